//! Frame sync slots on a real device. Skipped without a Vulkan driver.

use lightfield_rhi::sync::{Fence, FrameSyncSlot};
use lightfield_rhi::vk;

mod common;

use common::headless_device;

#[test]
fn test_slot_fence_starts_signaled_and_is_reset_by_recording() {
    let Some((instance, device)) = headless_device() else {
        return;
    };
    let graphics_family = device.queue_families().graphics_family;

    let slot = FrameSyncSlot::new(device.clone(), graphics_family)
        .expect("Failed to create frame sync slot");
    assert!(slot.in_flight().is_signaled());

    // The first recording must not block on a fresh slot.
    let cmd = slot.begin_recording().expect("Failed to begin recording");
    assert!(!slot.in_flight().is_signaled());
    cmd.end().expect("Failed to end recording");

    drop(slot);
    drop(device);
    drop(instance);
}

#[test]
fn test_slot_is_reusable_once_its_submission_retires() {
    let Some((instance, device)) = headless_device() else {
        return;
    };
    let graphics_family = device.queue_families().graphics_family;
    let slot = FrameSyncSlot::new(device.clone(), graphics_family)
        .expect("Failed to create frame sync slot");

    let cmd = slot.begin_recording().expect("Failed to begin recording");
    cmd.end().expect("Failed to end recording");

    let command_buffers = [cmd.handle()];
    let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
    unsafe {
        device
            .submit_graphics(&[submit_info], slot.in_flight().handle())
            .expect("Failed to submit");
    }

    slot.in_flight().wait(u64::MAX).expect("Fence wait failed");
    assert!(slot.in_flight().is_signaled());

    // Recording again waits on the retired fence and resets it.
    let cmd = slot.begin_recording().expect("Failed to begin second recording");
    assert!(!slot.in_flight().is_signaled());
    cmd.end().expect("Failed to end recording");

    drop(slot);
    drop(device);
    drop(instance);
}

#[test]
fn test_unsignaled_fence_blocks_until_timeout() {
    let Some((instance, device)) = headless_device() else {
        return;
    };

    let fence = Fence::new(device.clone(), false).expect("Failed to create fence");
    assert!(!fence.is_signaled());
    assert!(fence.wait(0).is_err());

    let ring = FrameSyncSlot::create_ring(&device, device.queue_families().graphics_family, 3)
        .expect("Failed to create ring");
    assert_eq!(ring.len(), 3);
    assert!(ring.iter().all(|slot| slot.in_flight().is_signaled()));

    drop(ring);
    drop(fence);
    drop(device);
    drop(instance);
}
