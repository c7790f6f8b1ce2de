//! Integration tests that need a Vulkan loader.

use lightfield_rhi::physical_device::{
    AdapterCandidate, DISCRETE_GPU_BONUS, assign_queue_families, score_adapter,
};
use lightfield_rhi::vk;

mod common;

use common::headless_instance;

#[test]
fn test_headless_instance_without_validation() {
    let Some(instance) = headless_instance() else {
        return;
    };
    assert!(!instance.has_validation());
}

#[test]
fn test_real_adapters_score_from_their_limits() {
    let Some(instance) = headless_instance() else {
        return;
    };

    let devices = unsafe { instance.handle().enumerate_physical_devices() }
        .expect("Failed to enumerate physical devices");

    for device in devices {
        let properties = unsafe { instance.handle().get_physical_device_properties(device) };
        let families = unsafe {
            instance
                .handle()
                .get_physical_device_queue_family_properties(device)
        };

        // Without a surface, assume every family can present.
        let candidate = AdapterCandidate {
            device_type: properties.device_type,
            max_image_dimension_2d: properties.limits.max_image_dimension2_d,
            queue_families: assign_queue_families(&families, |_| true),
            format_count: 1,
            present_mode_count: 1,
        };

        match score_adapter(&candidate) {
            Some(score) => {
                assert!(score >= properties.limits.max_image_dimension2_d);
                if properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
                    assert!(score >= DISCRETE_GPU_BONUS);
                }
            }
            None => assert!(candidate.queue_families.is_none()),
        }
    }
}
