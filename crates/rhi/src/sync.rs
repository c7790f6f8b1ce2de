//! Synchronization primitives and the per-frame sync ring.
//!
//! - [`Semaphore`] - GPU-to-GPU synchronization (between queue operations)
//! - [`Fence`] - GPU-to-CPU synchronization (for host waiting)
//! - [`FrameSyncSlot`] - everything one in-flight frame needs: semaphores,
//!   fence, command pool and one primary command buffer
//! - [`SlotRing`] - the round-robin counter that picks the next slot
//!
//! # Frame protocol
//!
//! ```text
//! 1. ring.advance()                          -> slot s
//! 2. acquire image, signal s.image_available
//! 3. wait s.in_flight, reset it, reset s.command_pool, begin s.command_buffer
//! 4. record
//! 5. submit: wait s.image_available @ COLOR_ATTACHMENT_OUTPUT,
//!            signal s.render_finished + s.in_flight
//! 6. present: wait s.render_finished
//! ```
//!
//! Step 3 is the only backpressure: a slot is never touched again until the
//! GPU has signaled its fence.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::command::{CommandBuffer, CommandPool};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Frames the renderer aims to keep in flight.
pub const TARGET_FRAMES_IN_FLIGHT: u32 = 2;

/// Vulkan semaphore wrapper.
pub struct Semaphore {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan semaphore handle.
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new unsignaled binary semaphore.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Vulkan fence wrapper.
///
/// Fences let the host wait for GPU work. The frame loop waits on a slot's
/// fence before reusing that slot's command buffer.
pub struct Fence {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan fence handle.
    fence: vk::Fence,
}

impl Fence {
    /// Creates a new fence.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `signaled` - If true, creates the fence in the signaled state so the
    ///   first wait returns immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if fence creation fails.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);

        let fence = unsafe { device.handle().create_fence(&create_info, None)? };

        Ok(Self { device, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Waits for the fence to become signaled.
    ///
    /// `timeout` is in nanoseconds; `u64::MAX` waits forever.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait times out or fails.
    pub fn wait(&self, timeout: u64) -> Result<(), RhiError> {
        let fences = [self.fence];
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&fences, true, timeout)?
        };
        Ok(())
    }

    /// Resets the fence to the unsignaled state.
    ///
    /// The fence must not be in use by any queue operation when this is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset operation fails.
    pub fn reset(&self) -> Result<(), RhiError> {
        let fences = [self.fence];
        unsafe { self.device.handle().reset_fences(&fences)? };
        Ok(())
    }

    /// Checks if the fence is currently signaled without blocking.
    pub fn is_signaled(&self) -> bool {
        let result = unsafe { self.device.handle().get_fence_status(self.fence) };
        matches!(result, Ok(true))
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization and recording state for one in-flight frame.
pub struct FrameSyncSlot {
    /// Primary command buffer, allocated from `command_pool`.
    command_buffer: CommandBuffer,
    /// Pool reset as a whole before each recording.
    command_pool: CommandPool,
    /// Signaled when the swapchain image is acquired.
    image_available: Semaphore,
    /// Signaled when the frame's submission completes on the GPU.
    render_finished: Semaphore,
    /// Signaled with the submission; created signaled.
    in_flight: Fence,
}

impl FrameSyncSlot {
    /// Creates a slot whose command pool lives on `queue_family_index`.
    ///
    /// # Errors
    ///
    /// Returns an error if any object creation fails.
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> RhiResult<Self> {
        let command_pool = CommandPool::new(device.clone(), queue_family_index)?;
        let command_buffer = CommandBuffer::new(device.clone(), &command_pool)?;

        Ok(Self {
            command_buffer,
            command_pool,
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device, true)?,
        })
    }

    /// Creates `count` slots on the same queue family.
    pub fn create_ring(
        device: &Arc<Device>,
        queue_family_index: u32,
        count: u32,
    ) -> RhiResult<Vec<Self>> {
        let slots = (0..count)
            .map(|_| Self::new(device.clone(), queue_family_index))
            .collect::<RhiResult<Vec<_>>>()?;
        debug!("Created {} frame sync slot(s)", slots.len());
        Ok(slots)
    }

    /// Waits for the slot's previous submission, then prepares a fresh
    /// one-time-submit recording.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait, a reset or `begin` fails.
    pub fn begin_recording(&self) -> RhiResult<&CommandBuffer> {
        self.in_flight.wait(u64::MAX)?;
        self.in_flight.reset()?;
        self.command_pool.reset(false)?;
        self.command_buffer.begin()?;
        Ok(&self.command_buffer)
    }

    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    #[inline]
    pub fn image_available(&self) -> &Semaphore {
        &self.image_available
    }

    #[inline]
    pub fn render_finished(&self) -> &Semaphore {
        &self.render_finished
    }

    #[inline]
    pub fn in_flight(&self) -> &Fence {
        &self.in_flight
    }
}

/// Round-robin index over a fixed number of frame slots.
///
/// The index is pre-incremented: starting from 0, the first `advance` returns
/// slot 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRing {
    len: u32,
    current: u32,
}

impl SlotRing {
    /// Creates a ring over `len` slots, positioned at slot 0.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SwapchainError`] for an empty ring.
    pub fn new(len: u32) -> RhiResult<Self> {
        if len == 0 {
            return Err(RhiError::SwapchainError(
                "frame sync ring needs at least one slot".to_string(),
            ));
        }
        Ok(Self { len, current: 0 })
    }

    /// Moves to the next slot and returns its index.
    #[inline]
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % self.len;
        self.current as usize
    }

    /// Index of the slot most recently returned by [`SlotRing::advance`].
    #[inline]
    pub fn current(&self) -> usize {
        self.current as usize
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns to slot 0, as after creation.
    pub fn reset(&mut self) {
        self.current = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_visits_slots_with_pre_increment() {
        let mut ring = SlotRing::new(3).unwrap();
        assert_eq!(ring.current(), 0);

        let visited: Vec<usize> = (0..5).map(|_| ring.advance()).collect();
        assert_eq!(visited, vec![1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_ring_index_after_k_advances() {
        for len in 1..=4u32 {
            let mut ring = SlotRing::new(len).unwrap();
            for k in 1..=12usize {
                ring.advance();
                assert_eq!(ring.current(), k % len as usize);
            }
        }
    }

    #[test]
    fn test_ring_no_overlap_within_window() {
        let mut ring = SlotRing::new(3).unwrap();
        let picks: Vec<usize> = (0..12).map(|_| ring.advance()).collect();
        for window in picks.windows(ring.len()) {
            let mut sorted = window.to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), window.len());
        }
    }

    #[test]
    fn test_ring_reset() {
        let mut ring = SlotRing::new(2).unwrap();
        ring.advance();
        ring.reset();
        assert_eq!(ring.current(), 0);
        assert_eq!(ring.advance(), 1);
    }

    #[test]
    fn test_ring_rejects_zero_slots() {
        assert!(SlotRing::new(0).is_err());
    }

    /// Host-side model of the per-slot fence protocol.
    struct FenceModel {
        /// Submission each slot's fence is pending on, if any.
        pending: Vec<Option<usize>>,
        /// Submissions the GPU has completed.
        completed: Vec<bool>,
    }

    impl FenceModel {
        fn new(slots: usize, frames: usize) -> Self {
            Self {
                pending: vec![None; slots],
                completed: vec![false; frames],
            }
        }

        /// Submission that recording into `slot` must wait for, if unfinished.
        fn blocks_on(&self, slot: usize) -> Option<usize> {
            self.pending[slot].filter(|&frame| !self.completed[frame])
        }

        fn submit(&mut self, slot: usize, frame: usize) {
            self.pending[slot] = Some(frame);
        }
    }

    #[test]
    fn test_fence_discipline_bounds_frames_in_flight() {
        let n = TARGET_FRAMES_IN_FLIGHT as usize;
        let frames = n + 1;
        let mut ring = SlotRing::new(n as u32).unwrap();
        let mut model = FenceModel::new(n, frames);

        // The GPU completes nothing while the host submits N+1 frames.
        for frame in 0..frames {
            let slot = ring.advance();
            let blocker = model.blocks_on(slot);
            if frame < n {
                assert_eq!(blocker, None, "frame {frame} must not block");
            } else {
                assert_eq!(blocker, Some(0), "frame {frame} must wait for the first");
                model.completed[0] = true;
                assert_eq!(model.blocks_on(slot), None);
            }
            model.submit(slot, frame);
        }
    }

    #[test]
    fn test_sync_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
    }
}
