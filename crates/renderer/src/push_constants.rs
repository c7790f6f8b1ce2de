//! Push constants shared by the disparity shader and the input handling.

use bytemuck::{Pod, Zeroable};

use lightfield_core::MAX_STEP_COUNT;

/// Phase that shows the disparity map.
pub const DISPARITY_PHASE: u32 = 0;

/// Highest phase; phase `n` in `1..=MAX_PHASE` shows light-field view `n - 1`.
pub const MAX_PHASE: u32 = 9;

/// Push constant block of `disparity.comp`.
///
/// Layout matches the GLSL `push_constant` block: two tightly packed `uint`s.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct PushConstants {
    /// 0 for disparity, 1..=9 for a raw view.
    pub phase: u32,
    /// Number of disparity hypotheses swept per pixel.
    pub step_count: u32,
}

impl PushConstants {
    /// Size in bytes (8 bytes).
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Disparity output with `step_count` clamped to the valid range.
    pub fn new(step_count: u32) -> Self {
        Self {
            phase: DISPARITY_PHASE,
            step_count: step_count.clamp(1, MAX_STEP_COUNT),
        }
    }

    /// Selects the output phase. Values past [`MAX_PHASE`] are ignored.
    ///
    /// Returns whether the phase changed.
    pub fn set_phase(&mut self, phase: u32) -> bool {
        if phase > MAX_PHASE || phase == self.phase {
            return false;
        }
        self.phase = phase;
        true
    }

    /// Adds `delta` to the step count, staying within `[1, MAX_STEP_COUNT]`.
    ///
    /// Returns whether the step count changed.
    pub fn adjust_step_count(&mut self, delta: i32) -> bool {
        let next = (i64::from(self.step_count) + i64::from(delta))
            .clamp(1, i64::from(MAX_STEP_COUNT)) as u32;
        let changed = next != self.step_count;
        self.step_count = next;
        changed
    }

    /// Light-field view shown by the current phase, if any.
    pub fn view_index(&self) -> Option<u32> {
        (self.phase != DISPARITY_PHASE).then(|| self.phase - 1)
    }
}

impl Default for PushConstants {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_constants_layout() {
        assert_eq!(PushConstants::SIZE, 8);
        let pc = PushConstants {
            phase: 3,
            step_count: 16,
        };
        let bytes = bytemuck::bytes_of(&pc);
        assert_eq!(&bytes[0..4], &3u32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &16u32.to_ne_bytes());
    }

    #[test]
    fn test_new_clamps_step_count() {
        assert_eq!(PushConstants::new(0).step_count, 1);
        assert_eq!(PushConstants::new(1000).step_count, MAX_STEP_COUNT);
        assert_eq!(PushConstants::new(16).phase, DISPARITY_PHASE);
    }

    #[test]
    fn test_set_phase() {
        let mut pc = PushConstants::default();
        assert!(pc.set_phase(5));
        assert_eq!(pc.view_index(), Some(4));
        assert!(!pc.set_phase(5));
        assert!(!pc.set_phase(10));
        assert_eq!(pc.phase, 5);
        assert!(pc.set_phase(0));
        assert_eq!(pc.view_index(), None);
    }

    #[test]
    fn test_adjust_step_count_bounds() {
        let mut pc = PushConstants::new(2);
        assert!(pc.adjust_step_count(-1));
        assert_eq!(pc.step_count, 1);
        assert!(!pc.adjust_step_count(-1));
        assert_eq!(pc.step_count, 1);

        let mut pc = PushConstants::new(MAX_STEP_COUNT);
        assert!(!pc.adjust_step_count(1));
        assert_eq!(pc.step_count, MAX_STEP_COUNT);
        assert!(pc.adjust_step_count(-4));
        assert_eq!(pc.step_count, MAX_STEP_COUNT - 4);
    }
}
