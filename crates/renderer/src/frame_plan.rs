//! The fixed per-frame command sequence and its layout checks.
//!
//! The orchestrator walks [`plan_frame`] step by step, so the order of GPU
//! work inside a frame lives in one place and can be checked without a
//! device.

use ash::vk;
use thiserror::Error;

/// Images whose layout changes inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanImage {
    Disparity,
}

/// One step of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOp {
    /// Acquire the next swapchain image and advance the sync ring.
    Acquire,
    /// Wait on the slot fence and begin its command buffer.
    BeginRecording,
    /// Record a full-image layout transition.
    Transition {
        image: PlanImage,
        from: vk::ImageLayout,
        to: vk::ImageLayout,
    },
    /// Record the disparity dispatch.
    DispatchCompute,
    /// Record the composite render pass.
    Composite,
    /// End, submit and present.
    SubmitPresent,
}

/// Layout problems found by [`validate_plan`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("step {step}: {op:?} before the image was acquired")]
    NotAcquired { step: usize, op: FrameOp },

    #[error("step {step}: {op:?} outside command recording")]
    NotRecording { step: usize, op: FrameOp },

    #[error("step {step}: transition from {from:?} but {image:?} is in {current:?}")]
    LayoutMismatch {
        step: usize,
        image: PlanImage,
        from: vk::ImageLayout,
        current: vk::ImageLayout,
    },

    #[error("step {step}: dispatch needs GENERAL, disparity is in {current:?}")]
    DispatchLayout { step: usize, current: vk::ImageLayout },

    #[error("step {step}: composite needs SHADER_READ_ONLY, disparity is in {current:?}")]
    CompositeLayout { step: usize, current: vk::ImageLayout },

    #[error("frame ends with disparity in {0:?} instead of SHADER_READ_ONLY")]
    UnbalancedLayout(vk::ImageLayout),

    #[error("frame is never submitted")]
    NotSubmitted,
}

/// Layout the disparity image is in between frames.
pub const DISPARITY_REST_LAYOUT: vk::ImageLayout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;

/// The frame sequence: acquire, record, bracket the dispatch with layout
/// transitions, composite, then submit and present.
pub fn plan_frame() -> [FrameOp; 7] {
    [
        FrameOp::Acquire,
        FrameOp::BeginRecording,
        FrameOp::Transition {
            image: PlanImage::Disparity,
            from: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            to: vk::ImageLayout::GENERAL,
        },
        FrameOp::DispatchCompute,
        FrameOp::Transition {
            image: PlanImage::Disparity,
            from: vk::ImageLayout::GENERAL,
            to: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        },
        FrameOp::Composite,
        FrameOp::SubmitPresent,
    ]
}

/// Checks that `ops` keeps the disparity image in the layout each step
/// needs, starting and ending at [`DISPARITY_REST_LAYOUT`].
pub fn validate_plan(ops: &[FrameOp]) -> Result<(), PlanError> {
    let mut layout = DISPARITY_REST_LAYOUT;
    let mut acquired = false;
    let mut recording = false;
    let mut submitted = false;

    for (step, &op) in ops.iter().enumerate() {
        if op != FrameOp::Acquire && !acquired {
            return Err(PlanError::NotAcquired { step, op });
        }
        let records = !matches!(op, FrameOp::Acquire | FrameOp::BeginRecording);
        if records && !recording {
            return Err(PlanError::NotRecording { step, op });
        }

        match op {
            FrameOp::Acquire => acquired = true,
            FrameOp::BeginRecording => recording = true,
            FrameOp::Transition { image, from, to } => {
                if from != layout {
                    return Err(PlanError::LayoutMismatch {
                        step,
                        image,
                        from,
                        current: layout,
                    });
                }
                layout = to;
            }
            FrameOp::DispatchCompute => {
                if layout != vk::ImageLayout::GENERAL {
                    return Err(PlanError::DispatchLayout {
                        step,
                        current: layout,
                    });
                }
            }
            FrameOp::Composite => {
                if layout != vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL {
                    return Err(PlanError::CompositeLayout {
                        step,
                        current: layout,
                    });
                }
            }
            FrameOp::SubmitPresent => {
                recording = false;
                submitted = true;
            }
        }
    }

    if !submitted {
        return Err(PlanError::NotSubmitted);
    }
    if layout != DISPARITY_REST_LAYOUT {
        return Err(PlanError::UnbalancedLayout(layout));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_is_valid() {
        assert_eq!(validate_plan(&plan_frame()), Ok(()));
    }

    #[test]
    fn test_plan_order() {
        let plan = plan_frame();
        assert_eq!(plan[0], FrameOp::Acquire);
        assert_eq!(plan[1], FrameOp::BeginRecording);
        assert_eq!(plan[3], FrameOp::DispatchCompute);
        assert_eq!(plan[5], FrameOp::Composite);
        assert_eq!(plan[6], FrameOp::SubmitPresent);
    }

    #[test]
    fn test_dispatch_without_transition_rejected() {
        let mut plan = plan_frame().to_vec();
        plan.remove(2);
        assert_eq!(
            validate_plan(&plan),
            Err(PlanError::DispatchLayout {
                step: 2,
                current: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            })
        );
    }

    #[test]
    fn test_composite_in_general_rejected() {
        let mut plan = plan_frame().to_vec();
        plan.swap(4, 5);
        assert_eq!(
            validate_plan(&plan),
            Err(PlanError::CompositeLayout {
                step: 4,
                current: vk::ImageLayout::GENERAL,
            })
        );
    }

    #[test]
    fn test_transition_from_wrong_layout_rejected() {
        let mut plan = plan_frame().to_vec();
        plan.insert(
            3,
            FrameOp::Transition {
                image: PlanImage::Disparity,
                from: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                to: vk::ImageLayout::GENERAL,
            },
        );
        assert!(matches!(
            validate_plan(&plan),
            Err(PlanError::LayoutMismatch { step: 3, .. })
        ));
    }

    #[test]
    fn test_recording_before_acquire_rejected() {
        let mut plan = plan_frame().to_vec();
        plan.swap(0, 1);
        assert!(matches!(
            validate_plan(&plan),
            Err(PlanError::NotAcquired { step: 0, .. })
        ));
    }

    #[test]
    fn test_unbalanced_and_unsubmitted_rejected() {
        let plan = plan_frame();
        assert_eq!(validate_plan(&plan[..6]), Err(PlanError::NotSubmitted));

        let mut plan = plan_frame().to_vec();
        plan.remove(5);
        plan.remove(4);
        assert_eq!(
            validate_plan(&plan),
            Err(PlanError::UnbalancedLayout(vk::ImageLayout::GENERAL))
        );
    }
}
