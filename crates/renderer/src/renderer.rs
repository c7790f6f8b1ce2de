//! Main renderer orchestration.
//!
//! This module provides the [`Renderer`] that owns every Vulkan object and
//! drives one frame at a time through the steps of [`plan_frame`].

use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use lightfield_core::{Config, PresentMode};
use lightfield_platform::{Surface, Window};
use lightfield_resources::LightField;
use lightfield_rhi::RhiError;
use lightfield_rhi::command::{CommandBuffer, CommandPool};
use lightfield_rhi::descriptor::{DescriptorPool, pool_sizes};
use lightfield_rhi::device::Device;
use lightfield_rhi::image::{GpuImage, ImageDimension};
use lightfield_rhi::instance::Instance;
use lightfield_rhi::physical_device::select_physical_device;
use lightfield_rhi::swapchain::{AcquiredImage, Swapchain};

use crate::composite_pass::{self, CompositePass};
use crate::disparity_pass::{self, DisparityPass};
use crate::error::RendererResult;
use crate::frame_plan::{FrameOp, PlanImage, plan_frame, validate_plan};
use crate::light_field::upload_light_field;
use crate::overlay::Overlay;
use crate::push_constants::PushConstants;

/// Texel format of the disparity image.
pub const DISPARITY_FORMAT: vk::Format = vk::Format::R32G32B32A32_SFLOAT;

/// Descriptor sets allocated at startup: one per pass.
const DESCRIPTOR_SET_COUNT: u32 = 2;

/// Vulkan present mode for a configured mode.
pub fn to_vk_present_mode(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
    }
}

/// Usage of the disparity image: compute output, composite input.
pub fn disparity_usage() -> vk::ImageUsageFlags {
    vk::ImageUsageFlags::STORAGE
        | vk::ImageUsageFlags::SAMPLED
        | vk::ImageUsageFlags::COLOR_ATTACHMENT
        | vk::ImageUsageFlags::INPUT_ATTACHMENT
}

/// What happened to a requested frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and queued for presentation.
    Presented,
    /// Nothing was drawn: the window is minimized or the swapchain went
    /// out of date while acquiring.
    Skipped,
}

/// Main renderer that owns all Vulkan resources.
///
/// # Resource Destruction Order
///
/// 1. Wait for the device to go idle
/// 2. Composite and disparity passes
/// 3. Disparity and light-field images
/// 4. Descriptor pool and command pools
/// 5. Swapchain (and its frame sync slots)
/// 6. Device
/// 7. Surface
/// 8. Instance
///
/// ManuallyDrop is used to ensure correct destruction order.
pub struct Renderer {
    instance: ManuallyDrop<Instance>,
    surface: ManuallyDrop<Surface>,
    device: ManuallyDrop<Arc<Device>>,
    swapchain: ManuallyDrop<Swapchain>,

    /// Startup and resize transitions on the graphics queue.
    graphics_pool: ManuallyDrop<CommandPool>,
    /// Light-field upload on the transfer queue.
    transfer_pool: ManuallyDrop<CommandPool>,
    descriptor_pool: ManuallyDrop<DescriptorPool>,

    light_field: ManuallyDrop<GpuImage>,
    disparity: ManuallyDrop<GpuImage>,

    disparity_pass: ManuallyDrop<DisparityPass>,
    composite_pass: ManuallyDrop<CompositePass>,

    /// Set when acquire or present reports the chain out of date, or the
    /// window was resized.
    needs_recreate: bool,
    /// Latest drawable size reported by the window.
    drawable: vk::Extent2D,
}

impl Renderer {
    /// Creates the renderer for `window`.
    ///
    /// Loads and uploads the configured light field at the swapchain size,
    /// creates the disparity image and builds both passes.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan object cannot be created, the light
    /// field cannot be loaded or a shader is missing.
    pub fn new(window: &Window, config: &Config) -> RendererResult<Self> {
        let drawable = window.drawable_extent();
        info!(
            "Initializing Vulkan renderer ({}x{})",
            drawable.width, drawable.height
        );

        let instance = Instance::new(
            Some(window.raw_display_handle()?),
            config.renderer.validation_enabled(),
        )?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device_info)?;

        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            drawable,
            to_vk_present_mode(config.renderer.present_mode),
            config.renderer.frames_in_flight,
        )?;
        let extent = swapchain.extent();

        let families = *device.queue_families();
        let graphics_pool = CommandPool::new_transient(device.clone(), families.graphics_family)?;
        let transfer_pool = CommandPool::new_transient(device.clone(), families.transfer_family)?;

        let bindings: Vec<_> = disparity_pass::bindings()
            .into_iter()
            .chain(composite_pass::bindings())
            .collect();
        let descriptor_pool = DescriptorPool::new(
            device.clone(),
            DESCRIPTOR_SET_COUNT,
            &pool_sizes(&bindings),
        )?;

        let light_field = LightField::load(
            &config.light_field.directory,
            &config.light_field.name_filter,
            &config.light_field.indices,
            extent.width,
            extent.height,
        )?;
        let light_field = upload_light_field(
            device.clone(),
            &transfer_pool,
            device.transfer_queue(),
            &light_field,
        )?;

        let disparity = create_disparity_image(&device, &graphics_pool, extent)?;

        let shader_dir = config.shaders.directory.as_path();
        let disparity_pass = DisparityPass::new(
            device.clone(),
            shader_dir,
            &descriptor_pool,
            &light_field,
            &disparity,
        )?;
        let composite_pass = CompositePass::new(
            device.clone(),
            shader_dir,
            &descriptor_pool,
            &swapchain,
            &disparity,
        )?;

        validate_plan(&plan_frame())?;

        info!(
            "Renderer initialized on {}: {} swapchain images, present mode {:?}",
            physical_device_info.device_name(),
            swapchain.image_count(),
            swapchain.present_mode()
        );

        Ok(Self {
            instance: ManuallyDrop::new(instance),
            surface: ManuallyDrop::new(surface),
            device: ManuallyDrop::new(device),
            swapchain: ManuallyDrop::new(swapchain),
            graphics_pool: ManuallyDrop::new(graphics_pool),
            transfer_pool: ManuallyDrop::new(transfer_pool),
            descriptor_pool: ManuallyDrop::new(descriptor_pool),
            light_field: ManuallyDrop::new(light_field),
            disparity: ManuallyDrop::new(disparity),
            disparity_pass: ManuallyDrop::new(disparity_pass),
            composite_pass: ManuallyDrop::new(composite_pass),
            needs_recreate: false,
            drawable,
        })
    }

    /// Notifies the renderer that the window has been resized.
    ///
    /// The swapchain is rebuilt at the start of the next frame. A zero size
    /// (minimized) pauses rendering until a non-zero size arrives.
    pub fn resize(&mut self, extent: vk::Extent2D) {
        if extent == self.drawable {
            return;
        }
        debug!(
            "Resize triggered: {}x{} -> {}x{}",
            self.drawable.width, self.drawable.height, extent.width, extent.height
        );
        self.drawable = extent;
        self.needs_recreate = true;
    }

    /// Renders one frame.
    ///
    /// Walks [`plan_frame`]: acquire, record, disparity to GENERAL,
    /// dispatch, disparity back to SHADER_READ_ONLY, composite, submit and
    /// present. An out-of-date swapchain is rebuilt on the next call.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan operation fails for a reason other
    /// than an out-of-date swapchain.
    pub fn render_frame(
        &mut self,
        overlay: &mut dyn Overlay,
        push_constants: &PushConstants,
    ) -> RendererResult<FrameOutcome> {
        if self.drawable.width == 0 || self.drawable.height == 0 {
            return Ok(FrameOutcome::Skipped);
        }

        if self.needs_recreate {
            self.recreate_swapchain()?;
        }

        let mut acquired: Option<AcquiredImage> = None;
        let mut cmd: Option<CommandBuffer> = None;

        for op in plan_frame() {
            match op {
                FrameOp::Acquire => match self.swapchain.acquire_next_image() {
                    Ok(image) => {
                        self.needs_recreate |= image.suboptimal;
                        acquired = Some(image);
                    }
                    Err(RhiError::SwapchainOutOfDate) => {
                        debug!("Swapchain out of date on acquire");
                        self.needs_recreate = true;
                        return Ok(FrameOutcome::Skipped);
                    }
                    Err(e) => return Err(e.into()),
                },
                FrameOp::BeginRecording => {
                    let image = acquired_image(acquired)?;
                    let recording = self.swapchain.record_commands(image.slot)?;
                    cmd = Some(CommandBuffer::from_handle(
                        Arc::clone(&*self.device),
                        recording.handle(),
                    ));
                }
                FrameOp::Transition { image, from, to } => {
                    let cmd = recording(&cmd)?;
                    match image {
                        PlanImage::Disparity => self.disparity.transition_layout(cmd, from, to)?,
                    }
                }
                FrameOp::DispatchCompute => {
                    self.disparity_pass.execute(recording(&cmd)?, push_constants);
                }
                FrameOp::Composite => {
                    let image = acquired_image(acquired)?;
                    self.composite_pass
                        .execute(recording(&cmd)?, image.image_index, overlay)?;
                }
                FrameOp::SubmitPresent => {
                    let image = acquired_image(acquired)?;
                    if self.swapchain.present(image.image_index)? {
                        debug!("Swapchain needs recreation after present");
                        self.needs_recreate = true;
                    }
                }
            }
        }

        Ok(FrameOutcome::Presented)
    }

    /// Rebuilds the swapchain and everything sized to it.
    ///
    /// The disparity image is recreated at the new extent and moved to
    /// SHADER_READ_ONLY. The compute descriptor, dispatch size and composite
    /// framebuffers are updated before the old image is released.
    fn recreate_swapchain(&mut self) -> RendererResult<()> {
        self.device.wait_idle()?;

        self.swapchain
            .recreate(&self.instance, self.surface.handle(), self.drawable)?;
        let extent = self.swapchain.extent();

        let disparity = create_disparity_image(&self.device, &self.graphics_pool, extent)?;
        self.disparity_pass.resize(&disparity);
        self.composite_pass.resize(&self.swapchain, &disparity)?;
        *self.disparity = disparity;

        self.needs_recreate = false;
        info!(
            "Swapchain recreated at {}x{}",
            extent.width, extent.height
        );
        Ok(())
    }

    /// Returns the current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Returns the swapchain format.
    pub fn format(&self) -> vk::Format {
        self.swapchain.format()
    }

    /// Extent of the light-field stack, depth being the view count.
    pub fn light_field_extent(&self) -> vk::Extent3D {
        self.light_field.extent()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!(
                "Failed to wait for device idle during renderer drop: {:?}",
                e
            );
        }

        unsafe {
            ManuallyDrop::drop(&mut self.composite_pass);
            ManuallyDrop::drop(&mut self.disparity_pass);
            ManuallyDrop::drop(&mut self.disparity);
            ManuallyDrop::drop(&mut self.light_field);
            ManuallyDrop::drop(&mut self.descriptor_pool);
            ManuallyDrop::drop(&mut self.transfer_pool);
            ManuallyDrop::drop(&mut self.graphics_pool);
            ManuallyDrop::drop(&mut self.swapchain);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}

/// Creates the disparity image and moves it to SHADER_READ_ONLY, the
/// layout it rests in between frames.
fn create_disparity_image(
    device: &Arc<Device>,
    graphics_pool: &CommandPool,
    extent: vk::Extent2D,
) -> RendererResult<GpuImage> {
    let mut image = GpuImage::new(
        device.clone(),
        "disparity",
        ImageDimension::D2,
        vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        },
        DISPARITY_FORMAT,
        disparity_usage(),
    )?;
    image.transition_layout_immediate(
        graphics_pool,
        device.graphics_queue(),
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    )?;
    Ok(image)
}

fn acquired_image(acquired: Option<AcquiredImage>) -> Result<AcquiredImage, RhiError> {
    acquired.ok_or_else(|| RhiError::InvalidHandle("no acquired swapchain image".to_string()))
}

fn recording(cmd: &Option<CommandBuffer>) -> Result<&CommandBuffer, RhiError> {
    cmd.as_ref()
        .ok_or_else(|| RhiError::InvalidHandle("no command buffer recording".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_mode_mapping() {
        assert_eq!(to_vk_present_mode(PresentMode::Fifo), vk::PresentModeKHR::FIFO);
        assert_eq!(
            to_vk_present_mode(PresentMode::Mailbox),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            to_vk_present_mode(PresentMode::Immediate),
            vk::PresentModeKHR::IMMEDIATE
        );
    }

    #[test]
    fn test_disparity_usage_covers_both_passes() {
        let usage = disparity_usage();
        assert!(usage.contains(vk::ImageUsageFlags::STORAGE));
        assert!(usage.contains(vk::ImageUsageFlags::INPUT_ATTACHMENT));
        assert!(usage.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
    }

    #[test]
    fn test_missing_acquire_is_an_error() {
        assert!(acquired_image(None).is_err());
        assert!(recording(&None).is_err());
    }
}
