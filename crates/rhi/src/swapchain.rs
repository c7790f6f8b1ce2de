//! Swapchain management.
//!
//! [`Swapchain`] owns the presentable image chain, one image view per image
//! and one [`FrameSyncSlot`] per image. It drives the per-frame protocol:
//!
//! ```text
//! acquire_next_image()  -> AcquiredImage { image_index, slot, .. }
//! record_commands(slot) -> &CommandBuffer   (waits on the slot fence)
//! present(image_index)                      (ends, submits, presents)
//! ```
//!
//! The chain can be rebuilt in place with [`Swapchain::recreate`] when the
//! surface goes out of date or the window is resized.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::command::CommandBuffer;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::sync::{FrameSyncSlot, SlotRing};

/// Present mode requested when nothing else is configured.
pub const DEFAULT_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

/// Swapchain surface support details.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (min/max image count, extents, transforms, etc.)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support details for a physical device and surface.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the queries fail.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> Result<Self, RhiError> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unlimited".to_string()
            } else {
                capabilities.max_image_count.to_string()
            }
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Returns true if at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Lifecycle of a [`Swapchain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    Uninitialized,
    Live,
    Destroyed,
}

/// Result of a successful [`Swapchain::acquire_next_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    /// Index into the swapchain images.
    pub image_index: u32,
    /// Frame sync slot used for this frame.
    pub slot: usize,
    /// The surface no longer matches exactly; presentation still works.
    pub suboptimal: bool,
}

/// Vulkan swapchain wrapper with its frame sync ring.
///
/// # Thread Safety
///
/// Not thread-safe. The frame loop owns the swapchain exclusively.
pub struct Swapchain {
    /// Reference to the logical device
    device: Arc<Device>,
    /// Swapchain extension loader
    swapchain_loader: ash::khr::swapchain::Device,
    /// Swapchain handle
    swapchain: vk::SwapchainKHR,
    /// Swapchain images (owned by the presentation engine)
    images: Vec<vk::Image>,
    /// Image views for the swapchain images
    image_views: Vec<vk::ImageView>,
    /// One sync slot per image
    slots: Vec<FrameSyncSlot>,
    /// Round-robin index into `slots`
    ring: SlotRing,
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    /// Requested present mode, reused by `recreate`
    preferred_present_mode: vk::PresentModeKHR,
    /// Frames-in-flight target, reused by `recreate`
    frames_in_flight: u32,
    state: SwapchainState,
}

/// Handles produced by one chain creation.
struct ChainParts {
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Creates the swapchain, its image views and one sync slot per image.
    ///
    /// # Arguments
    ///
    /// * `instance` - The Vulkan instance
    /// * `device` - The logical device
    /// * `surface` - The window surface
    /// * `drawable` - Current drawable size of the window in pixels
    /// * `preferred_present_mode` - Used if listed by the surface, else FIFO
    /// * `frames_in_flight` - Lower bound for the image count
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Surface queries fail
    /// - The surface lists no format or no present mode
    /// - Swapchain, image view or sync object creation fails
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        drawable: vk::Extent2D,
        preferred_present_mode: vk::PresentModeKHR,
        frames_in_flight: u32,
    ) -> RhiResult<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());

        let mut this = Self {
            device,
            swapchain_loader,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            slots: Vec::new(),
            ring: SlotRing::new(1)?,
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            extent: drawable,
            present_mode: preferred_present_mode,
            preferred_present_mode,
            frames_in_flight,
            state: SwapchainState::Uninitialized,
        };

        let parts = this.create_chain(instance, surface, drawable, vk::SwapchainKHR::null())?;
        this.install(parts)?;
        this.state = SwapchainState::Live;

        Ok(this)
    }

    /// Creates a chain and its views. `self` is only read.
    fn create_chain(
        &self,
        instance: &Instance,
        surface: vk::SurfaceKHR,
        drawable: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> RhiResult<ChainParts> {
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        let support =
            SwapchainSupportDetails::query(self.device.physical_device(), surface, &surface_loader)?;

        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "Inadequate swapchain support (no formats or present modes)".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes, self.preferred_present_mode);
        let extent = choose_extent(&support.capabilities, drawable);
        let image_count = determine_image_count(&support.capabilities, self.frames_in_flight);

        info!(
            "Creating swapchain: {}x{}, format {:?}, color space {:?}, present mode {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            surface_format.color_space,
            present_mode,
            image_count
        );

        // Graphics and present share a family, so the chain is never shared.
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None)? };

        let images = match unsafe { self.swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e.into());
            }
        };
        info!("Swapchain created with {} images", images.len());

        let image_views = match create_image_views(&self.device, &images, surface_format.format) {
            Ok(views) => views,
            Err(e) => {
                unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e);
            }
        };

        Ok(ChainParts {
            swapchain,
            images,
            image_views,
            format: surface_format,
            extent,
            present_mode,
        })
    }

    /// Takes ownership of `parts` and builds one sync slot per image.
    fn install(&mut self, parts: ChainParts) -> RhiResult<()> {
        self.swapchain = parts.swapchain;
        self.images = parts.images;
        self.image_views = parts.image_views;
        self.format = parts.format.format;
        self.color_space = parts.format.color_space;
        self.extent = parts.extent;
        self.present_mode = parts.present_mode;

        let count = self.images.len() as u32;
        self.slots = FrameSyncSlot::create_ring(
            &self.device,
            self.device.queue_families().graphics_family,
            count,
        )?;
        self.ring = SlotRing::new(count)?;
        Ok(())
    }

    /// Rebuilds the chain for a new drawable size (`Live -> Live`).
    ///
    /// Waits for the device to go idle, drops the views and sync slots,
    /// creates a new chain from the old handle, destroys the old chain and
    /// rebuilds the slots. The slot ring restarts at 0.
    ///
    /// Anything holding views of the old images (framebuffers) must be
    /// rebuilt by the caller afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the swapchain is not live or creation fails. A
    /// failed recreation leaves the swapchain `Destroyed`.
    pub fn recreate(
        &mut self,
        instance: &Instance,
        surface: vk::SurfaceKHR,
        new_extent: vk::Extent2D,
    ) -> RhiResult<()> {
        require_live(self.state)?;

        self.device.wait_idle()?;
        self.state = SwapchainState::Destroyed;

        info!(
            "Recreating swapchain for new size: {}x{}",
            new_extent.width, new_extent.height
        );

        self.slots.clear();
        self.destroy_image_views();

        let old_swapchain = self.swapchain;
        let parts = self.create_chain(instance, surface, new_extent, old_swapchain);

        unsafe {
            self.swapchain_loader.destroy_swapchain(old_swapchain, None);
        }
        self.swapchain = vk::SwapchainKHR::null();
        self.images.clear();

        self.install(parts?)?;
        self.state = SwapchainState::Live;
        Ok(())
    }

    fn slot(&self, index: usize) -> RhiResult<&FrameSyncSlot> {
        self.slots
            .get(index)
            .ok_or_else(|| RhiError::InvalidHandle(format!("frame sync slot {index}")))
    }

    /// Advances the slot ring and acquires the next presentable image.
    ///
    /// The new slot's image-available semaphore is signaled when the image
    /// is ready. The wait for an image is unbounded.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SwapchainOutOfDate`] when the surface changed and
    /// the chain must be recreated.
    pub fn acquire_next_image(&mut self) -> RhiResult<AcquiredImage> {
        require_live(self.state)?;
        let slot = self.ring.advance();
        let semaphore = self.slot(slot)?.image_available().handle();

        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, suboptimal)) => {
                if suboptimal {
                    warn!("Swapchain is suboptimal for the surface");
                }
                Ok(AcquiredImage {
                    image_index,
                    slot,
                    suboptimal,
                })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(RhiError::SwapchainOutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    /// Waits for `slot` to retire and begins its command buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if `slot` is out of range or the wait/reset fails.
    pub fn record_commands(&self, slot: usize) -> RhiResult<&CommandBuffer> {
        require_live(self.state)?;
        self.slot(slot)?.begin_recording()
    }

    /// Ends the current slot's recording, submits it and presents `image_index`.
    ///
    /// # Returns
    ///
    /// `true` if the chain is out of date or suboptimal and should be
    /// recreated before the next frame.
    ///
    /// # Errors
    ///
    /// Returns an error if ending, submission or presentation fails.
    pub fn present(&self, image_index: u32) -> RhiResult<bool> {
        require_live(self.state)?;
        let slot = self.slot(self.ring.current())?;
        let cmd = slot.command_buffer();
        cmd.end()?;

        let wait_semaphores = [slot.image_available().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [slot.render_finished().handle()];
        let command_buffers = [cmd.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .submit_graphics(&[submit_info], slot.in_flight().handle())?;
        }

        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.swapchain_loader
                .queue_present(self.device.present_queue(), &present_info)
        };

        match result {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    #[inline]
    pub fn state(&self) -> SwapchainState {
        self.state
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.color_space
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Returns the number of swapchain images.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    fn destroy_image_views(&mut self) {
        for &image_view in &self.image_views {
            unsafe {
                self.device.handle().destroy_image_view(image_view, None);
            }
        }
        self.image_views.clear();
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        // Fences and semaphores may still be referenced by queued work.
        if let Err(e) = self.device.wait_idle() {
            warn!("wait_idle before swapchain teardown failed: {e}");
        }

        self.slots.clear();
        self.destroy_image_views();

        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe {
                self.swapchain_loader
                    .destroy_swapchain(self.swapchain, None);
            }

            info!(
                "Swapchain destroyed (was {}x{}, {} images)",
                self.extent.width,
                self.extent.height,
                self.images.len()
            );
        }
        self.state = SwapchainState::Destroyed;
    }
}

/// Fails unless `state` is [`SwapchainState::Live`].
fn require_live(state: SwapchainState) -> RhiResult<()> {
    if state == SwapchainState::Live {
        Ok(())
    } else {
        Err(RhiError::SwapchainError(format!(
            "swapchain is {state:?}, not Live"
        )))
    }
}

/// Chooses the surface format.
///
/// Prefers B8G8R8A8_SRGB with SRGB_NONLINEAR color space, else the first
/// listed format. `formats` must not be empty.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    if let Some(&format) = preferred {
        debug!("Selected preferred surface format: B8G8R8A8_SRGB with SRGB_NONLINEAR");
        return format;
    }

    warn!(
        "Using first available surface format: {:?}",
        formats[0].format
    );
    formats[0]
}

/// Chooses `preferred` if the surface lists it, else FIFO.
///
/// FIFO is always supported by a conforming presentation engine.
pub fn choose_present_mode(
    present_modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if present_modes.contains(&preferred) {
        debug!("Selected {:?} present mode", preferred);
        return preferred;
    }

    debug!("{:?} unavailable, falling back to FIFO", preferred);
    vk::PresentModeKHR::FIFO
}

/// Chooses the swapchain extent.
///
/// Uses the surface's current extent when it is defined, else clamps the
/// drawable size to the surface limits.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    drawable: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        debug!(
            "Using current surface extent: {}x{}",
            capabilities.current_extent.width, capabilities.current_extent.height
        );
        return capabilities.current_extent;
    }

    let extent = vk::Extent2D {
        width: drawable.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: drawable.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    };

    debug!(
        "Calculated extent: {}x{} (drawable: {}x{})",
        extent.width, extent.height, drawable.width, drawable.height
    );

    extent
}

/// Image count: `max(min_image_count, frames_in_flight)`, capped by the
/// surface maximum when one is set.
pub fn determine_image_count(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    frames_in_flight: u32,
) -> u32 {
    let preferred = capabilities.min_image_count.max(frames_in_flight);

    // A max of 0 means no limit
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

/// Creates one 2D color view per swapchain image.
fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>, RhiError> {
    let mut image_views = Vec::with_capacity(images.len());

    for (i, &image) in images.iter().enumerate() {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .level_count(1)
                    .layer_count(1),
            );

        match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => image_views.push(view),
            Err(e) => {
                for &view in &image_views {
                    unsafe { device.handle().destroy_image_view(view, None) };
                }
                return Err(RhiError::SwapchainError(format!(
                    "Failed to create image view {i}: {e:?}"
                )));
            }
        }
    }

    debug!("Created {} image views", image_views.len());
    Ok(image_views)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn test_choose_surface_format_prefers_srgb() {
        let formats = vec![
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_SRGB),
            surface_format(vk::Format::B8G8R8A8_UNORM),
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(selected.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_choose_surface_format_falls_back_to_first() {
        let formats = vec![
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_UNORM),
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_choose_surface_format_needs_matching_color_space() {
        let formats = vec![
            surface_format(vk::Format::R16G16B16A16_SFLOAT),
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            },
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::R16G16B16A16_SFLOAT);
    }

    #[test]
    fn test_choose_present_mode_keeps_listed_preference() {
        let modes = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];

        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&modes, DEFAULT_PRESENT_MODE),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_choose_present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];

        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, vk::Extent2D { width: 512, height: 512 });
        assert_eq!(extent.width, 1920);
        assert_eq!(extent.height, 1080);
    }

    #[test]
    fn test_choose_extent_clamps_to_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 2000,
                height: 2000,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, vk::Extent2D { width: 3000, height: 50 });
        assert_eq!(extent.width, 2000);
        assert_eq!(extent.height, 100);

        let extent = choose_extent(&capabilities, vk::Extent2D { width: 512, height: 512 });
        assert_eq!(extent.width, 512);
        assert_eq!(extent.height, 512);
    }

    #[test]
    fn test_determine_image_count() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities, 2), 2);
        assert_eq!(determine_image_count(&capabilities, 3), 3);

        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 1,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities, 2), 2);

        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 1,
            max_image_count: 1,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities, 2), 1);
    }

    #[test]
    fn test_three_image_surface_yields_three_slots_visited_in_order() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 0,
            ..Default::default()
        };
        let image_count = determine_image_count(&capabilities, 2);
        assert_eq!(image_count, 3);

        // One slot per image, ring starting at 0.
        let mut ring = SlotRing::new(image_count).unwrap();
        let visited: Vec<usize> = (0..5).map(|_| ring.advance()).collect();
        assert_eq!(visited, vec![1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_only_live_chain_accepts_frame_calls() {
        assert!(require_live(SwapchainState::Live).is_ok());

        // A failed recreate leaves the chain Destroyed with no slots.
        for state in [SwapchainState::Uninitialized, SwapchainState::Destroyed] {
            let err = require_live(state).unwrap_err();
            assert!(matches!(err, RhiError::SwapchainError(msg) if msg.contains("not Live")));
        }
    }

    #[test]
    fn test_swapchain_support_details_is_adequate() {
        let adequate = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(adequate.is_adequate());

        let no_formats = SwapchainSupportDetails {
            formats: vec![],
            ..adequate.clone()
        };
        assert!(!no_formats.is_adequate());

        let no_modes = SwapchainSupportDetails {
            present_modes: vec![],
            ..adequate
        };
        assert!(!no_modes.is_adequate());
    }
}
