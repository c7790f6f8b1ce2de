//! GPU images.
//!
//! [`GpuImage`] owns a device-local image, its memory and one view. The
//! caller picks 2D or 3D with [`ImageDimension`]; a 3D image keeps its 3D
//! view even when it has a single depth slice. The current layout is
//! tracked host-side and updated by every transition recorded through the
//! image, so callers can check the layout they expect before using it.
//!
//! Host uploads go through a staging buffer and a one-shot submission that
//! blocks until the queue is idle. They are meant for startup, not for the
//! frame loop.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error, info};

use crate::buffer::StagingBuffer;
use crate::command::{CommandBuffer, CommandPool, one_time_submit};
use crate::device::{Device, queue_create_families};
use crate::error::{RhiError, RhiResult};

/// Bytes per texel of the RGBA8 host data accepted by [`GpuImage::load_from_host`].
pub const HOST_TEXEL_SIZE: u64 = 4;

/// Color subresource range covering every mip level and array layer.
pub fn full_color_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(vk::REMAINING_MIP_LEVELS)
        .base_array_layer(0)
        .layer_count(vk::REMAINING_ARRAY_LAYERS)
}

/// Access mask and pipeline stages that use an image in `layout`.
pub fn layout_usage(layout: vk::ImageLayout) -> (vk::AccessFlags, vk::PipelineStageFlags) {
    match layout {
        vk::ImageLayout::UNDEFINED => (vk::AccessFlags::empty(), vk::PipelineStageFlags::TOP_OF_PIPE),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => {
            (vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER)
        }
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => (
            vk::AccessFlags::SHADER_READ | vk::AccessFlags::INPUT_ATTACHMENT_READ,
            vk::PipelineStageFlags::COMPUTE_SHADER | vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
        vk::ImageLayout::GENERAL => (
            vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
            vk::PipelineStageFlags::COMPUTE_SHADER,
        ),
        _ => (
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
    }
}

/// A layout transition ready to record.
#[derive(Debug, Clone, Copy)]
pub struct LayoutTransition {
    pub barrier: vk::ImageMemoryBarrier<'static>,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

/// Builds the full-image barrier for `from -> to` with stages derived from
/// both layouts. Used inside the frame on the graphics queue.
pub fn transition_barrier(
    image: vk::Image,
    from: vk::ImageLayout,
    to: vk::ImageLayout,
) -> LayoutTransition {
    let (src_access, src_stage) = layout_usage(from);
    let (dst_access, dst_stage) = layout_usage(to);

    LayoutTransition {
        barrier: vk::ImageMemoryBarrier::default()
            .old_layout(from)
            .new_layout(to)
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(full_color_range()),
        src_stage,
        dst_stage,
    }
}

/// Builds the startup barrier for `from -> to`, limited to TOP_OF_PIPE and
/// TRANSFER so it is valid on a transfer-only queue.
///
/// Consumers on other queues are ordered by the queue-idle wait that ends
/// every immediate submission.
pub fn init_transition_barrier(
    image: vk::Image,
    from: vk::ImageLayout,
    to: vk::ImageLayout,
) -> LayoutTransition {
    let (src_access, src_stage) = if from == vk::ImageLayout::TRANSFER_DST_OPTIMAL {
        (vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER)
    } else {
        (vk::AccessFlags::empty(), vk::PipelineStageFlags::TOP_OF_PIPE)
    };
    let dst_access = if to == vk::ImageLayout::TRANSFER_DST_OPTIMAL {
        vk::AccessFlags::TRANSFER_WRITE
    } else {
        vk::AccessFlags::empty()
    };

    LayoutTransition {
        barrier: vk::ImageMemoryBarrier::default()
            .old_layout(from)
            .new_layout(to)
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(full_color_range()),
        src_stage,
        dst_stage: vk::PipelineStageFlags::TRANSFER,
    }
}

/// Byte length a tightly packed RGBA8 upload of `extent` must have.
pub fn host_upload_size(extent: vk::Extent3D) -> u64 {
    u64::from(extent.width) * u64::from(extent.height) * u64::from(extent.depth) * HOST_TEXEL_SIZE
}

/// Copy region for a tightly packed upload of the whole image.
pub fn full_copy_region(extent: vk::Extent3D) -> vk::BufferImageCopy {
    vk::BufferImageCopy::default()
        .buffer_offset(0)
        .buffer_row_length(extent.width)
        .buffer_image_height(extent.height)
        .image_subresource(
            vk::ImageSubresourceLayers::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .mip_level(0)
                .base_array_layer(0)
                .layer_count(1),
        )
        .image_offset(vk::Offset3D::default())
        .image_extent(extent)
}

/// Dimensionality of a [`GpuImage`] and its view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageDimension {
    D2,
    D3,
}

impl ImageDimension {
    pub fn image_type(self) -> vk::ImageType {
        match self {
            ImageDimension::D2 => vk::ImageType::TYPE_2D,
            ImageDimension::D3 => vk::ImageType::TYPE_3D,
        }
    }

    pub fn view_type(self) -> vk::ImageViewType {
        match self {
            ImageDimension::D2 => vk::ImageViewType::TYPE_2D,
            ImageDimension::D3 => vk::ImageViewType::TYPE_3D,
        }
    }
}

/// Rejects empty extents and 2D images with more than one depth slice.
fn check_extent(
    name: &str,
    dimension: ImageDimension,
    extent: vk::Extent3D,
) -> RhiResult<()> {
    if extent.width == 0 || extent.height == 0 || extent.depth == 0 {
        return Err(RhiError::ImageError(format!(
            "{name}: empty extent {}x{}x{}",
            extent.width, extent.height, extent.depth
        )));
    }
    if dimension == ImageDimension::D2 && extent.depth != 1 {
        return Err(RhiError::ImageError(format!(
            "{name}: 2D image with depth {}",
            extent.depth
        )));
    }
    Ok(())
}

/// Device-local image with one view and a tracked layout.
///
/// # Resource Destruction
///
/// Resources are destroyed in the following order:
/// 1. Image view
/// 2. Image
/// 3. Memory allocation
pub struct GpuImage {
    device: Arc<Device>,
    image: vk::Image,
    image_view: vk::ImageView,
    allocation: Option<Allocation>,
    format: vk::Format,
    extent: vk::Extent3D,
    usage: vk::ImageUsageFlags,
    layout: vk::ImageLayout,
    name: &'static str,
}

impl GpuImage {
    /// Creates a device-local image and its view.
    ///
    /// When the device uses more than one queue family the image is created
    /// with concurrent sharing across them, so uploads on the transfer queue
    /// need no ownership transfer.
    ///
    /// # Errors
    ///
    /// Returns an error if the extent is empty, a 2D image has a depth other
    /// than 1, or any creation step fails.
    pub fn new(
        device: Arc<Device>,
        name: &'static str,
        dimension: ImageDimension,
        extent: vk::Extent3D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
    ) -> RhiResult<Self> {
        check_extent(name, dimension, extent)?;

        let image_type = dimension.image_type();
        let view_type = dimension.view_type();
        let families = queue_create_families(device.queue_families());
        let sharing_mode = if families.len() > 1 {
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        };

        let mut image_info = vk::ImageCreateInfo::default()
            .image_type(image_type)
            .format(format)
            .extent(extent)
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(sharing_mode)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        if sharing_mode == vk::SharingMode::CONCURRENT {
            image_info = image_info.queue_family_indices(&families);
        }

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = device.allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name,
                    requirements,
                    location: MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(RhiError::from)
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e);
            }
        };

        // From here on Drop releases whatever was created.
        let mut this = Self {
            device,
            image,
            image_view: vk::ImageView::null(),
            allocation: Some(allocation),
            format,
            extent,
            usage,
            layout: vk::ImageLayout::UNDEFINED,
            name,
        };

        if let Some(allocation) = &this.allocation {
            unsafe {
                this.device.handle().bind_image_memory(
                    image,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .level_count(1)
                    .layer_count(1),
            );

        this.image_view = unsafe { this.device.handle().create_image_view(&view_info, None)? };

        info!(
            "Created {} image: {}x{}x{}, format {:?}",
            name, extent.width, extent.height, extent.depth, format
        );

        Ok(this)
    }

    /// Records a full-image transition into `cmd`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::ImageError`] if `from` is neither UNDEFINED nor
    /// the tracked layout.
    pub fn transition_layout(
        &mut self,
        cmd: &CommandBuffer,
        from: vk::ImageLayout,
        to: vk::ImageLayout,
    ) -> RhiResult<()> {
        self.check_from(from)?;
        let transition = transition_barrier(self.image, from, to);
        cmd.pipeline_barrier(
            transition.src_stage,
            transition.dst_stage,
            &[transition.barrier],
        );
        self.layout = to;
        Ok(())
    }

    /// Transitions the image in a one-shot submission on `queue` and waits
    /// for the queue to go idle.
    ///
    /// # Errors
    ///
    /// Returns an error if `from` does not match or the submission fails.
    pub fn transition_layout_immediate(
        &mut self,
        pool: &CommandPool,
        queue: vk::Queue,
        from: vk::ImageLayout,
        to: vk::ImageLayout,
    ) -> RhiResult<()> {
        self.check_from(from)?;
        let transition = init_transition_barrier(self.image, from, to);
        one_time_submit(pool, queue, |cmd| {
            cmd.pipeline_barrier(
                transition.src_stage,
                transition.dst_stage,
                &[transition.barrier],
            );
            Ok(())
        })?;
        self.layout = to;
        debug!("{}: {:?} -> {:?}", self.name, from, to);
        Ok(())
    }

    /// Uploads tightly packed RGBA8 texels covering the whole image.
    ///
    /// Leaves the image in TRANSFER_DST_OPTIMAL. The staging buffer is freed
    /// after the queue goes idle.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::ImageError`] if `bytes` is not exactly
    /// `width * height * depth * 4` long, or an error from the submission.
    pub fn load_from_host(
        &mut self,
        pool: &CommandPool,
        queue: vk::Queue,
        bytes: &[u8],
    ) -> RhiResult<()> {
        let expected = host_upload_size(self.extent);
        if bytes.len() as u64 != expected {
            return Err(RhiError::ImageError(format!(
                "{}: upload of {} bytes, expected {}",
                self.name,
                bytes.len(),
                expected
            )));
        }

        let staging = StagingBuffer::with_data(self.device.clone(), bytes)?;
        let transition = init_transition_barrier(
            self.image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        let region = full_copy_region(self.extent);
        let image = self.image;

        one_time_submit(pool, queue, |cmd| {
            cmd.pipeline_barrier(
                transition.src_stage,
                transition.dst_stage,
                &[transition.barrier],
            );
            cmd.copy_buffer_to_image(
                staging.handle(),
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
            Ok(())
        })?;

        self.layout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
        info!("{}: uploaded {} bytes", self.name, bytes.len());
        Ok(())
    }

    fn check_from(&self, from: vk::ImageLayout) -> RhiResult<()> {
        if from != vk::ImageLayout::UNDEFINED && from != self.layout {
            return Err(RhiError::ImageError(format!(
                "{}: transition from {:?} but image is in {:?}",
                self.name, from, self.layout
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.image_view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent3D {
        self.extent
    }

    #[inline]
    pub fn usage(&self) -> vk::ImageUsageFlags {
        self.usage
    }

    /// Layout after the last transition recorded through this image.
    #[inline]
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        unsafe {
            if self.image_view != vk::ImageView::null() {
                self.device
                    .handle()
                    .destroy_image_view(self.image_view, None);
            }
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free {} allocation: {:?}", self.name, e);
                    }
                }
                Err(e) => error!("Leaking {} allocation: {e}", self.name),
            }
        }

        debug!("Destroyed {} image", self.name);
    }
}
