//! GPU upload of a decoded light field.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use lightfield_resources::LightField;
use lightfield_rhi::RhiResult;
use lightfield_rhi::command::CommandPool;
use lightfield_rhi::device::Device;
use lightfield_rhi::image::{GpuImage, ImageDimension};

/// Texel format of the light-field stack.
pub const LIGHT_FIELD_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// The stack is always a 3D image, even for a single view, so its view
/// matches the `texture3D` binding of the disparity shader.
pub const LIGHT_FIELD_DIMENSION: ImageDimension = ImageDimension::D3;

/// Extent of the 3D image holding every view as one depth slice.
pub fn light_field_extent(light_field: &LightField) -> vk::Extent3D {
    vk::Extent3D {
        width: light_field.width(),
        height: light_field.height(),
        depth: light_field.view_count(),
    }
}

/// Uploads all views in one transfer submission and leaves the image in
/// SHADER_READ_ONLY layout.
///
/// `pool` must belong to the family of `queue`.
///
/// # Errors
///
/// Returns an error if the light field is empty, or image creation or any
/// submission fails.
pub fn upload_light_field(
    device: Arc<Device>,
    pool: &CommandPool,
    queue: vk::Queue,
    light_field: &LightField,
) -> RhiResult<GpuImage> {
    let mut image = GpuImage::new(
        device,
        "light field",
        LIGHT_FIELD_DIMENSION,
        light_field_extent(light_field),
        LIGHT_FIELD_FORMAT,
        vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
    )?;

    image.load_from_host(pool, queue, light_field.data())?;
    image.transition_layout_immediate(
        pool,
        queue,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    )?;

    info!(
        "Light field resident: {} view(s) at {}x{}",
        light_field.view_count(),
        light_field.width(),
        light_field.height()
    );

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_view_stays_three_dimensional() {
        let light_field = LightField::from_raw(4, 4, 1, vec![0; 4 * 4 * 4]).unwrap();
        let extent = light_field_extent(&light_field);

        assert_eq!(extent.depth, 1);
        assert_eq!(LIGHT_FIELD_DIMENSION.image_type(), vk::ImageType::TYPE_3D);
        assert_eq!(LIGHT_FIELD_DIMENSION.view_type(), vk::ImageViewType::TYPE_3D);
    }

    #[test]
    fn test_extent_depth_is_view_count() {
        let light_field = LightField::from_raw(3, 2, 9, vec![0; 3 * 2 * 4 * 9]).unwrap();
        let extent = light_field_extent(&light_field);
        assert_eq!((extent.width, extent.height, extent.depth), (3, 2, 9));
    }
}
