//! Descriptor set management for shader resource binding.
//!
//! - [`DescriptorSetLayout`] defines the layout of shader bindings
//! - [`DescriptorPool`] allocates descriptor sets (with `FREE_DESCRIPTOR_SET`)
//! - [`DescriptorBindingBuilder`] builds the image bindings the passes use
//! - [`pool_sizes`] sums the descriptor counts a set of layouts needs
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use lightfield_rhi::device::Device;
//! use lightfield_rhi::descriptor::{
//!     pool_sizes, DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout,
//! };
//!
//! # fn example(device: Arc<Device>) -> Result<(), lightfield_rhi::RhiError> {
//! let bindings = [
//!     DescriptorBindingBuilder::sampled_image(0, vk::ShaderStageFlags::COMPUTE),
//!     DescriptorBindingBuilder::storage_image(1, vk::ShaderStageFlags::COMPUTE),
//! ];
//! let layout = DescriptorSetLayout::new(device.clone(), &bindings)?;
//! let pool = DescriptorPool::new(device, 1, &pool_sizes(&bindings))?;
//! let sets = pool.allocate(&[layout.handle()])?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Descriptor set layout wrapper.
///
/// Immutable after creation.
pub struct DescriptorSetLayout {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan descriptor set layout handle.
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Creates a new descriptor set layout.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan descriptor set layout handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
        debug!("Destroyed descriptor set layout");
    }
}

/// Descriptor pool for allocating descriptor sets.
///
/// Sets may be freed individually. Pool operations are not thread-safe.
pub struct DescriptorPool {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan descriptor pool handle.
    pool: vk::DescriptorPool,
    /// Maximum number of sets that can be allocated.
    max_sets: u32,
}

impl DescriptorPool {
    /// Creates a new descriptor pool.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `max_sets` - Maximum number of descriptor sets that can be allocated
    /// * `pool_sizes` - Capacity per descriptor type
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation fails.
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes)
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET);

        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };

        debug!(
            "Created descriptor pool: max_sets={}, pool_sizes={}",
            max_sets,
            pool_sizes.len()
        );

        Ok(Self {
            device,
            pool,
            max_sets,
        })
    }

    /// Allocates one descriptor set per layout.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails (e.g., pool exhausted).
    pub fn allocate(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };

        debug!("Allocated {} descriptor set(s)", sets.len());

        Ok(sets)
    }

    /// Frees descriptor sets back to the pool.
    ///
    /// The sets must not be in use by the GPU.
    ///
    /// # Errors
    ///
    /// Returns an error if freeing fails.
    pub fn free(&self, sets: &[vk::DescriptorSet]) -> RhiResult<()> {
        unsafe {
            self.device.handle().free_descriptor_sets(self.pool, sets)?;
        }

        debug!("Freed {} descriptor set(s)", sets.len());

        Ok(())
    }

    /// Returns the Vulkan descriptor pool handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
        debug!("Destroyed descriptor pool");
    }
}

/// Writes resource bindings into descriptor sets.
///
/// The sets must not be in use by a pending command buffer.
pub fn update_descriptor_sets(device: &Device, writes: &[vk::WriteDescriptorSet]) {
    if writes.is_empty() {
        return;
    }

    unsafe {
        device.handle().update_descriptor_sets(writes, &[]);
    }

    debug!("Updated {} descriptor binding(s)", writes.len());
}

/// Creates an image info for descriptor set updates.
///
/// Pass `vk::Sampler::null()` for sampled, storage and input-attachment
/// descriptors.
#[inline]
pub fn image_info(
    sampler: vk::Sampler,
    image_view: vk::ImageView,
    image_layout: vk::ImageLayout,
) -> vk::DescriptorImageInfo {
    vk::DescriptorImageInfo::default()
        .sampler(sampler)
        .image_view(image_view)
        .image_layout(image_layout)
}

/// Sums descriptor counts per type, in order of first appearance.
pub fn pool_sizes(bindings: &[vk::DescriptorSetLayoutBinding]) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for binding in bindings {
        match sizes.iter_mut().find(|s| s.ty == binding.descriptor_type) {
            Some(size) => size.descriptor_count += binding.descriptor_count,
            None => sizes.push(
                vk::DescriptorPoolSize::default()
                    .ty(binding.descriptor_type)
                    .descriptor_count(binding.descriptor_count),
            ),
        }
    }
    sizes
}

/// Builder for single-descriptor layout bindings.
pub struct DescriptorBindingBuilder;

impl DescriptorBindingBuilder {
    fn single(
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(descriptor_type)
            .descriptor_count(1)
            .stage_flags(stage_flags)
    }

    /// Sampled image read with `texelFetch`, no sampler.
    #[inline]
    pub fn sampled_image(
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        Self::single(binding, vk::DescriptorType::SAMPLED_IMAGE, stage_flags)
    }

    /// Storage image, accessed in GENERAL layout.
    #[inline]
    pub fn storage_image(
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        Self::single(binding, vk::DescriptorType::STORAGE_IMAGE, stage_flags)
    }

    /// Subpass input attachment. Only valid for the fragment stage.
    #[inline]
    pub fn input_attachment(
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        Self::single(binding, vk::DescriptorType::INPUT_ATTACHMENT, stage_flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_binding_builder_sampled_image() {
        let binding = DescriptorBindingBuilder::sampled_image(0, vk::ShaderStageFlags::COMPUTE);
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.descriptor_type, vk::DescriptorType::SAMPLED_IMAGE);
        assert_eq!(binding.descriptor_count, 1);
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::COMPUTE);
    }

    #[test]
    fn test_descriptor_binding_builder_storage_image() {
        let binding = DescriptorBindingBuilder::storage_image(1, vk::ShaderStageFlags::COMPUTE);
        assert_eq!(binding.binding, 1);
        assert_eq!(binding.descriptor_type, vk::DescriptorType::STORAGE_IMAGE);
    }

    #[test]
    fn test_descriptor_binding_builder_input_attachment() {
        let binding =
            DescriptorBindingBuilder::input_attachment(0, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(binding.descriptor_type, vk::DescriptorType::INPUT_ATTACHMENT);
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_pool_sizes_merges_types() {
        let bindings = [
            DescriptorBindingBuilder::sampled_image(0, vk::ShaderStageFlags::COMPUTE),
            DescriptorBindingBuilder::storage_image(1, vk::ShaderStageFlags::COMPUTE),
            DescriptorBindingBuilder::input_attachment(0, vk::ShaderStageFlags::FRAGMENT),
            DescriptorBindingBuilder::sampled_image(2, vk::ShaderStageFlags::COMPUTE),
        ];

        let sizes = pool_sizes(&bindings);
        assert_eq!(sizes.len(), 3);
        assert_eq!(sizes[0].ty, vk::DescriptorType::SAMPLED_IMAGE);
        assert_eq!(sizes[0].descriptor_count, 2);
        assert_eq!(sizes[1].ty, vk::DescriptorType::STORAGE_IMAGE);
        assert_eq!(sizes[2].ty, vk::DescriptorType::INPUT_ATTACHMENT);
    }

    #[test]
    fn test_pool_sizes_empty() {
        assert!(pool_sizes(&[]).is_empty());
    }

    #[test]
    fn test_image_info_helper() {
        let info = image_info(
            vk::Sampler::null(),
            vk::ImageView::null(),
            vk::ImageLayout::GENERAL,
        );
        assert_eq!(info.sampler, vk::Sampler::null());
        assert_eq!(info.image_view, vk::ImageView::null());
        assert_eq!(info.image_layout, vk::ImageLayout::GENERAL);
    }
}
