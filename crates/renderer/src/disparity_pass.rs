//! Compute pass that estimates disparity from the light field.
//!
//! Binding 0 is the light-field stack as a sampled 3D image (one slice per
//! view), binding 1 the disparity output as a storage image. The shader
//! runs 32x32 work groups and bounds-checks the edge tiles.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use lightfield_rhi::RhiResult;
use lightfield_rhi::command::CommandBuffer;
use lightfield_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, image_info,
    update_descriptor_sets,
};
use lightfield_rhi::device::Device;
use lightfield_rhi::image::GpuImage;
use lightfield_rhi::pipeline::{Pipeline, PipelineLayout, push_constant_range};
use lightfield_rhi::shader::{Shader, ShaderStage};

use crate::push_constants::PushConstants;

/// Work group edge length in invocations, matching `local_size_x/y`.
pub const WORKGROUP_SIZE: u32 = 32;

/// SPIR-V module name under the shader directory.
pub const SHADER_NAME: &str = "disparity.comp";

const LIGHT_FIELD_BINDING: u32 = 0;
const DISPARITY_BINDING: u32 = 1;

/// Work group counts covering `extent`, rounded up.
pub fn dispatch_size(extent: vk::Extent2D) -> [u32; 3] {
    [
        extent.width.div_ceil(WORKGROUP_SIZE),
        extent.height.div_ceil(WORKGROUP_SIZE),
        1,
    ]
}

/// Layout bindings of the compute descriptor set.
pub fn bindings() -> [vk::DescriptorSetLayoutBinding<'static>; 2] {
    [
        DescriptorBindingBuilder::sampled_image(LIGHT_FIELD_BINDING, vk::ShaderStageFlags::COMPUTE),
        DescriptorBindingBuilder::storage_image(DISPARITY_BINDING, vk::ShaderStageFlags::COMPUTE),
    ]
}

/// The disparity compute pipeline and its descriptor set.
pub struct DisparityPass {
    device: Arc<Device>,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    descriptor_set_layout: DescriptorSetLayout,
    descriptor_set: vk::DescriptorSet,
    dispatch: [u32; 3],
}

impl DisparityPass {
    /// Builds the pipeline and writes both descriptors.
    ///
    /// `light_field` must be in SHADER_READ_ONLY layout and `disparity` is
    /// bound as GENERAL, the layout it has while the dispatch runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the shader cannot be loaded or any Vulkan object
    /// creation fails.
    pub fn new(
        device: Arc<Device>,
        shader_dir: &Path,
        descriptor_pool: &DescriptorPool,
        light_field: &GpuImage,
        disparity: &GpuImage,
    ) -> RhiResult<Self> {
        let descriptor_set_layout = DescriptorSetLayout::new(device.clone(), &bindings())?;

        let pipeline_layout = PipelineLayout::new(
            device.clone(),
            &[descriptor_set_layout.handle()],
            &[push_constant_range::<PushConstants>(vk::ShaderStageFlags::COMPUTE)],
        )?;

        let shader = Shader::load(device.clone(), shader_dir, SHADER_NAME, ShaderStage::Compute)?;
        let pipeline = Pipeline::compute(device.clone(), &shader, &pipeline_layout)?;

        let descriptor_set = descriptor_pool.allocate(&[descriptor_set_layout.handle()])?[0];

        let extent = disparity.extent();
        let this = Self {
            device,
            pipeline,
            pipeline_layout,
            descriptor_set_layout,
            descriptor_set,
            dispatch: dispatch_size(vk::Extent2D {
                width: extent.width,
                height: extent.height,
            }),
        };

        this.write_light_field(light_field);
        this.write_disparity(disparity);

        info!(
            "Disparity pass created, dispatch {}x{}x{}",
            this.dispatch[0], this.dispatch[1], this.dispatch[2]
        );

        Ok(this)
    }

    fn write_light_field(&self, light_field: &GpuImage) {
        let infos = [image_info(
            vk::Sampler::null(),
            light_field.view(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )];
        let writes = [vk::WriteDescriptorSet::default()
            .dst_set(self.descriptor_set)
            .dst_binding(LIGHT_FIELD_BINDING)
            .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
            .image_info(&infos)];
        update_descriptor_sets(&self.device, &writes);
    }

    fn write_disparity(&self, disparity: &GpuImage) {
        let infos = [image_info(
            vk::Sampler::null(),
            disparity.view(),
            vk::ImageLayout::GENERAL,
        )];
        let writes = [vk::WriteDescriptorSet::default()
            .dst_set(self.descriptor_set)
            .dst_binding(DISPARITY_BINDING)
            .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
            .image_info(&infos)];
        update_descriptor_sets(&self.device, &writes);
    }

    /// Records pipeline and set binding, the push constants and the dispatch.
    ///
    /// The disparity image must be in GENERAL layout when this executes.
    pub fn execute(&self, cmd: &CommandBuffer, push_constants: &PushConstants) {
        cmd.bind_pipeline(self.pipeline.bind_point(), self.pipeline.handle());
        cmd.bind_descriptor_sets(
            self.pipeline.bind_point(),
            self.pipeline_layout.handle(),
            0,
            &[self.descriptor_set],
        );
        cmd.push_constants(
            self.pipeline_layout.handle(),
            vk::ShaderStageFlags::COMPUTE,
            0,
            push_constants,
        );
        let [x, y, z] = self.dispatch;
        cmd.dispatch(x, y, z);
    }

    /// Points the output binding at a recreated disparity image and resizes
    /// the dispatch to match. The set must not be in use by the GPU.
    pub fn resize(&mut self, disparity: &GpuImage) {
        self.write_disparity(disparity);
        let extent = disparity.extent();
        self.dispatch = dispatch_size(vk::Extent2D {
            width: extent.width,
            height: extent.height,
        });
        debug!(
            "Disparity dispatch resized to {}x{}",
            self.dispatch[0], self.dispatch[1]
        );
    }

    /// Work group counts of the next dispatch.
    pub fn dispatch(&self) -> [u32; 3] {
        self.dispatch
    }

    pub fn descriptor_set_layout(&self) -> &DescriptorSetLayout {
        &self.descriptor_set_layout
    }
}
