//! Render pass that draws the disparity image to the swapchain.
//!
//! The disparity image is attachment 0 and is read in the fragment shader
//! as a subpass input. The swapchain image is attachment 1. A single
//! full-screen triangle covers the target and the overlay draws after it
//! in the same subpass.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use lightfield_rhi::{RhiError, RhiResult};
use lightfield_rhi::command::CommandBuffer;
use lightfield_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, image_info,
    update_descriptor_sets,
};
use lightfield_rhi::device::Device;
use lightfield_rhi::image::GpuImage;
use lightfield_rhi::pipeline::{CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use lightfield_rhi::render_pass::{Framebuffer, RenderPass, full_scissor, full_viewport};
use lightfield_rhi::shader::{Shader, ShaderStage};
use lightfield_rhi::swapchain::Swapchain;

use crate::overlay::Overlay;

pub const VERTEX_SHADER_NAME: &str = "fullscreen.vert";
pub const FRAGMENT_SHADER_NAME: &str = "composite.frag";

const INPUT_ATTACHMENT: u32 = 0;
const OUTPUT_ATTACHMENT: u32 = 1;
const INPUT_BINDING: u32 = 0;

/// Attachment 0 is the disparity input, attachment 1 the swapchain output.
pub fn attachment_descriptions(
    disparity_format: vk::Format,
    surface_format: vk::Format,
) -> [vk::AttachmentDescription; 2] {
    [
        vk::AttachmentDescription::default()
            .format(disparity_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        vk::AttachmentDescription::default()
            .format(surface_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
    ]
}

/// Orders the color write after the presentation engine releases the image.
pub fn external_dependency() -> vk::SubpassDependency {
    vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        .dependency_flags(vk::DependencyFlags::BY_REGION)
}

/// Layout bindings of the composite descriptor set.
pub fn bindings() -> [vk::DescriptorSetLayoutBinding<'static>; 1] {
    [DescriptorBindingBuilder::input_attachment(
        INPUT_BINDING,
        vk::ShaderStageFlags::FRAGMENT,
    )]
}

fn create_render_pass(
    device: Arc<Device>,
    disparity_format: vk::Format,
    surface_format: vk::Format,
) -> RhiResult<RenderPass> {
    let input_refs = [vk::AttachmentReference {
        attachment: INPUT_ATTACHMENT,
        layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    }];
    let color_refs = [vk::AttachmentReference {
        attachment: OUTPUT_ATTACHMENT,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .input_attachments(&input_refs)
        .color_attachments(&color_refs);

    RenderPass::new(
        device,
        &attachment_descriptions(disparity_format, surface_format),
        subpass,
        &[external_dependency()],
    )
}

fn create_framebuffers(
    device: &Arc<Device>,
    render_pass: &RenderPass,
    swapchain: &Swapchain,
    disparity: &GpuImage,
) -> RhiResult<Vec<Framebuffer>> {
    swapchain
        .image_views()
        .iter()
        .map(|&view| {
            Framebuffer::new(
                device.clone(),
                render_pass,
                &[disparity.view(), view],
                swapchain.extent(),
            )
        })
        .collect()
}

/// Full-screen composite of the disparity image.
pub struct CompositePass {
    device: Arc<Device>,
    framebuffers: Vec<Framebuffer>,
    pipeline: Pipeline,
    pipeline_layout: PipelineLayout,
    descriptor_set_layout: DescriptorSetLayout,
    descriptor_set: vk::DescriptorSet,
    render_pass: RenderPass,
    extent: vk::Extent2D,
}

impl CompositePass {
    /// Builds the render pass, pipeline, input-attachment descriptor and one
    /// framebuffer per swapchain image.
    ///
    /// # Errors
    ///
    /// Returns an error if a shader cannot be loaded or any Vulkan object
    /// creation fails.
    pub fn new(
        device: Arc<Device>,
        shader_dir: &Path,
        descriptor_pool: &DescriptorPool,
        swapchain: &Swapchain,
        disparity: &GpuImage,
    ) -> RhiResult<Self> {
        let render_pass =
            create_render_pass(device.clone(), disparity.format(), swapchain.format())?;

        let descriptor_set_layout = DescriptorSetLayout::new(device.clone(), &bindings())?;
        let pipeline_layout =
            PipelineLayout::new(device.clone(), &[descriptor_set_layout.handle()], &[])?;

        let vertex_shader = Shader::load(
            device.clone(),
            shader_dir,
            VERTEX_SHADER_NAME,
            ShaderStage::Vertex,
        )?;
        let fragment_shader = Shader::load(
            device.clone(),
            shader_dir,
            FRAGMENT_SHADER_NAME,
            ShaderStage::Fragment,
        )?;

        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .cull_mode(CullMode::None)
            .render_pass(render_pass.handle(), 0)
            .build(device.clone(), &pipeline_layout)?;

        let descriptor_set = descriptor_pool.allocate(&[descriptor_set_layout.handle()])?[0];
        let framebuffers = create_framebuffers(&device, &render_pass, swapchain, disparity)?;

        let this = Self {
            device,
            framebuffers,
            pipeline,
            pipeline_layout,
            descriptor_set_layout,
            descriptor_set,
            render_pass,
            extent: swapchain.extent(),
        };
        this.write_input(disparity);

        info!(
            "Composite pass created with {} framebuffer(s)",
            this.framebuffers.len()
        );

        Ok(this)
    }

    fn write_input(&self, disparity: &GpuImage) {
        let infos = [image_info(
            vk::Sampler::null(),
            disparity.view(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )];
        let writes = [vk::WriteDescriptorSet::default()
            .dst_set(self.descriptor_set)
            .dst_binding(INPUT_BINDING)
            .descriptor_type(vk::DescriptorType::INPUT_ATTACHMENT)
            .image_info(&infos)];
        update_descriptor_sets(&self.device, &writes);
    }

    /// Records the render pass into `image_index`'s framebuffer.
    ///
    /// The disparity image must be in SHADER_READ_ONLY layout.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if there is no
    /// framebuffer for `image_index`.
    pub fn execute(
        &self,
        cmd: &CommandBuffer,
        image_index: u32,
        overlay: &mut dyn Overlay,
    ) -> RhiResult<()> {
        let framebuffer = self
            .framebuffers
            .get(image_index as usize)
            .ok_or_else(|| RhiError::InvalidHandle(format!("composite framebuffer {image_index}")))?;

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass.handle())
            .framebuffer(framebuffer.handle())
            .render_area(full_scissor(self.extent));

        cmd.begin_render_pass(&begin_info);
        cmd.bind_pipeline(self.pipeline.bind_point(), self.pipeline.handle());
        cmd.bind_descriptor_sets(
            self.pipeline.bind_point(),
            self.pipeline_layout.handle(),
            0,
            &[self.descriptor_set],
        );
        cmd.set_viewport(&full_viewport(self.extent));
        cmd.set_scissor(&full_scissor(self.extent));
        cmd.draw(3, 1, 0, 0);
        overlay.render_into(cmd);
        cmd.end_render_pass();

        Ok(())
    }

    /// Rebuilds the framebuffers and input descriptor after a swapchain
    /// recreation. Nothing may be in flight.
    ///
    /// The render pass is kept, so the surface format must not change.
    pub fn resize(&mut self, swapchain: &Swapchain, disparity: &GpuImage) -> RhiResult<()> {
        self.framebuffers.clear();
        self.framebuffers =
            create_framebuffers(&self.device, &self.render_pass, swapchain, disparity)?;
        self.extent = swapchain.extent();
        self.write_input(disparity);
        debug!(
            "Composite pass resized to {}x{}",
            self.extent.width, self.extent.height
        );
        Ok(())
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn descriptor_set_layout(&self) -> &DescriptorSetLayout {
        &self.descriptor_set_layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_layouts() {
        let [input, output] = attachment_descriptions(
            vk::Format::R32G32B32A32_SFLOAT,
            vk::Format::B8G8R8A8_SRGB,
        );

        assert_eq!(input.format, vk::Format::R32G32B32A32_SFLOAT);
        assert_eq!(input.load_op, vk::AttachmentLoadOp::LOAD);
        assert_eq!(input.store_op, vk::AttachmentStoreOp::DONT_CARE);
        assert_eq!(input.initial_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(input.final_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);

        assert_eq!(output.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(output.load_op, vk::AttachmentLoadOp::DONT_CARE);
        assert_eq!(output.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(output.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(output.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn test_input_binding() {
        let [input] = bindings();
        assert_eq!(input.descriptor_type, vk::DescriptorType::INPUT_ATTACHMENT);
        assert_eq!(input.stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_external_dependency() {
        let dep = external_dependency();
        assert_eq!(dep.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(dep.dst_subpass, 0);
        assert_eq!(dep.dst_stage_mask, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(dep.dst_access_mask, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
        assert_eq!(dep.dependency_flags, vk::DependencyFlags::BY_REGION);
    }
}
