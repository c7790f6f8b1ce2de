//! Graphics and compute pipeline management.
//!
//! - [`PipelineLayout`] wraps VkPipelineLayout (descriptor set layouts and
//!   push constant ranges)
//! - [`Pipeline`] wraps a graphics or compute VkPipeline
//! - [`GraphicsPipelineBuilder`] builds render-pass graphics pipelines
//!
//! Pipelines are created without a pipeline cache. A
//! `PIPELINE_COMPILE_REQUIRED` result is logged and reported as
//! [`RhiError::PipelineError`]; there is no fallback compile.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::path::Path;
//! use lightfield_rhi::device::Device;
//! use lightfield_rhi::shader::{Shader, ShaderStage};
//! use lightfield_rhi::pipeline::{Pipeline, PipelineLayout};
//!
//! # fn example(device: Arc<Device>) -> Result<(), lightfield_rhi::RhiError> {
//! let shader = Shader::load(
//!     device.clone(),
//!     Path::new("shaders/spirv"),
//!     "disparity.comp",
//!     ShaderStage::Compute,
//! )?;
//! let layout = PipelineLayout::new(device.clone(), &[], &[])?;
//! let pipeline = Pipeline::compute(device, &shader, &layout)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::Shader;

/// Vulkan pipeline layout wrapper.
///
/// Immutable after creation.
pub struct PipelineLayout {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan pipeline layout handle.
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a new pipeline layout.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `descriptor_set_layouts` - Slice of descriptor set layout handles
    /// * `push_constant_ranges` - Slice of push constant ranges
    ///
    /// # Errors
    ///
    /// Returns an error if pipeline layout creation fails.
    pub fn new(
        device: Arc<Device>,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(descriptor_set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe { device.handle().create_pipeline_layout(&create_info, None)? };

        debug!(
            "Created pipeline layout with {} descriptor set layout(s) and {} push constant range(s)",
            descriptor_set_layouts.len(),
            push_constant_ranges.len()
        );

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan pipeline layout handle.
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
        debug!("Pipeline layout destroyed");
    }
}

/// Push constant range covering a whole `T` at offset 0.
pub fn push_constant_range<T>(stage_flags: vk::ShaderStageFlags) -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags,
        offset: 0,
        size: std::mem::size_of::<T>() as u32,
    }
}

/// Maps a failed pipeline creation result to an error.
///
/// `PIPELINE_COMPILE_REQUIRED` is only returned when compilation was
/// deferred; it is logged and reported without a retry.
pub fn pipeline_creation_error(kind: &str, result: vk::Result) -> RhiError {
    if result == vk::Result::PIPELINE_COMPILE_REQUIRED {
        error!("{} pipeline requires compilation, not retrying", kind);
        return RhiError::PipelineError(format!("{kind} pipeline compile required"));
    }
    RhiError::VulkanError(result)
}

/// Vulkan pipeline wrapper.
///
/// Immutable after creation.
pub struct Pipeline {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan pipeline handle.
    pipeline: vk::Pipeline,
    /// Pipeline bind point (graphics or compute).
    bind_point: vk::PipelineBindPoint,
}

impl Pipeline {
    /// Creates a compute pipeline from a single compute shader.
    ///
    /// # Errors
    ///
    /// Returns an error if the shader is not a compute shader or creation fails.
    pub fn compute(device: Arc<Device>, shader: &Shader, layout: &PipelineLayout) -> RhiResult<Self> {
        if shader.stage() != crate::shader::ShaderStage::Compute {
            return Err(RhiError::PipelineError(format!(
                "compute pipeline needs a compute shader, got {}",
                shader.stage()
            )));
        }

        let create_info = vk::ComputePipelineCreateInfo::default()
            .stage(shader.stage_create_info())
            .layout(layout.handle());

        let pipeline = unsafe {
            device
                .handle()
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, result)| pipeline_creation_error("Compute", result))?[0]
        };

        info!("Compute pipeline created");

        Ok(Self {
            device,
            pipeline,
            bind_point: vk::PipelineBindPoint::COMPUTE,
        })
    }

    fn create_graphics_internal(
        device: Arc<Device>,
        create_info: &vk::GraphicsPipelineCreateInfo,
    ) -> RhiResult<Self> {
        let pipeline = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[*create_info], None)
                .map_err(|(_, result)| pipeline_creation_error("Graphics", result))?[0]
        };

        info!("Graphics pipeline created");

        Ok(Self {
            device,
            pipeline,
            bind_point: vk::PipelineBindPoint::GRAPHICS,
        })
    }

    /// Returns the Vulkan pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Returns the pipeline bind point (graphics or compute).
    #[inline]
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        self.bind_point
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        info!(
            "{} pipeline destroyed",
            if self.bind_point == vk::PipelineBindPoint::GRAPHICS {
                "Graphics"
            } else {
                "Compute"
            }
        );
    }
}

/// Face culling mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    /// Do not cull any faces.
    None,
    /// Cull front-facing triangles.
    Front,
    /// Cull back-facing triangles.
    #[default]
    Back,
}

impl CullMode {
    /// Converts to Vulkan cull mode flags.
    pub fn to_vk(self) -> vk::CullModeFlags {
        match self {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Front => vk::CullModeFlags::FRONT,
            CullMode::Back => vk::CullModeFlags::BACK,
        }
    }
}

/// Builder for render-pass graphics pipelines.
///
/// Defaults:
///
/// - No vertex input (vertices are generated in the vertex shader)
/// - Primitive topology: Triangle list
/// - Cull mode: Back-face culling, counter-clockwise front face
/// - No depth/stencil, no blending, one color attachment
/// - Dynamic states: Viewport and Scissor
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use lightfield_rhi::device::Device;
/// use lightfield_rhi::shader::Shader;
/// use lightfield_rhi::pipeline::{CullMode, GraphicsPipelineBuilder, PipelineLayout};
/// use ash::vk;
///
/// # fn example(
/// #     device: Arc<Device>,
/// #     vs: &Shader,
/// #     fs: &Shader,
/// #     render_pass: vk::RenderPass,
/// # ) -> Result<(), lightfield_rhi::RhiError> {
/// let layout = PipelineLayout::new(device.clone(), &[], &[])?;
/// let pipeline = GraphicsPipelineBuilder::new()
///     .vertex_shader(vs)
///     .fragment_shader(fs)
///     .cull_mode(CullMode::None)
///     .render_pass(render_pass, 0)
///     .build(device, &layout)?;
/// # Ok(())
/// # }
/// ```
pub struct GraphicsPipelineBuilder<'a> {
    vertex_shader: Option<&'a Shader>,
    fragment_shader: Option<&'a Shader>,
    topology: vk::PrimitiveTopology,
    cull_mode: CullMode,
    front_face: vk::FrontFace,
    color_attachment_count: u32,
    render_pass: vk::RenderPass,
    subpass: u32,
    dynamic_states: Vec<vk::DynamicState>,
}

impl Default for GraphicsPipelineBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> GraphicsPipelineBuilder<'a> {
    /// Creates a new graphics pipeline builder with default settings.
    pub fn new() -> Self {
        Self {
            vertex_shader: None,
            fragment_shader: None,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            cull_mode: CullMode::Back,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            color_attachment_count: 1,
            render_pass: vk::RenderPass::null(),
            subpass: 0,
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
        }
    }

    pub fn vertex_shader(mut self, shader: &'a Shader) -> Self {
        self.vertex_shader = Some(shader);
        self
    }

    pub fn fragment_shader(mut self, shader: &'a Shader) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    pub fn topology(mut self, topology: vk::PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    pub fn front_face(mut self, face: vk::FrontFace) -> Self {
        self.front_face = face;
        self
    }

    /// Number of color attachments written by the subpass.
    pub fn color_attachment_count(mut self, count: u32) -> Self {
        self.color_attachment_count = count;
        self
    }

    /// Sets the render pass and subpass the pipeline is used in.
    pub fn render_pass(mut self, render_pass: vk::RenderPass, subpass: u32) -> Self {
        self.render_pass = render_pass;
        self.subpass = subpass;
        self
    }

    /// Adds a dynamic state.
    pub fn dynamic_state(mut self, state: vk::DynamicState) -> Self {
        if !self.dynamic_states.contains(&state) {
            self.dynamic_states.push(state);
        }
        self
    }

    /// Checks that everything `build` needs is set.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PipelineError`] naming the first missing piece.
    pub fn validate(&self) -> RhiResult<()> {
        if self.vertex_shader.is_none() {
            return Err(RhiError::PipelineError(
                "Vertex shader is required".to_string(),
            ));
        }
        if self.fragment_shader.is_none() {
            return Err(RhiError::PipelineError(
                "Fragment shader is required".to_string(),
            ));
        }
        if self.render_pass == vk::RenderPass::null() {
            return Err(RhiError::PipelineError(
                "A render pass is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the graphics pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if [`GraphicsPipelineBuilder::validate`] fails or
    /// pipeline creation fails.
    pub fn build(self, device: Arc<Device>, layout: &PipelineLayout) -> RhiResult<Pipeline> {
        self.validate()?;
        let (Some(vertex_shader), Some(fragment_shader)) =
            (self.vertex_shader, self.fragment_shader)
        else {
            return Err(RhiError::PipelineError(
                "Shader stages are required".to_string(),
            ));
        };

        let shader_stages = [
            vertex_shader.stage_create_info(),
            fragment_shader.stage_create_info(),
        ];

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default();

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(self.topology)
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode.to_vk())
            .front_face(self.front_face);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .min_sample_shading(1.0);

        let color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = (0..self
            .color_attachment_count)
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::default()
                    .blend_enable(false)
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
            })
            .collect();

        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&self.dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .render_pass(self.render_pass)
            .subpass(self.subpass);

        Pipeline::create_graphics_internal(device, &pipeline_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    struct EightBytes {
        _a: u32,
        _b: u32,
    }

    #[test]
    fn test_cull_mode_to_vk() {
        assert_eq!(CullMode::None.to_vk(), vk::CullModeFlags::NONE);
        assert_eq!(CullMode::Front.to_vk(), vk::CullModeFlags::FRONT);
        assert_eq!(CullMode::Back.to_vk(), vk::CullModeFlags::BACK);
        assert_eq!(CullMode::default(), CullMode::Back);
    }

    #[test]
    fn test_push_constant_range_covers_type() {
        let range = push_constant_range::<EightBytes>(vk::ShaderStageFlags::COMPUTE);
        assert_eq!(range.offset, 0);
        assert_eq!(range.size, 8);
        assert_eq!(range.stage_flags, vk::ShaderStageFlags::COMPUTE);
    }

    #[test]
    fn test_compile_required_becomes_pipeline_error() {
        let err = pipeline_creation_error("Compute", vk::Result::PIPELINE_COMPILE_REQUIRED);
        assert!(matches!(err, RhiError::PipelineError(_)));

        let err = pipeline_creation_error("Compute", vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        assert!(matches!(
            err,
            RhiError::VulkanError(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
        ));
    }

    #[test]
    fn test_graphics_pipeline_builder_default() {
        let builder = GraphicsPipelineBuilder::new();
        assert!(builder.vertex_shader.is_none());
        assert!(builder.fragment_shader.is_none());
        assert_eq!(builder.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(builder.cull_mode, CullMode::Back);
        assert_eq!(builder.color_attachment_count, 1);
        assert_eq!(builder.dynamic_states.len(), 2);
    }

    #[test]
    fn test_graphics_pipeline_builder_requires_shaders() {
        let err = GraphicsPipelineBuilder::new().validate().unwrap_err();
        assert!(matches!(err, RhiError::PipelineError(msg) if msg.contains("Vertex")));
    }

    #[test]
    fn test_graphics_pipeline_builder_dynamic_state_dedup() {
        let builder = GraphicsPipelineBuilder::new()
            .dynamic_state(vk::DynamicState::LINE_WIDTH)
            .dynamic_state(vk::DynamicState::LINE_WIDTH)
            .dynamic_state(vk::DynamicState::VIEWPORT);
        assert_eq!(builder.dynamic_states.len(), 3);
    }

    #[test]
    fn test_graphics_pipeline_builder_render_pass() {
        let builder = GraphicsPipelineBuilder::new()
            .cull_mode(CullMode::None)
            .render_pass(vk::RenderPass::null(), 1);
        assert_eq!(builder.subpass, 1);
        assert_eq!(builder.cull_mode, CullMode::None);
    }
}
