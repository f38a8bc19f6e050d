//! Graphics pipelines
//!
//! [`GraphicsPipeline`] is the immutable GPU object. It is baked against one
//! render pass and one extent, so [`Pipeline`] keeps the inputs around and
//! rebuilds it whenever the swapchain is replaced.

use std::ffi::CStr;
use std::rc::Rc;

use ash::{vk, Device};

use crate::render::frame::SwapchainDependent;
use crate::render::vulkan::{
    commands::ActiveRenderPass, DeviceContext, IndexBuffer, RenderPassHandle, ShaderModule, ShaderStage,
    UniformBuffer, VertexBuffer, VulkanError, VulkanResult,
};

const ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// Everything a pipeline draws with
#[derive(Clone)]
pub struct PipelineDescriptor {
    /// Shader modules and the stage each is bound to
    pub shaders: Vec<(ShaderStage, Rc<ShaderModule>)>,
    /// Vertex data; its layout drives the vertex input state
    pub vertex_buffer: Rc<VertexBuffer>,
    /// Optional indices; draws are indexed when present
    pub index_buffer: Option<Rc<IndexBuffer>>,
    /// Optional per-frame uniform at set 0
    pub uniform_buffer: Option<Rc<UniformBuffer>>,
}

impl PipelineDescriptor {
    /// Descriptor with shaders and vertices only
    pub fn new(vertex_buffer: Rc<VertexBuffer>) -> Self {
        Self {
            shaders: Vec::new(),
            vertex_buffer,
            index_buffer: None,
            uniform_buffer: None,
        }
    }

    /// Attach a shader stage
    pub fn with_shader(mut self, stage: ShaderStage, module: Rc<ShaderModule>) -> Self {
        self.shaders.push((stage, module));
        self
    }

    /// Attach an index buffer
    pub fn with_index_buffer(mut self, index_buffer: Rc<IndexBuffer>) -> Self {
        self.index_buffer = Some(index_buffer);
        self
    }

    /// Attach a uniform buffer
    pub fn with_uniform_buffer(mut self, uniform_buffer: Rc<UniformBuffer>) -> Self {
        self.uniform_buffer = Some(uniform_buffer);
        self
    }

    /// Fails unless both a vertex and a fragment stage are present
    pub fn validate(&self) -> VulkanResult<()> {
        for required in [ShaderStage::Vertex, ShaderStage::Fragment] {
            if !self.shaders.iter().any(|(stage, _)| *stage == required) {
                return Err(VulkanError::InvalidOperation {
                    reason: format!("pipeline has no {:?} shader", required),
                });
            }
        }
        Ok(())
    }
}

/// Full-extent viewport with the standard depth range
pub fn viewport_for(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Full-extent scissor
pub const fn scissor_for(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

/// Graphics pipeline wrapper with RAII cleanup
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Bake a pipeline for `render_pass` at `extent`
    pub fn new(
        context: &DeviceContext,
        descriptor: &PipelineDescriptor,
        set_layout: Option<vk::DescriptorSetLayout>,
        render_pass: RenderPassHandle,
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        descriptor.validate()?;
        let device = context.device();

        let shader_stages: Vec<_> = descriptor
            .shaders
            .iter()
            .map(|(stage, module)| {
                vk::PipelineShaderStageCreateInfo::builder()
                    .stage(stage.flags())
                    .module(module.handle())
                    .name(ENTRY_POINT)
                    .build()
            })
            .collect();

        let vertex_layout = descriptor.vertex_buffer.layout();
        let bindings = [vertex_layout.binding_description()];
        let attributes = vertex_layout.attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewports = [viewport_for(extent)];
        let scissors = [scissor_for(extent)];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let set_layouts: Vec<_> = set_layout.into_iter().collect();
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }.map_err(VulkanError::Api)?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(render_pass.raw())
            .subpass(0);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
        };
        let pipeline = match pipelines {
            Ok(mut pipelines) => pipelines.pop(),
            Err((_, result)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::Api(result));
            }
        };
        let Some(pipeline) = pipeline else {
            unsafe { device.destroy_pipeline_layout(layout, None) };
            return Err(VulkanError::InitializationFailed("driver returned no pipeline".to_string()));
        };

        Ok(Self {
            device: device.clone(),
            pipeline,
            layout,
        })
    }

    /// Get pipeline handle
    pub const fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get pipeline layout handle
    pub const fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// A drawable pipeline that follows the swapchain
pub struct Pipeline {
    context: DeviceContext,
    descriptor: PipelineDescriptor,
    set_layout: Option<vk::DescriptorSetLayout>,
    graphics: Option<GraphicsPipeline>,
}

impl Pipeline {
    /// Validate `descriptor` and bake it for the current swapchain
    pub fn new(
        context: &DeviceContext,
        descriptor: PipelineDescriptor,
        uniform_layout: vk::DescriptorSetLayout,
        render_pass: RenderPassHandle,
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let set_layout = descriptor.uniform_buffer.as_ref().map(|_| uniform_layout);
        let mut pipeline = Self {
            context: context.clone(),
            descriptor,
            set_layout,
            graphics: None,
        };
        pipeline.on_swapchain_create(render_pass, extent)?;
        Ok(pipeline)
    }

    /// Inputs this pipeline draws with
    pub const fn descriptor(&self) -> &PipelineDescriptor {
        &self.descriptor
    }

    /// Whether a GPU pipeline currently exists
    pub const fn is_built(&self) -> bool {
        self.graphics.is_some()
    }

    /// Record this pipeline's draw for frame slot `slot`
    pub fn record(&self, pass: &mut ActiveRenderPass<'_>, slot: usize) -> VulkanResult<()> {
        let graphics = self.graphics.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "pipeline recorded while its swapchain is gone".to_string(),
        })?;

        pass.bind_pipeline(graphics.handle());
        pass.bind_vertex_buffer(self.descriptor.vertex_buffer.handle());

        if let Some(uniform) = &self.descriptor.uniform_buffer {
            let set = uniform.descriptor_set(slot).ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("uniform buffer has no descriptor set for frame slot {}", slot),
            })?;
            pass.bind_descriptor_set(graphics.layout(), set);
        }

        match &self.descriptor.index_buffer {
            Some(indices) => {
                pass.bind_index_buffer(indices.handle());
                pass.draw_indexed(indices.index_count(), 1);
            }
            None => pass.draw(self.descriptor.vertex_buffer.vertex_count(), 1),
        }
        Ok(())
    }
}

impl SwapchainDependent for Pipeline {
    fn on_swapchain_destroy(&mut self) {
        self.graphics = None;
    }

    fn on_swapchain_create(&mut self, render_pass: RenderPassHandle, extent: vk::Extent2D) -> VulkanResult<()> {
        self.graphics = Some(GraphicsPipeline::new(
            &self.context,
            &self.descriptor,
            self.set_layout,
            render_pass,
            extent,
        )?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_viewport_covers_extent() {
        let viewport = viewport_for(vk::Extent2D { width: 800, height: 600 });
        assert_relative_eq!(viewport.x, 0.0);
        assert_relative_eq!(viewport.y, 0.0);
        assert_relative_eq!(viewport.width, 800.0);
        assert_relative_eq!(viewport.height, 600.0);
        assert_relative_eq!(viewport.min_depth, 0.0);
        assert_relative_eq!(viewport.max_depth, 1.0);
    }

    #[test]
    fn test_scissor_covers_extent() {
        let extent = vk::Extent2D { width: 1280, height: 720 };
        let scissor = scissor_for(extent);
        assert_eq!(scissor.offset.x, 0);
        assert_eq!(scissor.offset.y, 0);
        assert_eq!(scissor.extent, extent);
    }
}
