//! Renderer and Vulkan presenter
//!
//! [`Renderer`] owns the per-slot command buffers and the registered
//! pipelines, and is what applications record into. [`VulkanPresenter`]
//! pairs it with the [`Swapchain`] and implements [`PresentationEngine`] so
//! the frame scheduler can drive real hardware.

use std::path::Path;
use std::rc::Rc;

use ash::vk;
use slotmap::SlotMap;

use crate::render::frame::{AcquireOutcome, PresentationEngine, PresentationResult, SwapchainDependent};
use crate::render::vulkan::{
    commands::{ActiveRenderPass, CommandPool, CommandRecorder},
    pipeline::scissor_for,
    CommandBufferHandle, DescriptorPool, DescriptorSetLayout, DeviceContext, Fence, FramebufferHandle, IndexBuffer,
    Pipeline, PipelineDescriptor, RenderPassHandle, Semaphore, ShaderModule, Swapchain, UniformBuffer, VertexBuffer,
    VertexLayout, VulkanError, VulkanResult,
};

/// Uniform buffers a renderer can hand out
pub const MAX_UNIFORM_BUFFERS: usize = 32;

/// Opaque black
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

slotmap::new_key_type! {
    /// Key of a pipeline registered with a [`Renderer`]
    pub struct PipelineId;
}

/// Where the current frame renders to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTarget {
    /// Frame slot being recorded
    pub slot: usize,
    /// Acquired swapchain image
    pub image_index: u32,
    /// Framebuffer wrapping the acquired image
    pub framebuffer: FramebufferHandle,
    /// Presentation render pass
    pub render_pass: RenderPassHandle,
    /// Swapchain extent
    pub extent: vk::Extent2D,
    /// Command buffer owned by the slot
    pub command_buffer: CommandBufferHandle,
}

/// Records one frame's render pass into `target`'s command buffer
fn record_frame<F>(device: &ash::Device, target: &FrameTarget, clear_color: [f32; 4], record: F) -> VulkanResult<()>
where
    F: FnOnce(&mut ActiveRenderPass<'_>, usize) -> VulkanResult<()>,
{
    let mut recorder = CommandRecorder::new(target.command_buffer.raw(), device.clone());
    recorder.begin()?;
    {
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue { float32: clear_color },
        }];
        let mut pass = recorder.begin_render_pass(
            target.render_pass,
            target.framebuffer,
            scissor_for(target.extent),
            &clear_values,
        )?;
        record(&mut pass, target.slot)?;
    }
    recorder.end()?;
    Ok(())
}

/// Resource factory and per-frame recording surface
pub struct Renderer {
    // Field order is destruction order.
    pipelines: SlotMap<PipelineId, Pipeline>,
    descriptor_pool: DescriptorPool,
    uniform_layout: DescriptorSetLayout,
    command_pool: CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    context: DeviceContext,
    render_pass: RenderPassHandle,
    extent: vk::Extent2D,
    uniform_buffers: usize,
    target: Option<FrameTarget>,
    recorded: bool,
}

impl Renderer {
    /// Create a renderer with one command buffer per frame slot
    pub fn new(
        context: &DeviceContext,
        frames_in_flight: usize,
        render_pass: RenderPassHandle,
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let command_pool = CommandPool::new(context, context.queue_families().graphics)?;
        let slot_count = u32::try_from(frames_in_flight).map_err(|_| VulkanError::InvalidOperation {
            reason: format!("{} frames in flight", frames_in_flight),
        })?;
        let command_buffers = command_pool.allocate_command_buffers(slot_count)?;

        let uniform_layout = DescriptorSetLayout::uniform(context)?;
        let descriptor_pool = DescriptorPool::new(context, slot_count * MAX_UNIFORM_BUFFERS as u32)?;

        log::debug!("Renderer created with {} command buffers", command_buffers.len());

        Ok(Self {
            pipelines: SlotMap::with_key(),
            descriptor_pool,
            uniform_layout,
            command_pool,
            command_buffers,
            context: context.clone(),
            render_pass,
            extent,
            uniform_buffers: 0,
            target: None,
            recorded: false,
        })
    }

    /// Device capability handle
    pub const fn context(&self) -> &DeviceContext {
        &self.context
    }

    /// Number of frame slots
    pub fn frames_in_flight(&self) -> usize {
        self.command_buffers.len()
    }

    /// Current swapchain extent
    pub const fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Load a SPIR-V shader from disk
    pub fn load_shader(&self, path: impl AsRef<Path>) -> VulkanResult<Rc<ShaderModule>> {
        ShaderModule::from_file(&self.context, path).map(Rc::new)
    }

    /// Create a shader from SPIR-V bytes
    pub fn create_shader(&self, bytes: &[u8]) -> VulkanResult<Rc<ShaderModule>> {
        ShaderModule::from_bytes(&self.context, bytes).map(Rc::new)
    }

    /// Upload vertices described by `layout`
    pub fn create_vertex_buffer<T: bytemuck::Pod>(
        &self,
        layout: VertexLayout,
        vertices: &[T],
    ) -> VulkanResult<Rc<VertexBuffer>> {
        VertexBuffer::new(&self.context, &self.command_pool, layout, vertices).map(Rc::new)
    }

    /// Upload 32-bit indices
    pub fn create_index_buffer(&self, indices: &[u32]) -> VulkanResult<Rc<IndexBuffer>> {
        IndexBuffer::new(&self.context, &self.command_pool, indices).map(Rc::new)
    }

    /// Create a per-slot uniform buffer initialised with `data`
    pub fn create_uniform_buffer<T: bytemuck::Pod>(&mut self, data: &T) -> VulkanResult<Rc<UniformBuffer>> {
        if self.uniform_buffers >= MAX_UNIFORM_BUFFERS {
            return Err(VulkanError::InvalidOperation {
                reason: format!("at most {} uniform buffers per renderer", MAX_UNIFORM_BUFFERS),
            });
        }
        let uniform = UniformBuffer::new(
            &self.context,
            &self.uniform_layout,
            &self.descriptor_pool,
            self.frames_in_flight(),
            data,
        )?;
        self.uniform_buffers += 1;
        Ok(Rc::new(uniform))
    }

    /// Bake `descriptor` against the current swapchain and register it
    pub fn add_pipeline(&mut self, descriptor: PipelineDescriptor) -> VulkanResult<PipelineId> {
        let pipeline = Pipeline::new(
            &self.context,
            descriptor,
            self.uniform_layout.handle(),
            self.render_pass,
            self.extent,
        )?;
        let id = self.pipelines.insert(pipeline);
        log::debug!("Added pipeline {:?}", id);
        Ok(id)
    }

    /// Unregister a pipeline once the GPU has stopped using it
    pub fn remove_pipeline(&mut self, id: PipelineId) -> VulkanResult<bool> {
        if !self.pipelines.contains_key(id) {
            return Ok(false);
        }
        self.context.wait_idle()?;
        self.pipelines.remove(id);
        log::debug!("Removed pipeline {:?}", id);
        Ok(true)
    }

    /// Registered pipeline `id`
    pub fn pipeline(&self, id: PipelineId) -> Option<&Pipeline> {
        self.pipelines.get(id)
    }

    /// Number of registered pipelines
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Target of the frame being recorded, if any
    pub const fn target(&self) -> Option<FrameTarget> {
        self.target
    }

    /// Frame slot being recorded, for per-slot resources such as uniforms
    pub fn current_slot(&self) -> VulkanResult<usize> {
        self.current_target().map(|target| target.slot)
    }

    fn current_target(&self) -> VulkanResult<FrameTarget> {
        self.target.ok_or_else(|| VulkanError::InvalidOperation {
            reason: "recording outside of a frame".to_string(),
        })
    }

    /// Record the frame with a custom render pass body
    pub fn record_with<F>(&mut self, clear_color: [f32; 4], record: F) -> VulkanResult<()>
    where
        F: FnOnce(&mut ActiveRenderPass<'_>, usize) -> VulkanResult<()>,
    {
        let target = self.current_target()?;
        record_frame(self.context.device(), &target, clear_color, record)?;
        self.recorded = true;
        Ok(())
    }

    /// Clear to black and draw every registered pipeline
    pub fn record_pipelines(&mut self) -> VulkanResult<()> {
        if self.pipelines.is_empty() {
            log::error!("Renderer has no pipeline bound");
            return Err(VulkanError::MissingCommandBuffer);
        }

        let target = self.current_target()?;
        let pipelines = &self.pipelines;
        record_frame(self.context.device(), &target, CLEAR_COLOR, |pass, slot| {
            pipelines.values().try_for_each(|pipeline| pipeline.record(pass, slot))
        })?;
        self.recorded = true;
        Ok(())
    }

    fn command_buffer(&self, slot: usize) -> VulkanResult<CommandBufferHandle> {
        self.command_buffers
            .get(slot)
            .map(|&buffer| CommandBufferHandle::new(buffer))
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no command buffer for frame slot {}", slot),
            })
    }

    fn begin_frame(&mut self, target: FrameTarget) {
        self.target = Some(target);
        self.recorded = false;
    }

    /// Close the frame, returning its target if anything was recorded
    fn finish_frame(&mut self) -> VulkanResult<FrameTarget> {
        let target = self.target.take();
        match target {
            Some(target) if self.recorded => {
                self.recorded = false;
                Ok(target)
            }
            _ => Err(VulkanError::MissingCommandBuffer),
        }
    }
}

impl SwapchainDependent for Renderer {
    fn on_swapchain_destroy(&mut self) {
        self.target = None;
        self.recorded = false;
        for pipeline in self.pipelines.values_mut() {
            pipeline.on_swapchain_destroy();
        }
    }

    fn on_swapchain_create(&mut self, render_pass: RenderPassHandle, extent: vk::Extent2D) -> VulkanResult<()> {
        self.render_pass = render_pass;
        self.extent = extent;
        self.pipelines
            .values_mut()
            .try_for_each(|pipeline| pipeline.on_swapchain_create(render_pass, extent))
    }
}

/// [`PresentationEngine`] over a real swapchain and queues
pub struct VulkanPresenter {
    // Pipelines go before the render pass they were baked against.
    renderer: Renderer,
    swapchain: Swapchain,
    context: DeviceContext,
    vsync: bool,
}

impl VulkanPresenter {
    /// Build the initial swapchain and a renderer for it
    pub fn new(
        context: &DeviceContext,
        drawable_size: (u32, u32),
        vsync: bool,
        frames_in_flight: usize,
    ) -> VulkanResult<Self> {
        let swapchain = Swapchain::new(context, drawable_size, vsync, None)?;
        let renderer = Renderer::new(context, frames_in_flight, swapchain.render_pass(), swapchain.extent())?;

        Ok(Self {
            renderer,
            swapchain,
            context: context.clone(),
            vsync,
        })
    }

    /// The renderer
    pub const fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// The renderer, mutably
    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// The current swapchain
    pub const fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }
}

impl PresentationEngine for VulkanPresenter {
    type Semaphore = Semaphore;
    type Fence = Fence;
    type Frame = Renderer;

    fn create_semaphore(&self) -> VulkanResult<Semaphore> {
        Semaphore::new(&self.context)
    }

    fn create_fence(&self, signaled: bool) -> VulkanResult<Fence> {
        Fence::new(&self.context, signaled)
    }

    fn wait_for_fence(&self, fence: &Fence) -> VulkanResult<()> {
        fence.wait(u64::MAX)
    }

    fn reset_fence(&self, fence: &Fence) -> VulkanResult<()> {
        fence.reset()
    }

    fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    fn acquire_next_image(&mut self, signal: &Semaphore) -> VulkanResult<AcquireOutcome> {
        let acquired = unsafe {
            self.context.swapchain_loader().acquire_next_image(
                self.swapchain.handle().raw(),
                u64::MAX,
                signal.handle(),
                vk::Fence::null(),
            )
        };

        match acquired {
            Ok((index, suboptimal)) => Ok(AcquireOutcome::Acquired { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(result) => Err(VulkanError::Call {
                operation: "acquire next image",
                result,
            }),
        }
    }

    fn begin_frame(&mut self, slot: usize, image_index: u32) -> VulkanResult<&mut Renderer> {
        let framebuffer =
            self.swapchain
                .framebuffer(image_index as usize)
                .ok_or_else(|| VulkanError::InvalidOperation {
                    reason: format!("no framebuffer for swapchain image {}", image_index),
                })?;
        let command_buffer = self.renderer.command_buffer(slot)?;

        self.renderer.begin_frame(FrameTarget {
            slot,
            image_index,
            framebuffer,
            render_pass: self.swapchain.render_pass(),
            extent: self.swapchain.extent(),
            command_buffer,
        });
        Ok(&mut self.renderer)
    }

    fn submit(
        &mut self,
        slot: usize,
        image_index: u32,
        wait: &Semaphore,
        signal: &Semaphore,
        fence: &Fence,
    ) -> VulkanResult<()> {
        let target = self.renderer.finish_frame()?;
        if target.slot != slot || target.image_index != image_index {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "submitting slot {} image {} but recorded slot {} image {}",
                    slot, image_index, target.slot, target.image_index
                ),
            });
        }

        let wait_semaphores = [wait.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [target.command_buffer.raw()];
        let signal_semaphores = [signal.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.context
                .device()
                .queue_submit(self.context.graphics_queue(), &[submit_info.build()], fence.handle())
        }
        .map_err(|result| VulkanError::Call {
            operation: "queue submit",
            result,
        })
    }

    fn present(&mut self, image_index: u32, wait: &Semaphore) -> VulkanResult<PresentationResult> {
        let wait_semaphores = [wait.handle()];
        let swapchains = [self.swapchain.handle().raw()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let presented = unsafe {
            self.context
                .swapchain_loader()
                .queue_present(self.context.present_queue(), &present_info)
        };

        match presented {
            Ok(false) => Ok(PresentationResult::Success),
            Ok(true) => Ok(PresentationResult::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentationResult::SurfaceOutOfDate),
            Err(result) => Err(VulkanError::Call {
                operation: "queue present",
                result,
            }),
        }
    }

    fn wait_idle(&self) -> VulkanResult<()> {
        self.context.wait_idle()
    }

    fn rebuild(&mut self, drawable_size: (u32, u32)) -> VulkanResult<()> {
        self.renderer.on_swapchain_destroy();

        let swapchain = Swapchain::new(&self.context, drawable_size, self.vsync, Some(&self.swapchain))?;
        self.swapchain = swapchain;

        self.renderer
            .on_swapchain_create(self.swapchain.render_pass(), self.swapchain.extent())
    }
}
