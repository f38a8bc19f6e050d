//! Command buffer management
//!
//! A command pool per queue family, a recorder that tracks the recording
//! state of one buffer, and a scoped render pass that ends itself on drop.

use ash::{vk, Device};

use crate::render::vulkan::{
    CommandBufferHandle, DeviceContext, FramebufferHandle, RenderPassHandle, VulkanError, VulkanResult,
};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually
    pub fn new(context: &DeviceContext, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool =
            unsafe { context.device().create_command_pool(&pool_create_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self {
            device: context.device().clone(),
            command_pool,
        })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { self.device.allocate_command_buffers(&alloc_info) }.map_err(VulkanError::Api)
    }

    /// Return command buffers to the pool
    pub fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        if command_buffers.is_empty() {
            return;
        }
        unsafe {
            self.device.free_command_buffers(self.command_pool, command_buffers);
        }
    }

    /// Record a throwaway command buffer, submit it to `queue` and wait for completion
    pub fn submit_one_time<F>(&self, queue: vk::Queue, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&mut CommandRecorder),
    {
        let command_buffers = self.allocate_command_buffers(1)?;
        let result = self.record_and_wait(queue, command_buffers[0], record);
        self.free_command_buffers(&command_buffers);
        result
    }

    fn record_and_wait<F>(&self, queue: vk::Queue, command_buffer: vk::CommandBuffer, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&mut CommandRecorder),
    {
        let mut recorder = CommandRecorder::new(command_buffer, self.device.clone());
        recorder.begin()?;
        record(&mut recorder);
        let command_buffer = recorder.end()?;

        let command_buffers = [command_buffer.raw()];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
        unsafe {
            self.device
                .queue_submit(queue, &[submit_info.build()], vk::Fence::null())
                .map_err(VulkanError::Api)?;
            self.device.queue_wait_idle(queue).map_err(VulkanError::Api)
        }
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                log::warn!("device_wait_idle failed before command pool teardown: {:?}", e);
            }
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Tracks recording state for one command buffer
pub struct CommandRecorder {
    command_buffer: vk::CommandBuffer,
    device: Device,
    recording: bool,
}

impl CommandRecorder {
    /// Wrap a command buffer that is not currently recording
    pub fn new(command_buffer: vk::CommandBuffer, device: Device) -> Self {
        Self {
            command_buffer,
            device,
            recording: false,
        }
    }

    /// Reset the buffer and begin one-time-submit recording
    pub fn begin(&mut self) -> VulkanResult<&mut Self> {
        if self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer already recording".to_string(),
            });
        }

        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
            self.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        self.recording = true;
        Ok(self)
    }

    /// Begin a render pass with inline subpass contents
    pub fn begin_render_pass(
        &mut self,
        render_pass: RenderPassHandle,
        framebuffer: FramebufferHandle,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> VulkanResult<ActiveRenderPass<'_>> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string(),
            });
        }

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass.raw())
            .framebuffer(framebuffer.raw())
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.device
                .cmd_begin_render_pass(self.command_buffer, &render_pass_begin, vk::SubpassContents::INLINE);
        }

        Ok(ActiveRenderPass { recorder: self })
    }

    /// Copy the first `size` bytes of `src` into `dst`
    pub fn copy_buffer(&mut self, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            self.device.cmd_copy_buffer(self.command_buffer, src, dst, &[region]);
        }
    }

    /// End command recording
    pub fn end(mut self) -> VulkanResult<CommandBufferHandle> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string(),
            });
        }

        unsafe { self.device.end_command_buffer(self.command_buffer) }.map_err(VulkanError::Api)?;

        self.recording = false;
        Ok(CommandBufferHandle::new(self.command_buffer))
    }
}

/// Render pass scope; the pass ends when this is dropped
pub struct ActiveRenderPass<'a> {
    recorder: &'a mut CommandRecorder,
}

impl<'a> ActiveRenderPass<'a> {
    fn device(&self) -> &Device {
        &self.recorder.device
    }

    fn command_buffer(&self) -> vk::CommandBuffer {
        self.recorder.command_buffer
    }

    /// Bind a graphics pipeline
    pub fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device()
                .cmd_bind_pipeline(self.command_buffer(), vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    /// Bind a vertex buffer at binding 0
    pub fn bind_vertex_buffer(&mut self, buffer: vk::Buffer) {
        unsafe {
            self.device().cmd_bind_vertex_buffers(self.command_buffer(), 0, &[buffer], &[0]);
        }
    }

    /// Bind a 32-bit index buffer
    pub fn bind_index_buffer(&mut self, buffer: vk::Buffer) {
        unsafe {
            self.device()
                .cmd_bind_index_buffer(self.command_buffer(), buffer, 0, vk::IndexType::UINT32);
        }
    }

    /// Bind one descriptor set at set 0
    pub fn bind_descriptor_set(&mut self, layout: vk::PipelineLayout, descriptor_set: vk::DescriptorSet) {
        unsafe {
            self.device().cmd_bind_descriptor_sets(
                self.command_buffer(),
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[descriptor_set],
                &[],
            );
        }
    }

    /// Draw non-indexed vertices
    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        unsafe {
            self.device().cmd_draw(self.command_buffer(), vertex_count, instance_count, 0, 0);
        }
    }

    /// Draw indexed
    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        unsafe {
            self.device()
                .cmd_draw_indexed(self.command_buffer(), index_count, instance_count, 0, 0, 0);
        }
    }
}

impl<'a> Drop for ActiveRenderPass<'a> {
    fn drop(&mut self) {
        unsafe {
            self.recorder.device.cmd_end_render_pass(self.recorder.command_buffer);
        }
    }
}
