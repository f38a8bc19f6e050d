//! Framebuffer management

use ash::{vk, Device};

use crate::render::vulkan::{DeviceContext, FramebufferHandle, ImageViewHandle, RenderPassHandle, VulkanError, VulkanResult};

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a framebuffer over `attachments` compatible with `render_pass`
    pub fn new(
        context: &DeviceContext,
        render_pass: RenderPassHandle,
        attachments: &[ImageViewHandle],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let views: Vec<vk::ImageView> = attachments.iter().map(|view| view.raw()).collect();
        let framebuffer_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass.raw())
            .attachments(&views)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer =
            unsafe { context.device().create_framebuffer(&framebuffer_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self {
            device: context.device().clone(),
            framebuffer,
        })
    }

    /// Get framebuffer handle
    pub const fn handle(&self) -> FramebufferHandle {
        FramebufferHandle::new(self.framebuffer)
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
