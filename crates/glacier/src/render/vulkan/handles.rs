//! Typed handles
//!
//! Each Vulkan object kind that crosses a module boundary gets its own
//! wrapper so a framebuffer cannot be passed where a render pass is expected.
//! The raw handle stays private; `raw()` is the only way back out.

use ash::vk;

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident => $raw:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name($raw);

        impl $name {
            pub(crate) const fn new(raw: $raw) -> Self {
                Self(raw)
            }

            /// The underlying Vulkan handle
            pub const fn raw(self) -> $raw {
                self.0
            }

            /// Whether this wraps `VK_NULL_HANDLE`
            pub fn is_null(self) -> bool {
                self.0 == <$raw>::null()
            }
        }
    };
}

typed_handle!(
    /// A presentable image chain
    SwapchainHandle => vk::SwapchainKHR
);
typed_handle!(
    /// An image owned by the presentation engine
    ImageHandle => vk::Image
);
typed_handle!(
    /// A render-target view of a swapchain image
    ImageViewHandle => vk::ImageView
);
typed_handle!(
    /// A render pass
    RenderPassHandle => vk::RenderPass
);
typed_handle!(
    /// A framebuffer bound to one image view and one render pass
    FramebufferHandle => vk::Framebuffer
);
typed_handle!(
    /// A primary command buffer
    CommandBufferHandle => vk::CommandBuffer
);

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_raw_round_trip() {
        let raw = vk::Framebuffer::from_raw(42);
        let handle = FramebufferHandle::new(raw);
        assert_eq!(handle.raw(), raw);
        assert!(!handle.is_null());
        assert!(RenderPassHandle::new(vk::RenderPass::null()).is_null());
    }

    #[test]
    fn test_equality_follows_raw_value() {
        let a = RenderPassHandle::new(vk::RenderPass::from_raw(7));
        let b = RenderPassHandle::new(vk::RenderPass::from_raw(7));
        let c = RenderPassHandle::new(vk::RenderPass::from_raw(8));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
