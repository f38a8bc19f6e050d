//! Vulkan backend
//!
//! RAII wrappers for every GPU object the engine creates, the swapchain
//! manager, and the presenter that lets the frame scheduler drive a real
//! device. Everything that creates GPU objects takes a [`DeviceContext`]
//! by reference.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptor;
pub mod framebuffer;
pub mod handles;
pub mod pipeline;
pub mod render_pass;
pub mod renderer;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod vertex_layout;
pub mod window;

pub use buffer::{Buffer, IndexBuffer, UniformBuffer, VertexBuffer};
pub use commands::{ActiveRenderPass, CommandPool, CommandRecorder};
pub use context::{DeviceContext, QueueFamilies, VulkanContext, VulkanError, VulkanResult};
pub use descriptor::{DescriptorPool, DescriptorSetLayout};
pub use framebuffer::Framebuffer;
pub use handles::{
    CommandBufferHandle, FramebufferHandle, ImageHandle, ImageViewHandle, RenderPassHandle, SwapchainHandle,
};
pub use pipeline::{GraphicsPipeline, Pipeline, PipelineDescriptor};
pub use render_pass::RenderPass;
pub use renderer::{FrameTarget, PipelineId, Renderer, VulkanPresenter};
pub use shader::{ShaderModule, ShaderStage};
pub use swapchain::{Swapchain, SwapchainSettings, SwapchainSupport};
pub use sync::{Fence, FrameSlot, Semaphore};
pub use vertex_layout::{ElementType, VertexLayout};
pub use window::{Window, WindowError};
