//! Frame scheduling
//!
//! The [`FrameScheduler`] drives acquire, record, submit and present over a
//! fixed ring of frame slots. It talks to the GPU only through
//! [`PresentationEngine`], which the Vulkan presenter implements for real
//! hardware.

pub mod scheduler;

pub use scheduler::FrameScheduler;

use ash::vk;

use crate::render::vulkan::{RenderPassHandle, VulkanResult};

/// Outcome of a frame that did not fail
///
/// Failures other than these are returned as
/// [`VulkanError::Call`](crate::render::vulkan::VulkanError::Call) naming the
/// operation and its result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationResult {
    /// The frame was presented
    Success,
    /// The frame was presented but the swapchain no longer matches the surface exactly
    Suboptimal,
    /// The swapchain must be rebuilt before the next frame
    SurfaceOutOfDate,
}

/// Result of asking the presentation engine for the next image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired
    Acquired {
        /// Swapchain image index
        index: u32,
        /// The image is usable but the swapchain is not an exact match
        suboptimal: bool,
    },
    /// No image; the swapchain is out of date
    OutOfDate,
}

/// An object baked against the swapchain's render pass or extent
pub trait SwapchainDependent {
    /// Release everything that references the old swapchain
    fn on_swapchain_destroy(&mut self);

    /// Rebuild against the new render pass and extent
    fn on_swapchain_create(&mut self, render_pass: RenderPassHandle, extent: vk::Extent2D) -> VulkanResult<()>;
}

/// The GPU-facing half of the frame loop
///
/// Every method maps onto one queue, fence or swapchain operation. Errors
/// returned here are fatal to the frame loop.
pub trait PresentationEngine {
    /// GPU-side wait primitive
    type Semaphore;
    /// CPU-waitable completion primitive
    type Fence;
    /// What the render callback records into
    type Frame;

    /// Create an unsignaled semaphore
    fn create_semaphore(&self) -> VulkanResult<Self::Semaphore>;

    /// Create a fence, optionally already signaled
    fn create_fence(&self, signaled: bool) -> VulkanResult<Self::Fence>;

    /// Block until `fence` is signaled
    fn wait_for_fence(&self, fence: &Self::Fence) -> VulkanResult<()>;

    /// Return `fence` to the unsignaled state
    fn reset_fence(&self, fence: &Self::Fence) -> VulkanResult<()>;

    /// Number of images in the current swapchain
    fn image_count(&self) -> usize;

    /// Acquire the next image, signaling `signal` once it is ready
    fn acquire_next_image(&mut self, signal: &Self::Semaphore) -> VulkanResult<AcquireOutcome>;

    /// Prepare frame slot `slot` to record against image `image_index`
    fn begin_frame(&mut self, slot: usize, image_index: u32) -> VulkanResult<&mut Self::Frame>;

    /// Submit what was recorded for `slot`
    ///
    /// Waits on `wait` at the color attachment output stage and signals
    /// `signal` and `fence` on completion. Nothing recorded is
    /// [`VulkanError::MissingCommandBuffer`](crate::render::vulkan::VulkanError::MissingCommandBuffer).
    fn submit(
        &mut self,
        slot: usize,
        image_index: u32,
        wait: &Self::Semaphore,
        signal: &Self::Semaphore,
        fence: &Self::Fence,
    ) -> VulkanResult<()>;

    /// Queue image `image_index` for presentation once `wait` is signaled
    fn present(&mut self, image_index: u32, wait: &Self::Semaphore) -> VulkanResult<PresentationResult>;

    /// Block until the device is idle
    fn wait_idle(&self) -> VulkanResult<()>;

    /// Replace the swapchain for a drawable area of `drawable_size` pixels
    fn rebuild(&mut self, drawable_size: (u32, u32)) -> VulkanResult<()>;
}
