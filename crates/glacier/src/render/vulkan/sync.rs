//! Synchronization primitives
//!
//! RAII wrappers for semaphores and fences, and the per-frame-in-flight
//! bundle the scheduler rotates through.

use ash::{vk, Device};

use crate::render::vulkan::{DeviceContext, VulkanError, VulkanResult};

/// GPU-side semaphore
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create an unsignaled binary semaphore
    pub fn new(context: &DeviceContext) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { context.device().create_semaphore(&create_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self {
            device: context.device().clone(),
            semaphore,
        })
    }

    /// Get semaphore handle
    pub const fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// CPU-waitable fence
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled
    pub fn new(context: &DeviceContext, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { context.device().create_fence(&create_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self {
            device: context.device().clone(),
            fence,
        })
    }

    /// Block until the fence is signaled or `timeout` nanoseconds pass
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe { self.device.wait_for_fences(&[self.fence], true, timeout) }.map_err(|result| VulkanError::Call {
            operation: "wait for fence",
            result,
        })
    }

    /// Return the fence to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]) }.map_err(|result| VulkanError::Call {
            operation: "reset fence",
            result,
        })
    }

    /// Get fence handle
    pub const fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects owned by one frame in flight
///
/// Generic so the scheduler can run against test doubles; the defaults are
/// the Vulkan wrappers above.
pub struct FrameSlot<S = Semaphore, F = Fence> {
    /// Signaled by the presentation engine when the acquired image is ready
    pub image_available: S,
    /// Signaled by the graphics queue when this frame's commands finish
    pub render_finished: S,
    /// Signaled when this frame's submission completes on the GPU
    pub in_flight: F,
}
