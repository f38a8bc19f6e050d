//! Descriptor set layout and pool management

use ash::{vk, Device};

use crate::render::vulkan::{DeviceContext, VulkanError, VulkanResult};

/// Binding slot of the per-frame uniform buffer
pub const UNIFORM_BINDING: u32 = 0;

/// Descriptor set layout with a single uniform buffer binding
pub struct DescriptorSetLayout {
    device: Device,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Uniform buffer at [`UNIFORM_BINDING`], visible to vertex and fragment stages
    pub fn uniform(context: &DeviceContext) -> VulkanResult<Self> {
        let bindings = [vk::DescriptorSetLayoutBinding::builder()
            .binding(UNIFORM_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .build()];

        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let layout = unsafe { context.device().create_descriptor_set_layout(&layout_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(Self {
            device: context.device().clone(),
            layout,
        })
    }

    /// Get the Vulkan descriptor set layout handle
    pub const fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool of uniform buffer descriptor sets
///
/// Sets are never freed individually; they return to the driver when the
/// pool is destroyed.
pub struct DescriptorPool {
    device: Device,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    /// Create a pool holding up to `max_sets` uniform buffer sets
    pub fn new(context: &DeviceContext, max_sets: u32) -> VulkanResult<Self> {
        let pool_sizes = [vk::DescriptorPoolSize::builder()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(max_sets)
            .build()];

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(max_sets);

        let pool =
            unsafe { context.device().create_descriptor_pool(&pool_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self {
            device: context.device().clone(),
            pool,
        })
    }

    /// Allocate `count` sets with the same layout
    pub fn allocate(&self, layout: &DescriptorSetLayout, count: usize) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout.handle(); count];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.map_err(VulkanError::Api)
    }

    /// Get the Vulkan descriptor pool handle
    pub const fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}
