//! Buffer management for vertex data and uniforms
//!
//! Vertex and index data is uploaded once through a host-visible staging
//! buffer into device-local memory. Uniform data stays host-visible, with one
//! buffer per frame slot so a slot can be rewritten while the others are
//! still being read by the GPU.

use ash::{vk, Device};

use crate::render::vulkan::{
    descriptor::UNIFORM_BINDING, CommandPool, DescriptorPool, DescriptorSetLayout, DeviceContext, VertexLayout,
    VulkanError, VulkanResult,
};

/// Buffer wrapper with memory management
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer and bind freshly allocated memory with `properties`
    pub fn new(
        context: &DeviceContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let device = context.device();
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None) }.map_err(VulkanError::Api)?;

        let memory = Self::allocate(context, buffer, properties).map_err(|e| {
            unsafe { device.destroy_buffer(buffer, None) };
            e
        })?;

        Ok(Self {
            device: device.clone(),
            buffer,
            memory,
            size,
        })
    }

    fn allocate(
        context: &DeviceContext,
        buffer: vk::Buffer,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<vk::DeviceMemory> {
        let device = context.device();
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type_index = context.find_memory_type(requirements.memory_type_bits, properties)?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe { device.allocate_memory(&alloc_info, None) }.map_err(VulkanError::Api)?;

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe { device.free_memory(memory, None) };
            return Err(VulkanError::Api(e));
        }

        Ok(memory)
    }

    /// Host-visible, coherent buffer
    pub fn host_visible(context: &DeviceContext, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> VulkanResult<Self> {
        Self::new(
            context,
            size,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
    }

    /// Copy `data` to the start of the buffer; memory must be host-visible
    pub fn write_data<T: bytemuck::Pod>(&self, data: &[T]) -> VulkanResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("write of {} bytes into a {} byte buffer", bytes.len(), self.size),
            });
        }

        unsafe {
            let ptr = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Get buffer handle
    pub const fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get size
    pub const fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Upload `data` into a new device-local buffer through a staging copy
fn upload_device_local<T: bytemuck::Pod>(
    context: &DeviceContext,
    command_pool: &CommandPool,
    data: &[T],
    usage: vk::BufferUsageFlags,
) -> VulkanResult<Buffer> {
    let size = std::mem::size_of_val(data) as vk::DeviceSize;
    if size == 0 {
        return Err(VulkanError::InvalidOperation {
            reason: "cannot upload an empty buffer".to_string(),
        });
    }

    let staging = Buffer::host_visible(context, size, vk::BufferUsageFlags::TRANSFER_SRC)?;
    staging.write_data(data)?;

    let buffer = Buffer::new(
        context,
        size,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    command_pool.submit_one_time(context.graphics_queue(), |recorder| {
        recorder.copy_buffer(staging.handle(), buffer.handle(), size);
    })?;

    Ok(buffer)
}

/// Device-local vertex data with its input layout
pub struct VertexBuffer {
    buffer: Buffer,
    layout: VertexLayout,
    vertex_count: u32,
}

impl VertexBuffer {
    /// Upload interleaved vertices described by `layout`
    pub fn new<T: bytemuck::Pod>(
        context: &DeviceContext,
        command_pool: &CommandPool,
        layout: VertexLayout,
        vertices: &[T],
    ) -> VulkanResult<Self> {
        let vertex_count = vertex_count(std::mem::size_of_val(vertices), layout.stride())?;
        let buffer = upload_device_local(context, command_pool, vertices, vk::BufferUsageFlags::VERTEX_BUFFER)?;
        log::debug!("Uploaded {} vertices ({} bytes)", vertex_count, buffer.size());

        Ok(Self {
            buffer,
            layout,
            vertex_count,
        })
    }

    /// Get buffer handle
    pub const fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Input layout of the stored vertices
    pub const fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// Number of vertices
    pub const fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

/// Number of whole vertices in `byte_len` bytes
fn vertex_count(byte_len: usize, stride: u32) -> VulkanResult<u32> {
    let stride = stride as usize;
    if stride == 0 || byte_len % stride != 0 {
        return Err(VulkanError::InvalidOperation {
            reason: format!("{} bytes of vertex data do not match a stride of {}", byte_len, stride),
        });
    }
    u32::try_from(byte_len / stride).map_err(|_| VulkanError::InvalidOperation {
        reason: "too many vertices".to_string(),
    })
}

/// Device-local 32-bit index data
pub struct IndexBuffer {
    buffer: Buffer,
    index_count: u32,
}

impl IndexBuffer {
    /// Upload `indices`
    pub fn new(context: &DeviceContext, command_pool: &CommandPool, indices: &[u32]) -> VulkanResult<Self> {
        let index_count = u32::try_from(indices.len()).map_err(|_| VulkanError::InvalidOperation {
            reason: "too many indices".to_string(),
        })?;
        let buffer = upload_device_local(context, command_pool, indices, vk::BufferUsageFlags::INDEX_BUFFER)?;

        Ok(Self { buffer, index_count })
    }

    /// Get buffer handle
    pub const fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Number of indices
    pub const fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Uniform data replicated per frame slot
///
/// Slot `i` owns buffer `i` and descriptor set `i`. Writing slot `i` is safe
/// once that slot's fence has been waited, which is the case inside a render
/// callback for the slot being recorded.
pub struct UniformBuffer {
    buffers: Vec<Buffer>,
    descriptor_sets: Vec<vk::DescriptorSet>,
}

impl UniformBuffer {
    /// Create `frames_in_flight` copies initialised with `data`
    pub fn new<T: bytemuck::Pod>(
        context: &DeviceContext,
        layout: &DescriptorSetLayout,
        pool: &DescriptorPool,
        frames_in_flight: usize,
        data: &T,
    ) -> VulkanResult<Self> {
        let size = std::mem::size_of::<T>() as vk::DeviceSize;
        let buffers = (0..frames_in_flight)
            .map(|_| Buffer::host_visible(context, size, vk::BufferUsageFlags::UNIFORM_BUFFER))
            .collect::<VulkanResult<Vec<_>>>()?;
        let descriptor_sets = pool.allocate(layout, frames_in_flight)?;

        for (buffer, &set) in buffers.iter().zip(&descriptor_sets) {
            let buffer_infos = [vk::DescriptorBufferInfo {
                buffer: buffer.handle(),
                offset: 0,
                range: size,
            }];
            let write = vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(UNIFORM_BINDING)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_infos)
                .build();
            unsafe { context.device().update_descriptor_sets(&[write], &[]) };
        }

        let uniform = Self {
            buffers,
            descriptor_sets,
        };
        uniform.set(data)?;
        Ok(uniform)
    }

    /// Write `data` to every slot
    pub fn set<T: bytemuck::Pod>(&self, data: &T) -> VulkanResult<()> {
        self.buffers
            .iter()
            .try_for_each(|buffer| buffer.write_data(std::slice::from_ref(data)))
    }

    /// Write `data` to frame slot `slot`
    pub fn update<T: bytemuck::Pod>(&self, slot: usize, data: &T) -> VulkanResult<()> {
        self.buffers
            .get(slot)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("frame slot {} out of range", slot),
            })?
            .write_data(std::slice::from_ref(data))
    }

    /// Descriptor set bound when recording frame slot `slot`
    pub fn descriptor_set(&self, slot: usize) -> Option<vk::DescriptorSet> {
        self.descriptor_sets.get(slot).copied()
    }

    /// Number of slots
    pub fn frames_in_flight(&self) -> usize {
        self.buffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_count_from_stride() {
        assert_eq!(vertex_count(96, 24).unwrap(), 4);
        assert!(vertex_count(100, 24).is_err());
        assert!(vertex_count(96, 0).is_err());
    }
}
