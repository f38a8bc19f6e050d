//! SPIR-V shader modules

use std::io::Cursor;
use std::path::Path;

use ash::{vk, Device};

use crate::render::vulkan::{DeviceContext, VulkanError, VulkanResult};

/// Pipeline stage a shader module is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage
    Vertex,
    /// Fragment stage
    Fragment,
}

impl ShaderStage {
    /// Vulkan stage flag
    pub const fn flags(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from SPIR-V bytecode
    ///
    /// The bytes are realigned to words and the SPIR-V magic number is
    /// checked before the driver sees them.
    pub fn from_bytes(context: &DeviceContext, bytes: &[u8]) -> VulkanResult<Self> {
        let code = ash::util::read_spv(&mut Cursor::new(bytes))
            .map_err(|e| VulkanError::Shader(format!("invalid SPIR-V: {}", e)))?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module =
            unsafe { context.device().create_shader_module(&create_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self {
            device: context.device().clone(),
            module,
        })
    }

    /// Load a shader from a SPIR-V file
    pub fn from_file(context: &DeviceContext, path: impl AsRef<Path>) -> VulkanResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| VulkanError::Shader(format!("failed to read {}: {}", path.display(), e)))?;
        log::debug!("Loaded shader {} ({} bytes)", path.display(), bytes.len());
        Self::from_bytes(context, &bytes)
    }

    /// Get shader module handle
    pub const fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}
