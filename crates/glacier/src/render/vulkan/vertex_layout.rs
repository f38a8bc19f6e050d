//! Vertex input layouts
//!
//! A [`VertexLayout`] is an ordered list of attributes, each a scalar element
//! type repeated one to four times. Attribute `n` is bound at shader location
//! `n`; offsets and the stride are accumulated from the element sizes.

use ash::vk;

use crate::render::vulkan::{VulkanError, VulkanResult};

/// Scalar type of one vertex attribute component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// 32-bit float
    Float,
    /// 32-bit signed integer
    Int,
    /// 32-bit unsigned integer
    UInt,
}

impl ElementType {
    /// Size of one component in bytes
    pub const fn size(self) -> u32 {
        match self {
            Self::Float | Self::Int | Self::UInt => 4,
        }
    }

    /// Vulkan format for `count` components of this type
    pub const fn format(self, count: u32) -> Option<vk::Format> {
        let format = match (self, count) {
            (Self::Float, 1) => vk::Format::R32_SFLOAT,
            (Self::Float, 2) => vk::Format::R32G32_SFLOAT,
            (Self::Float, 3) => vk::Format::R32G32B32_SFLOAT,
            (Self::Float, 4) => vk::Format::R32G32B32A32_SFLOAT,
            (Self::Int, 1) => vk::Format::R32_SINT,
            (Self::Int, 2) => vk::Format::R32G32_SINT,
            (Self::Int, 3) => vk::Format::R32G32B32_SINT,
            (Self::Int, 4) => vk::Format::R32G32B32A32_SINT,
            (Self::UInt, 1) => vk::Format::R32_UINT,
            (Self::UInt, 2) => vk::Format::R32G32_UINT,
            (Self::UInt, 3) => vk::Format::R32G32B32_UINT,
            (Self::UInt, 4) => vk::Format::R32G32B32A32_UINT,
            _ => return None,
        };
        Some(format)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VertexElement {
    ty: ElementType,
    count: u32,
    offset: u32,
}

/// Interleaved single-binding vertex layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    elements: Vec<VertexElement>,
    stride: u32,
}

impl VertexLayout {
    /// Empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attribute of `count` components
    pub fn push(&mut self, ty: ElementType, count: u32) -> VulkanResult<&mut Self> {
        if ty.format(count).is_none() {
            return Err(VulkanError::InvalidOperation {
                reason: format!("vertex attribute must have 1 to 4 components, got {}", count),
            });
        }

        self.elements.push(VertexElement {
            ty,
            count,
            offset: self.stride,
        });
        self.stride += ty.size() * count;
        Ok(self)
    }

    /// Builder form of [`push`](Self::push)
    pub fn with(mut self, ty: ElementType, count: u32) -> VulkanResult<Self> {
        self.push(ty, count)?;
        Ok(self)
    }

    /// Bytes between consecutive vertices
    pub const fn stride(&self) -> u32 {
        self.stride
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// No attributes pushed yet
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Binding 0, advanced per vertex
    pub const fn binding_description(&self) -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: self.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// One description per attribute, locations in push order
    pub fn attribute_descriptions(&self) -> Vec<vk::VertexInputAttributeDescription> {
        self.elements
            .iter()
            .zip(0u32..)
            .filter_map(|(element, location)| {
                element.ty.format(element.count).map(|format| vk::VertexInputAttributeDescription {
                    location,
                    binding: 0,
                    format,
                    offset: element.offset,
                })
            })
            .collect()
    }
}
