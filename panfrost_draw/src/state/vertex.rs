/// Vertex elements and vertex buffer bindings

use std::sync::Arc;
use crate::device::{Bo, Quirks};
use crate::format::{attribute_swizzle, default_swizzle, MaliFormat, PipeFormat};

/// Maximum number of API vertex attributes
pub const MAX_ATTRIBS: usize = 16;

/// Maximum number of bound vertex buffers
pub const MAX_VERTEX_BUFFERS: usize = 16;

/// Hardware attribute slot of the synthetic vertex id
pub const PAN_VERTEX_ID: usize = MAX_ATTRIBS;

/// Hardware attribute slot of the synthetic instance id
pub const PAN_INSTANCE_ID: usize = MAX_ATTRIBS + 1;

/// One API vertex attribute
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexElement {
    /// Byte offset of the attribute inside one vertex
    pub src_offset: u32,
    /// Non-zero for per-instance attributes
    pub instance_divisor: u32,
    pub vertex_buffer_index: u32,
    pub src_format: PipeFormat,
}

/// Hardware view of one attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDescriptor {
    /// Attribute buffer the record reads from
    pub index: u32,
    pub format: MaliFormat,
    pub swizzle: u32,
    pub src_offset: u32,
}

impl Default for AttributeDescriptor {
    fn default() -> Self {
        Self { index: 0, format: MaliFormat::R32UI, swizzle: default_swizzle(1), src_offset: 0 }
    }
}

/// Vertex elements state object
///
/// `elements` keeps the canonical API description. `hw` is what the GPU
/// sees; draws only ever rewrite its `src_offset`, always from the canonical
/// value.
#[derive(Debug, Clone)]
pub struct VertexElementState {
    pub elements: Vec<VertexElement>,
    /// Meta records; element `i` reads attribute buffer record `i`
    pub hw: [AttributeDescriptor; MAX_ATTRIBS + 2],
}

impl VertexElementState {
    /// Translate API elements for the given GPU
    pub fn new(elements: &[VertexElement], quirks: Quirks) -> Self {
        assert!(elements.len() <= MAX_ATTRIBS, "too many vertex elements: {}", elements.len());

        let mut hw = [AttributeDescriptor::default(); MAX_ATTRIBS + 2];

        for (i, element) in elements.iter().enumerate() {
            hw[i] = AttributeDescriptor {
                index: i as u32,
                format: element.src_format.desc().hw,
                swizzle: attribute_swizzle(element.src_format, quirks),
                src_offset: element.src_offset,
            };
        }

        // Builtins are single R32UI values on every GPU
        for slot in [PAN_VERTEX_ID, PAN_INSTANCE_ID] {
            hw[slot] = AttributeDescriptor { index: slot as u32, ..Default::default() };
        }

        Self { elements: elements.to_vec(), hw }
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }
}

/// A bound vertex buffer
#[derive(Debug, Clone)]
pub struct VertexBuffer {
    pub bo: Arc<dyn Bo>,
    /// Byte offset of the first vertex inside `bo`; may be unaligned
    pub buffer_offset: u32,
    pub stride: u32,
}

impl VertexBuffer {
    /// Address of the first vertex
    pub fn address(&self) -> u64 {
        self.bo.gpu_address() + self.buffer_offset as u64
    }
}

#[cfg(test)]
#[path = "vertex_tests.rs"]
mod tests;
