/// Per-draw attribute offset fixup
///
/// Attribute buffers must start on a 64-byte boundary. The descriptor gets
/// the buffer address rounded down and the discarded low bits move into
/// each attribute's source offset, so the GPU still computes
/// `base + stride * index + src_offset` to the exact byte.

use crate::state::{VertexBuffer, VertexElementState};

/// Attribute buffer base alignment
pub const ATTRIBUTE_BUFFER_ALIGN: u64 = 64;

/// Address the attribute buffer descriptor for `buffer` carries
pub fn attribute_buffer_base(buffer: &VertexBuffer) -> u64 {
    buffer.address() & !(ATTRIBUTE_BUFFER_ALIGN - 1)
}

/// Rewrite the hardware source offsets for one draw
///
/// Always derived from the canonical element offsets, so calling this for
/// every draw never accumulates. Elements whose buffer slot is unbound keep
/// their canonical offset.
pub fn fixup_attribute_offsets(
    state: &mut VertexElementState,
    buffers: &[Option<VertexBuffer>],
    start: u32,
    instance_count: u32,
) {
    for (element, hw) in state.elements.iter().zip(state.hw.iter_mut()) {
        let Some(buffer) = buffers.get(element.vertex_buffer_index as usize).and_then(|b| b.as_ref()) else {
            hw.src_offset = element.src_offset;
            continue;
        };

        let misalignment = (buffer.address() & (ATTRIBUTE_BUFFER_ALIGN - 1)) as u32;
        let mut src_offset = element.src_offset.wrapping_add(misalignment);

        // Instanced addressing starts from vertex 0 even for a delayed start
        if element.instance_divisor != 0 && instance_count > 1 && start != 0 {
            src_offset = src_offset.wrapping_sub(buffer.stride.wrapping_mul(start));
        }

        hw.src_offset = src_offset;
    }
}

#[cfg(test)]
#[path = "attribute_fixup_tests.rs"]
mod tests;
