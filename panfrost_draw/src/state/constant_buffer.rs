/// Per-stage constant (uniform) buffer bindings

use std::sync::Arc;
use crate::device::Bo;

/// Maximum constant buffer slots per stage
pub const MAX_CONSTANT_BUFFERS: usize = 16;

/// Where a constant buffer's data lives
#[derive(Debug, Clone)]
pub enum ConstantBufferData {
    /// Resident in a BO
    Buffer { bo: Arc<dyn Bo>, offset: u32 },
    /// Client memory, uploaded at draw time
    User(Arc<[u8]>),
}

#[derive(Debug, Clone)]
pub struct ConstantBuffer {
    pub data: ConstantBufferData,
    pub size: u32,
}

/// Constant buffers bound to one stage
#[derive(Debug, Clone, Default)]
pub struct ConstantBufferState {
    pub cb: [Option<ConstantBuffer>; MAX_CONSTANT_BUFFERS],
    pub enabled_mask: u32,
    pub dirty_mask: u32,
}

impl ConstantBufferState {
    /// Bind (or with `None`, unbind) slot `index`
    pub fn set(&mut self, index: usize, buffer: Option<ConstantBuffer>) {
        assert!(index < MAX_CONSTANT_BUFFERS, "constant buffer slot {} out of range", index);

        let mask = 1u32 << index;
        match buffer {
            Some(buffer) => {
                self.cb[index] = Some(buffer);
                self.enabled_mask |= mask;
                self.dirty_mask |= mask;
            }
            None => {
                self.cb[index] = None;
                self.enabled_mask &= !mask;
                self.dirty_mask &= !mask;
            }
        }
    }

    /// Number of UBO table entries: highest enabled slot + 1
    ///
    /// Slot 0 always counts since it carries system values.
    pub fn ubo_count(&self) -> u32 {
        let mask = self.enabled_mask | 1;
        32 - mask.leading_zeros()
    }
}

#[cfg(test)]
#[path = "constant_buffer_tests.rs"]
mod tests;
