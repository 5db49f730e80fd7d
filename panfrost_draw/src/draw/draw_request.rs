/// Draw call parameters as handed over by the state tracker

use std::sync::Arc;
use crate::device::Bo;
use crate::error::{Error, Result};
use crate::geometry::PrimitiveTopology;

/// Where the index list lives
#[derive(Debug, Clone)]
pub enum IndexSource {
    /// Client memory, uploaded at draw time
    User(Arc<[u8]>),
    /// Resident in a BO, `offset` bytes in
    Buffer { bo: Arc<dyn Bo>, offset: u32 },
}

/// One draw call
#[derive(Debug, Clone)]
pub struct DrawRequest {
    pub mode: PrimitiveTopology,
    /// First vertex, or first index for indexed draws
    pub start: u32,
    pub count: u32,
    /// Bytes per index (1, 2 or 4), 0 for non-indexed draws
    pub index_size: u32,
    pub indices: Option<IndexSource>,
    /// Added to every index before fetching
    pub index_bias: i32,
    /// Known `(min, max)` index values; computed from the indices when `None`
    pub index_bounds: Option<(u32, u32)>,
    pub instance_count: u32,
    pub start_instance: u32,
    pub primitive_restart: bool,
    pub restart_index: u32,
}

impl DrawRequest {
    /// Non-indexed draw of `count` vertices from `start`
    pub fn arrays(mode: PrimitiveTopology, start: u32, count: u32) -> Self {
        Self {
            mode,
            start,
            count,
            index_size: 0,
            indices: None,
            index_bias: 0,
            index_bounds: None,
            instance_count: 1,
            start_instance: 0,
            primitive_restart: false,
            restart_index: 0,
        }
    }

    /// Indexed draw of `count` indices from index `start`
    pub fn indexed(mode: PrimitiveTopology, index_size: u32, indices: IndexSource, start: u32, count: u32) -> Self {
        assert!(matches!(index_size, 1 | 2 | 4), "invalid index size {}", index_size);
        Self {
            index_size,
            indices: Some(indices),
            ..Self::arrays(mode, start, count)
        }
    }

    /// Indexed draw over a list of 32-bit indices in client memory
    pub fn from_u32_indices(mode: PrimitiveTopology, indices: &[u32]) -> Self {
        let bytes: Vec<u8> = bytemuck::cast_slice(indices).to_vec();
        Self::indexed(mode, 4, IndexSource::User(Arc::from(bytes)), 0, indices.len() as u32)
    }

    pub fn with_instances(mut self, instance_count: u32) -> Self {
        self.instance_count = instance_count;
        self
    }

    pub fn with_index_bias(mut self, index_bias: i32) -> Self {
        self.index_bias = index_bias;
        self
    }

    pub fn with_index_bounds(mut self, min: u32, max: u32) -> Self {
        self.index_bounds = Some((min, max));
        self
    }

    pub fn with_restart(mut self, restart_index: u32) -> Self {
        self.primitive_restart = true;
        self.restart_index = restart_index;
        self
    }

    pub fn is_indexed(&self) -> bool {
        self.index_size != 0
    }

    /// Largest value an index of this width can hold
    pub fn max_index_value(&self) -> u32 {
        match self.index_size {
            1 => 0xFF,
            2 => 0xFFFF,
            _ => 0xFFFF_FFFF,
        }
    }

    /// Restart at the all-ones index is handled by the hardware
    pub fn needs_restart_fallback(&self) -> bool {
        self.primitive_restart && self.is_indexed() && self.restart_index != self.max_index_value()
    }

    /// Byte offset of the first index used, relative to the index source
    pub fn index_byte_offset(&self) -> u64 {
        self.start as u64 * self.index_size as u64
    }

    /// The `count` indices starting at `start`, widened to 32 bits
    pub fn read_indices(&self) -> Result<Vec<u32>> {
        let (Some(source), true) = (&self.indices, self.is_indexed()) else {
            return Err(Error::InvalidResource("draw has no index source".to_string()));
        };

        let size = self.index_size as usize;
        let len = self.count as usize * size;
        let mut bytes = vec![0u8; len];

        match source {
            IndexSource::User(data) => {
                let begin = self.index_byte_offset() as usize;
                let end = begin + len;
                if end > data.len() {
                    return Err(Error::InvalidResource(format!(
                        "index range {}..{} past end of {} bytes of user indices",
                        begin, end, data.len()
                    )));
                }
                bytes.copy_from_slice(&data[begin..end]);
            }
            IndexSource::Buffer { bo, offset } => {
                bo.read(*offset as u64 + self.index_byte_offset(), &mut bytes)?;
            }
        }

        let widen: fn(&[u8]) -> u32 = match size {
            1 => |c| c[0] as u32,
            2 => |c| u16::from_le_bytes([c[0], c[1]]) as u32,
            _ => |c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]),
        };

        Ok(bytes.chunks_exact(size).map(widen).collect())
    }

    /// `(min, max)` index value of an indexed draw
    ///
    /// Uses the bounds supplied with the draw when present. Restart indices
    /// are not vertices and are skipped.
    pub fn min_max_index(&self) -> Result<(u32, u32)> {
        if let Some(bounds) = self.index_bounds {
            return Ok(bounds);
        }

        let indices = self.read_indices()?;
        let bounds = indices
            .iter()
            .copied()
            .filter(|&i| !(self.primitive_restart && i == self.restart_index))
            .fold(None, |acc: Option<(u32, u32)>, i| match acc {
                None => Some((i, i)),
                Some((lo, hi)) => Some((lo.min(i), hi.max(i))),
            });

        Ok(bounds.unwrap_or((0, 0)))
    }
}

#[cfg(test)]
#[path = "draw_request_tests.rs"]
mod tests;
