/// Transform feedback targets and their running offsets

use std::sync::Arc;
use crate::device::Bo;

/// Maximum simultaneously bound stream output targets
pub const MAX_SO_BUFFERS: usize = 4;

/// A buffer range captured vertices are written to
#[derive(Debug)]
pub struct StreamOutputTarget {
    pub bo: Arc<dyn Bo>,
    pub buffer_offset: u32,
    pub buffer_size: u32,
}

impl StreamOutputTarget {
    pub fn new(bo: Arc<dyn Bo>, buffer_offset: u32, buffer_size: u32) -> Arc<Self> {
        Arc::new(Self { bo, buffer_offset, buffer_size })
    }

    /// Address of captured vertex `offset`, `stride` in dwords
    pub fn address(&self, stride: u32, offset: u32) -> u64 {
        self.bo.gpu_address() + self.buffer_offset as u64 + (offset as u64) * (stride as u64) * 4
    }
}

/// Bound targets
///
/// Offsets count captured vertices and advance after every draw.
#[derive(Debug, Default)]
pub struct StreamOutState {
    pub targets: [Option<Arc<StreamOutputTarget>>; MAX_SO_BUFFERS],
    pub offsets: [u32; MAX_SO_BUFFERS],
    pub num_targets: usize,
}

impl StreamOutState {
    /// Replace the bound targets
    ///
    /// `offsets[i] == None` keeps the offset target `i` already had
    /// (resuming a paused capture).
    pub fn set_targets(&mut self, targets: &[Arc<StreamOutputTarget>], offsets: &[Option<u32>]) {
        assert!(targets.len() <= MAX_SO_BUFFERS, "too many stream output targets: {}", targets.len());
        assert_eq!(targets.len(), offsets.len());

        for (i, (target, offset)) in targets.iter().zip(offsets).enumerate() {
            if let Some(offset) = offset {
                self.offsets[i] = *offset;
            }
            self.targets[i] = Some(target.clone());
        }

        for slot in self.targets.iter_mut().skip(targets.len()) {
            *slot = None;
        }

        self.num_targets = targets.len();
    }

    /// Advance every bound target by `count` captured vertices
    pub fn advance(&mut self, count: u32) {
        for offset in self.offsets.iter_mut().take(self.num_targets) {
            *offset += count;
        }
    }

    pub fn active_targets(&self) -> impl Iterator<Item = (usize, &Arc<StreamOutputTarget>)> + '_ {
        self.targets
            .iter()
            .take(self.num_targets)
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|t| (i, t)))
    }
}

#[cfg(test)]
#[path = "streamout_tests.rs"]
mod tests;
