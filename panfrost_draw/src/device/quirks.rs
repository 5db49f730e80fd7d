/// Hardware quirks and GPU identification

use bitflags::bitflags;

bitflags! {
    /// Per-GPU behavioural differences the command stream has to honour
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Quirks: u32 {
        /// Bifrost architecture (G31, G52, ...) rather than Midgard
        const IS_BIFROST = 1 << 0;
        /// Attribute descriptors carry a full 4-channel swizzle
        const HAS_SWIZZLES = 1 << 1;
        /// The tiler only supports a single flat tiling level
        const MIDGARD_NO_HIER_TILING = 1 << 2;
        /// Single framebuffer descriptor (T6xx / T720)
        const MIDGARD_SFBD = 1 << 3;
    }
}

/// Identification of the GPU a context drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuInfo {
    /// Product id as reported by the kernel (e.g. 0x860 for T860)
    pub gpu_id: u32,
    /// Quirks derived from the product id
    pub quirks: Quirks,
}

impl GpuInfo {
    /// Look up the quirks for a known product id
    ///
    /// Returns `None` for GPUs this driver does not know about.
    pub fn from_gpu_id(gpu_id: u32) -> Option<Self> {
        let midgard = Quirks::HAS_SWIZZLES;

        let quirks = match gpu_id {
            0x600 | 0x620 => midgard | Quirks::MIDGARD_SFBD,
            0x720 => midgard | Quirks::MIDGARD_SFBD | Quirks::MIDGARD_NO_HIER_TILING,
            0x820 | 0x830 => midgard | Quirks::MIDGARD_NO_HIER_TILING,
            0x750 | 0x860 | 0x880 => midgard,
            0x6221 | 0x7093 | 0x7212 => Quirks::IS_BIFROST,
            _ => return None,
        };

        Some(Self { gpu_id, quirks })
    }

    /// Build a description with explicit quirks (used by tests and bring-up)
    pub fn with_quirks(gpu_id: u32, quirks: Quirks) -> Self {
        Self { gpu_id, quirks }
    }

    /// Whether the tiler supports hierarchical binning
    pub fn has_hierarchical_tiling(&self) -> bool {
        !self.quirks.contains(Quirks::MIDGARD_NO_HIER_TILING)
    }

    /// Whether this is a Bifrost-class GPU
    pub fn is_bifrost(&self) -> bool {
        self.quirks.contains(Quirks::IS_BIFROST)
    }
}

#[cfg(test)]
#[path = "quirks_tests.rs"]
mod tests;
