/// Buffer objects and the allocator collaborator

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use bitflags::bitflags;
use crate::error::Result;

bitflags! {
    /// Allocation flags understood by the kernel driver
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BoFlags: u32 {
        /// Mapped executable (shader binaries)
        const EXECUTE = 1 << 0;
        /// Backing pages are committed on GPU fault (tiler heap)
        const GROWABLE = 1 << 1;
        /// Never mapped on the CPU
        const INVISIBLE = 1 << 2;
    }
}

/// Descriptor for creating a buffer object
#[derive(Debug, Clone)]
pub struct BoDesc {
    /// Size in bytes
    pub size: u64,
    /// Allocation flags
    pub flags: BoFlags,
    /// Debug label shown in traces
    pub label: &'static str,
}

/// GPU buffer object
///
/// Shared through `Arc`. The memory is released when the last reference
/// (context binding, batch, variant) is dropped.
pub trait Bo: Send + Sync + fmt::Debug {
    /// GPU virtual address of the first byte
    fn gpu_address(&self) -> u64;

    /// Size in bytes
    fn size(&self) -> u64;

    /// Write through the CPU mapping
    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Read through the CPU mapping
    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()>;

    /// Wait until the GPU is done with this BO
    ///
    /// `None` waits without bound. Returns `false` on timeout.
    fn wait(&self, timeout: Option<Duration>) -> bool;
}

/// Buffer object allocator
pub trait BoAllocator: Send + Sync {
    /// Allocate a new buffer object
    fn create_bo(&self, desc: BoDesc) -> Result<Arc<dyn Bo>>;
}

/// Two handles refer to the same BO
pub fn same_bo(a: &Arc<dyn Bo>, b: &Arc<dyn Bo>) -> bool {
    a.gpu_address() == b.gpu_address()
}
