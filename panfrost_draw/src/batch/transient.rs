/// Per-batch transient memory
///
/// Descriptors live until the batch is submitted, so they are bump-allocated
/// out of slabs the batch owns. Requests larger than a slab get a dedicated
/// BO.

use std::sync::Arc;
use bytemuck::Pod;
use crate::device::{Bo, BoAllocator, BoDesc, BoFlags};
use crate::error::Result;

/// Round `value` up to a multiple of `alignment` (power of two)
pub fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// One sub-allocation
#[derive(Debug, Clone)]
pub struct TransientAllocation {
    pub bo: Arc<dyn Bo>,
    /// Offset inside `bo`
    pub offset: u64,
    pub gpu: u64,
    pub size: u64,
}

impl TransientAllocation {
    /// Write `data` at the start of the allocation
    pub fn write(&self, data: &[u8]) -> Result<()> {
        debug_assert!(data.len() as u64 <= self.size);
        self.bo.write(self.offset, data)
    }
}

#[derive(Debug)]
struct Slab {
    bo: Arc<dyn Bo>,
    cursor: u64,
}

/// Linear allocator over a growing list of slabs
#[derive(Debug)]
pub struct TransientPool {
    slab_size: u64,
    slabs: Vec<Slab>,
    /// Oversized allocations, one BO each
    dedicated: Vec<Arc<dyn Bo>>,
}

impl TransientPool {
    pub fn new(slab_size: u64) -> Self {
        Self { slab_size: slab_size.max(256), slabs: Vec::new(), dedicated: Vec::new() }
    }

    /// Reserve `size` bytes aligned to `align`
    pub fn allocate(&mut self, allocator: &dyn BoAllocator, size: u64, align: u64) -> Result<TransientAllocation> {
        let align = align.max(1);
        let size = size.max(1);

        if size > self.slab_size {
            let bo = allocator.create_bo(BoDesc {
                size,
                flags: BoFlags::empty(),
                label: "transient (dedicated)",
            })?;
            self.dedicated.push(bo.clone());
            let gpu = bo.gpu_address();
            return Ok(TransientAllocation { bo, offset: 0, gpu, size });
        }

        let fits = self
            .slabs
            .last()
            .map(|slab| align_up(slab.cursor, align) + size <= slab.bo.size())
            .unwrap_or(false);

        if !fits {
            let bo = allocator.create_bo(BoDesc {
                size: self.slab_size,
                flags: BoFlags::empty(),
                label: "transient",
            })?;
            self.slabs.push(Slab { bo, cursor: 0 });
        }

        let last = self.slabs.len() - 1;
        let slab = &mut self.slabs[last];
        let offset = align_up(slab.cursor, align);
        slab.cursor = offset + size;

        Ok(TransientAllocation {
            bo: slab.bo.clone(),
            offset,
            gpu: slab.bo.gpu_address() + offset,
            size,
        })
    }

    /// Copy raw bytes into fresh transient memory and return their GPU address
    pub fn upload_bytes(&mut self, allocator: &dyn BoAllocator, data: &[u8], align: u64) -> Result<u64> {
        let allocation = self.allocate(allocator, data.len() as u64, align)?;
        allocation.write(data)?;
        Ok(allocation.gpu)
    }

    /// Upload one `Pod` record
    pub fn upload<T: Pod>(&mut self, allocator: &dyn BoAllocator, value: &T) -> Result<u64> {
        self.upload_bytes(allocator, bytemuck::bytes_of(value), std::mem::align_of::<T>().max(16) as u64)
    }

    /// Upload a table of `Pod` records
    pub fn upload_slice<T: Pod>(&mut self, allocator: &dyn BoAllocator, values: &[T]) -> Result<u64> {
        self.upload_bytes(allocator, bytemuck::cast_slice(values), std::mem::align_of::<T>().max(16) as u64)
    }

    /// Every BO backing this pool
    pub fn bos(&self) -> impl Iterator<Item = &Arc<dyn Bo>> + '_ {
        self.slabs.iter().map(|s| &s.bo).chain(self.dedicated.iter())
    }

    /// Bytes handed out so far, excluding alignment gaps at slab ends
    pub fn used(&self) -> u64 {
        self.slabs.iter().map(|s| s.cursor).sum::<u64>()
            + self.dedicated.iter().map(|bo| bo.size()).sum::<u64>()
    }
}

#[cfg(test)]
#[path = "transient_tests.rs"]
mod tests;
