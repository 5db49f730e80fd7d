/// A batch: the jobs and memory needed to render into one framebuffer
///
/// Draws append a vertex/tiler job pair and upload their descriptors into
/// the batch's transient pool. Every BO a job touches is referenced by the
/// batch until it is dropped after submission.

use std::sync::Arc;
use bitflags::bitflags;
use bytemuck::Pod;
use rustc_hash::FxHashSet;
use crate::device::{Bo, BoAllocator, BoDesc, BoFlags, ShaderStage};
use crate::error::Result;
use crate::pan_trace;
use crate::state::FramebufferKey;
use super::descriptors::{JobHeader, TilerJob, VertexJob};
use super::transient::{TransientAllocation, TransientPool};

bitflags! {
    /// Framebuffer features the fragment job has to enable
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BatchRequirements: u32 {
        const MSAA = 1 << 0;
        const DEPTH_WRITE = 1 << 1;
    }
}

bitflags! {
    /// Buffers cleared at the start of the batch
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClearBuffers: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Pending clear
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearInfo {
    pub buffers: ClearBuffers,
    pub color: [f32; 4],
    pub depth: f64,
    pub stencil: u32,
}

/// Hardware job types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JobType {
    Vertex = 5,
    Tiler = 7,
}

/// One job in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    pub job_type: JobType,
    /// 1-based position in the chain
    pub index: u16,
    /// Index of the job this one waits for, 0 for none
    pub dependency: u16,
    pub gpu: u64,
}

/// Descriptor tables a draw emits, in emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    VertexBuffers,
    Varyings,
    ShaderMeta(ShaderStage),
    AttributeMeta,
    Samplers(ShaderStage),
    Textures(ShaderStage),
    ConstantBuffers(ShaderStage),
    Viewport,
    VertexJob,
    TilerJob,
}

#[derive(Debug)]
pub struct Batch {
    key: FramebufferKey,
    bos: Vec<Arc<dyn Bo>>,
    bo_addresses: FxHashSet<u64>,
    pool: TransientPool,
    tiler_heap: Option<Arc<dyn Bo>>,
    tiler_dummy: Option<Arc<dyn Bo>>,
    polygon_list: Option<Arc<dyn Bo>>,
    jobs: Vec<Job>,
    /// Location of the last job's `next_job` pointer
    last_job: Option<TransientAllocation>,
    emitted: Vec<DescriptorKind>,
    draw_count: u32,
    stack_size: u32,
    requirements: BatchRequirements,
    clear: Option<ClearInfo>,
}

impl Batch {
    pub fn new(key: FramebufferKey, slab_size: u64) -> Self {
        Self {
            key,
            bos: Vec::new(),
            bo_addresses: FxHashSet::default(),
            pool: TransientPool::new(slab_size),
            tiler_heap: None,
            tiler_dummy: None,
            polygon_list: None,
            jobs: Vec::new(),
            last_job: None,
            emitted: Vec::new(),
            draw_count: 0,
            stack_size: 0,
            requirements: BatchRequirements::empty(),
            clear: None,
        }
    }

    pub fn key(&self) -> &FramebufferKey {
        &self.key
    }

    // ===== BO references =====

    /// Keep `bo` alive until the batch is done; duplicates are ignored
    pub fn add_bo(&mut self, bo: &Arc<dyn Bo>) {
        if self.bo_addresses.insert(bo.gpu_address()) {
            self.bos.push(bo.clone());
        }
    }

    pub fn bos(&self) -> &[Arc<dyn Bo>] {
        &self.bos
    }

    /// Whether the batch references the BO at `gpu`
    pub fn has_bo(&self, gpu: u64) -> bool {
        self.bo_addresses.contains(&gpu)
    }

    // ===== Tiler memory =====

    /// Growable heap the tiler bins into, created on first use
    pub fn get_tiler_heap(&mut self, allocator: &dyn BoAllocator, size: u64) -> Result<Arc<dyn Bo>> {
        let bo = match &self.tiler_heap {
            Some(bo) => bo.clone(),
            None => {
                let bo = allocator.create_bo(BoDesc {
                    size,
                    flags: BoFlags::INVISIBLE | BoFlags::GROWABLE,
                    label: "tiler heap",
                })?;
                self.tiler_heap = Some(bo.clone());
                bo
            }
        };
        self.add_bo(&bo);
        Ok(bo)
    }

    /// Small CPU-visible stand-in for the heap when the tiler is disabled
    pub fn get_tiler_dummy(&mut self, allocator: &dyn BoAllocator, size: u64) -> Result<Arc<dyn Bo>> {
        let bo = match &self.tiler_dummy {
            Some(bo) => bo.clone(),
            None => {
                let bo = allocator.create_bo(BoDesc {
                    size,
                    flags: BoFlags::empty(),
                    label: "tiler dummy",
                })?;
                self.tiler_dummy = Some(bo.clone());
                bo
            }
        };
        self.add_bo(&bo);
        Ok(bo)
    }

    /// Polygon list shared by every draw of the batch
    pub fn get_polygon_list(&mut self, allocator: &dyn BoAllocator, size: u64) -> Result<Arc<dyn Bo>> {
        let bo = match &self.polygon_list {
            Some(bo) => bo.clone(),
            None => {
                let bo = allocator.create_bo(BoDesc {
                    size,
                    flags: BoFlags::INVISIBLE,
                    label: "polygon list",
                })?;
                self.polygon_list = Some(bo.clone());
                bo
            }
        };
        self.add_bo(&bo);
        Ok(bo)
    }

    // ===== Descriptor uploads =====

    /// Reserve transient memory owned by this batch
    pub fn allocate(&mut self, allocator: &dyn BoAllocator, size: u64, align: u64) -> Result<TransientAllocation> {
        let allocation = self.pool.allocate(allocator, size, align)?;
        self.add_bo(&allocation.bo);
        Ok(allocation)
    }

    pub fn upload_bytes(&mut self, allocator: &dyn BoAllocator, data: &[u8], align: u64) -> Result<u64> {
        let allocation = self.allocate(allocator, data.len() as u64, align)?;
        allocation.write(data)?;
        Ok(allocation.gpu)
    }

    pub fn upload<T: Pod>(&mut self, allocator: &dyn BoAllocator, value: &T) -> Result<u64> {
        self.upload_slice(allocator, std::slice::from_ref(value))
    }

    pub fn upload_slice<T: Pod>(&mut self, allocator: &dyn BoAllocator, values: &[T]) -> Result<u64> {
        let align = std::mem::align_of::<T>().max(16) as u64;
        self.upload_bytes(allocator, bytemuck::cast_slice(values), align)
    }

    /// Note that a descriptor table was emitted
    pub fn record(&mut self, kind: DescriptorKind) {
        self.emitted.push(kind);
    }

    /// Descriptor tables emitted so far, in order
    pub fn emitted(&self) -> &[DescriptorKind] {
        &self.emitted
    }

    // ===== Jobs =====

    /// Append a vertex job and, unless rasterization is off, a tiler job
    /// depending on it
    pub fn add_vertex_tiler_jobs(
        &mut self,
        allocator: &dyn BoAllocator,
        mut vertex: VertexJob,
        tiler: Option<TilerJob>,
    ) -> Result<()> {
        let vertex_index = self.next_job_index();
        vertex.header = JobHeader {
            job_type: JobType::Vertex as u8,
            job_index: vertex_index,
            ..Default::default()
        };
        self.push_job(allocator, JobType::Vertex, vertex_index, 0, bytemuck::bytes_of(&vertex))?;
        self.record(DescriptorKind::VertexJob);

        if let Some(mut tiler) = tiler {
            let tiler_index = self.next_job_index();
            tiler.header = JobHeader {
                job_type: JobType::Tiler as u8,
                job_index: tiler_index,
                job_dependency_index_1: vertex_index,
                ..Default::default()
            };
            self.push_job(allocator, JobType::Tiler, tiler_index, vertex_index, bytemuck::bytes_of(&tiler))?;
            self.record(DescriptorKind::TilerJob);
        }

        self.draw_count += 1;
        Ok(())
    }

    fn next_job_index(&self) -> u16 {
        self.jobs.len() as u16 + 1
    }

    fn push_job(&mut self, allocator: &dyn BoAllocator, job_type: JobType, index: u16, dependency: u16, bytes: &[u8]) -> Result<()> {
        let allocation = self.allocate(allocator, bytes.len() as u64, 64)?;
        allocation.write(bytes)?;

        // Chain it after the previous job
        if let Some(previous) = &self.last_job {
            let next_job = std::mem::offset_of!(JobHeader, next_job) as u64;
            previous.bo.write(previous.offset + next_job, &allocation.gpu.to_le_bytes())?;
        }

        pan_trace!("pan::Batch", "{:?} job #{} at {:#x} (dep {})", job_type, index, allocation.gpu, dependency);

        self.jobs.push(Job { job_type, index, dependency, gpu: allocation.gpu });
        self.last_job = Some(allocation);
        Ok(())
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// GPU address of the first job of the chain
    pub fn first_job(&self) -> Option<u64> {
        self.jobs.first().map(|job| job.gpu)
    }

    pub fn draw_count(&self) -> u32 {
        self.draw_count
    }

    // ===== Fragment job state =====

    /// Grow the thread-local stack to fit `stack_size`
    pub fn adjust_stack_size(&mut self, stack_size: u32) {
        self.stack_size = self.stack_size.max(stack_size);
    }

    pub fn stack_size(&self) -> u32 {
        self.stack_size
    }

    pub fn set_requirements(&mut self, requirements: BatchRequirements) {
        self.requirements |= requirements;
    }

    pub fn requirements(&self) -> BatchRequirements {
        self.requirements
    }

    /// Record a clear; later values win for buffers cleared twice
    pub fn clear(&mut self, buffers: ClearBuffers, color: [f32; 4], depth: f64, stencil: u32) {
        let mut info = self.clear.unwrap_or_default();
        info.buffers |= buffers;
        if buffers.contains(ClearBuffers::COLOR) {
            info.color = color;
        }
        if buffers.contains(ClearBuffers::DEPTH) {
            info.depth = depth;
        }
        if buffers.contains(ClearBuffers::STENCIL) {
            info.stencil = stencil;
        }
        self.clear = Some(info);
    }

    pub fn clear_info(&self) -> Option<&ClearInfo> {
        self.clear.as_ref()
    }

    pub fn has_draws(&self) -> bool {
        self.draw_count > 0
    }

    /// Draws or a clear are pending
    pub fn has_work(&self) -> bool {
        self.has_draws() || self.clear.is_some()
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
