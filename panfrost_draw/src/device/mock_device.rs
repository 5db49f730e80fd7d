/// Mock collaborators for unit tests (no GPU required)
///
/// BOs live in host memory with fake, 4 KiB-aligned GPU addresses. The
/// compiler returns a configurable result and counts invocations. The
/// submitter records what it was given and signals fences immediately.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use bytemuck::Pod;
use crate::batch::Batch;
use crate::config::ContextConfig;
use crate::context::Context;
use crate::device::{
    Bo, BoAllocator, BoDesc, BoFlags, CompiledShader, Fence, GpuInfo, ShaderCompiler, ShaderIr, ShaderStage, Submitter,
};
use crate::error::{Error, Result};
use crate::shader::VariantKey;

// ============================================================================
// Mock BO
// ============================================================================

#[derive(Debug)]
pub struct MockBo {
    pub gpu: u64,
    pub size: u64,
    pub flags: BoFlags,
    pub label: &'static str,
    data: Mutex<Vec<u8>>,
}

impl MockBo {
    pub fn new(gpu: u64, size: u64, flags: BoFlags, label: &'static str) -> Self {
        Self { gpu, size, flags, label, data: Mutex::new(Vec::new()) }
    }

    /// Read a little-endian u32 at `offset`
    pub fn read_u32(&self, offset: u64) -> u32 {
        let mut bytes = [0u8; 4];
        self.read(offset, &mut bytes).unwrap();
        u32::from_le_bytes(bytes)
    }
}

impl Bo for MockBo {
    fn gpu_address(&self) -> u64 {
        self.gpu
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset + data.len() as u64;
        if end > self.size {
            return Err(Error::InvalidResource(format!(
                "write of {} bytes at {} past end of '{}' ({} bytes)",
                data.len(), offset, self.label, self.size
            )));
        }
        let mut storage = self.data.lock().unwrap();
        if storage.len() < end as usize {
            storage.resize(end as usize, 0);
        }
        storage[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        let end = offset + out.len() as u64;
        if end > self.size {
            return Err(Error::InvalidResource(format!(
                "read past end of '{}'", self.label
            )));
        }
        let storage = self.data.lock().unwrap();
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = storage.get(offset as usize + i).copied().unwrap_or(0);
        }
        Ok(())
    }

    fn wait(&self, _timeout: Option<Duration>) -> bool {
        true
    }
}

// ============================================================================
// Mock allocator
// ============================================================================

pub struct MockBoAllocator {
    next_gpu: AtomicU64,
    fail: AtomicBool,
    created: Mutex<Vec<Weak<MockBo>>>,
}

impl MockBoAllocator {
    pub fn new() -> Self {
        Self {
            next_gpu: AtomicU64::new(0x1000_0000),
            fail: AtomicBool::new(false),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Make every following allocation fail with `OutOfMemory`
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    /// Total number of BOs ever allocated
    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    /// Number of BOs still referenced somewhere
    pub fn live_count(&self) -> usize {
        self.created.lock().unwrap().iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Labels of BOs still referenced somewhere
    pub fn live_labels(&self) -> Vec<&'static str> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .filter_map(|w| w.upgrade())
            .map(|bo| bo.label)
            .collect()
    }

    /// Find a live BO by GPU address, to inspect what the core wrote into it
    pub fn find(&self, gpu: u64) -> Option<Arc<MockBo>> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .filter_map(|w| w.upgrade())
            .find(|bo| gpu >= bo.gpu && gpu < bo.gpu + bo.size)
    }
}

impl BoAllocator for MockBoAllocator {
    fn create_bo(&self, desc: BoDesc) -> Result<Arc<dyn Bo>> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(Error::OutOfMemory);
        }
        let aligned = (desc.size.max(1) + 4095) & !4095;
        let gpu = self.next_gpu.fetch_add(aligned, Ordering::Relaxed);
        let bo = Arc::new(MockBo::new(gpu, desc.size, desc.flags, desc.label));
        self.created.lock().unwrap().push(Arc::downgrade(&bo));
        Ok(bo)
    }
}

// ============================================================================
// Mock compiler
// ============================================================================

#[derive(Debug, Clone)]
pub struct MockCompileCall {
    pub stage: ShaderStage,
    pub key: VariantKey,
}

pub struct MockCompiler {
    pub result: Mutex<CompiledShader>,
    pub calls: Mutex<Vec<MockCompileCall>>,
    pub fail: AtomicBool,
}

impl MockCompiler {
    pub fn new() -> Self {
        Self::with_result(CompiledShader {
            binary: vec![0xAA; 64],
            outputs_written: 0b1,
            varying_count: 1,
            attribute_count: 1,
            uniform_count: 1,
            work_reg_count: 4,
            ..Default::default()
        })
    }

    pub fn with_result(result: CompiledShader) -> Self {
        Self {
            result: Mutex::new(result),
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Change what subsequent compilations report
    pub fn set_result(&self, result: CompiledShader) {
        *self.result.lock().unwrap() = result;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ShaderCompiler for MockCompiler {
    fn compile(&self, _ir: &ShaderIr, stage: ShaderStage, key: &VariantKey) -> Result<CompiledShader> {
        self.calls.lock().unwrap().push(MockCompileCall { stage, key: key.clone() });
        if self.fail.load(Ordering::Relaxed) {
            return Err(Error::CompileFailed("mock compiler told to fail".to_string()));
        }
        Ok(self.result.lock().unwrap().clone())
    }
}

// ============================================================================
// Mock submission
// ============================================================================

pub struct MockFence {
    signalled: AtomicBool,
}

impl MockFence {
    pub fn new() -> Self {
        Self { signalled: AtomicBool::new(false) }
    }
}

impl Fence for MockFence {
    fn wait(&self, _timeout: Option<Duration>) -> bool {
        self.signalled.load(Ordering::Acquire)
    }

    fn is_signalled(&self) -> bool {
        self.signalled.load(Ordering::Acquire)
    }
}

/// What the mock submitter saw for one batch
#[derive(Debug, Clone)]
pub struct SubmittedBatch {
    pub job_count: usize,
    pub draw_count: u32,
    pub bo_count: usize,
    pub width: u32,
    pub height: u32,
    pub had_fence: bool,
}

pub struct MockSubmitter {
    pub submitted: Mutex<Vec<SubmittedBatch>>,
    fences: Mutex<Vec<Arc<MockFence>>>,
    failures: AtomicU32,
    attempts: AtomicU32,
}

impl MockSubmitter {
    pub fn new() -> Self {
        Self {
            submitted: Mutex::new(Vec::new()),
            fences: Mutex::new(Vec::new()),
            failures: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
        }
    }

    /// Reject the next `count` submissions
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::Relaxed);
    }

    /// Submissions tried, including rejected ones
    pub fn attempt_count(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

impl Submitter for MockSubmitter {
    fn create_fence(&self) -> Result<Arc<dyn Fence>> {
        let fence = Arc::new(MockFence::new());
        self.fences.lock().unwrap().push(fence.clone());
        Ok(fence)
    }

    fn submit(&self, batch: &Batch, out_fence: Option<&Arc<dyn Fence>>) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let remaining = self.failures.load(Ordering::Relaxed);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::Relaxed);
            return Err(Error::SubmitFailed("rejected by mock".to_string()));
        }

        self.submitted.lock().unwrap().push(SubmittedBatch {
            job_count: batch.jobs().len(),
            draw_count: batch.draw_count(),
            bo_count: batch.bos().len(),
            width: batch.key().width,
            height: batch.key().height,
            had_fence: out_fence.is_some(),
        });
        // The GPU is infinitely fast here
        for fence in self.fences.lock().unwrap().iter() {
            fence.signalled.store(true, Ordering::Release);
        }
        Ok(())
    }
}

// ============================================================================
// Mock device
// ============================================================================

/// One set of mock collaborators, shared by the contexts built on it
pub struct MockDevice {
    pub allocator: Arc<MockBoAllocator>,
    pub compiler: Arc<MockCompiler>,
    pub submitter: Arc<MockSubmitter>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            allocator: Arc::new(MockBoAllocator::new()),
            compiler: Arc::new(MockCompiler::new()),
            submitter: Arc::new(MockSubmitter::new()),
        }
    }

    pub fn context(&self, gpu: GpuInfo, config: ContextConfig) -> Context {
        Context::new(gpu, config, self.allocator.clone(), self.compiler.clone(), self.submitter.clone())
    }

    pub fn bo(&self, size: u64, label: &'static str) -> Arc<dyn Bo> {
        self.allocator
            .create_bo(BoDesc { size, flags: BoFlags::empty(), label })
            .unwrap()
    }

    /// Read back a `Pod` record the core wrote at `gpu`
    pub fn read<T: Pod + Default>(&self, gpu: u64) -> T {
        let bo = self.allocator.find(gpu).unwrap();
        let mut value = T::default();
        bo.read(gpu - bo.gpu, bytemuck::bytes_of_mut(&mut value)).unwrap();
        value
    }
}
