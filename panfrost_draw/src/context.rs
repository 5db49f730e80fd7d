/// Per-context state: bound pipeline state, batches, collaborators
///
/// Every operation of the state tracker goes through a `Context`. State
/// objects live in slot maps and are referred to by stable keys; batches are
/// kept per framebuffer until flushed.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use crate::batch::{Batch, ClearBuffers, SamplerDescriptor};
use crate::config::{ContextConfig, DebugFlags};
use crate::device::{Bo, BoAllocator, Fence, GpuInfo, ShaderCompiler, ShaderIr, ShaderStage, Submitter};
use crate::draw::{PrimitiveConverter, PrimitiveFallback, RestartFallback, RestartSplitter};
use crate::error::Result;
use crate::geometry::{DrawModes, PrimitiveTopology};
use crate::query::Query;
use crate::shader::{ShaderProgram, StreamOutputInfo, VariantState};
use crate::state::{
    ConstantBuffer, ConstantBufferState, DepthStencilAlphaState, FramebufferKey, FramebufferState, RasterizerState,
    SamplerObject, SamplerState, SamplerView, SamplerViewDesc, ScissorState, StreamOutState, StreamOutputTarget,
    VertexBuffer, VertexElement, VertexElementState, ViewportState, ZsaState, MAX_VERTEX_BUFFERS,
};
use crate::{pan_debug, pan_error, pan_info};

// ===== SLOT MAP KEYS =====

new_key_type! {
    /// Stable key for a shader program
    pub struct ShaderKey;

    /// Stable key for a vertex elements state
    pub struct VertexStateKey;

    /// Stable key for a rasterizer state
    pub struct RasterizerKey;

    /// Stable key for a depth/stencil/alpha state
    pub struct ZsaKey;

    /// Stable key for a sampler state
    pub struct SamplerKey;

    /// Stable key for a query
    pub struct QueryKey;
}

/// Draw-call state for one GPU context
///
/// Not shareable between threads; collaborators are.
pub struct Context {
    pub(crate) gpu: GpuInfo,
    pub(crate) config: ContextConfig,
    pub(crate) allocator: Arc<dyn BoAllocator>,
    pub(crate) compiler: Arc<dyn ShaderCompiler>,
    pub(crate) submitter: Arc<dyn Submitter>,
    pub(crate) restart_fallback: Arc<dyn RestartFallback>,
    pub(crate) primitive_fallback: Arc<dyn PrimitiveFallback>,

    /// Topologies the tiler takes natively
    pub(crate) draw_modes: DrawModes,

    // State objects
    pub(crate) shaders: SlotMap<ShaderKey, ShaderProgram>,
    pub(crate) vertex_states: SlotMap<VertexStateKey, VertexElementState>,
    pub(crate) rasterizers: SlotMap<RasterizerKey, RasterizerState>,
    pub(crate) zsa_states: SlotMap<ZsaKey, ZsaState>,
    pub(crate) samplers: SlotMap<SamplerKey, SamplerObject>,
    pub(crate) queries: SlotMap<QueryKey, Query>,

    // Bindings
    pub(crate) bound_shaders: [Option<ShaderKey>; 2],
    pub(crate) vertex: Option<VertexStateKey>,
    pub(crate) rasterizer: Option<RasterizerKey>,
    pub(crate) zsa: Option<ZsaKey>,
    pub(crate) vertex_buffers: Vec<Option<VertexBuffer>>,
    pub(crate) constant_buffers: [ConstantBufferState; 2],
    pub(crate) sampler_descriptors: [Vec<SamplerDescriptor>; 2],
    pub(crate) sampler_views: [Vec<Option<Arc<SamplerView>>>; 2],
    pub(crate) stencil_ref: [u8; 2],
    pub(crate) sample_mask: u32,
    pub(crate) min_samples: u32,
    pub(crate) viewport: ViewportState,
    pub(crate) scissor: ScissorState,
    pub(crate) framebuffer: FramebufferState,
    pub(crate) streamout: StreamOutState,

    // Last draw
    pub(crate) vertex_count: u32,
    pub(crate) instance_count: u32,
    pub(crate) active_prim: PrimitiveTopology,

    // Statistics
    pub(crate) active_queries: bool,
    pub(crate) occlusion_query: Option<QueryKey>,
    pub(crate) prims_generated: u64,
    pub(crate) tf_prims_generated: u64,

    // Batches
    pub(crate) batches: FxHashMap<FramebufferKey, Batch>,
    pub(crate) batch: Option<FramebufferKey>,
}

impl Context {
    /// Create a context for `gpu`
    ///
    /// Restart and topology fallbacks default to the CPU implementations in
    /// [`crate::draw`].
    pub fn new(
        gpu: GpuInfo,
        config: ContextConfig,
        allocator: Arc<dyn BoAllocator>,
        compiler: Arc<dyn ShaderCompiler>,
        submitter: Arc<dyn Submitter>,
    ) -> Self {
        let draw_modes = config.draw_modes.unwrap_or_else(|| DrawModes::for_quirks(gpu.quirks));

        pan_info!("pan::Context", "Context for GPU {:#x} (draw modes {:?})", gpu.gpu_id, draw_modes);

        Self {
            gpu,
            config,
            allocator,
            compiler,
            submitter,
            restart_fallback: Arc::new(RestartSplitter),
            primitive_fallback: Arc::new(PrimitiveConverter),
            draw_modes,
            shaders: SlotMap::with_key(),
            vertex_states: SlotMap::with_key(),
            rasterizers: SlotMap::with_key(),
            zsa_states: SlotMap::with_key(),
            samplers: SlotMap::with_key(),
            queries: SlotMap::with_key(),
            bound_shaders: [None; 2],
            vertex: None,
            rasterizer: None,
            zsa: None,
            vertex_buffers: vec![None; MAX_VERTEX_BUFFERS],
            constant_buffers: Default::default(),
            sampler_descriptors: Default::default(),
            sampler_views: Default::default(),
            stencil_ref: [0; 2],
            // Everything on by default
            sample_mask: !0,
            min_samples: 1,
            viewport: ViewportState::default(),
            scissor: ScissorState::default(),
            framebuffer: FramebufferState::default(),
            streamout: StreamOutState::default(),
            vertex_count: 0,
            instance_count: 1,
            active_prim: PrimitiveTopology::Points,
            active_queries: true,
            occlusion_query: None,
            prims_generated: 0,
            tf_prims_generated: 0,
            batches: FxHashMap::default(),
            batch: None,
        }
    }

    /// Replace the restart and topology fallbacks
    pub fn with_fallbacks(
        mut self,
        restart_fallback: Arc<dyn RestartFallback>,
        primitive_fallback: Arc<dyn PrimitiveFallback>,
    ) -> Self {
        self.restart_fallback = restart_fallback;
        self.primitive_fallback = primitive_fallback;
        self
    }

    pub fn gpu(&self) -> GpuInfo {
        self.gpu
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn draw_modes(&self) -> DrawModes {
        self.draw_modes
    }

    // ===== Shader programs =====

    /// Create a shader program
    ///
    /// Under `DebugFlags::PRECOMPILE`, NIR programs are compiled once right
    /// away for the default state.
    pub fn create_shader_state(
        &mut self,
        ir: ShaderIr,
        stage: ShaderStage,
        stream_output: StreamOutputInfo,
    ) -> Result<ShaderKey> {
        let program = ShaderProgram::new(ir, stage, stream_output);

        if self.config.debug.contains(DebugFlags::PRECOMPILE) && matches!(program.ir(), ShaderIr::Nir(_)) {
            program.precompile(self.compiler.as_ref())?;
        }

        Ok(self.shaders.insert(program))
    }

    /// Bind a program (or unbind with `None`) and select its variant for the
    /// current state
    pub fn bind_shader_state(&mut self, stage: ShaderStage, shader: Option<ShaderKey>) -> Result<()> {
        self.bound_shaders[stage.index()] = shader;

        let Some(key) = shader else {
            return Ok(());
        };

        let rasterizer = self.rasterizer.map(|k| &self.rasterizers[k]);
        let state = VariantState { framebuffer: &self.framebuffer, rasterizer, quirks: self.gpu.quirks };

        let program = &mut self.shaders[key];
        assert_eq!(program.stage(), stage, "program bound to the wrong stage");

        program.select_variant(&state, self.compiler.as_ref(), self.allocator.as_ref(), self.config.max_shader_variants)?;
        Ok(())
    }

    /// Destroy a program; every variant's binary is released with it
    pub fn delete_shader_state(&mut self, shader: ShaderKey) {
        for bound in self.bound_shaders.iter_mut() {
            if *bound == Some(shader) {
                *bound = None;
            }
        }
        self.shaders.remove(shader);
    }

    pub fn shader(&self, shader: ShaderKey) -> &ShaderProgram {
        &self.shaders[shader]
    }

    pub fn bound_shader(&self, stage: ShaderStage) -> Option<ShaderKey> {
        self.bound_shaders[stage.index()]
    }

    /// Re-run variant selection for the bound fragment program
    fn rebind_fragment_shader(&mut self) -> Result<()> {
        let fs = self.bound_shaders[ShaderStage::Fragment.index()];
        self.bind_shader_state(ShaderStage::Fragment, fs)
    }

    fn active_fragment_variant(&self) -> Option<&crate::shader::ShaderVariant> {
        self.bound_shaders[ShaderStage::Fragment.index()].and_then(|k| self.shaders[k].active())
    }

    // ===== Rasterizer =====

    /// # Panics
    ///
    /// Panics if `offset_clamp` is not zero.
    pub fn create_rasterizer_state(&mut self, state: &RasterizerState) -> RasterizerKey {
        assert!(state.offset_clamp == 0.0, "polygon offset clamp is not supported");
        self.rasterizers.insert(*state)
    }

    /// Bind a rasterizer state
    ///
    /// Point sprites are compiled into the fragment shader, so the fragment
    /// program is re-bound when sprites are on now or were for its variant.
    pub fn bind_rasterizer_state(&mut self, rasterizer: Option<RasterizerKey>) -> Result<()> {
        self.rasterizer = rasterizer;

        let Some(key) = rasterizer else {
            return Ok(());
        };

        let sprites = self.rasterizers[key].sprite_coord_enable != 0;
        let variant_sprites = self.active_fragment_variant().is_some_and(|v| v.key.point_sprite_mask != 0);

        if sprites || variant_sprites {
            self.rebind_fragment_shader()?;
        }
        Ok(())
    }

    pub fn delete_rasterizer_state(&mut self, rasterizer: RasterizerKey) {
        if self.rasterizer == Some(rasterizer) {
            self.rasterizer = None;
        }
        self.rasterizers.remove(rasterizer);
    }

    // ===== Vertex input =====

    pub fn create_vertex_elements_state(&mut self, elements: &[VertexElement]) -> VertexStateKey {
        self.vertex_states.insert(VertexElementState::new(elements, self.gpu.quirks))
    }

    pub fn bind_vertex_elements_state(&mut self, state: Option<VertexStateKey>) {
        self.vertex = state;
    }

    pub fn delete_vertex_elements_state(&mut self, state: VertexStateKey) {
        if self.vertex == Some(state) {
            self.vertex = None;
        }
        self.vertex_states.remove(state);
    }

    pub fn vertex_elements_state(&self, state: VertexStateKey) -> &VertexElementState {
        &self.vertex_states[state]
    }

    /// Bind `buffers` from `start_slot` on; `None` entries unbind
    pub fn set_vertex_buffers(&mut self, start_slot: usize, buffers: &[Option<VertexBuffer>]) {
        assert!(start_slot + buffers.len() <= MAX_VERTEX_BUFFERS, "vertex buffer slots out of range");

        for (slot, buffer) in self.vertex_buffers[start_slot..].iter_mut().zip(buffers) {
            *slot = buffer.clone();
        }
    }

    // ===== Shader resources =====

    pub fn set_constant_buffer(&mut self, stage: ShaderStage, index: usize, buffer: Option<ConstantBuffer>) {
        self.constant_buffers[stage.index()].set(index, buffer);
    }

    pub fn constant_buffers(&self, stage: ShaderStage) -> &ConstantBufferState {
        &self.constant_buffers[stage.index()]
    }

    pub fn create_sampler_state(&mut self, state: &SamplerState) -> SamplerKey {
        self.samplers.insert(SamplerObject::new(state, self.gpu.quirks))
    }

    /// Bind samplers to a stage; replaces every previous binding of the stage
    pub fn bind_sampler_states(&mut self, stage: ShaderStage, samplers: &[SamplerKey]) {
        self.sampler_descriptors[stage.index()] = samplers.iter().map(|&k| self.samplers[k].hw).collect();
    }

    pub fn delete_sampler_state(&mut self, sampler: SamplerKey) {
        self.samplers.remove(sampler);
    }

    /// Create a view of `texture` with its texture descriptor uploaded
    pub fn create_sampler_view(&self, texture: Arc<dyn Bo>, desc: SamplerViewDesc) -> Result<Arc<SamplerView>> {
        Ok(Arc::new(SamplerView::new(self.allocator.as_ref(), texture, desc)?))
    }

    /// Bind views to a stage; trailing empty slots are dropped
    pub fn set_sampler_views(&mut self, stage: ShaderStage, views: &[Option<Arc<SamplerView>>]) {
        let count = views.iter().rposition(|v| v.is_some()).map_or(0, |i| i + 1);
        self.sampler_views[stage.index()] = views[..count].to_vec();
    }

    pub fn sampler_view_count(&self, stage: ShaderStage) -> usize {
        self.sampler_views[stage.index()].len()
    }

    // ===== Depth / stencil =====

    /// # Panics
    ///
    /// Panics if alpha test or depth bounds test is enabled.
    pub fn create_depth_stencil_state(&mut self, state: &DepthStencilAlphaState) -> ZsaKey {
        self.zsa_states.insert(ZsaState::new(state))
    }

    pub fn bind_depth_stencil_state(&mut self, state: Option<ZsaKey>) {
        self.zsa = state;
    }

    pub fn delete_depth_stencil_state(&mut self, state: ZsaKey) {
        if self.zsa == Some(state) {
            self.zsa = None;
        }
        self.zsa_states.remove(state);
    }

    pub fn set_stencil_ref(&mut self, stencil_ref: [u8; 2]) {
        self.stencil_ref = stencil_ref;
    }

    // ===== Multisampling =====

    pub fn set_sample_mask(&mut self, sample_mask: u32) {
        self.sample_mask = sample_mask;
    }

    pub fn sample_mask(&self) -> u32 {
        self.sample_mask
    }

    pub fn set_min_samples(&mut self, min_samples: u32) {
        self.min_samples = min_samples;
    }

    pub fn min_samples(&self) -> u32 {
        self.min_samples
    }

    // ===== Viewport / scissor =====

    /// # Panics
    ///
    /// Panics unless exactly one viewport is given.
    pub fn set_viewport_states(&mut self, viewports: &[ViewportState]) {
        assert_eq!(viewports.len(), 1, "exactly one viewport is supported");
        self.viewport = viewports[0];
    }

    /// # Panics
    ///
    /// Panics unless exactly one scissor is given.
    pub fn set_scissor_states(&mut self, scissors: &[ScissorState]) {
        assert_eq!(scissors.len(), 1, "exactly one scissor is supported");
        self.scissor = scissors[0];
    }

    // ===== Framebuffer =====

    /// Bind new render targets
    ///
    /// Drops the current batch and re-selects the fragment variant when the
    /// active one reads render targets back.
    pub fn set_framebuffer_state(&mut self, framebuffer: FramebufferState) -> Result<()> {
        self.framebuffer = framebuffer;
        self.batch = None;
        self.invalidate_frame();

        if self.active_fragment_variant().is_some_and(|v| v.outputs_read() != 0) {
            self.rebind_fragment_shader()?;
        }
        Ok(())
    }

    pub fn framebuffer(&self) -> &FramebufferState {
        &self.framebuffer
    }

    fn invalidate_frame(&mut self) {
        self.active_queries = true;
    }

    // ===== Stream output =====

    pub fn create_stream_output_target(&self, bo: Arc<dyn Bo>, buffer_offset: u32, buffer_size: u32) -> Arc<StreamOutputTarget> {
        StreamOutputTarget::new(bo, buffer_offset, buffer_size)
    }

    /// Bind capture targets; an offset of `None` resumes where the target left off
    pub fn set_stream_output_targets(&mut self, targets: &[Arc<StreamOutputTarget>], offsets: &[Option<u32>]) {
        self.streamout.set_targets(targets, offsets);
    }

    /// Captured vertex offset of each target slot
    pub fn stream_output_offsets(&self) -> [u32; 4] {
        self.streamout.offsets
    }

    // ===== Queries =====

    pub fn set_active_query_state(&mut self, enable: bool) {
        self.active_queries = enable;
    }

    // ===== Draw info =====

    /// The vertex shader feeds per-vertex point sizes to the tiler
    pub fn writes_point_size(&self) -> bool {
        let vs = self.bound_shaders[ShaderStage::Vertex.index()].and_then(|k| self.shaders[k].active());
        vs.is_some_and(|v| v.writes_point_size()) && self.active_prim == PrimitiveTopology::Points
    }

    /// Vertex count of the last draw, including the index bias range
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    pub fn active_prim(&self) -> PrimitiveTopology {
        self.active_prim
    }

    // ===== Batches =====

    /// The batch draws currently go to, if one was created since the last
    /// framebuffer change
    pub fn current_batch(&self) -> Option<&Batch> {
        self.batch.as_ref().and_then(|key| self.batches.get(key))
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Remove the batch for the bound framebuffer from the map, creating it
    /// if needed; pair with `put_batch`
    pub(crate) fn take_batch(&mut self) -> Batch {
        let key = self.framebuffer.key();
        self.batch = Some(key.clone());

        self.batches.remove(&key).unwrap_or_else(|| {
            pan_debug!("pan::Batch", "New batch for {}x{}", key.width, key.height);
            Batch::new(key, self.config.transient_slab_size)
        })
    }

    pub(crate) fn put_batch(&mut self, batch: Batch) {
        self.batches.insert(batch.key().clone(), batch);
    }

    fn submit_batch(&self, batch: &Batch, fence: Option<&Arc<dyn Fence>>) -> Result<()> {
        if self.config.debug.contains(DebugFlags::TRACE) {
            pan_info!(
                "pan::Batch",
                "Submit {}x{}: {} draws, {} jobs, {} BOs, stack {} bytes",
                batch.key().width,
                batch.key().height,
                batch.draw_count(),
                batch.jobs().len(),
                batch.bos().len(),
                batch.stack_size()
            );
        }

        if let Err(e) = self.submitter.submit(batch, fence) {
            pan_error!("pan::Batch", "Submission failed: {}", e);
            return Err(e);
        }
        Ok(())
    }

    /// Submit every batch with pending work
    ///
    /// Returns a fence signalled when the last submission retires if
    /// `want_fence` is set. Under `DebugFlags::SYNC` the submission is
    /// waited for before returning.
    pub fn flush(&mut self, want_fence: bool) -> Result<Option<Arc<dyn Fence>>> {
        let sync = self.config.debug.contains(DebugFlags::SYNC);
        let fence = if want_fence || sync { Some(self.submitter.create_fence()?) } else { None };

        // Batches leave the map only once submitted
        let keys: Vec<FramebufferKey> = self.batches.keys().cloned().collect();
        let mut submitted = 0;
        for key in keys {
            if let Some(batch) = self.batches.get(&key) {
                if batch.has_work() {
                    self.submit_batch(batch, fence.as_ref())?;
                    submitted += 1;
                }
            }
            self.retire_batch(&key);
        }
        self.batch = None;

        pan_debug!("pan::Context", "Flushed {} batches", submitted);

        if sync {
            if let Some(fence) = &fence {
                fence.wait(None);
            }
        }

        self.invalidate_frame();
        Ok(if want_fence { fence } else { None })
    }

    /// Submit the batches referencing the BO at `gpu`
    pub fn flush_batches_accessing_bo(&mut self, gpu: u64) -> Result<()> {
        let keys: Vec<FramebufferKey> = self
            .batches
            .iter()
            .filter(|(_, batch)| batch.has_bo(gpu))
            .map(|(key, _)| key.clone())
            .collect();

        for key in keys {
            if let Some(batch) = self.batches.get(&key) {
                if batch.has_work() {
                    self.submit_batch(batch, None)?;
                }
            }
            self.retire_batch(&key);
        }
        Ok(())
    }

    fn retire_batch(&mut self, key: &FramebufferKey) {
        if self.batch.as_ref() == Some(key) {
            self.batch = None;
        }
        self.batches.remove(key);
    }

    /// Make sampling see everything rendered so far
    pub fn texture_barrier(&mut self) -> Result<()> {
        self.flush(false).map(|_| ())
    }

    /// Clear the bound framebuffer
    ///
    /// A batch that already has draws is submitted first, so the clear
    /// starts a fresh batch.
    pub fn clear(&mut self, buffers: ClearBuffers, color: [f32; 4], depth: f64, stencil: u32) -> Result<()> {
        let key = self.framebuffer.key();

        if let Some(existing) = self.batches.get(&key) {
            if existing.has_draws() {
                if let Some(batch) = self.batches.remove(&key) {
                    self.submit_batch(&batch, None)?;
                }
            }
        }

        let mut batch = self.take_batch();
        for bo in self.framebuffer.bos() {
            batch.add_bo(bo);
        }
        batch.clear(buffers, color, depth, stencil);
        self.put_batch(batch);
        Ok(())
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
