//! Unit tests for emit.rs

use super::*;
use crate::device::mock_device::{MockBoAllocator, MockCompiler};
use crate::device::{BoDesc, BoFlags, CompiledShader, Quirks, ShaderIr};
use crate::format::PipeFormat;
use crate::shader::{ShaderProgram, StreamOutput, StreamOutputInfo, VariantState};
use crate::state::{
    ConstantBuffer, DepthStencilAlphaState, DepthState, MaliStencilOp, StencilOp, StencilState, StreamOutputTarget, VertexElement,
};
use glam::Vec3;

// ============================================================================
// Fixture
// ============================================================================

struct Fixture {
    allocator: MockBoAllocator,
    vs: ShaderProgram,
    fs: ShaderProgram,
    framebuffer: FramebufferState,
    rasterizer: RasterizerState,
    constant_buffers: [ConstantBufferState; 2],
    samplers: [Vec<SamplerDescriptor>; 2],
    sampler_views: [Vec<Option<Arc<SamplerView>>>; 2],
    viewport: ViewportState,
    scissor: ScissorState,
    streamout: StreamOutState,
    vertex_buffers: Vec<Option<VertexBuffer>>,
    vertex_state: Option<VertexElementState>,
    zsa: Option<ZsaState>,
}

impl Fixture {
    fn new(vs_result: CompiledShader) -> Self {
        Self::with_stream_output(vs_result, StreamOutputInfo::default())
    }

    fn with_stream_output(vs_result: CompiledShader, so: StreamOutputInfo) -> Self {
        let allocator = MockBoAllocator::new();
        let framebuffer = FramebufferState::new(64, 32);
        let mut vs = ShaderProgram::new(ShaderIr::Nir(Arc::from(&b"vs"[..])), ShaderStage::Vertex, so);
        let mut fs = ShaderProgram::new(ShaderIr::Nir(Arc::from(&b"fs"[..])), ShaderStage::Fragment, StreamOutputInfo::default());

        let state = VariantState { framebuffer: &framebuffer, rasterizer: None, quirks: Quirks::HAS_SWIZZLES };
        vs.select_variant(&state, &MockCompiler::with_result(vs_result), &allocator, 16).unwrap();
        fs.select_variant(&state, &MockCompiler::new(), &allocator, 16).unwrap();

        Self {
            allocator,
            vs,
            fs,
            framebuffer,
            rasterizer: RasterizerState::default(),
            constant_buffers: Default::default(),
            samplers: Default::default(),
            sampler_views: Default::default(),
            viewport: ViewportState::for_size(64.0, 32.0),
            scissor: ScissorState::default(),
            streamout: StreamOutState::default(),
            vertex_buffers: Vec::new(),
            vertex_state: None,
            zsa: None,
        }
    }

    fn state(&self, writes_point_size: bool) -> DrawState<'_> {
        DrawState {
            allocator: &self.allocator,
            vertex_variant: self.vs.active().unwrap(),
            fragment_variant: self.fs.active().unwrap(),
            vertex_state: self.vertex_state.as_ref(),
            vertex_buffers: &self.vertex_buffers,
            rasterizer: &self.rasterizer,
            zsa: self.zsa.as_ref(),
            stencil_ref: [3, 4],
            sample_mask: !0,
            constant_buffers: &self.constant_buffers,
            samplers: &self.samplers,
            sampler_views: &self.sampler_views,
            viewport: &self.viewport,
            scissor: &self.scissor,
            framebuffer: &self.framebuffer,
            streamout: &self.streamout,
            padded_count: 4,
            writes_point_size,
        }
    }

    fn bo(&self, size: u64) -> Arc<dyn Bo> {
        self.allocator
            .create_bo(BoDesc { size, flags: BoFlags::empty(), label: "test" })
            .unwrap()
    }

    /// Read back a `Pod` record the emitter uploaded
    fn read<T: bytemuck::Pod + Default>(&self, gpu: u64) -> T {
        let bo = self.allocator.find(gpu).unwrap();
        let mut value = T::default();
        bo.read(gpu - bo.gpu, bytemuck::bytes_of_mut(&mut value)).unwrap();
        value
    }
}

fn batch() -> Batch {
    Batch::new(Default::default(), 64 * 1024)
}

fn simple_vs() -> CompiledShader {
    CompiledShader { binary: vec![1; 16], varying_count: 2, ..Default::default() }
}

// ============================================================================
// Vertex data
// ============================================================================

#[test]
fn test_vertex_buffer_base_is_aligned_and_referenced() {
    let mut fx = Fixture::new(simple_vs());
    let bo = fx.bo(4096);
    fx.vertex_buffers = vec![Some(VertexBuffer { bo: bo.clone(), buffer_offset: 70, stride: 12 })];
    fx.vertex_state = Some(VertexElementState::new(
        &[VertexElement { src_offset: 0, instance_divisor: 0, vertex_buffer_index: 0, src_format: PipeFormat::R32G32B32_FLOAT }],
        Quirks::HAS_SWIZZLES,
    ));

    let mut b = batch();
    let mut postfix = VertexTilerPostfix::default();
    emit_vertex_data(&mut b, &fx.state(false), &mut postfix).unwrap();

    let record: AttributeBufferDescriptor = fx.read(postfix.attributes);
    assert_eq!(record.elements & !63, bo.gpu_address() + 64);
    assert_eq!(record.elements & 63, ATTR_MODE_LINEAR);
    assert_eq!(record.stride, 12);
    assert!(b.has_bo(bo.gpu_address()));
    assert_eq!(b.emitted(), &[DescriptorKind::VertexBuffers]);
}

#[test]
fn test_elements_sharing_a_buffer_get_one_record_each() {
    let mut fx = Fixture::new(simple_vs());
    let bo = fx.bo(4096);
    fx.vertex_buffers = vec![None, Some(VertexBuffer { bo: bo.clone(), buffer_offset: 0, stride: 24 })];
    fx.vertex_state = Some(VertexElementState::new(
        &[
            VertexElement { src_offset: 0, instance_divisor: 0, vertex_buffer_index: 1, src_format: PipeFormat::R32G32B32_FLOAT },
            VertexElement { src_offset: 12, instance_divisor: 0, vertex_buffer_index: 1, src_format: PipeFormat::R32G32B32_FLOAT },
        ],
        Quirks::HAS_SWIZZLES,
    ));

    let mut b = batch();
    let mut postfix = VertexTilerPostfix::default();
    emit_vertex_data(&mut b, &fx.state(false), &mut postfix).unwrap();
    emit_vertex_attr_meta(&mut b, &fx.state(false), &mut postfix).unwrap();

    let record_size = std::mem::size_of::<AttributeBufferDescriptor>() as u64;
    for i in 0..2 {
        let record: AttributeBufferDescriptor = fx.read(postfix.attributes + i * record_size);
        assert_eq!(record.elements & !63, bo.gpu_address());
        assert_eq!(record.stride, 24);
    }
    let unused: AttributeBufferDescriptor = fx.read(postfix.attributes + 2 * record_size);
    assert_eq!(unused.elements, 0);

    let meta_size = std::mem::size_of::<AttributeMetaDescriptor>() as u64;
    let second: AttributeMetaDescriptor = fx.read(postfix.attribute_meta + meta_size);
    assert_eq!(second.index, 1);
}

#[test]
fn test_instanced_element_uses_divisor() {
    let mut fx = Fixture::new(simple_vs());
    let bo = fx.bo(4096);
    fx.vertex_buffers = vec![Some(VertexBuffer { bo, buffer_offset: 0, stride: 16 })];
    fx.vertex_state = Some(VertexElementState::new(
        &[VertexElement { src_offset: 0, instance_divisor: 2, vertex_buffer_index: 0, src_format: PipeFormat::R32G32B32A32_FLOAT }],
        Quirks::HAS_SWIZZLES,
    ));

    let mut b = batch();
    let mut postfix = VertexTilerPostfix::default();
    emit_vertex_data(&mut b, &fx.state(false), &mut postfix).unwrap();

    let record: AttributeBufferDescriptor = fx.read(postfix.attributes);
    assert_eq!(record.elements & 63, ATTR_MODE_INSTANCED);
    assert_eq!(record.divisor, 2);
}

// ============================================================================
// Varyings
// ============================================================================

#[test]
fn test_varyings_shared_by_both_jobs() {
    let fx = Fixture::new(simple_vs());
    let mut b = batch();
    let (mut vp, mut tp, mut ps) = (VertexTilerPostfix::default(), VertexTilerPostfix::default(), PrimitiveSize::default());

    emit_varying_descriptor(&mut b, &fx.state(false), 8, &mut vp, &mut tp, &mut ps).unwrap();

    assert_ne!(vp.varyings, 0);
    assert_eq!(vp.varyings, tp.varyings);
    assert_eq!(vp.varying_meta, tp.varying_meta);
    assert_eq!(ps.pointer, 0);

    // Two general slots then position
    let general: AttributeBufferDescriptor = fx.read(vp.varyings);
    assert_eq!(general.stride, 32);
    assert_eq!(general.size, 32 * 8);
}

#[test]
fn test_point_size_buffer_feeds_primitive_size() {
    let fx = Fixture::new(simple_vs());
    let mut b = batch();
    let (mut vp, mut tp, mut ps) = (VertexTilerPostfix::default(), VertexTilerPostfix::default(), PrimitiveSize::default());

    emit_varying_descriptor(&mut b, &fx.state(true), 8, &mut vp, &mut tp, &mut ps).unwrap();

    assert_ne!(ps.pointer, 0);

    // General, position, then point size: one fp16 per vertex
    let record_size = std::mem::size_of::<AttributeBufferDescriptor>() as u64;
    let buffer: AttributeBufferDescriptor = fx.read(vp.varyings + 2 * record_size);
    assert_eq!(buffer.elements & !63, ps.pointer);
    assert_eq!(buffer.stride, 2);
    assert_eq!(buffer.size, 2 * 8);

    let meta_size = std::mem::size_of::<AttributeMetaDescriptor>() as u64;
    let meta: AttributeMetaDescriptor = fx.read(vp.varying_meta + 3 * meta_size);
    assert_eq!(meta.index, 2);
    assert_eq!(meta.format, MaliFormat::R16F as u32);
}

#[test]
fn test_varying_sizes_past_32_bits_are_out_of_memory() {
    let fx = Fixture::new(simple_vs());
    let mut b = batch();
    let (mut vp, mut tp, mut ps) = (VertexTilerPostfix::default(), VertexTilerPostfix::default(), PrimitiveSize::default());

    let result = emit_varying_descriptor(&mut b, &fx.state(false), 1 << 32, &mut vp, &mut tp, &mut ps);

    assert!(matches!(result, Err(Error::OutOfMemory)));
    assert_eq!(vp.varyings, 0);
}

#[test]
fn test_stream_output_targets_become_varying_buffers() {
    let so = StreamOutputInfo {
        outputs: vec![StreamOutput { register_index: 0, num_components: 4, output_buffer: 0, ..Default::default() }],
        stride: [4, 0, 0, 0],
    };
    let mut fx = Fixture::with_stream_output(CompiledShader { binary: vec![0; 4], outputs_written: 1, ..Default::default() }, so);
    let target = StreamOutputTarget::new(fx.bo(4096), 0, 4096);
    fx.streamout.set_targets(&[target.clone()], &[Some(5)]);

    let mut b = batch();
    let (mut vp, mut tp, mut ps) = (VertexTilerPostfix::default(), VertexTilerPostfix::default(), PrimitiveSize::default());
    emit_varying_descriptor(&mut b, &fx.state(false), 8, &mut vp, &mut tp, &mut ps).unwrap();

    // No general varyings: position is record 0, the target record 1
    let record: AttributeBufferDescriptor = fx.read(vp.varyings + std::mem::size_of::<AttributeBufferDescriptor>() as u64);
    assert_eq!(record.elements & !63, target.bo.gpu_address() + 64);
    assert_eq!(record.stride, 16);
    assert!(b.has_bo(target.bo.gpu_address()));

    // Position meta, then the capture addressing the target with the
    // 16 misaligned bytes (vertex 5 of 16 bytes = 80)
    let capture: AttributeMetaDescriptor = fx.read(vp.varying_meta + std::mem::size_of::<AttributeMetaDescriptor>() as u64);
    assert_eq!(capture.index, 1);
    assert_eq!(capture.src_offset, 16);
}

// ============================================================================
// Shader metadata
// ============================================================================

#[test]
fn test_fragment_meta_carries_stencil_and_depth_write() {
    let mut fx = Fixture::new(simple_vs());
    let stencil = StencilState { enabled: true, zpass_op: StencilOp::Incr, writemask: 0xF0, valuemask: 0xFF, ..Default::default() };
    fx.zsa = Some(ZsaState::new(&DepthStencilAlphaState {
        depth: DepthState { enabled: true, writemask: true, ..Default::default() },
        stencil: [stencil, StencilState::default()],
        alpha_enabled: false,
    }));

    let mut b = batch();
    let mut postfix = VertexTilerPostfix::default();
    emit_shader_meta(&mut b, &fx.state(false), ShaderStage::Fragment, &mut postfix).unwrap();

    let meta: ShaderMetaDescriptor = fx.read(postfix.shader);
    assert_ne!(meta.flags & SHADER_DEPTH_WRITE, 0);
    assert_eq!(meta.stencil_front & 0xFF, 3);
    // Saturating increment on depth pass
    assert_eq!((meta.stencil_front >> 25) & 0x7, MaliStencilOp::IncrSat as u32);
    assert_eq!(meta.stencil_mask_front, 0xF0);
    // Back stencil disabled: mask falls back to the front one
    assert_eq!(meta.stencil_mask_back, 0xF0);
    assert_eq!(meta.sample_mask, !0);

    let binary = fx.fs.active().unwrap().bo().unwrap().gpu_address();
    assert_eq!(meta.shader, binary);
    assert!(b.has_bo(binary));
}

#[test]
fn test_vertex_meta_flags_point_size() {
    let fx = Fixture::new(simple_vs());
    let mut b = batch();
    let mut postfix = VertexTilerPostfix::default();

    emit_shader_meta(&mut b, &fx.state(true), ShaderStage::Vertex, &mut postfix).unwrap();

    let meta: ShaderMetaDescriptor = fx.read(postfix.shader);
    assert_ne!(meta.flags & SHADER_WRITES_POINT_SIZE, 0);
    assert_eq!(meta.varying_count, 2);
}

// ============================================================================
// Constant buffers
// ============================================================================

#[test]
fn test_const_buf_table_spans_highest_slot() {
    let mut fx = Fixture::new(simple_vs());
    let bo = fx.bo(256);
    fx.constant_buffers[0].set(2, Some(ConstantBuffer {
        data: ConstantBufferData::Buffer { bo: bo.clone(), offset: 32 },
        size: 64,
    }));

    let mut b = batch();
    let mut postfix = VertexTilerPostfix::default();
    emit_const_buf(&mut b, &fx.state(false), ShaderStage::Vertex, &mut postfix).unwrap();

    let entries: [UniformBufferDescriptor; 3] = [
        fx.read(postfix.uniform_buffers),
        fx.read(postfix.uniform_buffers + 8),
        fx.read(postfix.uniform_buffers + 16),
    ];
    assert_eq!(entries[2], UniformBufferDescriptor::new(bo.gpu_address() + 32, 64));
    assert_eq!(postfix.uniforms, 0);
    assert!(b.has_bo(bo.gpu_address()));
}

#[test]
fn test_user_constant_buffer_uploaded() {
    let mut fx = Fixture::new(simple_vs());
    fx.constant_buffers[1].set(0, Some(ConstantBuffer {
        data: ConstantBufferData::User(Arc::from(&[1u8, 0, 0, 0, 2, 0, 0, 0][..])),
        size: 8,
    }));

    let mut b = batch();
    let mut postfix = VertexTilerPostfix::default();
    emit_const_buf(&mut b, &fx.state(false), ShaderStage::Fragment, &mut postfix).unwrap();

    let uniforms: [u32; 2] = fx.read(postfix.uniforms);
    assert_eq!(uniforms, [1, 2]);
}

// ============================================================================
// Viewport
// ============================================================================

#[test]
fn test_viewport_clamped_to_framebuffer() {
    let mut fx = Fixture::new(simple_vs());
    fx.viewport = ViewportState { scale: Vec3::new(100.0, 100.0, 0.5), translate: Vec3::new(50.0, 50.0, 0.5) };

    let mut b = batch();
    let mut postfix = VertexTilerPostfix::default();
    emit_viewport(&mut b, &fx.state(false), &mut postfix).unwrap();

    let vp: ViewportDescriptor = fx.read(postfix.viewport);
    assert_eq!(vp.viewport0, [0, 0]);
    assert_eq!(vp.viewport1, [63, 31]);
    assert_eq!((vp.clip_minz, vp.clip_maxz), (0.0, 1.0));
}

#[test]
fn test_scissor_narrows_viewport() {
    let mut fx = Fixture::new(simple_vs());
    fx.rasterizer.scissor = true;
    fx.scissor = ScissorState { minx: 8, miny: 4, maxx: 16, maxy: 12 };

    let mut b = batch();
    let mut postfix = VertexTilerPostfix::default();
    emit_viewport(&mut b, &fx.state(false), &mut postfix).unwrap();

    let vp: ViewportDescriptor = fx.read(postfix.viewport);
    assert_eq!(vp.viewport0, [8, 4]);
    assert_eq!(vp.viewport1, [15, 11]);
}

// ============================================================================
// Samplers and textures
// ============================================================================

#[test]
fn test_empty_sampler_and_texture_tables() {
    let fx = Fixture::new(simple_vs());
    let mut b = batch();
    let mut postfix = VertexTilerPostfix::default();

    emit_sampler_descriptors(&mut b, &fx.state(false), ShaderStage::Fragment, &mut postfix).unwrap();
    emit_texture_descriptors(&mut b, &fx.state(false), ShaderStage::Fragment, &mut postfix).unwrap();

    assert_eq!(postfix.sampler_descriptor, 0);
    assert_eq!(postfix.textures, 0);
    assert_eq!(
        b.emitted(),
        &[DescriptorKind::Samplers(ShaderStage::Fragment), DescriptorKind::Textures(ShaderStage::Fragment)]
    );
}
