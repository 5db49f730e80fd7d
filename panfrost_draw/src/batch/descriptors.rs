/// GPU-visible descriptor layouts
///
/// Plain `#[repr(C)]` records uploaded with `bytemuck::bytes_of`. Field
/// order and widths follow what the job manager reads; explicit padding
/// keeps every struct `Pod`.

use bytemuck::{Pod, Zeroable};

/// Attribute (and varying) buffer record
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct AttributeBufferDescriptor {
    /// 64-byte aligned base address, low bits hold the addressing mode
    pub elements: u64,
    pub stride: u32,
    pub size: u32,
    /// Instance divisor, 0 for per-vertex data
    pub divisor: u32,
    pub _pad: u32,
}

/// Addressing modes stored in the low bits of `elements`
pub const ATTR_MODE_LINEAR: u64 = 1;
pub const ATTR_MODE_INSTANCED: u64 = 2;

/// Attribute (and varying) format record
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct AttributeMetaDescriptor {
    pub index: u32,
    pub format: u32,
    pub swizzle: u32,
    pub src_offset: u32,
}

/// Per-stage shader descriptor
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct ShaderMetaDescriptor {
    pub shader: u64,
    pub attribute_count: u16,
    pub varying_count: u16,
    pub uniform_count: u16,
    pub work_count: u16,
    pub stack_size: u32,
    pub flags: u32,
    pub stencil_front: u32,
    pub stencil_back: u32,
    pub stencil_mask_front: u8,
    pub stencil_mask_back: u8,
    pub _pad: u16,
    pub sample_mask: u32,
}

/// `ShaderMetaDescriptor::flags`
pub const SHADER_WRITES_POINT_SIZE: u32 = 1 << 0;
pub const SHADER_READS_TILEBUFFER: u32 = 1 << 1;
pub const SHADER_DEPTH_WRITE: u32 = 1 << 2;

/// Sampler record
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct SamplerDescriptor {
    pub filter_mode: u32,
    pub min_lod: u16,
    pub max_lod: u16,
    pub lod_bias: i16,
    pub _pad: u16,
    pub wrap: u32,
    pub border_color: [f32; 4],
}

/// Texture record
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct TextureDescriptor {
    pub width: u16,
    pub height: u16,
    pub depth: u16,
    pub array_size: u16,
    pub format: u32,
    pub swizzle: u32,
    pub levels: u32,
    pub _pad: u32,
    pub payload: u64,
}

/// One entry of the uniform buffer table
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct UniformBufferDescriptor {
    /// Size in 16-byte units minus one in bits 0..10, address >> 2 above
    pub entry: u64,
}

impl UniformBufferDescriptor {
    pub fn new(gpu: u64, size: u32) -> Self {
        let units = size.div_ceil(16).max(1) as u64;
        Self { entry: ((units - 1) & 0x3FF) | ((gpu >> 2) << 10) }
    }
}

/// Viewport / clip record
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ViewportDescriptor {
    pub clip_minx: f32,
    pub clip_miny: f32,
    pub clip_minz: f32,
    pub clip_maxx: f32,
    pub clip_maxy: f32,
    pub clip_maxz: f32,
    /// Inclusive pixel bounds
    pub viewport0: [u16; 2],
    pub viewport1: [u16; 2],
}

/// Tiler record consumed by the tiler job
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct TilerDescriptorPacked {
    pub polygon_list_size: u32,
    pub hierarchy_mask: u16,
    pub flags: u16,
    pub polygon_list: u64,
    pub polygon_list_body: u64,
    pub heap_start: u64,
    pub heap_end: u64,
}

/// Job chain header
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct JobHeader {
    pub exception_status: u32,
    pub first_incomplete_task: u32,
    pub fault_pointer: u64,
    pub job_type: u8,
    pub job_barrier: u8,
    pub job_index: u16,
    pub job_dependency_index_1: u16,
    pub job_dependency_index_2: u16,
    pub next_job: u64,
}

/// Invocation and draw parameters shared by the vertex/tiler pair
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct VertexTilerPrefix {
    pub invocation_count: u32,
    pub size_y_shift: u8,
    pub size_z_shift: u8,
    pub workgroups_x_shift: u8,
    pub workgroups_y_shift: u8,
    pub workgroups_z_shift: u8,
    pub workgroups_x_shift_2: u8,
    pub draw_mode: u8,
    pub workgroups_x_shift_3: u8,
    /// Index count minus one
    pub index_count: u32,
    /// Index size code in bits 0..2, point-size source in bit 2
    pub draw_flags: u32,
    pub offset_bias_correction: i32,
    pub indices: u64,
}

/// `VertexTilerPrefix::draw_flags`
pub const DRAW_POINT_SIZE_ARRAY: u32 = 1 << 2;

/// Pointers to every per-draw descriptor table
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct VertexTilerPostfix {
    pub offset_start: u32,
    pub instance_shift: u16,
    pub instance_odd: u16,
    pub gl_enables: u32,
    pub sample_mask: u32,
    pub shader: u64,
    pub attributes: u64,
    pub attribute_meta: u64,
    pub varyings: u64,
    pub varying_meta: u64,
    pub uniform_buffers: u64,
    pub uniforms: u64,
    pub textures: u64,
    pub sampler_descriptor: u64,
    pub viewport: u64,
    pub occlusion_counter: u64,
}

/// `VertexTilerPostfix::gl_enables`
pub const GL_OCCLUSION_QUERY: u32 = 1 << 3;
pub const GL_FRONT_CCW_TOP: u32 = 1 << 5;
pub const GL_CULL_FACE_FRONT: u32 = 1 << 6;
pub const GL_CULL_FACE_BACK: u32 = 1 << 7;

/// Point/line size: a constant or a per-vertex array
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PrimitiveSize {
    pub constant: f32,
    pub _pad: u32,
    pub pointer: u64,
}

/// Complete vertex job
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct VertexJob {
    pub header: JobHeader,
    pub prefix: VertexTilerPrefix,
    pub postfix: VertexTilerPostfix,
}

/// Complete tiler job
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct TilerJob {
    pub header: JobHeader,
    pub prefix: VertexTilerPrefix,
    pub postfix: VertexTilerPostfix,
    pub primitive_size: PrimitiveSize,
    pub tiler: TilerDescriptorPacked,
}
