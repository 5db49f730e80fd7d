/// Shader compiler collaborator

use std::sync::Arc;
use crate::error::Result;
use crate::shader::VariantKey;

/// Programmable pipeline stage handled by the draw path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Both stages, in emission order
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Fragment];

    /// Index into per-stage binding tables
    pub fn index(self) -> usize {
        match self {
            ShaderStage::Vertex => 0,
            ShaderStage::Fragment => 1,
        }
    }
}

/// Intermediate representation handed over by the state tracker
///
/// Opaque to the draw core; only the compiler interprets the bytes.
#[derive(Debug, Clone)]
pub enum ShaderIr {
    Nir(Arc<[u8]>),
    Tgsi(Arc<[u8]>),
}

/// Everything the compiler reports back about one variant
#[derive(Debug, Clone, Default)]
pub struct CompiledShader {
    /// Machine code
    pub binary: Vec<u8>,
    /// Bitmask of varying slots written (vertex) or outputs written (fragment)
    pub outputs_written: u64,
    /// Render targets read back by the shader (framebuffer fetch), one bit per RT
    pub outputs_read: u8,
    /// Vertex shader writes gl_PointSize
    pub writes_point_size: bool,
    /// Number of vertex attributes consumed
    pub attribute_count: u32,
    /// Number of inter-stage varyings (excluding position and point size)
    pub varying_count: u32,
    /// Number of 16-byte uniform vectors pushed through UBO 0
    pub uniform_count: u32,
    /// Work registers used
    pub work_reg_count: u32,
    /// Thread-local stack, in bytes
    pub stack_size: u32,
}

/// Backend compiler
///
/// Assumed deterministic for a given (IR, stage, key) triple.
pub trait ShaderCompiler: Send + Sync {
    fn compile(&self, ir: &ShaderIr, stage: ShaderStage, key: &VariantKey) -> Result<CompiledShader>;
}
