/// Shader programs and their per-state variants
///
/// A program is specialized on the parts of the pipeline state the compiled
/// code depends on: the formats of render targets the fragment shader reads
/// back, and which varyings are replaced by point-sprite coordinates.
/// Variants are created on the first bind under a state nothing matches and
/// compiled once.

use std::sync::Arc;
use crate::device::{Bo, BoAllocator, BoDesc, BoFlags, CompiledShader, Quirks, ShaderCompiler, ShaderIr, ShaderStage};
use crate::error::Result;
use crate::format::PipeFormat;
use crate::state::{FramebufferState, RasterizerState, SpriteCoordMode, MAX_COLOR_BUFS};
use crate::{pan_debug, pan_error};
use super::stream_output::{update_so_info, StreamOutputInfo};

/// State a variant was compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VariantKey {
    /// Format per render target, `None` when the shader does not depend on it
    pub rt_formats: [Option<PipeFormat>; MAX_COLOR_BUFS],
    pub point_sprite_mask: u16,
    pub point_sprite_upper_left: bool,
}

/// Pipeline state variant selection looks at
#[derive(Debug, Clone, Copy)]
pub struct VariantState<'a> {
    pub framebuffer: &'a FramebufferState,
    pub rasterizer: Option<&'a RasterizerState>,
    pub quirks: Quirks,
}

impl VariantState<'_> {
    /// Point sprites are only keyed on Midgard
    fn sprite_rasterizer(&self) -> Option<&RasterizerState> {
        if self.quirks.contains(Quirks::IS_BIFROST) {
            None
        } else {
            self.rasterizer
        }
    }
}

/// One compiled specialization
#[derive(Debug)]
pub struct ShaderVariant {
    pub key: VariantKey,
    compiled: bool,
    bo: Option<Arc<dyn Bo>>,
    info: CompiledShader,
    stream_output: StreamOutputInfo,
    so_mask: u64,
}

impl ShaderVariant {
    fn new(key: VariantKey) -> Self {
        Self {
            key,
            compiled: false,
            bo: None,
            info: CompiledShader::default(),
            stream_output: StreamOutputInfo::default(),
            so_mask: 0,
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// Executable BO holding the binary, owned by this variant
    pub fn bo(&self) -> Option<&Arc<dyn Bo>> {
        self.bo.as_ref()
    }

    /// Compiler metadata (the binary itself lives in `bo`)
    pub fn info(&self) -> &CompiledShader {
        &self.info
    }

    pub fn outputs_read(&self) -> u8 {
        self.info.outputs_read
    }

    pub fn writes_point_size(&self) -> bool {
        self.info.writes_point_size
    }

    /// Capture records rewritten to real varying slots
    pub fn stream_output(&self) -> &StreamOutputInfo {
        &self.stream_output
    }

    pub fn so_mask(&self) -> u64 {
        self.so_mask
    }

    /// Whether this variant is valid under `state`
    pub fn matches(&self, stage: ShaderStage, state: &VariantState) -> bool {
        if stage != ShaderStage::Fragment {
            return true;
        }

        let outputs_read = self.info.outputs_read;

        for rt in (0..MAX_COLOR_BUFS).filter(|rt| outputs_read & (1 << rt) != 0) {
            if self.key.rt_formats[rt] != state.framebuffer.rt_format_for_shader(rt, state.quirks) {
                return false;
            }
        }

        if let Some(rast) = state.sprite_rasterizer() {
            if rast.sprite_coord_enable | self.key.point_sprite_mask != 0 {
                if rast.sprite_coord_enable != self.key.point_sprite_mask {
                    return false;
                }
                let upper_left = rast.sprite_coord_mode == SpriteCoordMode::UpperLeft;
                if self.key.point_sprite_upper_left != upper_left {
                    return false;
                }
            }
        }

        true
    }

    fn compile(
        &mut self,
        ir: &ShaderIr,
        stage: ShaderStage,
        program_so: &StreamOutputInfo,
        compiler: &dyn ShaderCompiler,
        allocator: &dyn BoAllocator,
    ) -> Result<()> {
        let mut info = compiler.compile(ir, stage, &self.key).map_err(|e| {
            pan_error!("pan::Shader", "Compiling {:?} variant failed: {}", stage, e);
            e
        })?;

        let binary = std::mem::take(&mut info.binary);
        let bo = allocator.create_bo(BoDesc {
            size: binary.len().max(1) as u64,
            flags: BoFlags::EXECUTE,
            label: "shader binary",
        })?;
        bo.write(0, &binary)?;

        self.stream_output = program_so.clone();
        self.so_mask = update_so_info(&mut self.stream_output, info.outputs_written);
        self.info = info;
        self.bo = Some(bo);
        self.compiled = true;

        pan_debug!("pan::Shader", "Compiled {:?} variant ({} bytes)", stage, binary.len());
        Ok(())
    }
}

/// One API-level shader and its variants, in creation order
#[derive(Debug)]
pub struct ShaderProgram {
    ir: ShaderIr,
    stage: ShaderStage,
    stream_output: StreamOutputInfo,
    variants: Vec<ShaderVariant>,
    variant_space: usize,
    active_variant: Option<usize>,
}

impl ShaderProgram {
    pub fn new(ir: ShaderIr, stage: ShaderStage, stream_output: StreamOutputInfo) -> Self {
        Self {
            ir,
            stage,
            stream_output,
            variants: Vec::new(),
            variant_space: 0,
            active_variant: None,
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn ir(&self) -> &ShaderIr {
        &self.ir
    }

    pub fn variants(&self) -> &[ShaderVariant] {
        &self.variants
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Reserved variant slots; doubles from 1 as variants are added
    pub fn variant_space(&self) -> usize {
        self.variant_space
    }

    pub fn active_variant(&self) -> Option<usize> {
        self.active_variant
    }

    pub fn active(&self) -> Option<&ShaderVariant> {
        self.active_variant.map(|i| &self.variants[i])
    }

    /// Find or create the variant for `state`, compile it if needed and make it active
    ///
    /// # Panics
    ///
    /// Panics when the program would grow past `max_variants` variants.
    pub fn select_variant(
        &mut self,
        state: &VariantState,
        compiler: &dyn ShaderCompiler,
        allocator: &dyn BoAllocator,
        max_variants: usize,
    ) -> Result<usize> {
        let stage = self.stage;

        let index = match self.variants.iter().position(|v| v.matches(stage, state)) {
            Some(index) => index,
            None => self.push_variant(state, max_variants),
        };

        self.active_variant = Some(index);

        let variant = &mut self.variants[index];
        assert!(variant.matches(stage, state), "selected shader variant does not match the current state");

        if !variant.compiled {
            variant.compile(&self.ir, stage, &self.stream_output, compiler, allocator)?;
        }

        Ok(index)
    }

    fn push_variant(&mut self, state: &VariantState, max_variants: usize) -> usize {
        assert!(
            self.variants.len() < max_variants,
            "runaway shader variants: more than {} for one program",
            max_variants
        );

        if self.variants.len() == self.variant_space {
            self.variant_space = (self.variant_space * 2).max(1);
            self.variants.reserve_exact(self.variant_space - self.variants.len());
        }

        let mut key = VariantKey::default();

        if self.stage == ShaderStage::Fragment {
            let fb = state.framebuffer;
            for rt in 0..fb.cbufs.len().min(MAX_COLOR_BUFS) {
                key.rt_formats[rt] = fb.rt_format_for_shader(rt, state.quirks);
            }

            if let Some(rast) = state.sprite_rasterizer() {
                key.point_sprite_mask = rast.sprite_coord_enable;
                key.point_sprite_upper_left = rast.sprite_coord_mode == SpriteCoordMode::UpperLeft;
            }
        }

        pan_debug!(
            "pan::Shader",
            "New {:?} variant #{} (sprites {:#x})",
            self.stage,
            self.variants.len(),
            key.point_sprite_mask
        );

        self.variants.push(ShaderVariant::new(key));
        self.variants.len() - 1
    }

    /// Compile once for the default state and throw the result away
    pub fn precompile(&self, compiler: &dyn ShaderCompiler) -> Result<()> {
        compiler.compile(&self.ir, self.stage, &VariantKey::default())?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "variant_tests.rs"]
mod tests;
