/// Sampler states and sampler views

use std::sync::Arc;
use crate::batch::descriptors::{SamplerDescriptor, TextureDescriptor};
use crate::device::{Bo, BoAllocator, BoDesc, BoFlags, Quirks};
use crate::error::Result;
use crate::format::{translate_swizzle_4, Channel, PipeFormat};
use crate::state::depth_stencil::CompareFunc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    #[default]
    Repeat,
    ClampToEdge,
    ClampToBorder,
    MirroredRepeat,
}

impl WrapMode {
    fn to_mali(self) -> u32 {
        match self {
            WrapMode::Repeat => 0x8,
            WrapMode::ClampToEdge => 0x9,
            WrapMode::ClampToBorder => 0xB,
            WrapMode::MirroredRepeat => 0xC,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    Nearest,
    Linear,
}

/// Sampler state object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerState {
    pub wrap: [WrapMode; 3],
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub mip_filter: Option<Filter>,
    pub compare: Option<CompareFunc>,
    pub min_lod: f32,
    pub max_lod: f32,
    pub lod_bias: f32,
    pub border_color: [f32; 4],
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            wrap: [WrapMode::Repeat; 3],
            min_filter: Filter::Nearest,
            mag_filter: Filter::Nearest,
            mip_filter: None,
            compare: None,
            min_lod: 0.0,
            max_lod: 1000.0,
            lod_bias: 0.0,
            border_color: [0.0; 4],
        }
    }
}

/// Sampler state with its hardware record prepared at creation
#[derive(Debug, Clone, Copy)]
pub struct SamplerObject {
    pub base: SamplerState,
    pub hw: SamplerDescriptor,
}

/// Fixed-point 8.8 level of detail
fn lod_fixed(lod: f32) -> i32 {
    (lod.clamp(-128.0, 127.99) * 256.0) as i32
}

impl SamplerObject {
    pub fn new(state: &SamplerState, quirks: Quirks) -> Self {
        let mut filter_mode = 0u32;
        if state.mag_filter == Filter::Nearest {
            filter_mode |= 1 << 0;
        }
        if state.min_filter == Filter::Nearest {
            filter_mode |= 1 << 1;
        }
        if state.mip_filter == Some(Filter::Linear) {
            filter_mode |= 1 << 3;
        }
        if let Some(func) = state.compare {
            filter_mode |= 1 << 4 | (func.to_mali() as u32) << 5;
        }
        if quirks.contains(Quirks::IS_BIFROST) {
            // Bifrost normalizes coordinates in the sampler
            filter_mode |= 1 << 8;
        }

        let wrap = state.wrap[0].to_mali()
            | state.wrap[1].to_mali() << 4
            | state.wrap[2].to_mali() << 8;

        let max_lod = if state.mip_filter.is_some() { state.max_lod } else { state.min_lod };

        Self {
            base: *state,
            hw: SamplerDescriptor {
                filter_mode,
                min_lod: lod_fixed(state.min_lod).max(0) as u16,
                max_lod: lod_fixed(max_lod).max(0) as u16,
                lod_bias: lod_fixed(state.lod_bias) as i16,
                _pad: 0,
                wrap,
                border_color: state.border_color,
            },
        }
    }
}

/// What a sampler view exposes of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerViewDesc {
    pub format: PipeFormat,
    pub width: u16,
    pub height: u16,
    pub depth: u16,
    pub array_size: u16,
    pub first_level: u32,
    pub last_level: u32,
    pub swizzle: [Channel; 4],
}

/// Sampler view with its texture descriptor in GPU memory
#[derive(Debug)]
pub struct SamplerView {
    pub desc: SamplerViewDesc,
    pub texture: Arc<dyn Bo>,
    /// Holds the texture descriptor
    pub bo: Arc<dyn Bo>,
}

impl SamplerView {
    pub fn new(
        allocator: &dyn BoAllocator,
        texture: Arc<dyn Bo>,
        desc: SamplerViewDesc,
    ) -> Result<Self> {
        assert!(desc.last_level >= desc.first_level, "empty mip range");

        let record = TextureDescriptor {
            width: desc.width.saturating_sub(1),
            height: desc.height.saturating_sub(1),
            depth: desc.depth.saturating_sub(1),
            array_size: desc.array_size.saturating_sub(1),
            format: desc.format.desc().hw as u32,
            swizzle: translate_swizzle_4(desc.swizzle),
            levels: desc.last_level - desc.first_level,
            _pad: 0,
            payload: texture.gpu_address(),
        };

        let bo = allocator.create_bo(BoDesc {
            size: std::mem::size_of::<TextureDescriptor>() as u64,
            flags: BoFlags::empty(),
            label: "sampler view",
        })?;
        bo.write(0, bytemuck::bytes_of(&record))?;

        Ok(Self { desc, texture, bo })
    }
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
