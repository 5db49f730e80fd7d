/// Descriptor emission for one draw
///
/// Each function uploads one family of descriptor tables into the batch,
/// references the BOs the tables point at and stores the table address in
/// the vertex or tiler postfix.

use std::sync::Arc;
use crate::batch::{
    AttributeBufferDescriptor, AttributeMetaDescriptor, Batch, DescriptorKind, PrimitiveSize, SamplerDescriptor,
    ShaderMetaDescriptor, UniformBufferDescriptor, VertexTilerPostfix, ViewportDescriptor, ATTR_MODE_INSTANCED,
    ATTR_MODE_LINEAR, SHADER_DEPTH_WRITE, SHADER_READS_TILEBUFFER, SHADER_WRITES_POINT_SIZE,
};
use crate::device::{Bo, BoAllocator, ShaderStage};
use crate::error::{Error, Result};
use crate::format::{default_swizzle, MaliFormat};
use crate::geometry::attribute_buffer_base;
use crate::shader::ShaderVariant;
use crate::state::{
    ConstantBufferData, ConstantBufferState, FramebufferState, RasterizerState, SamplerView, ScissorState,
    StreamOutState, VertexBuffer, VertexElementState, ViewportState, ZsaState, MAX_ATTRIBS, PAN_INSTANCE_ID,
    PAN_VERTEX_ID,
};

/// Bytes per general varying slot (one vec4 of fp32)
const VARYING_SLOT_SIZE: u32 = 16;

/// Bytes per point-size entry (fp16)
const POINT_SIZE_STRIDE: u32 = 2;

/// Everything emission reads, borrowed from the context for one draw
pub struct DrawState<'a> {
    pub allocator: &'a dyn BoAllocator,
    pub vertex_variant: &'a ShaderVariant,
    pub fragment_variant: &'a ShaderVariant,
    pub vertex_state: Option<&'a VertexElementState>,
    pub vertex_buffers: &'a [Option<VertexBuffer>],
    pub rasterizer: &'a RasterizerState,
    pub zsa: Option<&'a ZsaState>,
    pub stencil_ref: [u8; 2],
    pub sample_mask: u32,
    pub constant_buffers: &'a [ConstantBufferState; 2],
    pub samplers: &'a [Vec<SamplerDescriptor>; 2],
    pub sampler_views: &'a [Vec<Option<Arc<SamplerView>>>; 2],
    pub viewport: &'a ViewportState,
    pub scissor: &'a ScissorState,
    pub framebuffer: &'a FramebufferState,
    pub streamout: &'a StreamOutState,
    pub padded_count: u32,
    pub writes_point_size: bool,
}

impl DrawState<'_> {
    fn variant(&self, stage: ShaderStage) -> &ShaderVariant {
        match stage {
            ShaderStage::Vertex => self.vertex_variant,
            ShaderStage::Fragment => self.fragment_variant,
        }
    }
}

// ===== Vertex data =====

/// Attribute buffer records, one per vertex element plus the builtin ids
///
/// Records are indexed by element, not by vertex buffer slot: element `i`
/// gets its own record at index `i` even when several elements share a
/// buffer, matching the `index` each attribute meta record carries. Slots
/// without an element stay zeroed.
pub fn emit_vertex_data(batch: &mut Batch, st: &DrawState, postfix: &mut VertexTilerPostfix) -> Result<()> {
    let mut records = [AttributeBufferDescriptor::default(); MAX_ATTRIBS + 2];

    if let Some(vertex_state) = st.vertex_state {
        for (i, element) in vertex_state.elements.iter().enumerate() {
            let Some(buffer) = st.vertex_buffers.get(element.vertex_buffer_index as usize).and_then(|b| b.as_ref())
            else {
                continue;
            };

            batch.add_bo(&buffer.bo);

            let base = attribute_buffer_base(buffer);
            let size = (buffer.bo.gpu_address() + buffer.bo.size()).saturating_sub(base) as u32;

            records[i] = if element.instance_divisor == 0 {
                AttributeBufferDescriptor { elements: base | ATTR_MODE_LINEAR, stride: buffer.stride, size, divisor: 0, _pad: 0 }
            } else {
                AttributeBufferDescriptor {
                    elements: base | ATTR_MODE_INSTANCED,
                    stride: buffer.stride,
                    size,
                    divisor: element.instance_divisor,
                    _pad: 0,
                }
            };
        }
    }

    // Builtins are computed from the invocation index, which is padded per instance
    records[PAN_VERTEX_ID].divisor = st.padded_count;
    records[PAN_INSTANCE_ID].divisor = st.padded_count;

    postfix.attributes = batch.upload_slice(st.allocator, &records)?;
    batch.record(DescriptorKind::VertexBuffers);
    Ok(())
}

// ===== Varyings =====

fn capture_format(components: u32) -> MaliFormat {
    match components {
        1 => MaliFormat::R32F,
        2 => MaliFormat::RG32F,
        3 => MaliFormat::RGB32F,
        _ => MaliFormat::RGBA32F,
    }
}

/// Varying buffers and formats shared by the vertex and tiler jobs
///
/// Buffers are laid out as general varyings, position, optional point size,
/// then one per bound stream output target. Captured outputs get an extra
/// format record addressing their target.
pub fn emit_varying_descriptor(
    batch: &mut Batch,
    st: &DrawState,
    vertex_count: u64,
    vertex_postfix: &mut VertexTilerPostfix,
    tiler_postfix: &mut VertexTilerPostfix,
    primitive_size: &mut PrimitiveSize,
) -> Result<()> {
    let vs = st.vertex_variant;
    let general = vs.info().varying_count;
    let mut buffers = Vec::new();
    let mut meta = Vec::new();

    let mut linear_buffer = |batch: &mut Batch, stride: u32| -> Result<(u32, u64)> {
        // Buffer sizes are 32-bit in the descriptor
        let size = u32::try_from(stride as u64 * vertex_count).map_err(|_| Error::OutOfMemory)?;
        let gpu = batch.allocate(st.allocator, size as u64, 64)?.gpu;
        buffers.push(AttributeBufferDescriptor {
            elements: gpu | ATTR_MODE_LINEAR,
            stride,
            size,
            divisor: 0,
            _pad: 0,
        });
        Ok((buffers.len() as u32 - 1, gpu))
    };

    if general > 0 {
        let (index, _) = linear_buffer(batch, general * VARYING_SLOT_SIZE)?;
        for slot in 0..general {
            meta.push(AttributeMetaDescriptor {
                index,
                format: MaliFormat::RGBA32F as u32,
                swizzle: default_swizzle(4),
                src_offset: slot * VARYING_SLOT_SIZE,
            });
        }
    }

    let (position, _) = linear_buffer(batch, VARYING_SLOT_SIZE)?;
    meta.push(AttributeMetaDescriptor {
        index: position,
        format: MaliFormat::RGBA32F as u32,
        swizzle: default_swizzle(4),
        src_offset: 0,
    });

    if st.writes_point_size {
        let (psiz, gpu) = linear_buffer(batch, POINT_SIZE_STRIDE)?;
        meta.push(AttributeMetaDescriptor {
            index: psiz,
            format: MaliFormat::R16F as u32,
            swizzle: default_swizzle(1),
            src_offset: 0,
        });
        primitive_size.pointer = gpu;
    }

    // Stream output targets
    let so = vs.stream_output();
    // (buffer index, bytes below the aligned base) per target
    let mut so_buffer: [Option<(u32, u32)>; 4] = [None; 4];
    for (i, target) in st.streamout.active_targets() {
        batch.add_bo(&target.bo);

        let gpu = target.address(so.stride[i], st.streamout.offsets[i]);
        so_buffer[i] = Some((buffers.len() as u32, (gpu & 63) as u32));
        buffers.push(AttributeBufferDescriptor {
            elements: (gpu & !63) | ATTR_MODE_LINEAR,
            stride: so.stride[i] * 4,
            size: target.buffer_size,
            divisor: 0,
            _pad: 0,
        });
    }

    for output in &so.outputs {
        let Some((index, misalignment)) = so_buffer.get(output.output_buffer as usize).copied().flatten() else {
            continue;
        };
        meta.push(AttributeMetaDescriptor {
            index,
            format: capture_format(output.num_components) as u32,
            swizzle: default_swizzle(output.num_components),
            src_offset: output.dst_offset * 4 + misalignment,
        });
    }

    let varyings = batch.upload_slice(st.allocator, &buffers)?;
    let varying_meta = batch.upload_slice(st.allocator, &meta)?;

    vertex_postfix.varyings = varyings;
    tiler_postfix.varyings = varyings;
    vertex_postfix.varying_meta = varying_meta;
    tiler_postfix.varying_meta = varying_meta;

    batch.record(DescriptorKind::Varyings);
    Ok(())
}

// ===== Shader metadata =====

pub fn emit_shader_meta(batch: &mut Batch, st: &DrawState, stage: ShaderStage, postfix: &mut VertexTilerPostfix) -> Result<()> {
    let variant = st.variant(stage);
    let info = variant.info();

    let mut meta = ShaderMetaDescriptor {
        shader: variant.bo().map(|bo| bo.gpu_address()).unwrap_or(0),
        attribute_count: info.attribute_count as u16,
        varying_count: info.varying_count as u16,
        uniform_count: info.uniform_count as u16,
        work_count: info.work_reg_count as u16,
        stack_size: info.stack_size,
        sample_mask: st.sample_mask,
        ..Default::default()
    };

    if let Some(bo) = variant.bo() {
        batch.add_bo(bo);
    }

    match stage {
        ShaderStage::Vertex => {
            if st.writes_point_size {
                meta.flags |= SHADER_WRITES_POINT_SIZE;
            }
        }
        ShaderStage::Fragment => {
            if variant.outputs_read() != 0 {
                meta.flags |= SHADER_READS_TILEBUFFER;
            }
            if let Some(zsa) = st.zsa {
                if zsa.base.depth.writemask {
                    meta.flags |= SHADER_DEPTH_WRITE;
                }
                meta.stencil_front = zsa.stencil_front.to_bits(st.stencil_ref[0]);
                meta.stencil_back = zsa.stencil_back.to_bits(st.stencil_ref[1]);
                meta.stencil_mask_front = zsa.stencil_mask_front;
                meta.stencil_mask_back = zsa.stencil_mask_back;
            }
        }
    }

    postfix.shader = batch.upload(st.allocator, &meta)?;
    batch.record(DescriptorKind::ShaderMeta(stage));
    Ok(())
}

// ===== Attribute formats =====

pub fn emit_vertex_attr_meta(batch: &mut Batch, st: &DrawState, postfix: &mut VertexTilerPostfix) -> Result<()> {
    let records: Vec<AttributeMetaDescriptor> = match st.vertex_state {
        Some(state) => state
            .hw
            .iter()
            .map(|hw| AttributeMetaDescriptor {
                index: hw.index,
                format: hw.format as u32,
                swizzle: hw.swizzle,
                src_offset: hw.src_offset,
            })
            .collect(),
        None => Vec::new(),
    };

    postfix.attribute_meta = if records.is_empty() { 0 } else { batch.upload_slice(st.allocator, &records)? };
    batch.record(DescriptorKind::AttributeMeta);
    Ok(())
}

// ===== Samplers and textures =====

pub fn emit_sampler_descriptors(batch: &mut Batch, st: &DrawState, stage: ShaderStage, postfix: &mut VertexTilerPostfix) -> Result<()> {
    let samplers = &st.samplers[stage.index()];

    postfix.sampler_descriptor = if samplers.is_empty() { 0 } else { batch.upload_slice(st.allocator, samplers)? };
    batch.record(DescriptorKind::Samplers(stage));
    Ok(())
}

/// Table of pointers to each bound view's texture descriptor
pub fn emit_texture_descriptors(batch: &mut Batch, st: &DrawState, stage: ShaderStage, postfix: &mut VertexTilerPostfix) -> Result<()> {
    let views = &st.sampler_views[stage.index()];
    let mut pointers = Vec::with_capacity(views.len());

    for view in views {
        match view {
            Some(view) => {
                batch.add_bo(&view.bo);
                batch.add_bo(&view.texture);
                pointers.push(view.bo.gpu_address());
            }
            None => pointers.push(0u64),
        }
    }

    postfix.textures = if pointers.is_empty() { 0 } else { batch.upload_slice(st.allocator, &pointers)? };
    batch.record(DescriptorKind::Textures(stage));
    Ok(())
}

// ===== Constant buffers =====

/// UBO table for one stage; slot 0 doubles as the uniform pointer
pub fn emit_const_buf(batch: &mut Batch, st: &DrawState, stage: ShaderStage, postfix: &mut VertexTilerPostfix) -> Result<()> {
    let state = &st.constant_buffers[stage.index()];
    let count = state.ubo_count() as usize;
    let mut table = Vec::with_capacity(count);

    for (slot, cb) in state.cb.iter().take(count).enumerate() {
        let (gpu, size) = match cb {
            Some(cb) => {
                let gpu = match &cb.data {
                    ConstantBufferData::Buffer { bo, offset } => {
                        batch.add_bo(bo);
                        bo.gpu_address() + *offset as u64
                    }
                    ConstantBufferData::User(data) => {
                        let len = (cb.size as usize).min(data.len());
                        batch.upload_bytes(st.allocator, &data[..len], 16)?
                    }
                };
                (gpu, cb.size)
            }
            None => (0, 0),
        };

        if slot == 0 {
            postfix.uniforms = gpu;
        }
        table.push(UniformBufferDescriptor::new(gpu, size));
    }

    postfix.uniform_buffers = batch.upload_slice(st.allocator, &table)?;
    batch.record(DescriptorKind::ConstantBuffers(stage));
    Ok(())
}

// ===== Viewport =====

/// Clip box: the viewport clamped to the framebuffer and, when enabled,
/// the scissor
pub fn emit_viewport(batch: &mut Batch, st: &DrawState, postfix: &mut VertexTilerPostfix) -> Result<()> {
    let (min, max) = st.viewport.bounds();
    let fb = st.framebuffer;

    let mut minx = (min.x.max(0.0) as u32).min(fb.width);
    let mut miny = (min.y.max(0.0) as u32).min(fb.height);
    let mut maxx = (max.x.max(0.0) as u32).min(fb.width);
    let mut maxy = (max.y.max(0.0) as u32).min(fb.height);

    if st.rasterizer.scissor {
        minx = minx.max(st.scissor.minx as u32);
        miny = miny.max(st.scissor.miny as u32);
        maxx = maxx.min(st.scissor.maxx as u32);
        maxy = maxy.min(st.scissor.maxy as u32);
    }

    // Inclusive bounds cannot express an empty box
    if maxx == 0 || maxy == 0 {
        minx = 1;
        miny = 1;
        maxx = 1;
        maxy = 1;
    }

    let viewport = ViewportDescriptor {
        clip_minx: f32::NEG_INFINITY,
        clip_miny: f32::NEG_INFINITY,
        clip_minz: min.z.min(max.z),
        clip_maxx: f32::INFINITY,
        clip_maxy: f32::INFINITY,
        clip_maxz: min.z.max(max.z),
        viewport0: [minx as u16, miny as u16],
        viewport1: [(maxx.max(1) - 1) as u16, (maxy.max(1) - 1) as u16],
    };

    postfix.viewport = batch.upload(st.allocator, &viewport)?;
    batch.record(DescriptorKind::Viewport);
    Ok(())
}

#[cfg(test)]
#[path = "emit_tests.rs"]
mod tests;
