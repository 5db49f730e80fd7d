/// The per-draw state machine
///
/// A draw is culled, handed to a fallback that re-enters the dispatcher
/// with simpler draws, or committed: counted, fixed up and emitted into the
/// batch of the bound framebuffer as a vertex/tiler job pair.

use crate::batch::{
    Batch, BatchRequirements, PrimitiveSize, TilerJob, VertexJob, VertexTilerPostfix, VertexTilerPrefix,
    DRAW_POINT_SIZE_ARRAY, GL_CULL_FACE_BACK, GL_CULL_FACE_FRONT, GL_FRONT_CCW_TOP, GL_OCCLUSION_QUERY,
};
use crate::context::Context;
use crate::device::ShaderStage;
use crate::error::{Error, Result};
use crate::geometry::{
    build_tiler_descriptor, fixup_attribute_offsets, pack_work_groups_fused, padded_vertex_count, prims_for_vertices,
    stream_outputs_for_vertices, InvocationPrefix, PrimitiveTopology,
};
use crate::shader::ShaderVariant;
use crate::state::RasterizerState;
use crate::pan_trace;
use super::draw_request::{DrawRequest, IndexSource};
use super::emit::{
    emit_const_buf, emit_sampler_descriptors, emit_shader_meta, emit_texture_descriptors, emit_varying_descriptor,
    emit_vertex_attr_meta, emit_vertex_data, emit_viewport, DrawState,
};

/// How a draw call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// Jobs were appended to the batch
    Submitted,
    /// Nothing can be visible; no state was touched
    Culled,
    /// A fallback rewrote the draw and issued the pieces
    Delegated,
}

/// Counts derived from the draw for the vertex/tiler prefix and postfix
struct DrawInfo {
    vertex_count: u32,
    offset_start: u32,
    padded_count: u32,
    instance_shift: u16,
    instance_odd: u16,
}

/// Hardware code for an index size
fn index_size_code(index_size: u32) -> u32 {
    match index_size {
        1 => 1,
        2 => 2,
        4 => 3,
        other => panic!("invalid index size {}", other),
    }
}

fn apply_invocation(prefix: &mut VertexTilerPrefix, invocation: &InvocationPrefix) {
    prefix.invocation_count = invocation.invocation_count;
    prefix.size_y_shift = invocation.size_y_shift;
    prefix.size_z_shift = invocation.size_z_shift;
    prefix.workgroups_x_shift = invocation.workgroups_x_shift;
    prefix.workgroups_y_shift = invocation.workgroups_y_shift;
    prefix.workgroups_z_shift = invocation.workgroups_z_shift;
    prefix.workgroups_x_shift_2 = invocation.workgroups_x_shift_2;
    prefix.workgroups_x_shift_3 = invocation.workgroups_x_shift_3;
}

impl Context {
    /// Issue one draw call
    ///
    /// # Panics
    ///
    /// Panics when no rasterizer state or no vertex/fragment program is
    /// bound, or when the topology fallback produces a topology the
    /// hardware does not draw.
    pub fn draw_vbo(&mut self, draw: &DrawRequest) -> Result<DrawOutcome> {
        if self.scissor_culls_everything() {
            pan_trace!("pan::Draw", "Empty scissor, {:?} draw dropped", draw.mode);
            return Ok(DrawOutcome::Culled);
        }

        if draw.needs_restart_fallback() {
            pan_trace!("pan::Draw", "Restart index {:#x} not native, splitting", draw.restart_index);
            let parts = self.restart_fallback.split(draw)?;
            for part in &parts {
                self.draw_vbo(part)?;
            }
            return Ok(DrawOutcome::Delegated);
        }

        let rasterizer = self.bound_rasterizer();
        let mut mode = draw.mode;

        if !self.draw_modes.supports(mode) {
            if mode == PrimitiveTopology::Quads && draw.count == 4 && !rasterizer.flatshade {
                mode = PrimitiveTopology::TriangleFan;
            } else if draw.count < 4 {
                pan_trace!("pan::Draw", "Degenerate {:?} draw of {} vertices dropped", mode, draw.count);
                return Ok(DrawOutcome::Culled);
            } else {
                pan_trace!("pan::Draw", "{:?} not drawn natively, converting", mode);
                let parts = self.primitive_fallback.convert(draw, &rasterizer)?;
                for part in &parts {
                    assert!(
                        self.draw_modes.supports(part.mode),
                        "topology fallback produced unsupported {:?}",
                        part.mode
                    );
                    self.draw_vbo(part)?;
                }
                return Ok(DrawOutcome::Delegated);
            }
        }

        // The batch is out of the map while the draw is built; it goes back
        // in even when emission fails
        let mut batch = self.take_batch();
        let result = self.commit_draw(&mut batch, draw, mode, &rasterizer);
        self.put_batch(batch);

        result.map(|()| DrawOutcome::Submitted)
    }

    fn scissor_culls_everything(&self) -> bool {
        match self.rasterizer {
            Some(key) => self.rasterizers[key].scissor && self.scissor.is_empty(),
            None => false,
        }
    }

    fn bound_rasterizer(&self) -> RasterizerState {
        match self.rasterizer {
            Some(key) => self.rasterizers[key],
            None => panic!("draw issued without a rasterizer state bound"),
        }
    }

    fn active_variant(&self, stage: ShaderStage) -> &ShaderVariant {
        let variant = self.bound_shaders[stage.index()].and_then(|key| self.shaders[key].active());
        match variant {
            Some(variant) => variant,
            None => panic!("draw issued without a {:?} program bound", stage),
        }
    }

    /// Fill the index fields of the tiler prefix and work out the vertex range
    fn set_draw_info(&self, batch: &mut Batch, draw: &DrawRequest, prefix: &mut VertexTilerPrefix) -> Result<DrawInfo> {
        let (vertex_count, offset_start) = if draw.is_indexed() {
            let (min, max) = draw.min_max_index()?;

            prefix.indices = self.index_buffer_pointer(batch, draw)?;
            prefix.offset_bias_correction = (min as i32).wrapping_neg();
            prefix.index_count = draw.count.saturating_sub(1);
            prefix.draw_flags |= index_size_code(draw.index_size);

            // Wraps to 0 across the full 32-bit range, as the hardware count does
            (max.wrapping_sub(min).wrapping_add(1), (min as i32).wrapping_add(draw.index_bias) as u32)
        } else {
            // Internally indexed in order
            prefix.index_count = self.vertex_count.saturating_sub(1);
            (self.vertex_count, draw.start)
        };

        let mut info = DrawInfo { vertex_count, offset_start, padded_count: vertex_count, instance_shift: 0, instance_odd: 0 };

        if self.instance_count > 1 && vertex_count > 0 {
            let padded = padded_vertex_count(vertex_count);
            let shift = padded.trailing_zeros();

            info.padded_count = padded;
            info.instance_shift = shift as u16;
            info.instance_odd = padded.checked_shr(shift + 1).unwrap_or(0) as u16;
        }

        Ok(info)
    }

    /// GPU address of the first index, uploading client indices
    fn index_buffer_pointer(&self, batch: &mut Batch, draw: &DrawRequest) -> Result<u64> {
        let offset = draw.index_byte_offset();
        let len = draw.count as u64 * draw.index_size as u64;

        match &draw.indices {
            Some(IndexSource::User(data)) => {
                let begin = offset as usize;
                let end = begin + len as usize;
                let Some(bytes) = data.get(begin..end) else {
                    return Err(Error::InvalidResource(format!(
                        "index range {}..{} past end of {} bytes of user indices",
                        begin,
                        end,
                        data.len()
                    )));
                };
                batch.upload_bytes(self.allocator.as_ref(), bytes, 64)
            }
            Some(IndexSource::Buffer { bo, offset: base }) => {
                batch.add_bo(bo);
                Ok(bo.gpu_address() + *base as u64 + offset)
            }
            None => Err(Error::InvalidResource("indexed draw without an index source".to_string())),
        }
    }

    fn record_statistics(&mut self, draw: &DrawRequest) {
        if !self.active_queries {
            return;
        }

        let prims = prims_for_vertices(draw.mode, draw.count) as u64;
        self.prims_generated += prims;

        if self.streamout.num_targets > 0 {
            self.tf_prims_generated += prims;
        }
    }

    fn commit_draw(
        &mut self,
        batch: &mut Batch,
        draw: &DrawRequest,
        mode: PrimitiveTopology,
        rasterizer: &RasterizerState,
    ) -> Result<()> {
        for bo in self.framebuffer.bos() {
            batch.add_bo(bo);
        }

        let mut requirements = BatchRequirements::empty();
        if rasterizer.multisample {
            requirements |= BatchRequirements::MSAA;
        }
        if self.zsa.is_some_and(|key| self.zsa_states[key].base.depth.writemask) {
            requirements |= BatchRequirements::DEPTH_WRITE;
        }
        batch.set_requirements(requirements);

        // A negative bias reaches below the first index
        self.vertex_count = draw.count.saturating_add(draw.index_bias.unsigned_abs());
        self.instance_count = draw.instance_count;
        self.active_prim = draw.mode;

        let mut vertex_prefix = VertexTilerPrefix::default();
        let mut tiler_prefix = VertexTilerPrefix::default();
        let mut vertex_postfix = VertexTilerPostfix::default();
        let mut tiler_postfix = VertexTilerPostfix::default();
        let mut primitive_size = PrimitiveSize::default();

        tiler_prefix.draw_mode = mode.to_mali() as u8;

        let info = self.set_draw_info(batch, draw, &mut tiler_prefix)?;
        for postfix in [&mut vertex_postfix, &mut tiler_postfix] {
            postfix.offset_start = info.offset_start;
            postfix.instance_shift = info.instance_shift;
            postfix.instance_odd = info.instance_odd;
        }

        self.record_statistics(draw);

        if let Some(key) = self.vertex {
            fixup_attribute_offsets(&mut self.vertex_states[key], &self.vertex_buffers, info.offset_start, self.instance_count);
        }

        let tiler = build_tiler_descriptor(batch, self.allocator.as_ref(), self.gpu.quirks, &self.config, self.vertex_count)?;

        // Work groups of one vertex; zero-sized draws still dispatch one
        let (vertex_invocation, tiler_invocation) =
            pack_work_groups_fused([1, info.padded_count.max(1), self.instance_count.max(1)], [1, 1, 1]);
        apply_invocation(&mut vertex_prefix, &vertex_invocation);
        apply_invocation(&mut tiler_prefix, &tiler_invocation);

        let writes_point_size = self.writes_point_size();
        let vs = self.active_variant(ShaderStage::Vertex);
        let fs = self.active_variant(ShaderStage::Fragment);
        let stack_size = vs.info().stack_size.max(fs.info().stack_size);

        let st = DrawState {
            allocator: self.allocator.as_ref(),
            vertex_variant: vs,
            fragment_variant: fs,
            vertex_state: self.vertex.map(|key| &self.vertex_states[key]),
            vertex_buffers: &self.vertex_buffers,
            rasterizer,
            zsa: self.zsa.map(|key| &self.zsa_states[key]),
            stencil_ref: self.stencil_ref,
            sample_mask: self.sample_mask,
            constant_buffers: &self.constant_buffers,
            samplers: &self.sampler_descriptors,
            sampler_views: &self.sampler_views,
            viewport: &self.viewport,
            scissor: &self.scissor,
            framebuffer: &self.framebuffer,
            streamout: &self.streamout,
            padded_count: info.padded_count,
            writes_point_size,
        };

        emit_vertex_data(batch, &st, &mut vertex_postfix)?;
        emit_varying_descriptor(
            batch,
            &st,
            info.padded_count as u64 * self.instance_count as u64,
            &mut vertex_postfix,
            &mut tiler_postfix,
            &mut primitive_size,
        )?;
        emit_shader_meta(batch, &st, ShaderStage::Vertex, &mut vertex_postfix)?;
        emit_shader_meta(batch, &st, ShaderStage::Fragment, &mut tiler_postfix)?;
        emit_vertex_attr_meta(batch, &st, &mut vertex_postfix)?;
        emit_sampler_descriptors(batch, &st, ShaderStage::Vertex, &mut vertex_postfix)?;
        emit_sampler_descriptors(batch, &st, ShaderStage::Fragment, &mut tiler_postfix)?;
        emit_texture_descriptors(batch, &st, ShaderStage::Vertex, &mut vertex_postfix)?;
        emit_texture_descriptors(batch, &st, ShaderStage::Fragment, &mut tiler_postfix)?;
        emit_const_buf(batch, &st, ShaderStage::Vertex, &mut vertex_postfix)?;
        emit_const_buf(batch, &st, ShaderStage::Fragment, &mut tiler_postfix)?;
        emit_viewport(batch, &st, &mut tiler_postfix)?;

        if writes_point_size {
            tiler_prefix.draw_flags |= DRAW_POINT_SIZE_ARRAY;
        } else if mode == PrimitiveTopology::Points {
            primitive_size.constant = rasterizer.point_size;
        } else {
            primitive_size.constant = rasterizer.line_width;
        }

        if rasterizer.front_ccw {
            tiler_postfix.gl_enables |= GL_FRONT_CCW_TOP;
        }
        if rasterizer.cull_front {
            tiler_postfix.gl_enables |= GL_CULL_FACE_FRONT;
        }
        if rasterizer.cull_back {
            tiler_postfix.gl_enables |= GL_CULL_FACE_BACK;
        }
        if let Some(bo) = self.occlusion_query.and_then(|key| self.queries[key].bo.as_ref()) {
            tiler_postfix.gl_enables |= GL_OCCLUSION_QUERY;
            tiler_postfix.occlusion_counter = bo.gpu_address();
            batch.add_bo(bo);
        }
        tiler_postfix.sample_mask = self.sample_mask;

        let vertex_job = VertexJob { header: Default::default(), prefix: vertex_prefix, postfix: vertex_postfix };
        let tiler_job = (!rasterizer.rasterizer_discard).then_some(TilerJob {
            header: Default::default(),
            prefix: tiler_prefix,
            postfix: tiler_postfix,
            primitive_size,
            tiler,
        });

        batch.add_vertex_tiler_jobs(self.allocator.as_ref(), vertex_job, tiler_job)?;
        batch.adjust_stack_size(stack_size);

        for buffers in self.constant_buffers.iter_mut() {
            buffers.dirty_mask = 0;
        }

        let captured = stream_outputs_for_vertices(self.active_prim, self.vertex_count);
        self.streamout.advance(captured);

        pan_trace!(
            "pan::Draw",
            "{:?} as {:?}: {} vertices (padded {}) x {} instances",
            draw.mode,
            mode,
            info.vertex_count,
            info.padded_count,
            self.instance_count
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
