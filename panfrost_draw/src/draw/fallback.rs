/// CPU-side rewrites for draws the hardware cannot take as they are
///
/// Both fallbacks turn one draw into zero or more simpler draws, which the
/// dispatcher then issues like any other.

use std::sync::Arc;
use crate::error::Result;
use crate::geometry::PrimitiveTopology;
use crate::state::RasterizerState;
use super::draw_request::{DrawRequest, IndexSource};

/// Rewrites primitive restart at an index the hardware does not recognize
pub trait RestartFallback: Send + Sync {
    fn split(&self, draw: &DrawRequest) -> Result<Vec<DrawRequest>>;
}

/// Rewrites topologies the tiler does not support into ones it does
pub trait PrimitiveFallback: Send + Sync {
    fn convert(&self, draw: &DrawRequest, rasterizer: &RasterizerState) -> Result<Vec<DrawRequest>>;
}

/// Split at each restart index into restart-free sub-draws
///
/// Sub-draws read from the original index source at shifted starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestartSplitter;

impl RestartFallback for RestartSplitter {
    fn split(&self, draw: &DrawRequest) -> Result<Vec<DrawRequest>> {
        let indices = draw.read_indices()?;

        Ok(restart_segments(&indices, draw.restart_index)
            .map(|(begin, len)| DrawRequest {
                start: draw.start + begin as u32,
                count: len as u32,
                primitive_restart: false,
                index_bounds: None,
                ..draw.clone()
            })
            .collect())
    }
}

/// Non-empty `(offset, len)` runs between restart indices
fn restart_segments(indices: &[u32], restart_index: u32) -> impl Iterator<Item = (usize, usize)> + '_ {
    let mut begin = 0;
    indices
        .split(move |&i| i == restart_index)
        .map(move |run| {
            let segment = (begin, run.len());
            begin += run.len() + 1;
            segment
        })
        .filter(|(_, len)| *len > 0)
}

/// Re-index loops, quads, quad strips and polygons as lines or triangles
///
/// Output draws use 32-bit indices in client memory. Provoking vertices
/// follow `flatshade_first`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveConverter;

impl PrimitiveFallback for PrimitiveConverter {
    fn convert(&self, draw: &DrawRequest, rasterizer: &RasterizerState) -> Result<Vec<DrawRequest>> {
        let (vertices, index_bias) = if draw.is_indexed() {
            (draw.read_indices()?, draw.index_bias)
        } else {
            ((draw.start..draw.start + draw.count).collect(), 0)
        };

        let runs: Vec<&[u32]> = if draw.is_indexed() && draw.primitive_restart {
            vertices.split(|&i| i == draw.restart_index).filter(|r| !r.is_empty()).collect()
        } else {
            vec![&vertices[..]]
        };

        let target = converted_topology(draw.mode);
        let mut indices = Vec::new();
        for run in runs {
            convert_run(draw.mode, run, rasterizer.flatshade_first, &mut indices);
        }

        if indices.is_empty() {
            return Ok(Vec::new());
        }

        let bytes: Vec<u8> = bytemuck::cast_slice(&indices).to_vec();
        let mut converted = DrawRequest::indexed(target, 4, IndexSource::User(Arc::from(bytes)), 0, indices.len() as u32);
        converted.index_bias = index_bias;
        converted.instance_count = draw.instance_count;
        converted.start_instance = draw.start_instance;

        Ok(vec![converted])
    }
}

/// Topology a converted draw is issued with
pub fn converted_topology(mode: PrimitiveTopology) -> PrimitiveTopology {
    match mode {
        PrimitiveTopology::Points => PrimitiveTopology::Points,
        PrimitiveTopology::Lines | PrimitiveTopology::LineLoop | PrimitiveTopology::LineStrip => PrimitiveTopology::Lines,
        PrimitiveTopology::Triangles
        | PrimitiveTopology::TriangleStrip
        | PrimitiveTopology::TriangleFan
        | PrimitiveTopology::Quads
        | PrimitiveTopology::QuadStrip
        | PrimitiveTopology::Polygon => PrimitiveTopology::Triangles,
    }
}

fn convert_run(mode: PrimitiveTopology, v: &[u32], first: bool, out: &mut Vec<u32>) {
    let n = v.len();

    match mode {
        PrimitiveTopology::Points => out.extend_from_slice(v),
        PrimitiveTopology::Lines => out.extend_from_slice(&v[..n - n % 2]),
        PrimitiveTopology::LineStrip | PrimitiveTopology::LineLoop => {
            if n < 2 {
                return;
            }
            for i in 0..n - 1 {
                out.extend_from_slice(&[v[i], v[i + 1]]);
            }
            if mode == PrimitiveTopology::LineLoop {
                out.extend_from_slice(&[v[n - 1], v[0]]);
            }
        }
        PrimitiveTopology::Triangles => out.extend_from_slice(&v[..n - n % 3]),
        PrimitiveTopology::TriangleStrip => {
            for i in 0..n.saturating_sub(2) {
                let tri = match (i % 2 == 0, first) {
                    (true, _) => [v[i], v[i + 1], v[i + 2]],
                    (false, false) => [v[i + 1], v[i], v[i + 2]],
                    (false, true) => [v[i], v[i + 2], v[i + 1]],
                };
                out.extend_from_slice(&tri);
            }
        }
        PrimitiveTopology::TriangleFan => {
            for i in 0..n.saturating_sub(2) {
                let tri = if first {
                    [v[i + 1], v[i + 2], v[0]]
                } else {
                    [v[0], v[i + 1], v[i + 2]]
                };
                out.extend_from_slice(&tri);
            }
        }
        PrimitiveTopology::Quads => {
            for q in v.chunks_exact(4) {
                if first {
                    out.extend_from_slice(&[q[0], q[1], q[2], q[0], q[2], q[3]]);
                } else {
                    out.extend_from_slice(&[q[0], q[1], q[3], q[1], q[2], q[3]]);
                }
            }
        }
        PrimitiveTopology::QuadStrip => {
            for i in 0..n.saturating_sub(2) / 2 {
                let (a, b, c, d) = (v[2 * i], v[2 * i + 1], v[2 * i + 2], v[2 * i + 3]);
                out.extend_from_slice(&[a, b, d, c, a, d]);
            }
        }
        PrimitiveTopology::Polygon => {
            for i in 1..n.saturating_sub(1) {
                let tri = if first {
                    [v[0], v[i], v[i + 1]]
                } else {
                    [v[i], v[i + 1], v[0]]
                };
                out.extend_from_slice(&tri);
            }
        }
    }
}

#[cfg(test)]
#[path = "fallback_tests.rs"]
mod tests;
