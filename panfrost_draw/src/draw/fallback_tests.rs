//! Unit tests for fallback.rs

use super::*;

fn u16_draw(mode: PrimitiveTopology, values: &[u16]) -> DrawRequest {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    DrawRequest::indexed(mode, 2, IndexSource::User(Arc::from(bytes)), 0, values.len() as u32)
}

fn converted(draw: &DrawRequest, rasterizer: &RasterizerState) -> (PrimitiveTopology, Vec<u32>) {
    let out = PrimitiveConverter.convert(draw, rasterizer).unwrap();
    assert_eq!(out.len(), 1);
    (out[0].mode, out[0].read_indices().unwrap())
}

// ============================================================================
// Restart splitting
// ============================================================================

#[test]
fn test_split_at_restart_index() {
    let draw = u16_draw(PrimitiveTopology::TriangleStrip, &[0, 1, 2, 7, 3, 4, 5, 6]).with_restart(7);

    let parts = RestartSplitter.split(&draw).unwrap();

    assert_eq!(parts.len(), 2);
    assert_eq!((parts[0].start, parts[0].count), (0, 3));
    assert_eq!((parts[1].start, parts[1].count), (4, 4));
    assert!(parts.iter().all(|p| !p.primitive_restart));
    assert_eq!(parts[1].read_indices().unwrap(), vec![3, 4, 5, 6]);
}

#[test]
fn test_split_skips_empty_runs() {
    let draw = u16_draw(PrimitiveTopology::LineStrip, &[9, 9, 0, 1, 9, 9]).with_restart(9);

    let parts = RestartSplitter.split(&draw).unwrap();

    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].read_indices().unwrap(), vec![0, 1]);
}

#[test]
fn test_split_keeps_bias_and_instances() {
    let draw = u16_draw(PrimitiveTopology::Points, &[0, 5, 1])
        .with_restart(5)
        .with_index_bias(-2)
        .with_instances(3);

    let parts = RestartSplitter.split(&draw).unwrap();

    assert!(parts.iter().all(|p| p.index_bias == -2 && p.instance_count == 3));
}

// ============================================================================
// Topology conversion
// ============================================================================

#[test]
fn test_line_loop_closes() {
    let draw = DrawRequest::arrays(PrimitiveTopology::LineLoop, 10, 3);
    let (mode, indices) = converted(&draw, &RasterizerState::default());

    assert_eq!(mode, PrimitiveTopology::Lines);
    assert_eq!(indices, vec![10, 11, 11, 12, 12, 10]);
}

#[test]
fn test_quads_provoking_vertex_order() {
    let draw = DrawRequest::arrays(PrimitiveTopology::Quads, 0, 8);

    let (mode, last) = converted(&draw, &RasterizerState::default());
    assert_eq!(mode, PrimitiveTopology::Triangles);
    assert_eq!(&last[..6], &[0, 1, 3, 1, 2, 3]);
    assert_eq!(last.len(), 12);

    let flat_first = RasterizerState { flatshade_first: true, ..Default::default() };
    let (_, first) = converted(&draw, &flat_first);
    assert_eq!(&first[6..], &[4, 5, 6, 4, 6, 7]);
}

#[test]
fn test_quad_strip() {
    let draw = DrawRequest::arrays(PrimitiveTopology::QuadStrip, 0, 6);
    let (_, indices) = converted(&draw, &RasterizerState::default());

    assert_eq!(indices, vec![0, 1, 3, 2, 0, 3, 2, 3, 5, 4, 2, 5]);
}

#[test]
fn test_polygon_fans_out() {
    let draw = DrawRequest::arrays(PrimitiveTopology::Polygon, 0, 5);
    let (_, indices) = converted(&draw, &RasterizerState::default());

    assert_eq!(indices.len(), 9);
    assert_eq!(&indices[..3], &[1, 2, 0]);
}

#[test]
fn test_indexed_conversion_keeps_bias_and_honours_restart() {
    let draw = u16_draw(PrimitiveTopology::Quads, &[0, 1, 2, 3, 0xFFFF, 4, 5, 6, 7])
        .with_restart(0xFFFF)
        .with_index_bias(100);

    let out = PrimitiveConverter.convert(&draw, &RasterizerState::default()).unwrap();

    assert_eq!(out[0].index_bias, 100);
    assert_eq!(out[0].count, 12);
    assert!(!out[0].primitive_restart);
    assert_eq!(out[0].index_size, 4);
}

#[test]
fn test_too_few_vertices_yields_nothing() {
    let draw = DrawRequest::arrays(PrimitiveTopology::Quads, 0, 3);
    assert!(PrimitiveConverter.convert(&draw, &RasterizerState::default()).unwrap().is_empty());
}

#[test]
fn test_converted_topologies() {
    assert_eq!(converted_topology(PrimitiveTopology::LineLoop), PrimitiveTopology::Lines);
    assert_eq!(converted_topology(PrimitiveTopology::Polygon), PrimitiveTopology::Triangles);
    assert_eq!(converted_topology(PrimitiveTopology::Points), PrimitiveTopology::Points);
}
