/// Primitive topologies, the hardware draw-mode table and primitive counting

use bitflags::bitflags;
use crate::device::Quirks;

/// API-level primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Quads,
    QuadStrip,
    Polygon,
}

bitflags! {
    /// Set of topologies the tiler consumes natively
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DrawModes: u32 {
        const POINTS = 1 << 0;
        const LINES = 1 << 1;
        const LINE_LOOP = 1 << 2;
        const LINE_STRIP = 1 << 3;
        const TRIANGLES = 1 << 4;
        const TRIANGLE_STRIP = 1 << 5;
        const TRIANGLE_FAN = 1 << 6;
        const QUADS = 1 << 7;
        const QUAD_STRIP = 1 << 8;
        const POLYGON = 1 << 9;
    }
}

impl DrawModes {
    /// Every GPU handles POINTS through QUADS; Midgard adds QUAD_STRIP and POLYGON
    pub fn for_quirks(quirks: Quirks) -> Self {
        let mut modes = DrawModes::from_bits_truncate((DrawModes::QUADS.bits() << 1) - 1);
        if !quirks.contains(Quirks::IS_BIFROST) {
            modes |= DrawModes::QUAD_STRIP | DrawModes::POLYGON;
        }
        modes
    }

    pub fn supports(self, topology: PrimitiveTopology) -> bool {
        self.contains(topology.mode_bit())
    }
}

/// Hardware draw mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MaliDrawMode {
    Points = 0x1,
    Lines = 0x2,
    LineStrip = 0x4,
    LineLoop = 0x6,
    Triangles = 0x8,
    TriangleStrip = 0xA,
    TriangleFan = 0xC,
    Polygon = 0xD,
    Quads = 0xE,
    QuadStrip = 0xF,
}

impl PrimitiveTopology {
    pub fn mode_bit(self) -> DrawModes {
        match self {
            PrimitiveTopology::Points => DrawModes::POINTS,
            PrimitiveTopology::Lines => DrawModes::LINES,
            PrimitiveTopology::LineLoop => DrawModes::LINE_LOOP,
            PrimitiveTopology::LineStrip => DrawModes::LINE_STRIP,
            PrimitiveTopology::Triangles => DrawModes::TRIANGLES,
            PrimitiveTopology::TriangleStrip => DrawModes::TRIANGLE_STRIP,
            PrimitiveTopology::TriangleFan => DrawModes::TRIANGLE_FAN,
            PrimitiveTopology::Quads => DrawModes::QUADS,
            PrimitiveTopology::QuadStrip => DrawModes::QUAD_STRIP,
            PrimitiveTopology::Polygon => DrawModes::POLYGON,
        }
    }

    /// Hardware encoding of this topology
    pub fn to_mali(self) -> MaliDrawMode {
        match self {
            PrimitiveTopology::Points => MaliDrawMode::Points,
            PrimitiveTopology::Lines => MaliDrawMode::Lines,
            PrimitiveTopology::LineLoop => MaliDrawMode::LineLoop,
            PrimitiveTopology::LineStrip => MaliDrawMode::LineStrip,
            PrimitiveTopology::Triangles => MaliDrawMode::Triangles,
            PrimitiveTopology::TriangleStrip => MaliDrawMode::TriangleStrip,
            PrimitiveTopology::TriangleFan => MaliDrawMode::TriangleFan,
            PrimitiveTopology::Quads => MaliDrawMode::Quads,
            PrimitiveTopology::QuadStrip => MaliDrawMode::QuadStrip,
            PrimitiveTopology::Polygon => MaliDrawMode::Polygon,
        }
    }

    /// List topology the primitives decompose into
    pub fn reduced(self) -> PrimitiveTopology {
        match self {
            PrimitiveTopology::Points => PrimitiveTopology::Points,
            PrimitiveTopology::Lines
            | PrimitiveTopology::LineLoop
            | PrimitiveTopology::LineStrip => PrimitiveTopology::Lines,
            PrimitiveTopology::Triangles
            | PrimitiveTopology::TriangleStrip
            | PrimitiveTopology::TriangleFan
            | PrimitiveTopology::Polygon => PrimitiveTopology::Triangles,
            PrimitiveTopology::Quads | PrimitiveTopology::QuadStrip => PrimitiveTopology::Quads,
        }
    }

    /// (minimum vertices, vertices per additional primitive)
    fn vertex_count_rule(self) -> (u32, u32) {
        match self {
            PrimitiveTopology::Points => (1, 1),
            PrimitiveTopology::Lines => (2, 2),
            PrimitiveTopology::LineLoop => (2, 1),
            PrimitiveTopology::LineStrip => (2, 1),
            PrimitiveTopology::Triangles => (3, 3),
            PrimitiveTopology::TriangleStrip => (3, 1),
            PrimitiveTopology::TriangleFan => (3, 1),
            PrimitiveTopology::Quads => (4, 4),
            PrimitiveTopology::QuadStrip => (4, 2),
            PrimitiveTopology::Polygon => (3, 1),
        }
    }

    fn vertices_per_primitive(self) -> u32 {
        match self.reduced() {
            PrimitiveTopology::Points => 1,
            PrimitiveTopology::Lines => 2,
            PrimitiveTopology::Quads => 4,
            _ => 3,
        }
    }
}

/// Primitives generated for the GL_PRIMITIVES_GENERATED query
pub fn prims_for_vertices(mode: PrimitiveTopology, vertices: u32) -> u32 {
    let (min, incr) = mode.vertex_count_rule();
    if vertices < min {
        0
    } else {
        1 + (vertices - min) / incr
    }
}

/// Primitives the topology decomposes into
pub fn decomposed_prims_for_vertices(mode: PrimitiveTopology, vertices: u32) -> u32 {
    match mode {
        PrimitiveTopology::Points => vertices,
        PrimitiveTopology::Lines => vertices / 2,
        PrimitiveTopology::LineLoop => if vertices >= 2 { vertices } else { 0 },
        PrimitiveTopology::LineStrip => vertices.saturating_sub(1),
        PrimitiveTopology::Triangles => vertices / 3,
        PrimitiveTopology::TriangleStrip | PrimitiveTopology::TriangleFan => vertices.saturating_sub(2),
        PrimitiveTopology::Quads => vertices / 4,
        PrimitiveTopology::QuadStrip => if vertices >= 4 { (vertices - 2) / 2 } else { 0 },
        PrimitiveTopology::Polygon => if vertices >= 3 { 1 } else { 0 },
    }
}

/// Vertices captured by stream output for a draw of `vertices` vertices
pub fn stream_outputs_for_vertices(mode: PrimitiveTopology, vertices: u32) -> u32 {
    if mode == PrimitiveTopology::Polygon {
        // One polygon, every vertex captured
        return if vertices >= 3 { vertices } else { 0 };
    }
    decomposed_prims_for_vertices(mode, vertices) * mode.vertices_per_primitive()
}

#[cfg(test)]
#[path = "primitive_tests.rs"]
mod tests;
