/*!
# Panfrost Draw

Draw-call command stream construction for Mali Midgard and Bifrost GPUs.

A [`pan::Context`] tracks the bound pipeline state of one GPU context and
turns every draw call into a vertex/tiler job pair appended to the batch of
the bound framebuffer. Kernel submission, buffer allocation and the shader
compiler backend stay outside, behind the collaborator traits in
[`device`].

## Architecture

- **Shader variants**: programs are specialized on render target formats
  and point-sprite state, compiled once per variant
- **Geometry fixup**: attribute offsets are re-derived per draw to absorb
  the 64-byte buffer alignment the hardware demands
- **Tiler descriptors**: hierarchy mask, heap and polygon list per draw,
  with a dummy path for geometry-less draws
- **Draw dispatch**: culling, restart and topology fallbacks, then
  descriptor emission in hardware order
*/

// Internal modules
mod error;
mod config;
mod context;
mod query;
pub mod log;
pub mod device;
pub mod format;
pub mod state;
pub mod shader;
pub mod geometry;
pub mod batch;
pub mod draw;

// Main pan namespace module
pub mod pan {
    // Error types
    pub use crate::error::{Error, Result};

    // Configuration
    pub use crate::config::{ContextConfig, DebugFlags};

    // Context and its state handles
    pub use crate::context::{Context, QueryKey, RasterizerKey, SamplerKey, ShaderKey, VertexStateKey, ZsaKey};

    // Queries
    pub use crate::query::{Query, QueryResult, QueryType};

    // Draw entry points
    pub use crate::draw::{DrawOutcome, DrawRequest, IndexSource};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Collaborator traits and GPU description
    pub mod device {
        pub use crate::device::*;
    }

    // Pipeline state objects
    pub mod state {
        pub use crate::state::*;
    }
}

// Re-export math library at crate root
pub use glam;
