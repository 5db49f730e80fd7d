/// Shader module - programs, per-state variants and stream output layout

pub mod variant;
pub mod stream_output;

pub use variant::*;
pub use stream_output::*;
