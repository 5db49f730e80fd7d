//! Context configuration
//!
//! `ContextConfig` carries the sizes and limits a `Context` is created with.
//! Debug switches come from the comma-separated `PAN_MESA_DEBUG` variable.

use bitflags::bitflags;
use crate::geometry::DrawModes;
use crate::pan_warn;

bitflags! {
    /// Debug switches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DebugFlags: u32 {
        /// Log a summary of every batch handed to the submitter
        const TRACE = 1 << 0;
        /// Compile NIR programs as soon as they are created
        const PRECOMPILE = 1 << 1;
        /// Wait for every submission to retire before returning from flush
        const SYNC = 1 << 2;
    }
}

impl DebugFlags {
    /// Parse a comma-separated flag list (`"trace,sync"`)
    ///
    /// Unknown names are logged and ignored.
    pub fn parse(list: &str) -> Self {
        let mut flags = DebugFlags::empty();

        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name.to_ascii_lowercase().as_str() {
                "trace" => flags |= DebugFlags::TRACE,
                "precompile" => flags |= DebugFlags::PRECOMPILE,
                "sync" => flags |= DebugFlags::SYNC,
                other => pan_warn!("pan::Config", "Unknown debug flag '{}' ignored", other),
            }
        }

        flags
    }
}

/// Parameters a context is created with
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Size of the growable per-batch tiler heap, in bytes
    pub tiler_heap_size: u64,

    /// Size of the per-batch dummy polygon list used by geometry-less draws
    pub tiler_dummy_size: u64,

    /// Size of each transient upload slab, in bytes
    pub transient_slab_size: u64,

    /// Upper bound on variants per shader program
    pub max_shader_variants: usize,

    /// Debug switches
    pub debug: DebugFlags,

    /// Override the topologies drawn natively (defaults from the GPU quirks)
    pub draw_modes: Option<DrawModes>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            tiler_heap_size: 16 * 1024 * 1024,
            tiler_dummy_size: 4096,
            transient_slab_size: 64 * 1024,
            max_shader_variants: 1024,
            debug: DebugFlags::empty(),
            draw_modes: None,
        }
    }
}

impl ContextConfig {
    /// Default configuration with debug flags read from `PAN_MESA_DEBUG`
    pub fn from_env() -> Self {
        let debug = std::env::var("PAN_MESA_DEBUG")
            .map(|v| DebugFlags::parse(&v))
            .unwrap_or_default();

        Self { debug, ..Self::default() }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
