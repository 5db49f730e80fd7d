/// Framebuffer state and the key batches are looked up by

use std::sync::Arc;
use crate::device::{Bo, Quirks};
use crate::format::{format_class_load, FormatClass, PipeFormat};

/// Maximum number of colour buffers
pub const MAX_COLOR_BUFS: usize = 8;

/// One attachment
#[derive(Debug, Clone)]
pub struct Surface {
    pub format: PipeFormat,
    pub bo: Arc<dyn Bo>,
}

/// Bound render targets
#[derive(Debug, Clone, Default)]
pub struct FramebufferState {
    pub width: u32,
    pub height: u32,
    pub samples: u32,
    pub cbufs: Vec<Option<Surface>>,
    pub zsbuf: Option<Surface>,
}

/// Identity of a framebuffer (size and attachment addresses)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FramebufferKey {
    pub width: u32,
    pub height: u32,
    pub cbufs: Vec<Option<u64>>,
    pub zsbuf: Option<u64>,
}

impl FramebufferState {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, samples: 1, cbufs: Vec::new(), zsbuf: None }
    }

    /// Builder: attach a colour buffer at the next slot
    pub fn with_cbuf(mut self, surface: Option<Surface>) -> Self {
        assert!(self.cbufs.len() < MAX_COLOR_BUFS, "too many colour buffers");
        self.cbufs.push(surface);
        self
    }

    pub fn with_zsbuf(mut self, surface: Surface) -> Self {
        self.zsbuf = Some(surface);
        self
    }

    pub fn key(&self) -> FramebufferKey {
        FramebufferKey {
            width: self.width,
            height: self.height,
            cbufs: self
                .cbufs
                .iter()
                .map(|s| s.as_ref().map(|s| s.bo.gpu_address()))
                .collect(),
            zsbuf: self.zsbuf.as_ref().map(|s| s.bo.gpu_address()),
        }
    }

    /// Format a shader reading render target `rt` has to be compiled for
    ///
    /// Empty slots read back as RGBA8. `None` means the hardware converts
    /// the format itself, so the shader does not depend on it.
    pub fn rt_format_for_shader(&self, rt: usize, quirks: Quirks) -> Option<PipeFormat> {
        let format = self
            .cbufs
            .get(rt)
            .and_then(|s| s.as_ref())
            .map(|s| s.format)
            .unwrap_or(PipeFormat::R8G8B8A8_UNORM);

        match format_class_load(format, quirks) {
            FormatClass::Native => None,
            FormatClass::Pack | FormatClass::Software => Some(format),
        }
    }

    /// Every BO attached to the framebuffer
    pub fn bos(&self) -> impl Iterator<Item = &Arc<dyn Bo>> + '_ {
        self.cbufs
            .iter()
            .flatten()
            .chain(self.zsbuf.iter())
            .map(|s| &s.bo)
    }
}

#[cfg(test)]
#[path = "framebuffer_tests.rs"]
mod tests;
