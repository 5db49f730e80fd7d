/// Rasterizer, viewport and scissor state

use glam::Vec3;

/// Origin of point-sprite texture coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpriteCoordMode {
    #[default]
    UpperLeft,
    LowerLeft,
}

/// Rasterizer state object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerState {
    pub scissor: bool,
    pub flatshade: bool,
    /// Provoking vertex is the first one rather than the last
    pub flatshade_first: bool,
    pub multisample: bool,
    pub rasterizer_discard: bool,
    pub front_ccw: bool,
    pub cull_front: bool,
    pub cull_back: bool,
    /// Generic varyings replaced by point-sprite coordinates, one bit each
    pub sprite_coord_enable: u16,
    pub sprite_coord_mode: SpriteCoordMode,
    pub point_size: f32,
    pub line_width: f32,
    /// Must stay 0; polygon offset clamping is not exposed
    pub offset_clamp: f32,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            scissor: false,
            flatshade: false,
            flatshade_first: false,
            multisample: false,
            rasterizer_discard: false,
            front_ccw: false,
            cull_front: false,
            cull_back: false,
            sprite_coord_enable: 0,
            sprite_coord_mode: SpriteCoordMode::UpperLeft,
            point_size: 1.0,
            line_width: 1.0,
            offset_clamp: 0.0,
        }
    }
}

/// Scissor rectangle, max exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScissorState {
    pub minx: u16,
    pub miny: u16,
    pub maxx: u16,
    pub maxy: u16,
}

impl ScissorState {
    pub fn is_empty(&self) -> bool {
        self.minx == self.maxx || self.miny == self.maxy
    }
}

/// Viewport transform (NDC to window coordinates)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub scale: Vec3,
    pub translate: Vec3,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self { scale: Vec3::ONE, translate: Vec3::ZERO }
    }
}

impl ViewportState {
    /// Viewport covering `width` x `height` pixels with depth range [0, 1]
    pub fn for_size(width: f32, height: f32) -> Self {
        Self {
            scale: Vec3::new(width * 0.5, height * 0.5, 0.5),
            translate: Vec3::new(width * 0.5, height * 0.5, 0.5),
        }
    }

    /// Window-space corners `(min, max)` of the viewport box
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let extent = self.scale.abs();
        (self.translate - extent, self.translate + extent)
    }
}

#[cfg(test)]
#[path = "rasterizer_tests.rs"]
mod tests;
