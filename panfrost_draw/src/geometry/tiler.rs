/// Tiler descriptor construction
///
/// The tiler bins primitives into screen tiles, either at several tile
/// sizes at once (hierarchical tiling) or at one size picked from the
/// framebuffer dimensions. Its memory comes from per-batch BOs.

use crate::batch::{align_up, Batch, TilerDescriptorPacked};
use crate::config::ContextConfig;
use crate::device::{BoAllocator, Quirks};
use crate::error::Result;

/// Smallest tile: 16x16 pixels
pub const MIN_TILE_SHIFT: u32 = 4;

/// Largest tile: 2048x2048 pixels
pub const MAX_TILE_SHIFT: u32 = 11;

/// Hierarchy levels, one mask bit each
pub const HIERARCHY_LEVELS: u32 = MAX_TILE_SHIFT - MIN_TILE_SHIFT + 1;

pub const HEADER_BYTES_PER_TILE: u64 = 0x8;
pub const FULL_BYTES_PER_TILE: u64 = 0x200;

/// Tiles' worth of space reserved before the first level
const PROLOGUE_TILES: u64 = 4;

const POLYGON_LIST_ALIGN: u64 = 0x200;

/// Flat mode picks the smallest tile that keeps the count under this
const FLAT_MAX_TILES: u64 = 4096;

pub const TILER_MINIMUM_HEADER_SIZE: u64 = 0x200;

/// Hierarchy mask bit turning the tiler off
pub const TILER_DISABLED: u16 = 1 << 12;

/// Hierarchy mask for a user-provided, single-level polygon list
pub const TILER_USER: u16 = 0xFFF;

/// Word the polygon list body must hold when a flat tiler sees no geometry
pub const POLYGON_LIST_SENTINEL: u32 = 0xa000_0000;

fn tile_count(width: u32, height: u32, tile_w: u32, tile_h: u32) -> u64 {
    width.div_ceil(tile_w) as u64 * height.div_ceil(tile_h) as u64
}

/// Tiler levels to enable for a draw
///
/// No geometry needs no levels. Hierarchical tilers get every level;
/// otherwise the mask encodes one square tile size as
/// `log2(size / 8)` in bits 0..2 and again in bits 6..8.
pub fn choose_hierarchy_mask(width: u32, height: u32, vertex_count: u32, hierarchy: bool) -> u16 {
    if vertex_count == 0 {
        return 0;
    }

    if hierarchy {
        return ((1u32 << HIERARCHY_LEVELS) - 1) as u16;
    }

    let mut shift = MIN_TILE_SHIFT;
    while shift < MAX_TILE_SHIFT && tile_count(width, height, 1 << shift, 1 << shift) > FLAT_MAX_TILES {
        shift += 1;
    }

    let level = (shift - 3) as u16;
    (level << 6) | level
}

fn segment_size(width: u32, height: u32, mask: u16, hierarchy: bool, bytes_per_tile: u64) -> u64 {
    let mut size = PROLOGUE_TILES * bytes_per_tile;

    if hierarchy {
        for level in (0..HIERARCHY_LEVELS).filter(|l| mask & (1 << l) != 0) {
            let tile = 1 << (MIN_TILE_SHIFT + level);
            size += tile_count(width, height, tile, tile) * bytes_per_tile;
        }
    } else {
        let tile_w = 8 << (mask & 0x7);
        let tile_h = 8 << ((mask >> 6) & 0x7);
        size += tile_count(width, height, tile_w, tile_h) * bytes_per_tile;
    }

    align_up(size, POLYGON_LIST_ALIGN)
}

/// Bytes of polygon list header for the given levels
pub fn tiler_header_size(width: u32, height: u32, mask: u16, hierarchy: bool) -> u64 {
    segment_size(width, height, mask, hierarchy, HEADER_BYTES_PER_TILE)
}

/// Bytes of polygon list body for the given levels
pub fn tiler_full_size(width: u32, height: u32, mask: u16, hierarchy: bool) -> u64 {
    segment_size(width, height, mask, hierarchy, FULL_BYTES_PER_TILE)
}

/// Build the tiler descriptor of one draw into `batch`
///
/// Draws with geometry bin into the batch's tiler heap and polygon list.
/// Geometry-less draws point everything at a small dummy BO and switch
/// the tiler off.
pub fn build_tiler_descriptor(
    batch: &mut Batch,
    allocator: &dyn BoAllocator,
    quirks: Quirks,
    config: &ContextConfig,
    vertex_count: u32,
) -> Result<TilerDescriptorPacked> {
    let (width, height) = (batch.key().width, batch.key().height);
    let hierarchy = !quirks.contains(Quirks::MIDGARD_NO_HIER_TILING);

    let mut t = TilerDescriptorPacked::default();
    t.hierarchy_mask = choose_hierarchy_mask(width, height, vertex_count, hierarchy);

    let mut header_size = tiler_header_size(width, height, t.hierarchy_mask, hierarchy);
    let full_size = tiler_full_size(width, height, t.hierarchy_mask, hierarchy);
    t.polygon_list_size = full_size as u32;

    if vertex_count > 0 {
        let heap = batch.get_tiler_heap(allocator, config.tiler_heap_size)?;
        let polygon_list = batch.get_polygon_list(allocator, header_size + full_size)?;

        t.polygon_list = polygon_list.gpu_address();
        t.heap_start = heap.gpu_address();
        t.heap_end = heap.gpu_address() + heap.size();
    } else {
        let dummy = batch.get_tiler_dummy(allocator, config.tiler_dummy_size)?;
        header_size = TILER_MINIMUM_HEADER_SIZE;

        t.heap_start = dummy.gpu_address();
        t.heap_end = dummy.gpu_address();
        t.polygon_list = dummy.gpu_address();

        if hierarchy {
            t.hierarchy_mask |= TILER_DISABLED;
        } else {
            t.hierarchy_mask = TILER_USER;
            t.polygon_list_size = (TILER_MINIMUM_HEADER_SIZE + 4) as u32;

            // No job type can write this value for us
            dummy.write(header_size, &POLYGON_LIST_SENTINEL.to_le_bytes())?;
        }
    }

    t.polygon_list_body = t.polygon_list + header_size;
    Ok(t)
}

#[cfg(test)]
#[path = "tiler_tests.rs"]
mod tests;
