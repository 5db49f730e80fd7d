//! Unit tests for tiler.rs

use super::*;
use crate::device::mock_device::MockBoAllocator;
use crate::state::FramebufferKey;

fn batch(width: u32, height: u32) -> Batch {
    Batch::new(FramebufferKey { width, height, ..Default::default() }, 4096)
}

const FLAT: Quirks = Quirks::MIDGARD_NO_HIER_TILING;

// ============================================================================
// Masks and sizes
// ============================================================================

#[test]
fn test_no_geometry_needs_no_levels() {
    assert_eq!(choose_hierarchy_mask(1920, 1080, 0, true), 0);
    assert_eq!(choose_hierarchy_mask(1920, 1080, 0, false), 0);
}

#[test]
fn test_hierarchical_enables_every_level() {
    assert_eq!(choose_hierarchy_mask(64, 64, 3, true), 0xFF);
}

#[test]
fn test_flat_tile_size_grows_with_framebuffer() {
    // 64x64 fits in 16px tiles: log2(16 / 8) = 1
    assert_eq!(choose_hierarchy_mask(64, 64, 3, false), (1 << 6) | 1);
    // 1080p needs 32px tiles to stay under 4096 of them
    assert_eq!(choose_hierarchy_mask(1920, 1080, 3, false), (2 << 6) | 2);
}

#[test]
fn test_sizes_are_aligned() {
    for (w, h) in [(1, 1), (64, 64), (800, 600), (1920, 1080)] {
        for hierarchy in [true, false] {
            let mask = choose_hierarchy_mask(w, h, 1, hierarchy);
            assert_eq!(tiler_header_size(w, h, mask, hierarchy) % 0x200, 0);
            assert_eq!(tiler_full_size(w, h, mask, hierarchy) % 0x200, 0);
        }
    }
}

#[test]
fn test_header_size_small_framebuffer() {
    // Prologue plus 16 + 4 + 1 + 5 tiles, 8 bytes each, rounds up to one block
    assert_eq!(tiler_header_size(64, 64, 0xFF, true), 0x200);
    assert!(tiler_full_size(64, 64, 0xFF, true) > tiler_header_size(64, 64, 0xFF, true));
}

// ============================================================================
// Descriptors
// ============================================================================

#[test]
fn test_geometry_uses_heap_and_polygon_list() {
    let allocator = MockBoAllocator::new();
    let config = ContextConfig::default();
    let mut b = batch(64, 64);

    let t = build_tiler_descriptor(&mut b, &allocator, Quirks::empty(), &config, 3).unwrap();

    let heap = allocator.find(t.heap_start).unwrap();
    assert_eq!(heap.label, "tiler heap");
    assert_eq!(t.heap_start, heap.gpu);
    assert_eq!(t.heap_end, heap.gpu + config.tiler_heap_size);
    assert_eq!(t.hierarchy_mask, 0xFF);

    let header = tiler_header_size(64, 64, 0xFF, true);
    assert_eq!(t.polygon_list_size as u64, tiler_full_size(64, 64, 0xFF, true));
    assert_eq!(t.polygon_list_body, t.polygon_list + header);
    assert_eq!(allocator.find(t.polygon_list).unwrap().size, header + t.polygon_list_size as u64);

    assert!(b.has_bo(t.heap_start));
    assert!(b.has_bo(t.polygon_list));
}

#[test]
fn test_heap_reused_across_draws() {
    let allocator = MockBoAllocator::new();
    let config = ContextConfig::default();
    let mut b = batch(64, 64);

    let first = build_tiler_descriptor(&mut b, &allocator, Quirks::empty(), &config, 3).unwrap();
    let created = allocator.created_count();
    let second = build_tiler_descriptor(&mut b, &allocator, Quirks::empty(), &config, 6).unwrap();

    assert_eq!(allocator.created_count(), created);
    assert_eq!(first.heap_start, second.heap_start);
    assert_eq!(first.polygon_list, second.polygon_list);
}

#[test]
fn test_no_geometry_hierarchical_disables_tiler() {
    let allocator = MockBoAllocator::new();
    let config = ContextConfig::default();
    let mut b = batch(64, 64);

    let t = build_tiler_descriptor(&mut b, &allocator, Quirks::empty(), &config, 0).unwrap();

    assert_eq!(t.hierarchy_mask, TILER_DISABLED);
    assert_eq!(t.heap_start, t.heap_end);
    assert_eq!(t.polygon_list, t.heap_start);
    assert_eq!(t.polygon_list_body, t.polygon_list + TILER_MINIMUM_HEADER_SIZE);
    assert_eq!(allocator.find(t.polygon_list).unwrap().label, "tiler dummy");
    assert!(allocator.live_labels().iter().all(|l| *l != "tiler heap"));
}

#[test]
fn test_no_geometry_flat_writes_sentinel() {
    let allocator = MockBoAllocator::new();
    let config = ContextConfig::default();
    let mut b = batch(1920, 1080);

    let t = build_tiler_descriptor(&mut b, &allocator, FLAT, &config, 0).unwrap();

    assert_eq!(t.hierarchy_mask, TILER_USER);
    assert_eq!(t.polygon_list_size as u64, TILER_MINIMUM_HEADER_SIZE + 4);
    assert_eq!(t.heap_start, t.heap_end);
    assert_eq!(t.polygon_list_body, t.polygon_list + TILER_MINIMUM_HEADER_SIZE);

    let dummy = allocator.find(t.polygon_list).unwrap();
    assert_eq!(dummy.read_u32(t.polygon_list_body - dummy.gpu), POLYGON_LIST_SENTINEL);
}

#[test]
fn test_allocation_failure_propagates() {
    let allocator = MockBoAllocator::new();
    allocator.set_fail(true);
    let mut b = batch(64, 64);

    assert!(build_tiler_descriptor(&mut b, &allocator, Quirks::empty(), &ContextConfig::default(), 3).is_err());
}
