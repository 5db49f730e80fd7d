//! Unit tests for sampler.rs

use super::*;
use crate::device::mock_device::MockBoAllocator;

#[test]
fn test_sampler_filter_bits() {
    let nearest = SamplerObject::new(&SamplerState::default(), Quirks::HAS_SWIZZLES);
    assert_eq!(nearest.hw.filter_mode & 0b11, 0b11);

    let linear = SamplerObject::new(
        &SamplerState { min_filter: Filter::Linear, mag_filter: Filter::Linear, ..Default::default() },
        Quirks::HAS_SWIZZLES,
    );
    assert_eq!(linear.hw.filter_mode & 0b11, 0);
}

#[test]
fn test_sampler_lod_without_mipmaps_is_clamped_to_min() {
    let state = SamplerState { min_lod: 2.0, max_lod: 8.0, ..Default::default() };
    let sampler = SamplerObject::new(&state, Quirks::HAS_SWIZZLES);
    assert_eq!(sampler.hw.min_lod, 512);
    assert_eq!(sampler.hw.max_lod, 512);

    let mipmapped = SamplerObject::new(
        &SamplerState { mip_filter: Some(Filter::Nearest), ..state },
        Quirks::HAS_SWIZZLES,
    );
    assert_eq!(mipmapped.hw.max_lod, 8 * 256);
}

#[test]
fn test_sampler_wrap_packing() {
    let state = SamplerState {
        wrap: [WrapMode::ClampToEdge, WrapMode::Repeat, WrapMode::MirroredRepeat],
        ..Default::default()
    };
    let sampler = SamplerObject::new(&state, Quirks::IS_BIFROST);
    assert_eq!(sampler.hw.wrap, 0x9 | 0x8 << 4 | 0xC << 8);
    assert_ne!(sampler.hw.filter_mode & (1 << 8), 0);
}

#[test]
fn test_sampler_view_writes_descriptor() {
    let allocator = MockBoAllocator::new();
    let texture = allocator
        .create_bo(BoDesc { size: 64 * 64 * 4, flags: BoFlags::empty(), label: "texture" })
        .unwrap();

    let view = SamplerView::new(
        &allocator,
        texture.clone(),
        SamplerViewDesc {
            format: PipeFormat::R8G8B8A8_UNORM,
            width: 64,
            height: 32,
            depth: 1,
            array_size: 1,
            first_level: 0,
            last_level: 3,
            swizzle: [Channel::R, Channel::G, Channel::B, Channel::A],
        },
    )
    .unwrap();

    let mut bytes = [0u8; std::mem::size_of::<TextureDescriptor>()];
    view.bo.read(0, &mut bytes).unwrap();
    let record: TextureDescriptor = bytemuck::pod_read_unaligned(&bytes);

    assert_eq!(record.width, 63);
    assert_eq!(record.height, 31);
    assert_eq!(record.levels, 3);
    assert_eq!(record.payload, texture.gpu_address());
}
