//! Pipe formats and their hardware translation
//!
//! Covers the formats the draw path needs to reason about: vertex attribute
//! formats (hardware format + swizzle) and colour buffer formats (how the
//! tile buffer can load them back for framebuffer fetch).

use crate::device::Quirks;

/// API-level format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum PipeFormat {
    // Colour buffer formats
    R8G8B8A8_UNORM,
    B8G8R8A8_UNORM,
    R8G8B8A8_SRGB,
    R5G6B5_UNORM,
    R10G10B10A2_UNORM,
    R11G11B10_FLOAT,
    R16G16B16A16_FLOAT,
    R8G8B8A8_UINT,

    // Vertex formats
    R32_FLOAT,
    R32G32_FLOAT,
    R32G32B32_FLOAT,
    R32G32B32A32_FLOAT,
    R32_UINT,
    R16G16_SNORM,

    // Depth/stencil
    Z24_UNORM_S8_UINT,
}

/// Hardware channel selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Channel {
    R = 0,
    G = 1,
    B = 2,
    A = 3,
    Zero = 4,
    One = 5,
}

/// Hardware (Mali) data format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(non_camel_case_types)]
pub enum MaliFormat {
    RGBA8_UNORM = 0x97,
    RGBA8_SRGB = 0x98,
    RGB565 = 0x40,
    RGB10_A2_UNORM = 0x41,
    R11F_G11F_B10F = 0x42,
    RGBA16F = 0x8E,
    RGBA8UI = 0xA7,
    R16F = 0x84,
    R32F = 0x88,
    RG32F = 0x89,
    RGB32F = 0x8A,
    RGBA32F = 0x8B,
    R32UI = 0xA4,
    RG16_SNORM = 0x5D,
    Z24X8_UNORM = 0x65,
}

/// How the tile buffer loads a colour format back into a shader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatClass {
    /// The hardware unpacks it; shaders do not depend on the format
    Native,
    /// The shader packs/unpacks the raw tile buffer bits itself
    Pack,
    /// Not loadable from the tile buffer
    Software,
}

/// Static description of one format
#[derive(Debug, Clone, Copy)]
pub struct FormatDesc {
    pub channels: u32,
    pub swizzle: [Channel; 4],
    pub hw: MaliFormat,
}

const XYZW: [Channel; 4] = [Channel::R, Channel::G, Channel::B, Channel::A];
const XYZ1: [Channel; 4] = [Channel::R, Channel::G, Channel::B, Channel::One];
const XY01: [Channel; 4] = [Channel::R, Channel::G, Channel::Zero, Channel::One];
const X001: [Channel; 4] = [Channel::R, Channel::Zero, Channel::Zero, Channel::One];

impl PipeFormat {
    /// Static description (channel count, swizzle, hardware format)
    pub fn desc(self) -> FormatDesc {
        let (channels, swizzle, hw) = match self {
            PipeFormat::R8G8B8A8_UNORM => (4, XYZW, MaliFormat::RGBA8_UNORM),
            PipeFormat::B8G8R8A8_UNORM => {
                (4, [Channel::B, Channel::G, Channel::R, Channel::A], MaliFormat::RGBA8_UNORM)
            }
            PipeFormat::R8G8B8A8_SRGB => (4, XYZW, MaliFormat::RGBA8_SRGB),
            PipeFormat::R5G6B5_UNORM => (3, XYZ1, MaliFormat::RGB565),
            PipeFormat::R10G10B10A2_UNORM => (4, XYZW, MaliFormat::RGB10_A2_UNORM),
            PipeFormat::R11G11B10_FLOAT => (3, XYZ1, MaliFormat::R11F_G11F_B10F),
            PipeFormat::R16G16B16A16_FLOAT => (4, XYZW, MaliFormat::RGBA16F),
            PipeFormat::R8G8B8A8_UINT => (4, XYZW, MaliFormat::RGBA8UI),
            PipeFormat::R32_FLOAT => (1, X001, MaliFormat::R32F),
            PipeFormat::R32G32_FLOAT => (2, XY01, MaliFormat::RG32F),
            PipeFormat::R32G32B32_FLOAT => (3, XYZ1, MaliFormat::RGB32F),
            PipeFormat::R32G32B32A32_FLOAT => (4, XYZW, MaliFormat::RGBA32F),
            PipeFormat::R32_UINT => (1, X001, MaliFormat::R32UI),
            PipeFormat::R16G16_SNORM => (2, XY01, MaliFormat::RG16_SNORM),
            PipeFormat::Z24_UNORM_S8_UINT => (2, XY01, MaliFormat::Z24X8_UNORM),
        };
        FormatDesc { channels, swizzle, hw }
    }

    /// Size of one element in bytes
    pub fn block_size(self) -> u32 {
        match self {
            PipeFormat::R5G6B5_UNORM => 2,
            PipeFormat::R16G16B16A16_FLOAT | PipeFormat::R32G32_FLOAT => 8,
            PipeFormat::R32G32B32_FLOAT => 12,
            PipeFormat::R32G32B32A32_FLOAT => 16,
            _ => 4,
        }
    }
}

/// Classify how a colour format is loaded back from the tile buffer
pub fn format_class_load(format: PipeFormat, quirks: Quirks) -> FormatClass {
    match format {
        PipeFormat::R8G8B8A8_UNORM | PipeFormat::B8G8R8A8_UNORM => FormatClass::Native,
        PipeFormat::R16G16B16A16_FLOAT if quirks.contains(Quirks::IS_BIFROST) => FormatClass::Native,
        PipeFormat::Z24_UNORM_S8_UINT => FormatClass::Software,
        _ => FormatClass::Pack,
    }
}

/// Pack a 4-channel swizzle into the 12-bit hardware encoding
pub fn translate_swizzle_4(swizzle: [Channel; 4]) -> u32 {
    swizzle
        .iter()
        .enumerate()
        .fold(0, |acc, (i, c)| acc | ((*c as u32) << (3 * i)))
}

/// Identity swizzle for `channels` components, zero-filled with alpha = 1
pub fn default_swizzle(channels: u32) -> u32 {
    let swizzle = match channels {
        1 => X001,
        2 => XY01,
        3 => XYZ1,
        _ => XYZW,
    };
    translate_swizzle_4(swizzle)
}

/// Attribute swizzle for a vertex format, honouring the swizzle quirk
pub fn attribute_swizzle(format: PipeFormat, quirks: Quirks) -> u32 {
    let desc = format.desc();
    if quirks.contains(Quirks::HAS_SWIZZLES) {
        translate_swizzle_4(desc.swizzle)
    } else {
        default_swizzle(desc.channels)
    }
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
