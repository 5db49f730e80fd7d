/// Geometry module - topologies, invocation packing, attribute fixup and tiling

pub mod primitive;
pub mod work_groups;
pub mod attribute_fixup;
pub mod tiler;

pub use primitive::*;
pub use work_groups::*;
pub use attribute_fixup::*;
pub use tiler::*;
