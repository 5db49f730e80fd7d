/// Batch module - per-framebuffer job chains and the memory they reference

pub mod descriptors;
pub mod transient;
pub mod batch;

pub use descriptors::*;
pub use transient::*;
pub use batch::*;
