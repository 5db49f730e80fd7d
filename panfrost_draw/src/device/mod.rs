/// Device module - hardware description and external collaborator traits
///
/// The draw core never talks to the kernel or the compiler directly. Every
/// side effect goes through one of the traits declared here.

pub mod quirks;
pub mod bo;
pub mod compiler;
pub mod submit;

pub use quirks::*;
pub use bo::*;
pub use compiler::*;
pub use submit::*;

// Mock collaborators for tests (no GPU required)
#[cfg(test)]
pub mod mock_device;
