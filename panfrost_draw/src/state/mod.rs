/// Pipeline state objects and bindings
///
/// These are plain descriptions copied in by the state tracker. Translation
/// to hardware words happens once, when the object is created.

pub mod rasterizer;
pub mod framebuffer;
pub mod vertex;
pub mod depth_stencil;
pub mod sampler;
pub mod constant_buffer;
pub mod streamout;

pub use rasterizer::*;
pub use framebuffer::*;
pub use vertex::*;
pub use depth_stencil::*;
pub use sampler::*;
pub use constant_buffer::*;
pub use streamout::*;
