/// Draw module - draw requests, fallbacks, descriptor emission and dispatch

pub mod draw_request;
pub mod fallback;
pub mod emit;
pub mod dispatcher;

pub use draw_request::*;
pub use fallback::*;
pub use emit::*;
pub use dispatcher::*;
