//! Error types for the draw core
//!
//! Only collaborator failures (allocation, compilation, submission) travel
//! through `Result`. API contract violations panic at the call site.

use std::fmt;

/// Result type for draw core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Draw core errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (kernel driver, BO mapping, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (BO range, unknown handle reached a collaborator, etc.)
    InvalidResource(String),

    /// The shader compiler rejected a program variant
    CompileFailed(String),

    /// The kernel refused a batch
    SubmitFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::CompileFailed(msg) => write!(f, "Shader compilation failed: {}", msg),
            Error::SubmitFailed(msg) => write!(f, "Batch submission failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
