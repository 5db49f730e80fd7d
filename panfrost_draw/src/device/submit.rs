/// Kernel submission collaborator

use std::sync::Arc;
use std::time::Duration;
use crate::batch::Batch;
use crate::error::Result;

/// Synchronization object signalled when a submission retires
pub trait Fence: Send + Sync {
    /// Block until signalled; `None` waits without bound. Returns `false` on timeout.
    fn wait(&self, timeout: Option<Duration>) -> bool;

    /// Non-blocking check
    fn is_signalled(&self) -> bool;
}

/// Hands finished batches to the kernel
pub trait Submitter: Send + Sync {
    /// Create an unsignalled fence that a later submission will signal
    fn create_fence(&self) -> Result<Arc<dyn Fence>>;

    /// Submit every job of the batch; `out_fence` is signalled when it retires
    fn submit(&self, batch: &Batch, out_fence: Option<&Arc<dyn Fence>>) -> Result<()>;
}
