//! Error types surfaced by the worker pool

use thiserror::Error;

/// Errors returned by [`WorkerPool`](super::WorkerPool) runs and the progress tracker
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool was configured with zero workers
    #[error("worker count must be at least 1")]
    InvalidWorkerCount,

    /// The OS refused to start a worker thread
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// One or more workers panicked while executing an item
    #[error("{count} worker(s) panicked during the run")]
    WorkerPanicked { count: usize },

    /// The final count does not match the number of items expected
    #[error("progress mismatch: expected {expected} items, saw {processed} processed and {failed} failed")]
    ProgressMismatch {
        expected: usize,
        processed: usize,
        failed: usize,
    },

    /// More items were counted than were expected
    #[error("progress overrun: expected {expected} items, counted {observed}")]
    ProgressOverrun { expected: usize, observed: usize },

    /// `finalize` was called twice on the same tracker
    #[error("progress tracker already finalized")]
    AlreadyFinalized,

    /// Every consumer of the input queue is gone
    #[error("input queue has no remaining consumers")]
    Closed,
}
