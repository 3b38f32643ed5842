//! Bounded worker pool draining a shared queue
//!
//! A fixed number of workers consume one shared input queue until the
//! producer closes it, applying the task's execute function to every item.
//! Completed items can be counted by a [`ProgressTracker`] that renders
//! through log lines or a live bar.
//!
//! # Data flow
//!
//! ```text
//! ┌───────────┐    ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐
//! │ Producer  │───▶│ shared queue │───▶│ N workers    │───▶│ ProgressTracker  │
//! │ (caller)  │    │ (crossbeam)  │    │ execute(item)│    │ (mutex + sinks)  │
//! └───────────┘    └──────────────┘    └──────────────┘    └──────────────────┘
//!                                              │
//!                                              ▼
//!                                     join barrier → RunSummary / completion signal
//! ```
//!
//! # Guarantees
//! - Every item sent before the queue is closed is executed by exactly one
//!   worker, exactly once.
//! - No ordering across workers. With a single worker items run in
//!   submission order.
//! - `run` returns only after every worker has exited.
//!
//! # Contract for callers
//! - The producer must close the queue (or drop its [`Producer`]); otherwise
//!   `run` never returns. There is no internal timeout.
//! - The execute function may be called concurrently from several workers.
//!
//! # Example
//!
//! ```rust
//! use drainpool::pool::{self, ProgressTracker, Task, WorkerPool};
//! use std::sync::Arc;
//!
//! let (producer, input) = pool::channel();
//! let task = Task::infallible(input, |n: u64| {
//!     let _ = n * 2;
//! });
//! let tracker = Arc::new(ProgressTracker::silent(100));
//! let workers = WorkerPool::new(8, task).with_progress(tracker.clone());
//!
//! for n in 0..100 {
//!     producer.send(n).unwrap();
//! }
//! producer.close();
//!
//! let summary = workers.run().unwrap();
//! assert_eq!(summary.processed, 100);
//! assert_eq!(tracker.processed(), 100);
//! ```

pub mod cancel;
pub mod core;
pub mod error;
pub mod progress;
pub mod task;
pub mod worker;

// Re-export main types for easier access
pub use cancel::CancelToken;
pub use self::core::{RunOutcome, RunSummary, WorkerPool};
pub use error::PoolError;
pub use progress::{
    BarSink, LogSink, ProgressMode, ProgressSink, ProgressSnapshot, ProgressTracker,
    ProgressUpdate, UpdateKind,
};
pub use task::{ExecuteFn, Producer, Task, bounded_channel, channel};
pub use worker::{WorkerExit, WorkerReport};
