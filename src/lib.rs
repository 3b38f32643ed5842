//! # drainpool
//!
//! A bounded worker pool: a fixed number of threads drain one shared queue,
//! applying a caller-supplied function to every item, with optional
//! thread-safe progress tracking rendered as log lines or a live bar.
//!
//! ## Features
//!
//! - **Exactly-once delivery**: every item sent before the queue closes is
//!   executed by one worker, once
//! - **Join barrier**: a run returns (or signals completion) only after every
//!   worker has exited
//! - **Guarded progress**: one mutex per run, never held while an item executes
//! - **Cooperative cancellation**: checked between items
//!
//! ## Quick Start
//!
//! ```bash
//! # 200 items, 50 workers, a log line every 5 items
//! drainpool run
//!
//! # Live progress bar, 500 items
//! drainpool run --items 500 --progress bar
//! ```

pub mod cli;
pub mod config;
pub mod pool;

pub use cli::{Cli, Output};
pub use config::DrainpoolConfig;
pub use pool::{PoolError, ProgressTracker, RunSummary, Task, WorkerPool};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
