use super::cancel::CancelToken;
use super::error::PoolError;
use super::progress::{ProgressSnapshot, ProgressTracker};
use super::task::Task;
use super::worker::{Worker, WorkerExit, WorkerReport};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Outcome written to the completion signal of [`WorkerPool::run_with_completion`]
pub type RunOutcome = Result<RunSummary, PoolError>;

/// Fixed-size group of workers draining one shared [`Task`]
pub struct WorkerPool<T> {
    worker_count: usize,
    task: Task<T>,
    progress: Option<Arc<ProgressTracker>>,
    cancel: CancelToken,
}

/// Totals of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub workers: usize,
    pub processed: usize,
    pub failed: usize,
    /// True when at least one worker stopped on cancellation
    pub canceled: bool,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub progress: Option<ProgressSnapshot>,
    pub reports: Vec<WorkerReport>,
}

fn as_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new(worker_count: usize, task: Task<T>) -> Self {
        Self {
            worker_count,
            task,
            progress: None,
            cancel: CancelToken::new(),
        }
    }

    /// Attach a tracker updated after every executed item
    pub fn with_progress(mut self, progress: Arc<ProgressTracker>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Token that cancels this pool's run when triggered
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Spawn the workers and block until every one of them has exited
    ///
    /// The run ends once the producer closes the input and the queue is
    /// drained, or once the cancel token fires. A producer that never closes
    /// the input keeps this call blocked forever.
    ///
    /// Item failures are counted and logged, they never stop a worker. A
    /// panic inside `execute` ends only the worker that ran it; the run then
    /// returns [`PoolError::WorkerPanicked`] after the others have drained.
    pub fn run(self) -> Result<RunSummary, PoolError> {
        if self.worker_count == 0 {
            return Err(PoolError::InvalidWorkerCount);
        }

        let WorkerPool {
            worker_count,
            task,
            progress,
            cancel,
        } = self;
        let started = Instant::now();
        tracing::debug!(workers = worker_count, "Starting worker pool");

        let (reports, panicked, spawn_error) = crossbeam::thread::scope(|s| {
            let mut handles = Vec::with_capacity(worker_count);
            let mut spawn_error = None;

            for id in 0..worker_count {
                let worker = Worker::new(id, task.clone(), progress.clone(), cancel.clone());
                match s
                    .builder()
                    .name(format!("drainpool-worker-{id}"))
                    .spawn(move |_| worker.work())
                {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        tracing::error!(worker = id, "Failed to spawn worker: {e}");
                        // Let the workers already running stop between items
                        cancel.cancel();
                        spawn_error = Some(e);
                        break;
                    }
                }
            }

            // Join barrier
            let mut reports = Vec::with_capacity(handles.len());
            let mut panicked = 0;
            for handle in handles {
                match handle.join() {
                    Ok(report) => reports.push(report),
                    Err(_) => panicked += 1,
                }
            }
            (reports, panicked, spawn_error)
        })
        .map_err(|_| PoolError::WorkerPanicked { count: 1 })?;

        let canceled = reports.iter().any(|r| r.exit == WorkerExit::Canceled);
        let stopped_early = canceled || panicked > 0 || spawn_error.is_some();

        let progress = match progress {
            Some(tracker) if stopped_early => Some(tracker.abandon()),
            Some(tracker) => Some(tracker.finalize()?),
            None => None,
        };

        if let Some(e) = spawn_error {
            return Err(PoolError::Spawn(e));
        }
        if panicked > 0 {
            tracing::error!(panicked, "Worker(s) panicked during the run");
            return Err(PoolError::WorkerPanicked { count: panicked });
        }

        let summary = RunSummary {
            workers: worker_count,
            processed: reports.iter().map(|r| r.processed).sum(),
            failed: reports.iter().map(|r| r.failed).sum(),
            canceled,
            elapsed: started.elapsed(),
            progress,
            reports,
        };
        tracing::debug!(
            processed = summary.processed,
            failed = summary.failed,
            canceled,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Worker pool finished"
        );
        Ok(summary)
    }

    /// Like [`run`](Self::run), then write the outcome to `done` exactly once
    ///
    /// The signal fires after every worker has joined and after progress
    /// finalization. A dropped receiver is not an error.
    pub fn run_with_completion(self, done: oneshot::Sender<RunOutcome>) {
        let outcome = self.run();
        if done.send(outcome).is_err() {
            tracing::debug!("Completion receiver dropped before the run finished");
        }
    }
}
