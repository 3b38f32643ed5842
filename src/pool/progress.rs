//! Thread-safe progress accounting for pool runs
//!
//! A [`ProgressTracker`] owns the completed-item counters behind a single
//! mutex and forwards every update to its [`ProgressSink`]s while that mutex
//! is held, so sinks observe updates strictly in order. Workers only take the
//! lock after `execute` has returned.

use super::error::PoolError;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

static BAR_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} {percent:>3}% (eta {eta}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
});

/// How a run reports its progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    /// Count only, nothing rendered
    Silent,
    /// Emit a log line every N processed items
    #[default]
    Log,
    /// Live progress bar on stderr
    Bar,
}

/// Which counter an update touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Processed,
    Failed,
}

/// One counter change, delivered to sinks under the tracker guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub kind: UpdateKind,
    pub processed: usize,
    pub failed: usize,
    pub total: usize,
    /// Mean execute time over every timed item so far
    pub mean_item_time: Option<Duration>,
}

/// Point-in-time view of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub failed: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    /// Items that finished executing, successfully or not
    pub fn completed(&self) -> usize {
        self.processed + self.failed
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed() as f64 / self.total as f64 * 100.0
        }
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} out of {} processed", self.processed, self.total)?;
        if self.failed > 0 {
            write!(f, " ({} failed)", self.failed)?;
        }
        Ok(())
    }
}

/// Rendering target for progress updates
///
/// Sinks are called with the tracker guard held. Errors are logged and
/// otherwise ignored; a broken display never stops the run.
pub trait ProgressSink: Send + Sync {
    fn record(&self, update: &ProgressUpdate) -> Result<()>;

    /// Called once when the run ends. `completed` is false for canceled or
    /// inconsistent runs.
    fn finish(&self, _snapshot: &ProgressSnapshot, _completed: bool) -> Result<()> {
        Ok(())
    }
}

/// Logs a line through `tracing` at every multiple of `every` processed items
#[derive(Debug, Clone)]
pub struct LogSink {
    every: usize,
}

impl LogSink {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }

    pub fn is_milestone(&self, processed: usize) -> bool {
        processed > 0 && processed % self.every == 0
    }
}

impl ProgressSink for LogSink {
    fn record(&self, update: &ProgressUpdate) -> Result<()> {
        if update.kind == UpdateKind::Processed && self.is_milestone(update.processed) {
            tracing::info!("{} out of {} processed.", update.processed, update.total);
        }
        Ok(())
    }

    fn finish(&self, snapshot: &ProgressSnapshot, completed: bool) -> Result<()> {
        if completed {
            tracing::info!(
                processed = snapshot.processed,
                failed = snapshot.failed,
                "Processing complete"
            );
        } else {
            tracing::warn!(
                processed = snapshot.processed,
                failed = snapshot.failed,
                total = snapshot.total,
                "Processing stopped early"
            );
        }
        Ok(())
    }
}

/// Live indicatif bar advancing once per completed item
///
/// The message shows the mean per-item execute time next to indicatif's own
/// throughput-based ETA.
#[derive(Clone)]
pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    pub fn new(total: usize) -> Self {
        Self::with_target(total, ProgressDrawTarget::stderr())
    }

    /// Bar that renders nowhere; counts are still kept
    pub fn hidden(total: usize) -> Self {
        Self::with_target(total, ProgressDrawTarget::hidden())
    }

    fn with_target(total: usize, target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total as u64), target);
        bar.set_style(BAR_STYLE.clone());
        bar.set_prefix("Processing:");
        Self { bar }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn message(&self) -> String {
        self.bar.message()
    }

    fn render_message(update: &ProgressUpdate) -> Option<String> {
        let mean = update
            .mean_item_time
            .map(|mean| format!("avg {:.1}ms/item", mean.as_secs_f64() * 1000.0));
        let failed = (update.failed > 0).then(|| format!("{} failed", update.failed));
        match (mean, failed) {
            (Some(mean), Some(failed)) => Some(format!("{mean}, {failed}")),
            (mean, failed) => mean.or(failed),
        }
    }
}

impl ProgressSink for BarSink {
    fn record(&self, update: &ProgressUpdate) -> Result<()> {
        self.bar.inc(1);
        if let Some(message) = Self::render_message(update) {
            self.bar.set_message(message);
        }
        Ok(())
    }

    fn finish(&self, _snapshot: &ProgressSnapshot, completed: bool) -> Result<()> {
        if completed {
            self.bar.finish_with_message("Complete");
        } else {
            self.bar.abandon_with_message("Stopped");
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    processed: usize,
    failed: usize,
    overrun: bool,
    finished: bool,
    timed_items: u32,
    busy: Duration,
}

impl ProgressState {
    fn mean_item_time(&self) -> Option<Duration> {
        (self.timed_items > 0).then(|| self.busy / self.timed_items)
    }
}

/// Guarded completion counter shared by every worker of one run
pub struct ProgressTracker {
    total: usize,
    state: Mutex<ProgressState>,
    sinks: Vec<Box<dyn ProgressSink>>,
}

impl ProgressTracker {
    /// Tracker with no sinks
    pub fn new(total: usize) -> Self {
        Self {
            total,
            state: Mutex::new(ProgressState::default()),
            sinks: Vec::new(),
        }
    }

    pub fn with_sink<S: ProgressSink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn silent(total: usize) -> Self {
        Self::new(total)
    }

    pub fn logging(total: usize, every: usize) -> Self {
        Self::new(total).with_sink(LogSink::new(every))
    }

    pub fn bar(total: usize) -> Self {
        Self::new(total).with_sink(BarSink::new(total))
    }

    pub fn for_mode(mode: ProgressMode, total: usize, log_every: usize) -> Self {
        match mode {
            ProgressMode::Silent => Self::silent(total),
            ProgressMode::Log => Self::logging(total, log_every),
            ProgressMode::Bar => Self::bar(total),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn processed(&self) -> usize {
        self.lock().processed
    }

    pub fn failed(&self) -> usize {
        self.lock().failed
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.lock();
        self.snapshot_of(&state)
    }

    /// Count one successfully executed item and return the new processed count
    pub fn increment(&self) -> usize {
        self.count(UpdateKind::Processed, None)
    }

    /// Like [`increment`](Self::increment), folding the item's execute time
    /// into the mean shown by sinks
    pub fn increment_timed(&self, elapsed: Duration) -> usize {
        self.count(UpdateKind::Processed, Some(elapsed))
    }

    /// Count one item whose execute function returned an error
    pub fn record_failure(&self) -> usize {
        self.count(UpdateKind::Failed, None)
    }

    pub fn record_failure_timed(&self, elapsed: Duration) -> usize {
        self.count(UpdateKind::Failed, Some(elapsed))
    }

    /// Mean execute time of the timed items counted so far
    pub fn mean_item_time(&self) -> Option<Duration> {
        self.lock().mean_item_time()
    }

    fn count(&self, kind: UpdateKind, elapsed: Option<Duration>) -> usize {
        let mut state = self.lock();
        if let Some(elapsed) = elapsed {
            state.timed_items = state.timed_items.saturating_add(1);
            state.busy = state.busy.saturating_add(elapsed);
        }
        match kind {
            UpdateKind::Processed => state.processed += 1,
            UpdateKind::Failed => state.failed += 1,
        }
        self.update(&mut state, kind);
        match kind {
            UpdateKind::Processed => state.processed,
            UpdateKind::Failed => state.failed,
        }
    }

    /// Close the sinks after a fully drained run and check the final count
    ///
    /// Fails when the completed count differs from the expected total, or when
    /// the tracker was already finalized.
    pub fn finalize(&self) -> Result<ProgressSnapshot, PoolError> {
        let mut state = self.lock();
        if state.finished {
            return Err(PoolError::AlreadyFinalized);
        }
        state.finished = true;

        let snapshot = self.snapshot_of(&state);
        let observed = snapshot.completed();
        self.finish_sinks(&snapshot, observed == self.total);

        if observed > self.total {
            Err(PoolError::ProgressOverrun {
                expected: self.total,
                observed,
            })
        } else if observed < self.total {
            Err(PoolError::ProgressMismatch {
                expected: self.total,
                processed: snapshot.processed,
                failed: snapshot.failed,
            })
        } else {
            Ok(snapshot)
        }
    }

    /// Close the sinks of a run that stopped before draining
    pub fn abandon(&self) -> ProgressSnapshot {
        let mut state = self.lock();
        let snapshot = self.snapshot_of(&state);
        if !state.finished {
            state.finished = true;
            self.finish_sinks(&snapshot, false);
        }
        snapshot
    }

    fn update(&self, state: &mut ProgressState, kind: UpdateKind) {
        let observed = state.processed + state.failed;
        if observed > self.total && !state.overrun {
            state.overrun = true;
            tracing::error!(
                expected = self.total,
                observed,
                "Progress overrun: more items counted than expected"
            );
        }

        let update = ProgressUpdate {
            kind,
            processed: state.processed,
            failed: state.failed,
            total: self.total,
            mean_item_time: state.mean_item_time(),
        };
        for sink in &self.sinks {
            if let Err(e) = sink.record(&update) {
                tracing::warn!("Progress display failed: {e:#}");
            }
        }
    }

    fn finish_sinks(&self, snapshot: &ProgressSnapshot, completed: bool) {
        for sink in &self.sinks {
            if let Err(e) = sink.finish(snapshot, completed) {
                tracing::warn!("Failed to close progress display: {e:#}");
            }
        }
    }

    fn snapshot_of(&self, state: &ProgressState) -> ProgressSnapshot {
        ProgressSnapshot {
            processed: state.processed,
            failed: state.failed,
            total: self.total,
        }
    }

    // A panicking sink must not wedge every other worker
    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("total", &self.total)
            .field("sinks", &self.sinks.len())
            .finish_non_exhaustive()
    }
}
