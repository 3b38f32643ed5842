//! `drainpool run`: feed a batch of integers through the worker pool
//!
//! The pool runs on a blocking thread and the producer on another, while the
//! async side waits for the completion signal or Ctrl-C.

use crate::cli::{OutputFormat, Output, RunArgs};
use crate::config::DrainpoolConfig;
use crate::pool::{self, CancelToken, Producer, ProgressTracker, RunSummary, Task, WorkerPool};
use anyhow::{Context, Result};
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Execute the run command
pub async fn execute(
    args: RunArgs,
    config: DrainpoolConfig,
    format: OutputFormat,
    output: &Output,
) -> Result<()> {
    let config = args.apply(config);
    config.validate()?;

    let workers = config.pool.effective_workers();
    let items = config.demo.items;
    let delay = Duration::from_millis(config.demo.delay_ms);
    let fail_every = config.demo.fail_every;

    if format == OutputFormat::Text {
        output.header("drainpool run");
        output.step(&format!("Processing {items} items with {workers} workers"));
        output.verbose(&format!(
            "delay {}ms, progress {:?}, queue capacity {}",
            config.demo.delay_ms, config.progress.mode, config.pool.queue_capacity
        ));
    }

    let (producer, input) = match config.pool.capacity() {
        None => pool::channel(),
        Some(capacity) => pool::bounded_channel(capacity),
    };
    let task = Task::new(input, move |n: usize| work_function(n, delay, fail_every));
    let tracker = Arc::new(ProgressTracker::for_mode(
        config.progress.mode,
        items,
        config.progress.log_every,
    ));
    let cancel = CancelToken::new();
    let worker_pool = WorkerPool::new(workers, task)
        .with_progress(tracker)
        .with_cancel(cancel.clone());

    let (done_tx, mut done_rx) = oneshot::channel();
    let runner = tokio::task::spawn_blocking(move || worker_pool.run_with_completion(done_tx));
    let feeder = tokio::task::spawn_blocking(move || feed(producer, items));

    let finished = tokio::select! {
        outcome = &mut done_rx => Some(outcome),
        () = interrupted(tokio::signal::ctrl_c()) => None,
    };
    let outcome = match finished {
        Some(outcome) => outcome,
        None => {
            output.warning("Interrupted, finishing in-flight items...");
            cancel.cancel();
            done_rx.await
        }
    }
    .context("Worker pool stopped without reporting completion")?;

    runner.await.context("Worker pool thread failed")?;
    let sent = feeder.await.context("Producer thread failed")?;
    tracing::debug!(sent, "Producer finished");

    let summary = outcome?;
    report(&summary, format, output)?;

    if summary.canceled {
        anyhow::bail!(
            "Run canceled after {} of {} items",
            summary.processed + summary.failed,
            items
        );
    }
    Ok(())
}

/// Resolve once `signal` reports an interrupt
///
/// If the handler cannot be installed the run keeps going without Ctrl-C
/// support instead of being canceled.
async fn interrupted<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::warn!("Unable to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Send `0..items` and close the queue; stops early once no worker is left
fn feed(producer: Producer<usize>, items: usize) -> usize {
    let mut sent = 0;
    for n in fetch_data_for_processing(items) {
        if producer.send(n).is_err() {
            tracing::debug!("Workers gone, stopping producer");
            break;
        }
        sent += 1;
    }
    producer.close();
    sent
}

fn fetch_data_for_processing(items: usize) -> impl Iterator<Item = usize> {
    0..items
}

/// Simulated unit of work
fn work_function(n: usize, delay: Duration, fail_every: usize) -> Result<()> {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
    if fail_every > 0 && (n + 1) % fail_every == 0 {
        anyhow::bail!("item {n} failed (injected every {fail_every} items)");
    }
    tracing::trace!(item = n, "Processed");
    Ok(())
}

fn report(summary: &RunSummary, format: OutputFormat, output: &Output) -> Result<()> {
    if format == OutputFormat::Json {
        let json =
            serde_json::to_string_pretty(summary).context("Failed to serialize run summary")?;
        output.raw(&json);
        return Ok(());
    }

    output.blank_line();
    output.status_indicator(
        if summary.canceled { "CANCELED" } else { "DONE" },
        &format!("{} items processed", summary.processed),
        !summary.canceled && summary.failed == 0,
    );
    output.key_value("Workers:", &summary.workers.to_string(), false);
    output.key_value("Failed:", &summary.failed.to_string(), summary.failed == 0);
    output.key_value(
        "Elapsed:",
        &format!("{:.2}s", summary.elapsed.as_secs_f64()),
        false,
    );
    if let Some(progress) = &summary.progress {
        output.key_value("Progress:", &format!("{:.1}%", progress.percent()), false);
    }
    if summary.failed > 0 {
        output.warning(&format!("{} item(s) failed, see log for details", summary.failed));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_function_injected_failures() {
        assert!(work_function(0, Duration::ZERO, 0).is_ok());
        assert!(work_function(1, Duration::ZERO, 2).is_err());
        assert!(work_function(2, Duration::ZERO, 2).is_ok());
    }

    #[test]
    fn test_feed_stops_when_workers_are_gone() {
        let (producer, input) = pool::channel::<usize>();
        drop(input);
        assert_eq!(feed(producer, 10), 0);
    }

    #[tokio::test]
    async fn test_interrupt_resolves_on_signal() {
        let wait = interrupted(async { Ok(()) });
        assert!(tokio::time::timeout(Duration::from_secs(1), wait).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_signal_handler_does_not_interrupt() {
        let wait = interrupted(async { Err(io::Error::other("no signal driver")) });
        assert!(
            tokio::time::timeout(Duration::from_millis(50), wait)
                .await
                .is_err()
        );
    }

    #[test]
    fn test_feed_closes_queue() {
        let (producer, input) = pool::channel();
        assert_eq!(feed(producer, 3), 3);
        assert_eq!(input.iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }
}
