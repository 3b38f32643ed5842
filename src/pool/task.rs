//! The unit of work shared by every worker of a pool
//!
//! A [`Task`] pairs the consuming end of the input queue with the function
//! applied to each item. The writing end is a [`Producer`], the only handle
//! able to feed or close the queue.

use super::error::PoolError;
use anyhow::Result;
use crossbeam::channel::{Receiver, Sender, bounded, unbounded};
use std::fmt;
use std::sync::Arc;

/// Function applied to each item drawn from the input queue
pub type ExecuteFn<T> = dyn Fn(T) -> Result<()> + Send + Sync;

/// Create an unbounded input queue
pub fn channel<T>() -> (Producer<T>, Receiver<T>) {
    let (tx, rx) = unbounded();
    (Producer { tx }, rx)
}

/// Create a bounded input queue
///
/// A capacity of zero gives a rendezvous queue: every `send` blocks until a
/// worker takes the item.
pub fn bounded_channel<T>(capacity: usize) -> (Producer<T>, Receiver<T>) {
    let (tx, rx) = bounded(capacity);
    (Producer { tx }, rx)
}

/// Writing end of the input queue
///
/// Closing consumes the producer, so the queue can be closed only once and
/// nothing can be sent after it is closed. Dropping the producer closes the
/// queue as well.
#[derive(Debug)]
pub struct Producer<T> {
    tx: Sender<T>,
}

impl<T> Producer<T> {
    /// Send one item, blocking while a bounded queue is full
    pub fn send(&self, item: T) -> Result<(), PoolError> {
        self.tx.send(item).map_err(|_| PoolError::Closed)
    }

    /// Number of items waiting in the queue
    pub fn pending(&self) -> usize {
        self.tx.len()
    }

    /// Signal that no more items will be sent
    pub fn close(self) {
        drop(self);
    }
}

/// Input queue plus the function applied to each of its items
pub struct Task<T> {
    input: Receiver<T>,
    execute: Arc<ExecuteFn<T>>,
}

impl<T> Task<T> {
    /// Build a task whose execute function may fail per item
    pub fn new<F>(input: Receiver<T>, execute: F) -> Self
    where
        F: Fn(T) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            input,
            execute: Arc::new(execute),
        }
    }

    /// Build a task from a function that cannot fail
    pub fn infallible<F>(input: Receiver<T>, execute: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::new(input, move |item| {
            execute(item);
            Ok(())
        })
    }

    pub(crate) fn input(&self) -> &Receiver<T> {
        &self.input
    }

    pub(crate) fn execute(&self, item: T) -> Result<()> {
        (self.execute)(item)
    }
}

// Manual impl: cloning shares the queue and the function, `T` itself need not be `Clone`
impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
            execute: Arc::clone(&self.execute),
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("pending", &self.input.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_clones_share_one_queue() {
        let (producer, rx) = channel();
        let task = Task::infallible(rx, |_: u32| {});
        let other = task.clone();

        producer.send(1).unwrap();
        producer.send(2).unwrap();
        producer.close();

        assert_eq!(task.input().recv().unwrap(), 1);
        assert_eq!(other.input().recv().unwrap(), 2);
        assert!(task.input().recv().is_err());
        assert!(other.input().recv().is_err());
    }

    #[test]
    fn test_send_without_consumers_fails() {
        let (producer, rx) = channel::<u32>();
        drop(rx);
        assert!(matches!(producer.send(7), Err(PoolError::Closed)));
    }

    #[test]
    fn test_infallible_task_always_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (_producer, rx) = channel::<u32>();
        let task = Task::infallible(rx, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(task.execute(1).is_ok());
        assert!(task.execute(2).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_pending_tracks_queue_length() {
        let (producer, _rx) = bounded_channel(4);
        producer.send("a").unwrap();
        producer.send("b").unwrap();
        assert_eq!(producer.pending(), 2);
    }
}
