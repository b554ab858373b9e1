//! Bounded-parallelism task groups.
//!
//! A group of independent stages is submitted as one batch. Every task that
//! spawns external processes first takes a slot from a FIFO admission gate
//! sized by the hardware profile; the batch resolves once all tasks finish.

use futures::future::{join_all, BoxFuture};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// A unit of work in a batch.
pub enum BatchTask<'a, T> {
    /// Already resolved; never takes a slot.
    Ready(T),
    /// Runs once admitted by the gate.
    Admitted(BoxFuture<'a, T>),
}

impl<'a, T> BatchTask<'a, T> {
    /// Wraps a future that must be admitted before running.
    pub fn admitted(future: impl Future<Output = T> + Send + 'a) -> Self {
        Self::Admitted(Box::pin(future))
    }
}

/// Admission gate plus fan-out/fan-in batch execution.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    gate: Arc<Semaphore>,
    max_parallel: usize,
}

impl TaskScheduler {
    /// Creates a scheduler admitting at most `max_parallel` tasks at once.
    #[must_use]
    pub fn new(max_parallel: usize) -> Self {
        let max_parallel = max_parallel.max(1);
        Self {
            gate: Arc::new(Semaphore::new(max_parallel)),
            max_parallel,
        }
    }

    /// Gate size.
    #[must_use]
    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Slots currently free.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.gate.available_permits()
    }

    /// Runs `task` while holding a slot.
    pub async fn run_admitted<F: Future>(&self, task: F) -> F::Output {
        // The gate is never closed, so acquire cannot fail.
        let _permit = self.gate.acquire().await.ok();
        task.await
    }

    /// Runs every task concurrently and waits for all of them.
    ///
    /// Results come back in submission order.
    pub async fn run_batch<'a, T>(&self, tasks: Vec<BatchTask<'a, T>>) -> Vec<T> {
        join_all(tasks.into_iter().map(|task| async move {
            match task {
                BatchTask::Ready(value) => value,
                BatchTask::Admitted(future) => self.run_admitted(future).await,
            }
        }))
        .await
    }
}
