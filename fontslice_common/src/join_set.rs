use anyhow::{ensure, Result};
use std::sync::Arc;
use tokio::{sync::Semaphore, task::JoinHandle};
use tracing::{Instrument, Span};

/// A list of spawned tasks, of which at most a fixed number run at the same time.
///
/// Results are always returned in the order the tasks were spawned in.
pub struct JoinSet<T> {
    permits: Arc<Semaphore>,
    joins: Vec<JoinHandle<Result<T>>>,
}
impl<T: Send + 'static> JoinSet<T> {
    /// Creates a join set that runs at most `workers` tasks at once.
    pub fn bounded(workers: usize) -> Result<Self> {
        ensure!(workers > 0, "At least one worker is required.");
        ensure!(workers <= Semaphore::MAX_PERMITS, "Too many workers requested: {workers}");
        Ok(JoinSet { permits: Arc::new(Semaphore::new(workers)), joins: Vec::new() })
    }

    /// Spawns a CPU-bound job on the blocking thread pool.
    pub fn spawn_blocking(&mut self, func: impl FnOnce() -> Result<T> + Send + 'static) {
        let permits = self.permits.clone();
        let span = Span::current();
        self.joins.push(tokio::spawn(
            async move {
                let _permit = permits.acquire_owned().await?;
                tokio::task::spawn_blocking(move || span.in_scope(func)).await?
            }
            .in_current_span(),
        ));
    }

    /// Waits for every task, returning each task's own result.
    ///
    /// A failing or panicking task does not affect the others.
    pub async fn join_each(self) -> Vec<Result<T>> {
        let mut result = Vec::new();
        for join in self.joins {
            result.push(match join.await {
                Ok(x) => x,
                Err(e) => Err(e.into()),
            });
        }
        result
    }
}
