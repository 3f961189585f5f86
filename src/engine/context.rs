// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::engine::TaskId;

/// Shared state threaded through one `process()` invocation.
///
/// Every node of the tree holds an `Arc` to the same context. The completion
/// channel closes once the whole tree has finished and the last clone drops.
pub(crate) struct ExecContext {
    completions: mpsc::UnboundedSender<TaskId>,
    cancel: CancellationToken,
    permits: Option<Arc<Semaphore>>,
    task_timeout: Option<Duration>,
}

impl ExecContext {
    pub(crate) fn new(
        completions: mpsc::UnboundedSender<TaskId>,
        cancel: CancellationToken,
        max_concurrency: Option<usize>,
        task_timeout: Option<Duration>,
    ) -> Self {
        Self {
            completions,
            cancel,
            permits: max_concurrency.map(|n| Arc::new(Semaphore::new(n.max(1)))),
            task_timeout,
        }
    }

    /// Waits for an execution slot; `None` when concurrency is unbounded.
    pub(crate) async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        match &self.permits {
            Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
            None => None,
        }
    }

    pub(crate) fn notify(&self, task_id: TaskId) {
        // The receiver is gone once process() has returned; late completions are dropped.
        let _ = self.completions.send(task_id);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub(crate) fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout
    }
}
