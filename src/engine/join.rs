// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashSet;
use tokio::sync::mpsc;

use crate::engine::TaskId;
use crate::errors::ExecutionError;

/// Tracks which awaited tasks have not yet reported a terminal status.
///
/// Leaves send their id on the completion channel when they finish; the
/// tracker removes them from the pending set until it is empty.
pub(crate) struct JoinTracker {
    pending: HashSet<TaskId>,
    completions: mpsc::UnboundedReceiver<TaskId>,
}

impl JoinTracker {
    pub(crate) fn new(
        await_set: impl IntoIterator<Item = TaskId>,
        completions: mpsc::UnboundedReceiver<TaskId>,
    ) -> Self {
        Self {
            pending: await_set.into_iter().collect(),
            completions,
        }
    }

    /// Resolves once every awaited task has completed.
    ///
    /// Completions of tasks outside the await set are consumed and ignored.
    pub(crate) async fn wait(&mut self) -> Result<(), ExecutionError> {
        while !self.pending.is_empty() {
            match self.completions.recv().await {
                Some(task_id) => {
                    self.pending.remove(&task_id);
                }
                None => {
                    return Err(ExecutionError::InternalError {
                        message: format!(
                            "flow finished with {} awaited task(s) never reporting completion",
                            self.pending.len()
                        ),
                    })
                }
            }
        }
        Ok(())
    }

    /// Awaited tasks still outstanding, in id order.
    pub(crate) fn remaining(&self) -> Vec<TaskId> {
        let mut remaining: Vec<TaskId> = self.pending.iter().copied().collect();
        remaining.sort();
        remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_returns_when_await_set_drained() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (a, b, other) = (TaskId::next(), TaskId::next(), TaskId::next());
        let mut tracker = JoinTracker::new([a, b], rx);

        tx.send(other).unwrap();
        tx.send(b).unwrap();
        tx.send(a).unwrap();

        tracker.wait().await.unwrap();
        assert!(tracker.remaining().is_empty());
    }

    #[tokio::test]
    async fn test_closed_channel_with_pending_tasks_is_internal_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (a, b) = (TaskId::next(), TaskId::next());
        let mut tracker = JoinTracker::new([a, b], rx);

        tx.send(a).unwrap();
        drop(tx);

        let err = tracker.wait().await.unwrap_err();
        assert!(matches!(err, ExecutionError::InternalError { .. }));
        assert_eq!(tracker.remaining(), vec![b]);
    }
}
