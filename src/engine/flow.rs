// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! A processor tree plus its await set, ready to run.
//!
//! `Flow::process` consumes the flow, so a tree runs at most once and its
//! await set cannot change after execution starts. The caller keeps its own
//! leaf handles and reads results from them once `process` returns.
//!
//! # Example
//! ```ignore
//! let flow = Parallel::new()
//!     .add(Sequence::new().add(&l1).add(&l2).add(&l3))
//!     .add(Parallel::new().add(&p1).add(&p2))
//!     .awaiting([l1.id(), l2.id(), l3.id(), p1.id(), p2.id()]);
//!
//! let summary = flow.process().await?;
//! println!("{} -> {:?}", l1, summary);
//! ```

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::engine::context::ExecContext;
use crate::engine::join::JoinTracker;
use crate::engine::leaf::{Leaf, TaskValue};
use crate::engine::options::ProcessOptions;
use crate::engine::processor::Processor;
use crate::engine::{ExecStatus, TaskId, TaskKind};
use crate::errors::{ExecutionError, FlowValidationError};
use crate::observability::messages::engine::{
    FlowCompleted, FlowInterrupted, FlowRejected, FlowStarted,
};
use crate::observability::messages::StructuredLog;

/// Outcome of a completed `process()` call.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessSummary {
    pub awaited: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl ProcessSummary {
    /// Whether every awaited task succeeded
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// A root processor with its await set.
pub struct Flow<V> {
    root: Processor<V>,
    await_set: Vec<TaskId>,
}

enum Interrupt {
    Cancelled,
    TimedOut(Duration),
}

impl<V: TaskValue> Flow<V> {
    /// A flow with an empty await set; add tasks with [`Flow::awaiting`].
    pub fn new(root: impl Into<Processor<V>>) -> Self {
        Self {
            root: root.into(),
            await_set: Vec::new(),
        }
    }

    /// A flow awaiting every leaf of `root`.
    pub fn await_all(root: impl Into<Processor<V>>) -> Self {
        let root = root.into();
        let await_set = root.leaves().iter().map(Leaf::id).collect();
        let mut flow = Self::new(root);
        flow.await_set = dedup(await_set);
        flow
    }

    /// Add tasks to the await set.
    pub fn awaiting<I, T>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.await_set.extend(tasks.into_iter().map(Into::into));
        self.await_set = dedup(std::mem::take(&mut self.await_set));
        self
    }

    pub fn await_set(&self) -> &[TaskId] {
        &self.await_set
    }

    pub fn root(&self) -> &Processor<V> {
        &self.root
    }

    /// Check the flow for caller misuse without running it.
    pub fn validate(&self) -> Result<(), Vec<FlowValidationError>> {
        self.check().map(|_| ())
    }

    fn check(&self) -> Result<HashMap<TaskId, Leaf<V>>, Vec<FlowValidationError>> {
        let mut errors = Vec::new();
        let mut leaves = HashMap::new();
        let mut duplicates = HashSet::new();

        for leaf in self.root.leaves() {
            let task_id = leaf.id();
            if leaves.contains_key(&task_id) {
                if duplicates.insert(task_id) {
                    errors.push(FlowValidationError::DuplicateTask {
                        task_id,
                        profile: leaf.profile().to_string(),
                        datapoint: leaf.datapoint().to_string(),
                    });
                }
                continue;
            }
            if leaf.is_claimed() {
                errors.push(FlowValidationError::TaskAlreadyClaimed { task_id });
            }
            if leaf.kind() == TaskKind::Write && !leaf.has_write_value() {
                errors.push(FlowValidationError::MissingWriteValue {
                    task_id,
                    profile: leaf.profile().to_string(),
                    datapoint: leaf.datapoint().to_string(),
                });
            }
            leaves.insert(task_id, leaf);
        }

        if self.await_set.is_empty() {
            errors.push(FlowValidationError::EmptyAwaitSet);
        }
        for task_id in &self.await_set {
            if !leaves.contains_key(task_id) {
                errors.push(FlowValidationError::UnknownAwaitTask { task_id: *task_id });
            }
        }

        if errors.is_empty() {
            Ok(leaves)
        } else {
            Err(errors)
        }
    }

    /// Run the tree and wait until every awaited task is terminal.
    ///
    /// Waits without bound; see [`Flow::process_with`] for deadlines and
    /// cancellation.
    pub async fn process(self) -> Result<ProcessSummary, ExecutionError> {
        self.process_with(ProcessOptions::default()).await
    }

    /// Run the tree with explicit concurrency, timeout and cancellation settings.
    ///
    /// Device failures do not make this return `Err`; they are captured on
    /// their tasks. `Err` means the flow was rejected, cancelled or timed out.
    /// Tasks outside the await set may still be running when this returns.
    pub async fn process_with(
        self,
        options: ProcessOptions,
    ) -> Result<ProcessSummary, ExecutionError> {
        let leaves = match self.check() {
            Ok(leaves) => leaves,
            Err(errors) => return Err(reject(errors)),
        };
        if let Err(contested) = claim_all(leaves.values()) {
            return Err(reject(contested));
        }

        let started = FlowStarted {
            task_count: leaves.len(),
            awaited: self.await_set.len(),
            max_concurrency: options.max_concurrency,
        };
        started.log();
        let span = started.span("process");

        self.run(leaves, options).instrument(span).await
    }

    async fn run(
        self,
        leaves: HashMap<TaskId, Leaf<V>>,
        options: ProcessOptions,
    ) -> Result<ProcessSummary, ExecutionError> {
        let clock = Instant::now();
        let token = options
            .cancellation
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_default();
        let (completions, receiver) = mpsc::unbounded_channel();
        let ctx = Arc::new(ExecContext::new(
            completions,
            token.clone(),
            options.max_concurrency,
            options.task_timeout,
        ));
        let mut tracker = JoinTracker::new(self.await_set.iter().copied(), receiver);

        // Detached: tasks outside the await set keep running after we return.
        tokio::spawn(self.root.execute(ctx).in_current_span());

        let deadline = async {
            match options.timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        let outcome = tokio::select! {
            biased;
            joined = tracker.wait() => Ok(joined),
            _ = token.cancelled() => Err(Interrupt::Cancelled),
            _ = deadline => Err(Interrupt::TimedOut(options.timeout.unwrap_or_default())),
        };

        match outcome {
            Ok(joined) => joined?,
            Err(interrupt) => {
                token.cancel();
                let pending = tracker.remaining();
                let (reason, error) = match interrupt {
                    Interrupt::Cancelled => ("cancelled", ExecutionError::Cancelled { pending }),
                    Interrupt::TimedOut(after) => {
                        ("timed out", ExecutionError::TimedOut { after, pending })
                    }
                };
                FlowInterrupted {
                    reason,
                    pending: error.pending().len(),
                    elapsed: clock.elapsed(),
                }
                .log();
                return Err(error);
            }
        }

        let statuses: Vec<ExecStatus> = self
            .await_set
            .iter()
            .filter_map(|task_id| leaves.get(task_id))
            .map(Leaf::status)
            .collect();
        let summary = ProcessSummary {
            awaited: statuses.len(),
            succeeded: statuses.iter().filter(|s| **s == ExecStatus::Success).count(),
            failed: statuses.iter().filter(|s| **s == ExecStatus::Error).count(),
            elapsed: clock.elapsed(),
        };
        FlowCompleted {
            awaited: summary.awaited,
            succeeded: summary.succeeded,
            failed: summary.failed,
            duration: summary.elapsed,
        }
        .log();
        Ok(summary)
    }
}

impl<V: TaskValue> Display for Flow<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let awaited: Vec<String> = self.await_set.iter().map(|id| id.to_string()).collect();
        write!(f, "{} awaiting [{}]", self.root, awaited.join(", "))
    }
}

/// Claim every leaf or none of them.
///
/// Another `process()` call may claim a leaf between validation and here; the
/// claims already taken are released before the contested ids are reported.
fn claim_all<'a, V: TaskValue>(
    leaves: impl IntoIterator<Item = &'a Leaf<V>>,
) -> Result<(), Vec<FlowValidationError>> {
    let (claimed, contested): (Vec<&Leaf<V>>, Vec<&Leaf<V>>) =
        leaves.into_iter().partition(|leaf| leaf.claim());
    if contested.is_empty() {
        return Ok(());
    }
    for leaf in claimed {
        leaf.release();
    }
    Err(contested
        .into_iter()
        .map(|leaf| FlowValidationError::TaskAlreadyClaimed { task_id: leaf.id() })
        .collect())
}

fn reject(errors: Vec<FlowValidationError>) -> ExecutionError {
    let error = ExecutionError::InvalidFlow(errors);
    FlowRejected { error: &error }.log();
    error
}

fn dedup(ids: Vec<TaskId>) -> Vec<TaskId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::MockDevice;
    use crate::engine::{Parallel, ReadExec, Sequence, WriteExec};
    use crate::errors::TaskError;

    fn reader(delay_ms: u64) -> Arc<MockDevice<f32>> {
        Arc::new(MockDevice::responding("meter", Duration::from_millis(delay_ms), 1.0))
    }

    #[test]
    fn test_awaiting_deduplicates() {
        let device = reader(0);
        let a = ReadExec::with_device("P", "A", device.clone());
        let flow = Sequence::<f32>::new().add(&a).awaiting([a.id(), a.id()]);
        assert_eq!(flow.await_set(), &[a.id()]);
    }

    #[test]
    fn test_await_all_covers_every_leaf() {
        let device = reader(0);
        let (a, b) = (
            ReadExec::with_device("P", "A", device.clone()),
            ReadExec::with_device("P", "B", device.clone()),
        );
        let flow = Parallel::<f32>::new().add(&a).add(Sequence::new().add(&b)).await_all();
        assert_eq!(flow.await_set(), &[a.id(), b.id()]);
        assert!(flow.validate().is_ok());
    }

    #[tokio::test]
    async fn test_empty_await_set_is_rejected() {
        let a = ReadExec::with_device("P", "A", reader(0));
        let err = Flow::new(Sequence::<f32>::new().add(&a)).process().await.unwrap_err();
        match err {
            ExecutionError::InvalidFlow(errors) => {
                assert_eq!(errors, vec![FlowValidationError::EmptyAwaitSet])
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(a.status(), ExecStatus::Pending);
        assert!(!a.is_claimed());
    }

    #[tokio::test]
    async fn test_unknown_await_task_is_rejected() {
        let device = reader(0);
        let a = ReadExec::with_device("P", "A", device.clone());
        let stranger = ReadExec::with_device("P", "X", device.clone());
        let err = Sequence::<f32>::new()
            .add(&a)
            .awaiting([a.id(), stranger.id()])
            .process()
            .await
            .unwrap_err();
        match err {
            ExecutionError::InvalidFlow(errors) => assert_eq!(
                errors,
                vec![FlowValidationError::UnknownAwaitTask {
                    task_id: stranger.id()
                }]
            ),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(device.calls(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_leaf_is_rejected() {
        let a = ReadExec::with_device("P", "A", reader(0));
        let err = Parallel::<f32>::new()
            .add(&a)
            .add(&a)
            .awaiting([a.id()])
            .process()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::InvalidFlow(ref errors)
                if matches!(errors.as_slice(), [FlowValidationError::DuplicateTask { .. }])
        ));
    }

    #[tokio::test]
    async fn test_write_without_value_is_rejected_before_execution() {
        let device = Arc::new(MockDevice::<f32>::accepting("garo", Duration::ZERO));
        let w = WriteExec::with_device("Curtailment", "HemsCurrentLimit", device.clone());
        let err = Parallel::new().add(&w).awaiting([w.id()]).process().await.unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::InvalidFlow(ref errors)
                if matches!(errors.as_slice(), [FlowValidationError::MissingWriteValue { .. }])
        ));
        assert_eq!(device.calls(), 0);
    }

    #[tokio::test]
    async fn test_reusing_a_task_is_rejected() {
        let device = reader(0);
        let a = ReadExec::with_device("P", "A", device.clone());

        Sequence::<f32>::new().add(&a).awaiting([a.id()]).process().await.unwrap();
        let err = Sequence::<f32>::new()
            .add(&a)
            .awaiting([a.id()])
            .process()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ExecutionError::InvalidFlow(ref errors)
                if matches!(errors.as_slice(), [FlowValidationError::TaskAlreadyClaimed { .. }])
        ));
        assert_eq!(device.calls(), 1);
        assert_eq!(a.status(), ExecStatus::Success);
    }

    #[test]
    fn test_contested_claim_releases_the_others() {
        let device = reader(0);
        let a = ReadExec::with_device("P", "A", device.clone());
        let b = ReadExec::with_device("P", "B", device.clone());
        assert!(b.claim());

        let contested = claim_all([a.as_leaf(), b.as_leaf()]).unwrap_err();

        assert_eq!(contested, vec![FlowValidationError::TaskAlreadyClaimed { task_id: b.id() }]);
        assert!(!a.is_claimed());
        assert!(b.is_claimed());
        assert!(claim_all([a.as_leaf()]).is_ok());
        assert!(a.is_claimed());
    }

    #[tokio::test]
    async fn test_summary_counts_awaited_outcomes() {
        let ok = ReadExec::with_device("P", "ok", reader(0));
        let bad: ReadExec<f32> = ReadExec::with_device(
            "P",
            "bad",
            Arc::new(MockDevice::failing("meter", Duration::ZERO, "DEVICE ERROR")),
        );

        let summary = Parallel::new()
            .add(&ok)
            .add(&bad)
            .awaiting([ok.id(), bad.id()])
            .process()
            .await
            .unwrap();

        assert_eq!(summary.awaited, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_succeeded());
    }

    #[tokio::test]
    async fn test_process_returns_before_unawaited_tasks_finish() {
        let fast = ReadExec::with_device("P", "fast", reader(5));
        let slow = ReadExec::with_device("P", "slow", reader(2_000));

        let started = Instant::now();
        Parallel::<f32>::new()
            .add(&fast)
            .add(&slow)
            .awaiting([fast.id()])
            .process()
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_millis(1_000));
        assert_eq!(fast.status(), ExecStatus::Success);
        assert_eq!(slow.status(), ExecStatus::Running);

        slow.cleanup();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(slow.status(), ExecStatus::Error);
        assert!(matches!(slow.error(), Some(TaskError::Cancelled)));
        assert!(slow.duration().unwrap() < Duration::from_millis(1_000));
        assert_eq!(fast.value(), Some(1.0));
    }

    #[tokio::test]
    async fn test_timeout_reports_pending_and_cancels_tasks() {
        let slow = ReadExec::with_device("P", "slow", reader(5_000));
        let fast = ReadExec::with_device("P", "fast", reader(1));

        let err = Parallel::<f32>::new()
            .add(&slow)
            .add(&fast)
            .awaiting([slow.id(), fast.id()])
            .process_with(ProcessOptions::default().with_timeout(Duration::from_millis(50)))
            .await
            .unwrap_err();

        match err {
            ExecutionError::TimedOut { after, pending } => {
                assert_eq!(after, Duration::from_millis(50));
                assert_eq!(pending, vec![slow.id()]);
            }
            other => panic!("unexpected error: {}", other),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(slow.status(), ExecStatus::Error);
        assert!(matches!(slow.error(), Some(TaskError::Cancelled)));
        assert_eq!(fast.status(), ExecStatus::Success);
    }

    #[tokio::test]
    async fn test_cancellation_token_stops_flow() {
        let slow = ReadExec::with_device("P", "slow", reader(5_000));
        let never = ReadExec::with_device("P", "never", reader(0));
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let err = Sequence::<f32>::new()
            .add(&slow)
            .add(&never)
            .await_all()
            .process_with(ProcessOptions::default().with_cancellation(token))
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::Cancelled { .. }));
        assert!(err.pending().contains(&never.id()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(never.status(), ExecStatus::Pending);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_max_concurrency_serializes_parallel() {
        let tasks: Vec<ReadExec<f32>> = (0..3)
            .map(|i| ReadExec::with_device("P", format!("P{}", i), reader(50)))
            .collect();
        let mut parallel = Parallel::<f32>::new();
        for task in &tasks {
            parallel = parallel.add(task);
        }

        let summary = parallel
            .await_all()
            .process_with(ProcessOptions::default().with_max_concurrency(1))
            .await
            .unwrap();

        assert!(summary.elapsed >= Duration::from_millis(150), "took {:?}", summary.elapsed);
        let mut spans: Vec<(Instant, Instant)> = tasks
            .iter()
            .map(|t| (t.requested_at().unwrap(), t.responded_at().unwrap()))
            .collect();
        spans.sort();
        for pair in spans.windows(2) {
            assert!(pair[1].0 >= pair[0].1);
        }
    }
}
