// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Leaf tasks: one device read or write plus its captured outcome.
//!
//! A leaf is a cheap, cloneable handle. The caller keeps one clone to read
//! results after `process()` returns; the tree holds another and the engine
//! writes the outcome through it. All clones share the same state.
//!
//! ```text
//! Pending --execute--> Running --ok--> Success
//!                              \--err-> Error
//! ```

use serde::Serialize;
use std::any::Any;
use std::fmt::{self, Debug, Display, Formatter};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::{AbortHandle, JoinHandle};

use crate::backends::blocking::{BlockingRead, BlockingWrite};
use crate::engine::context::ExecContext;
use crate::engine::{ExecStatus, TaskId, TaskKind};
use crate::errors::{BoxError, TaskError};
use crate::observability::messages::task::{TaskCleanedUp, TaskFailed, TaskStarted, TaskSucceeded};
use crate::observability::messages::StructuredLog;
use crate::traits::Device;

/// Bounds every value moved through a flow must satisfy.
pub trait TaskValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> TaskValue for T {}

struct LeafCore<V> {
    id: TaskId,
    kind: TaskKind,
    profile: String,
    datapoint: String,
    device: Arc<dyn Device<V>>,
    claimed: AtomicBool,
    state: Mutex<LeafState<V>>,
}

struct LeafState<V> {
    status: ExecStatus,
    value: Option<V>,
    write_value: Option<V>,
    error: Option<TaskError>,
    requested_at: Option<Instant>,
    responded_at: Option<Instant>,
    timeout: Option<Duration>,
    handle: Option<AbortHandle>,
}

/// Shared handle to a leaf task of either kind.
pub struct Leaf<V> {
    core: Arc<LeafCore<V>>,
}

impl<V> Clone for Leaf<V> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<V: TaskValue> Leaf<V> {
    fn new(
        kind: TaskKind,
        profile: impl Into<String>,
        datapoint: impl Into<String>,
        device: Arc<dyn Device<V>>,
    ) -> Self {
        Self {
            core: Arc::new(LeafCore {
                id: TaskId::next(),
                kind,
                profile: profile.into(),
                datapoint: datapoint.into(),
                device,
                claimed: AtomicBool::new(false),
                state: Mutex::new(LeafState {
                    status: ExecStatus::Pending,
                    value: None,
                    write_value: None,
                    error: None,
                    requested_at: None,
                    responded_at: None,
                    timeout: None,
                    handle: None,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LeafState<V>> {
        self.core.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> TaskId {
        self.core.id
    }

    pub fn kind(&self) -> TaskKind {
        self.core.kind
    }

    pub fn profile(&self) -> &str {
        &self.core.profile
    }

    pub fn datapoint(&self) -> &str {
        &self.core.datapoint
    }

    pub fn device_name(&self) -> &str {
        self.core.device.name()
    }

    pub fn status(&self) -> ExecStatus {
        self.lock().status
    }

    /// Value returned by a successful read; `None` for writes and before completion.
    pub fn value(&self) -> Option<V> {
        self.lock().value.clone()
    }

    pub fn error(&self) -> Option<TaskError> {
        self.lock().error.clone()
    }

    /// When execution began
    pub fn requested_at(&self) -> Option<Instant> {
        self.lock().requested_at
    }

    /// When execution reached a terminal status
    pub fn responded_at(&self) -> Option<Instant> {
        self.lock().responded_at
    }

    pub fn duration(&self) -> Option<Duration> {
        let state = self.lock();
        match (state.requested_at, state.responded_at) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// Whether a `process()` call has taken ownership of this task's single run.
    pub fn is_claimed(&self) -> bool {
        self.core.claimed.load(Ordering::SeqCst)
    }

    pub(crate) fn claim(&self) -> bool {
        !self.core.claimed.swap(true, Ordering::SeqCst)
    }

    /// Undo a claim taken by a `process()` call that was then rejected.
    pub(crate) fn release(&self) {
        self.core.claimed.store(false, Ordering::SeqCst);
    }

    pub(crate) fn has_write_value(&self) -> bool {
        self.lock().write_value.is_some()
    }

    fn set_timeout(&self, timeout: Duration) {
        self.lock().timeout = Some(timeout);
    }

    /// Release the execution handle backing this task.
    ///
    /// Aborts the device operation if it is still running. Captured results
    /// stay readable. Safe to call repeatedly and on tasks that never ran.
    pub fn cleanup(&self) {
        let handle = self.lock().handle.take();
        if let Some(handle) = handle {
            let aborted = !handle.is_finished();
            handle.abort();
            TaskCleanedUp {
                task_id: self.id(),
                aborted,
            }
            .log();
        }
    }

    /// Serializable snapshot of the task's identity and outcome.
    pub fn report(&self) -> TaskReport<V> {
        let state = self.lock();
        TaskReport {
            id: self.core.id,
            kind: self.core.kind,
            profile: self.core.profile.clone(),
            datapoint: self.core.datapoint.clone(),
            status: state.status,
            value: state.value.clone(),
            write_value: state.write_value.clone(),
            error: state.error.as_ref().map(|e| e.to_string()),
            duration_ms: match (state.requested_at, state.responded_at) {
                (Some(start), Some(end)) => Some(end.duration_since(start).as_millis() as u64),
                _ => None,
            },
        }
    }

    /// Run the device operation once and record its outcome.
    ///
    /// Never returns an error: failures are stored on the task. Completion is
    /// signalled to the flow through the context whatever the outcome.
    pub(crate) async fn execute(&self, ctx: &ExecContext) {
        let _permit = tokio::select! {
            permit = ctx.acquire() => permit,
            _ = ctx.cancelled() => return,
        };
        if ctx.is_cancelled() {
            return;
        }

        let Some((write_value, timeout)) = self.begin() else {
            return;
        };
        TaskStarted {
            task_id: self.id(),
            kind: self.kind(),
            profile: self.profile(),
            datapoint: self.datapoint(),
        }
        .log();

        let device = Arc::clone(&self.core.device);
        let profile = self.core.profile.clone();
        let datapoint = self.core.datapoint.clone();
        let mut operation: JoinHandle<Result<Option<V>, BoxError>> = match (self.kind(), write_value) {
            (TaskKind::Read, _) => tokio::spawn(async move {
                device.get_val(&profile, &datapoint).await.map(Some)
            }),
            (TaskKind::Write, Some(value)) => tokio::spawn(async move {
                device.set_val(&profile, &datapoint, value).await.map(|()| None)
            }),
            (TaskKind::Write, None) => {
                self.finish(Err(TaskError::MissingWriteValue));
                ctx.notify(self.id());
                return;
            }
        };
        self.lock().handle = Some(operation.abort_handle());

        let outcome = tokio::select! {
            joined = join_operation(&mut operation, timeout.or(ctx.task_timeout())) => joined,
            _ = ctx.cancelled() => Err(TaskError::Cancelled),
        };
        let interrupted = matches!(outcome, Err(TaskError::Cancelled) | Err(TaskError::TimedOut(_)));

        self.finish(outcome);
        ctx.notify(self.id());

        if interrupted && !operation.is_finished() {
            settle(operation, ctx).await;
        }
    }

    /// Pending -> Running. Returns the value to write and the task timeout.
    fn begin(&self) -> Option<(Option<V>, Option<Duration>)> {
        let mut state = self.lock();
        if state.status != ExecStatus::Pending {
            return None;
        }
        state.status = ExecStatus::Running;
        state.requested_at = Some(Instant::now());
        Some((state.write_value.clone(), state.timeout))
    }

    /// Running -> Success | Error. Ignored in any other state.
    fn finish(&self, outcome: Result<Option<V>, TaskError>) {
        let mut state = self.lock();
        if state.status != ExecStatus::Running {
            return;
        }
        let now = Instant::now();
        state.responded_at = Some(now);
        let duration = state
            .requested_at
            .map(|start| now.duration_since(start))
            .unwrap_or_default();
        match outcome {
            Ok(value) => {
                state.value = value;
                state.status = ExecStatus::Success;
                drop(state);
                TaskSucceeded {
                    task_id: self.id(),
                    kind: self.kind(),
                    profile: self.profile(),
                    datapoint: self.datapoint(),
                    duration,
                }
                .log();
            }
            Err(error) => {
                state.status = ExecStatus::Error;
                state.error = Some(error.clone());
                drop(state);
                TaskFailed {
                    task_id: self.id(),
                    kind: self.kind(),
                    profile: self.profile(),
                    datapoint: self.datapoint(),
                    error: &error,
                }
                .log();
            }
        }
    }
}

async fn join_operation<V>(
    operation: &mut JoinHandle<Result<Option<V>, BoxError>>,
    timeout: Option<Duration>,
) -> Result<Option<V>, TaskError> {
    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut *operation).await {
            Ok(joined) => joined,
            Err(_) => return Err(TaskError::TimedOut(limit)),
        },
        None => operation.await,
    };
    match joined {
        Ok(result) => result.map_err(TaskError::from),
        Err(e) if e.is_panic() => Err(TaskError::Panicked(panic_message(e.into_panic()))),
        Err(_) => Err(TaskError::Cancelled),
    }
}

/// Hold the caller until an interrupted device call has really returned.
///
/// The outcome is already recorded. A timed-out call keeps its bus until it
/// returns, the flow is cancelled or `cleanup()` aborts it, so the next leaf
/// of a `Sequence` never overlaps it. Cancellation aborts the call at once.
async fn settle<T>(mut operation: JoinHandle<T>, ctx: &ExecContext) {
    if !ctx.is_cancelled() {
        tokio::select! {
            _ = &mut operation => return,
            _ = ctx.cancelled() => {}
        }
    }
    operation.abort();
    let _ = operation.await;
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl<V: TaskValue + Debug> Display for Leaf<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        write!(
            f,
            "{}[{} {}/{} status={}",
            self.core.kind, self.core.id, self.core.profile, self.core.datapoint, state.status
        )?;
        if let Some(value) = &state.value {
            write!(f, " value={:?}", value)?;
        }
        if let Some(value) = &state.write_value {
            write!(f, " write_value={:?}", value)?;
        }
        if let Some(error) = &state.error {
            write!(f, " error=\"{}\"", error)?;
        }
        if let (Some(start), Some(end)) = (state.requested_at, state.responded_at) {
            write!(f, " duration={:?}", end.duration_since(start))?;
        }
        write!(f, "]")
    }
}

impl<V: TaskValue + Debug> Debug for Leaf<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Serializable snapshot of a leaf task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport<V> {
    pub id: TaskId,
    pub kind: TaskKind,
    pub profile: String,
    pub datapoint: String,
    pub status: ExecStatus,
    pub value: Option<V>,
    pub write_value: Option<V>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
}

/// A leaf task that reads one data point.
///
/// ```ignore
/// let voltage = ReadExec::new("VoltageAC", "VoltageL1", |profile, datapoint| {
///     meter.get_val(profile, datapoint)
/// });
/// ```
#[derive(Clone)]
pub struct ReadExec<V> {
    leaf: Leaf<V>,
}

impl<V: TaskValue> ReadExec<V> {
    /// Wrap a blocking read callable. It runs on the blocking worker pool.
    pub fn new<F>(profile: impl Into<String>, datapoint: impl Into<String>, op: F) -> Self
    where
        F: Fn(&str, &str) -> Result<V, BoxError> + Send + Sync + 'static,
    {
        Self::with_device(profile, datapoint, Arc::new(BlockingRead::new(op)))
    }

    /// Read through a device handle.
    pub fn with_device(
        profile: impl Into<String>,
        datapoint: impl Into<String>,
        device: Arc<dyn Device<V>>,
    ) -> Self {
        Self {
            leaf: Leaf::new(TaskKind::Read, profile, datapoint, device),
        }
    }

    /// Fail the read with `TaskError::TimedOut` if the device takes longer than `timeout`.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.leaf.set_timeout(timeout);
        self
    }

    pub fn as_leaf(&self) -> &Leaf<V> {
        &self.leaf
    }
}

impl<V> Deref for ReadExec<V> {
    type Target = Leaf<V>;

    fn deref(&self) -> &Leaf<V> {
        &self.leaf
    }
}

impl<V: TaskValue + Debug> Display for ReadExec<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.leaf, f)
    }
}

/// A leaf task that writes one data point.
///
/// The value must be set with [`WriteExec::set_write_value`] before the flow
/// containing the task is processed.
#[derive(Clone)]
pub struct WriteExec<V> {
    leaf: Leaf<V>,
}

impl<V: TaskValue> WriteExec<V> {
    /// Wrap a blocking write callable. It runs on the blocking worker pool.
    pub fn new<F>(profile: impl Into<String>, datapoint: impl Into<String>, op: F) -> Self
    where
        F: Fn(&str, &str, V) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::with_device(profile, datapoint, Arc::new(BlockingWrite::new(op)))
    }

    /// Write through a device handle.
    pub fn with_device(
        profile: impl Into<String>,
        datapoint: impl Into<String>,
        device: Arc<dyn Device<V>>,
    ) -> Self {
        Self {
            leaf: Leaf::new(TaskKind::Write, profile, datapoint, device),
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.leaf.set_timeout(timeout);
        self
    }

    /// Set the value sent when the task executes.
    ///
    /// Setting it after the task has started has no effect on that run.
    pub fn set_write_value(&self, value: V) {
        self.leaf.lock().write_value = Some(value);
    }

    pub fn write_value(&self) -> Option<V> {
        self.leaf.lock().write_value.clone()
    }

    pub fn as_leaf(&self) -> &Leaf<V> {
        &self.leaf
    }
}

impl<V> Deref for WriteExec<V> {
    type Target = Leaf<V>;

    fn deref(&self) -> &Leaf<V> {
        &self.leaf
    }
}

impl<V: TaskValue + Debug> Display for WriteExec<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.leaf, f)
    }
}
