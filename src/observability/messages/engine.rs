// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for flow lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * `process()` start and its concurrency settings
//! * Completion of the await set
//! * Cancellation and timeout of a running flow
//! * Rejection of a flow that failed validation
//! * A `Parallel` branch that ended without finishing its subtree

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Flow processing started.
///
/// # Log Level
/// `info!` - Important operational event
pub struct FlowStarted {
    pub task_count: usize,
    pub awaited: usize,
    pub max_concurrency: Option<usize>,
}

impl Display for FlowStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.max_concurrency {
            Some(limit) => write!(
                f,
                "Starting flow: {} tasks, awaiting {}, max_concurrency={}",
                self.task_count, self.awaited, limit
            ),
            None => write!(
                f,
                "Starting flow: {} tasks, awaiting {}, unbounded concurrency",
                self.task_count, self.awaited
            ),
        }
    }
}

impl StructuredLog for FlowStarted {
    fn log(&self) {
        tracing::info!(
            task_count = self.task_count,
            awaited = self.awaited,
            max_concurrency = ?self.max_concurrency,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "flow",
            span_name = name,
            task_count = self.task_count,
            awaited = self.awaited,
        )
    }
}

/// Every awaited task reached a terminal status.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use commflow::observability::messages::engine::FlowCompleted;
/// use std::time::Duration;
///
/// let msg = FlowCompleted {
///     awaited: 5,
///     succeeded: 4,
///     failed: 1,
///     duration: Duration::from_millis(100),
/// };
///
/// assert_eq!(msg.to_string(), "Flow completed: 5 awaited tasks (4 succeeded, 1 failed) in 100ms");
/// ```
pub struct FlowCompleted {
    pub awaited: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duration: Duration,
}

impl Display for FlowCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Flow completed: {} awaited tasks ({} succeeded, {} failed) in {:?}",
            self.awaited, self.succeeded, self.failed, self.duration
        )
    }
}

impl StructuredLog for FlowCompleted {
    fn log(&self) {
        tracing::info!(
            awaited = self.awaited,
            succeeded = self.succeeded,
            failed = self.failed,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "flow_completed",
            span_name = name,
            awaited = self.awaited,
            duration = ?self.duration,
        )
    }
}

/// Flow stopped waiting before the await set completed.
///
/// # Log Level
/// `warn!` - Caller-initiated or deadline-driven stop
pub struct FlowInterrupted<'a> {
    pub reason: &'a str,
    pub pending: usize,
    pub elapsed: Duration,
}

impl Display for FlowInterrupted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Flow {} after {:?} with {} awaited tasks pending",
            self.reason, self.elapsed, self.pending
        )
    }
}

impl StructuredLog for FlowInterrupted<'_> {
    fn log(&self) {
        tracing::warn!(
            reason = self.reason,
            pending = self.pending,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "flow_interrupted",
            span_name = name,
            reason = self.reason,
            pending = self.pending,
        )
    }
}

/// Flow failed validation and never started.
///
/// # Log Level
/// `error!` - Caller misuse requiring attention
pub struct FlowRejected<'a> {
    pub error: &'a dyn std::error::Error,
}

impl Display for FlowRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Flow rejected: {}", self.error)
    }
}

impl StructuredLog for FlowRejected<'_> {
    fn log(&self) {
        tracing::error!(error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("flow_rejected", span_name = name, error = %self.error)
    }
}

/// A `Parallel` branch task ended abnormally. Leaves below it that had not
/// finished stay in their last recorded status.
///
/// # Log Level
/// `error!` - Engine fault, not a device failure
///
/// # Example
/// ```
/// use commflow::observability::messages::engine::ParallelBranchFailed;
///
/// let cause = std::io::Error::new(std::io::ErrorKind::Other, "task 7 panicked");
/// let msg = ParallelBranchFailed {
///     branch_count: 2,
///     panicked: true,
///     error: &cause,
/// };
///
/// assert_eq!(msg.to_string(), "Parallel branch panicked (2 branches): task 7 panicked");
/// ```
pub struct ParallelBranchFailed<'a> {
    pub branch_count: usize,
    pub panicked: bool,
    pub error: &'a dyn std::error::Error,
}

impl Display for ParallelBranchFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let cause = if self.panicked { "panicked" } else { "was aborted" };
        write!(
            f,
            "Parallel branch {} ({} branches): {}",
            cause, self.branch_count, self.error
        )
    }
}

impl StructuredLog for ParallelBranchFailed<'_> {
    fn log(&self) {
        tracing::error!(
            branch_count = self.branch_count,
            panicked = self.panicked,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "parallel_branch_failed",
            span_name = name,
            panicked = self.panicked,
            error = %self.error,
        )
    }
}
