// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for leaf task execution events.

use crate::engine::{TaskId, TaskKind};
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Task transitioned to `Running`.
///
/// # Log Level
/// `debug!` - Per-task detail
pub struct TaskStarted<'a> {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub profile: &'a str,
    pub datapoint: &'a str,
}

impl Display for TaskStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} '{}' started: {}/{}",
            self.kind, self.task_id, self.profile, self.datapoint
        )
    }
}

impl StructuredLog for TaskStarted<'_> {
    fn log(&self) {
        tracing::debug!(
            task_id = %self.task_id,
            kind = %self.kind,
            profile = self.profile,
            datapoint = self.datapoint,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "task",
            span_name = name,
            task_id = %self.task_id,
            profile = self.profile,
            datapoint = self.datapoint,
        )
    }
}

/// Task reached `Success`.
///
/// # Log Level
/// `debug!` - Per-task detail
pub struct TaskSucceeded<'a> {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub profile: &'a str,
    pub datapoint: &'a str,
    pub duration: Duration,
}

impl Display for TaskSucceeded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} '{}' succeeded: {}/{} in {:?}",
            self.kind, self.task_id, self.profile, self.datapoint, self.duration
        )
    }
}

impl StructuredLog for TaskSucceeded<'_> {
    fn log(&self) {
        tracing::debug!(
            task_id = %self.task_id,
            kind = %self.kind,
            profile = self.profile,
            datapoint = self.datapoint,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "task_succeeded",
            span_name = name,
            task_id = %self.task_id,
            duration = ?self.duration,
        )
    }
}

/// Task reached `Error`. The error is captured on the task, not raised.
///
/// # Log Level
/// `warn!` - Device failure the caller should inspect
pub struct TaskFailed<'a> {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub profile: &'a str,
    pub datapoint: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for TaskFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} '{}' failed: {}/{}: {}",
            self.kind, self.task_id, self.profile, self.datapoint, self.error
        )
    }
}

impl StructuredLog for TaskFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            task_id = %self.task_id,
            kind = %self.kind,
            profile = self.profile,
            datapoint = self.datapoint,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "task_failed",
            span_name = name,
            task_id = %self.task_id,
            error = %self.error,
        )
    }
}

/// Task execution handle released.
///
/// # Log Level
/// `trace!` - Resource bookkeeping
pub struct TaskCleanedUp {
    pub task_id: TaskId,
    pub aborted: bool,
}

impl Display for TaskCleanedUp {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.aborted {
            write!(f, "Task '{}' cleaned up; aborted unfinished operation", self.task_id)
        } else {
            write!(f, "Task '{}' cleaned up", self.task_id)
        }
    }
}

impl StructuredLog for TaskCleanedUp {
    fn log(&self) {
        tracing::trace!(task_id = %self.task_id, aborted = self.aborted, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("task_cleanup", span_name = name, task_id = %self.task_id)
    }
}
