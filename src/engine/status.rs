// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle state of a leaf task.
///
/// Transitions are monotonic: `Pending -> Running -> {Success, Error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecStatus {
    Pending,
    Running,
    Success,
    Error,
}

impl ExecStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecStatus::Success | ExecStatus::Error)
    }
}

impl Display for ExecStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecStatus::Pending => "PENDING",
            ExecStatus::Running => "RUNNING",
            ExecStatus::Success => "SUCCESS",
            ExecStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Whether a leaf reads from or writes to its device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Read,
    Write,
}

impl Display for TaskKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Read => f.write_str("ReadExec"),
            TaskKind::Write => f.write_str("WriteExec"),
        }
    }
}

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a leaf task, used to build await sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}
