// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::TaskId;
use std::fmt;

/// Caller misuse detected when a flow is handed to `process()`.
///
/// These are programming errors; `process()` reports them before any task runs.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowValidationError {
    /// No task was declared in the await set
    EmptyAwaitSet,
    /// An awaited task is not reachable from the root
    UnknownAwaitTask {
        task_id: TaskId,
    },
    /// The same task handle was added at more than one position in the tree
    DuplicateTask {
        task_id: TaskId,
        profile: String,
        datapoint: String,
    },
    /// The task was already run by an earlier `process()` call
    TaskAlreadyClaimed {
        task_id: TaskId,
    },
    /// A write task has no value to send
    MissingWriteValue {
        task_id: TaskId,
        profile: String,
        datapoint: String,
    },
}

impl fmt::Display for FlowValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowValidationError::EmptyAwaitSet => {
                write!(f, "Await set is empty: at least one task must be awaited")
            }
            FlowValidationError::UnknownAwaitTask { task_id } => {
                write!(f, "Awaited task '{}' is not part of this flow", task_id)
            }
            FlowValidationError::DuplicateTask {
                task_id,
                profile,
                datapoint,
            } => {
                write!(
                    f,
                    "Task '{}' ({}/{}) appears more than once in the flow",
                    task_id, profile, datapoint
                )
            }
            FlowValidationError::TaskAlreadyClaimed { task_id } => {
                write!(
                    f,
                    "Task '{}' was already processed; tasks are single-shot",
                    task_id
                )
            }
            FlowValidationError::MissingWriteValue {
                task_id,
                profile,
                datapoint,
            } => {
                write!(
                    f,
                    "Write task '{}' ({}/{}) has no value; call set_write_value before process()",
                    task_id, profile, datapoint
                )
            }
        }
    }
}

impl std::error::Error for FlowValidationError {}
