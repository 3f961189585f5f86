// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::TaskId;
use crate::errors::FlowValidationError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by `Flow::process`.
///
/// Task failures are not in here: a failing device call is captured on its
/// task and `process()` still returns `Ok`.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The flow was rejected before anything ran.
    #[error("invalid flow: {}", join_errors(.0))]
    InvalidFlow(Vec<FlowValidationError>),

    /// The caller's cancellation token fired while awaited tasks were pending.
    #[error("flow cancelled with {} awaited task(s) pending", .pending.len())]
    Cancelled { pending: Vec<TaskId> },

    /// The process timeout elapsed while awaited tasks were pending.
    #[error("flow timed out after {after:?} with {} awaited task(s) pending", .pending.len())]
    TimedOut { after: Duration, pending: Vec<TaskId> },

    #[error("internal error: {message}")]
    InternalError { message: String },
}

impl ExecutionError {
    /// Awaited tasks that had not reached a terminal status.
    pub fn pending(&self) -> &[TaskId] {
        match self {
            ExecutionError::Cancelled { pending } | ExecutionError::TimedOut { pending, .. } => {
                pending
            }
            _ => &[],
        }
    }
}

fn join_errors(errors: &[FlowValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
