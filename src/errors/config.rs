// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use thiserror::Error;

/// Errors found while validating a flow definition loaded from configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Two tasks in the flow definition share an ID
    DuplicateTaskId {
        /// The duplicate task ID
        task_id: String,
    },
    /// The await list names a task that the flow does not define
    UnresolvedAwait {
        /// The awaited ID that couldn't be resolved
        task_id: String,
    },
    /// The await list is present but empty
    EmptyAwaitList,
    /// A task ID is blank
    EmptyTaskId,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateTaskId { task_id } => {
                write!(f, "Duplicate task ID: '{}'", task_id)
            }
            ValidationError::UnresolvedAwait { task_id } => {
                write!(f, "Await list references task '{}' which does not exist", task_id)
            }
            ValidationError::EmptyAwaitList => {
                write!(f, "Await list is empty; omit it to await every task")
            }
            ValidationError::EmptyTaskId => write!(f, "Task ID must not be empty"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors from loading configuration and building flows from it.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("configuration validation failed:\n{}", join_lines(.0))]
    Invalid(Vec<ValidationError>),

    #[error("task '{task_id}' references unknown device '{device}'")]
    UnknownDevice { task_id: String, device: String },

    #[error("configuration does not define a flow")]
    MissingFlow,
}

fn join_lines(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
