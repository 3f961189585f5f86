// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors captured on a leaf task.
//!
//! A leaf's error is data: it is stored on the task and read back through
//! its accessors, never propagated to the scheduler.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by device operations.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Shared form of a device error, so captured errors can be cloned out of a task.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Why a leaf task ended in `ExecStatus::Error`.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// The wrapped device operation returned an error, preserved as-is.
    #[error("device operation failed: {0}")]
    Device(#[source] SharedError),

    /// The wrapped callable panicked.
    #[error("device operation panicked: {0}")]
    Panicked(String),

    /// The per-task timeout elapsed before the operation returned.
    #[error("device operation timed out after {0:?}")]
    TimedOut(Duration),

    /// The flow was cancelled or timed out while this task was running.
    #[error("device operation cancelled")]
    Cancelled,

    /// A write task reached execution without a value to send.
    #[error("no write value set")]
    MissingWriteValue,
}

impl TaskError {
    /// The original device error, if this task failed inside the device call.
    ///
    /// Callers downcast it to inspect transport-specific error types.
    pub fn device_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            TaskError::Device(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<BoxError> for TaskError {
    fn from(err: BoxError) -> Self {
        TaskError::Device(Arc::from(err))
    }
}

/// Errors raised by the device adapters shipped with this crate.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The device does not implement the requested operation.
    #[error("device does not support {operation} on {profile}/{datapoint}")]
    Unsupported {
        operation: &'static str,
        profile: String,
        datapoint: String,
    },

    /// A device-side failure described by a message.
    #[error("{0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_is_preserved_for_downcast() {
        let boxed: BoxError = Box::new(DeviceError::Failed("DEVICE ERROR".into()));
        let err = TaskError::from(boxed);

        let original = err.device_error().expect("device error should be kept");
        let device = original
            .downcast_ref::<DeviceError>()
            .expect("original type should be recoverable");
        assert!(matches!(device, DeviceError::Failed(msg) if msg == "DEVICE ERROR"));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "device operation failed: DEVICE ERROR");
    }

    #[test]
    fn test_non_device_errors_have_no_device_error() {
        assert!(TaskError::Cancelled.device_error().is_none());
        assert!(TaskError::TimedOut(Duration::from_millis(5)).device_error().is_none());
    }
}
