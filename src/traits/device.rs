// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::errors::{BoxError, DeviceError};

/// A handle to an external device that leaf tasks read from and write to.
///
/// Either call may take an arbitrary, device-dependent time and may fail.
/// Read-only or write-only devices implement just one method; the other
/// reports `DeviceError::Unsupported`.
#[async_trait]
pub trait Device<V>: Send + Sync
where
    V: Send + 'static,
{
    async fn get_val(&self, profile: &str, datapoint: &str) -> Result<V, BoxError> {
        Err(Box::new(DeviceError::Unsupported {
            operation: "read",
            profile: profile.to_string(),
            datapoint: datapoint.to_string(),
        }))
    }

    async fn set_val(&self, profile: &str, datapoint: &str, value: V) -> Result<(), BoxError> {
        let _ = value;
        Err(Box::new(DeviceError::Unsupported {
            operation: "write",
            profile: profile.to_string(),
            datapoint: datapoint.to_string(),
        }))
    }

    fn name(&self) -> &str {
        "device"
    }
}
