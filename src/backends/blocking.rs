// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Adapters that turn blocking closures into `Device` implementations.
//!
//! Device drivers are usually synchronous and hold the calling thread for the
//! whole bus transaction, so the closure runs on tokio's blocking pool and
//! never stalls the async workers.

use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::errors::BoxError;
use crate::traits::Device;

/// Read-only device backed by a blocking `(profile, datapoint) -> value` closure.
pub struct BlockingRead<V, F> {
    op: Arc<F>,
    _value: PhantomData<fn() -> V>,
}

impl<V, F> BlockingRead<V, F>
where
    F: Fn(&str, &str) -> Result<V, BoxError> + Send + Sync + 'static,
{
    pub fn new(op: F) -> Self {
        Self {
            op: Arc::new(op),
            _value: PhantomData,
        }
    }
}

#[async_trait]
impl<V, F> Device<V> for BlockingRead<V, F>
where
    V: Send + 'static,
    F: Fn(&str, &str) -> Result<V, BoxError> + Send + Sync + 'static,
{
    async fn get_val(&self, profile: &str, datapoint: &str) -> Result<V, BoxError> {
        let op = Arc::clone(&self.op);
        let profile = profile.to_string();
        let datapoint = datapoint.to_string();
        match tokio::task::spawn_blocking(move || op(&profile, &datapoint)).await {
            Ok(result) => result,
            // Re-raise so the task wrapper records it as a panic, not a device error.
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(Box::new(e)),
        }
    }

    fn name(&self) -> &str {
        "blocking_read"
    }
}

/// Write-only device backed by a blocking `(profile, datapoint, value)` closure.
pub struct BlockingWrite<V, F> {
    op: Arc<F>,
    _value: PhantomData<fn(V)>,
}

impl<V, F> BlockingWrite<V, F>
where
    F: Fn(&str, &str, V) -> Result<(), BoxError> + Send + Sync + 'static,
{
    pub fn new(op: F) -> Self {
        Self {
            op: Arc::new(op),
            _value: PhantomData,
        }
    }
}

#[async_trait]
impl<V, F> Device<V> for BlockingWrite<V, F>
where
    V: Send + 'static,
    F: Fn(&str, &str, V) -> Result<(), BoxError> + Send + Sync + 'static,
{
    async fn set_val(&self, profile: &str, datapoint: &str, value: V) -> Result<(), BoxError> {
        let op = Arc::clone(&self.op);
        let profile = profile.to_string();
        let datapoint = datapoint.to_string();
        match tokio::task::spawn_blocking(move || op(&profile, &datapoint, value)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(Box::new(e)),
        }
    }

    fn name(&self) -> &str {
        "blocking_write"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DeviceError;

    #[tokio::test]
    async fn test_blocking_read_passes_labels() {
        let device = BlockingRead::new(|profile: &str, datapoint: &str| {
            Ok(format!("{}/{}", profile, datapoint))
        });
        let value = device.get_val("VoltageAC", "VoltageL1").await.unwrap();
        assert_eq!(value, "VoltageAC/VoltageL1");
    }

    #[tokio::test]
    async fn test_blocking_read_rejects_writes() {
        let device = BlockingRead::new(|_: &str, _: &str| Ok(1.0f32));
        let err = device.set_val("Curtailment", "HemsCurrentLimit", 2.0).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DeviceError>(),
            Some(DeviceError::Unsupported { operation: "write", .. })
        ));
    }

    #[tokio::test]
    async fn test_blocking_write_receives_value() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let sink = Arc::clone(&seen);
        let device = BlockingWrite::new(move |_: &str, _: &str, value: f32| {
            *sink.lock().unwrap() = Some(value);
            Ok(())
        });
        device.set_val("Curtailment", "HemsCurrentLimit", 10.0).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(10.0));
    }
}
