// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::errors::{BoxError, DeviceError};
use crate::traits::Device;

/// Scripted result of a mock device call
#[derive(Debug, Clone)]
pub enum MockOutcome<V> {
    /// Reads return this value; writes succeed
    Respond(V),
    /// Writes succeed; reads fail because there is nothing to return
    Accept,
    /// Every call fails with this message
    Fail(String),
}

/// A simulated device that answers after a fixed delay.
///
/// Stands in for a Modbus meter, REST gateway or wallbox in tests and demos.
pub struct MockDevice<V> {
    name: String,
    delay: Duration,
    outcome: MockOutcome<V>,
    calls: AtomicUsize,
    written: Mutex<Vec<(String, String, V)>>,
}

impl<V: Clone> MockDevice<V> {
    pub fn new(name: impl Into<String>, delay: Duration, outcome: MockOutcome<V>) -> Self {
        Self {
            name: name.into(),
            delay,
            outcome,
            calls: AtomicUsize::new(0),
            written: Mutex::new(Vec::new()),
        }
    }

    /// Device that returns `value` on reads after `delay`
    pub fn responding(name: impl Into<String>, delay: Duration, value: V) -> Self {
        Self::new(name, delay, MockOutcome::Respond(value))
    }

    /// Device that accepts writes after `delay`
    pub fn accepting(name: impl Into<String>, delay: Duration) -> Self {
        Self::new(name, delay, MockOutcome::Accept)
    }

    /// Device that fails every call after `delay`
    pub fn failing(name: impl Into<String>, delay: Duration, message: impl Into<String>) -> Self {
        Self::new(name, delay, MockOutcome::Fail(message.into()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every `(profile, datapoint, value)` written so far, in call order
    pub fn written(&self) -> Vec<(String, String, V)> {
        self.written
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn simulate(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        tracing::debug!(device = %self.name, delay_ms = self.delay.as_millis() as u64, "Delay is over");
    }
}

#[async_trait]
impl<V> Device<V> for MockDevice<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get_val(&self, profile: &str, datapoint: &str) -> Result<V, BoxError> {
        self.simulate().await;
        match &self.outcome {
            MockOutcome::Respond(value) => Ok(value.clone()),
            MockOutcome::Accept => Err(Box::new(DeviceError::Unsupported {
                operation: "read",
                profile: profile.to_string(),
                datapoint: datapoint.to_string(),
            })),
            MockOutcome::Fail(message) => Err(Box::new(DeviceError::Failed(message.clone()))),
        }
    }

    async fn set_val(&self, profile: &str, datapoint: &str, value: V) -> Result<(), BoxError> {
        self.simulate().await;
        match &self.outcome {
            MockOutcome::Fail(message) => Err(Box::new(DeviceError::Failed(message.clone()))),
            _ => {
                self.written
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push((profile.to_string(), datapoint.to_string(), value));
                Ok(())
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
