// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::ExecutorOptions;

/// Knobs for a single `process()` invocation.
///
/// The defaults mean unbounded concurrency and no deadline, so a device call
/// that never returns blocks `process()` until the caller cancels it.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Give up waiting for the await set after this long
    pub timeout: Option<Duration>,
    /// Fail any single device call that takes longer than this
    pub task_timeout: Option<Duration>,
    /// Maximum number of leaves executing at once
    pub max_concurrency: Option<usize>,
    /// Caller-owned token that stops the flow when cancelled
    pub cancellation: Option<CancellationToken>,
}

impl ProcessOptions {
    /// Build options from the `executor_options` section of a configuration file.
    pub fn from_config(options: &ExecutorOptions) -> Self {
        Self {
            timeout: options.timeout_ms.map(Duration::from_millis),
            task_timeout: options.task_timeout_ms.map(Duration::from_millis),
            max_concurrency: options.max_concurrency,
            cancellation: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency.max(1));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}
