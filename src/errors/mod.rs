// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod execution;
mod task;
mod validation;

pub use config::{ConfigError, ValidationError};
pub use execution::ExecutionError;
pub use task::{BoxError, DeviceError, SharedError, TaskError};
pub use validation::FlowValidationError;
