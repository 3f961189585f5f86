// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // device adapters
pub mod config;     // config + device registry
pub mod engine;     // leaves, composites, flow runner
pub mod errors;     // error handling
pub mod observability;
pub mod traits;     // device abstraction
pub mod value;

pub use engine::{
    ExecStatus, Flow, Leaf, Parallel, ProcessOptions, ProcessSummary, Processor, ReadExec,
    Sequence, TaskId, TaskKind, TaskReport, WriteExec,
};
pub use errors::{ExecutionError, TaskError};
pub use traits::Device;
pub use value::Value;
