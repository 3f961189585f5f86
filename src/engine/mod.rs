// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Execution engine: leaf tasks, composite processors and the flow runner.

pub mod status;
pub(crate) mod context;
pub mod leaf;
pub mod processor;
pub(crate) mod join;
pub mod flow;
pub mod options;

pub use flow::{Flow, ProcessSummary};
pub use leaf::{Leaf, ReadExec, TaskReport, TaskValue, WriteExec};
pub use options::ProcessOptions;
pub use processor::{Parallel, Processor, Sequence};
pub use status::{ExecStatus, TaskId, TaskKind};
