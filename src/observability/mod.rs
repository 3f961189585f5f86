// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Message types follow a struct-based pattern with a `Display`
//! implementation so log text lives in one place instead of being scattered
//! as string literals through the engine.
//!
//! Messages are organized by subsystem:
//! * `messages::engine` - flow lifecycle events (`process()` start, completion, interruption)
//! * `messages::task` - leaf task execution and cleanup events
//!
//! # Usage
//!
//! ```rust
//! use commflow::observability::messages::engine::FlowStarted;
//! use commflow::observability::messages::StructuredLog;
//!
//! let msg = FlowStarted {
//!     task_count: 5,
//!     awaited: 5,
//!     max_concurrency: None,
//! };
//!
//! msg.log();
//! ```

pub mod messages;
