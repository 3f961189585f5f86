// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! * `engine` - flow lifecycle events
//! * `task` - leaf task execution events

use tracing::Span;

pub mod engine;
pub mod task;

/// A log message that knows its own level and structured fields.
pub trait StructuredLog {
    /// Emit the message at its designated level with structured fields.
    fn log(&self);

    /// Create a span carrying the same fields.
    fn span(&self, name: &str) -> Span;
}
