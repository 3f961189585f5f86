// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Device implementations shipped with commflow.
//!
//! Every leaf task talks to a `Device`. Real transports (Modbus, REST,
//! vendor SDKs) live in the application; this module provides the adapters
//! the engine itself needs.
//!
//! # Available Backends
//!
//! ## Blocking
//! Wraps a synchronous closure so it runs on tokio's blocking pool:
//! - **BlockingRead**: `Fn(&str, &str) -> Result<V, BoxError>`
//! - **BlockingWrite**: `Fn(&str, &str, V) -> Result<(), BoxError>`
//! - **Use Case**: Existing blocking drivers that cannot be made async
//!
//! ## Mock
//! Simulated devices with a fixed delay and a scripted outcome:
//! - **MockDevice**: responds with a value, accepts writes, or fails
//! - **Use Case**: Tests, demos, and dry runs of configured flows

pub mod blocking;
pub mod mock;
