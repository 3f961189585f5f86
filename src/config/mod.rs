// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod builder;
mod loader;
mod registry;
mod validation;

pub use builder::{BuiltFlow, FlowBuilder};
pub use loader::{
    load_and_validate_config, load_config, Config, ExecutorOptions, FlowConfig, FlowNodeConfig,
    TaskConfig,
};
pub use registry::DeviceRegistry;
pub use validation::validate_flow_config;
