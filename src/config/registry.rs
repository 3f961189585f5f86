// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::traits::Device;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps device names used in flow definitions to device handles.
///
/// Devices are shared: every task naming the same device gets a clone of
/// the same `Arc`, so one connection serves the whole flow.
///
/// ```ignore
/// let mut devices = DeviceRegistry::new();
/// devices.insert("wago", Arc::new(ModbusMeter::connect("10.0.0.7:502")?));
/// devices.insert("garo", Arc::new(Wallbox::new("http://10.0.0.9")));
///
/// let built = FlowBuilder::from_config(&cfg.flow, &devices)?;
/// ```
pub struct DeviceRegistry<V>(HashMap<String, Arc<dyn Device<V>>>);

impl<V: Send + 'static> DeviceRegistry<V> {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Register a device under `name`, replacing any previous entry
    pub fn insert(&mut self, name: impl Into<String>, device: Arc<dyn Device<V>>) {
        self.0.insert(name.into(), device);
    }

    /// Builder form of [`DeviceRegistry::insert`]
    pub fn with(mut self, name: impl Into<String>, device: Arc<dyn Device<V>>) -> Self {
        self.insert(name, device);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Device<V>>> {
        self.0.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V: Send + 'static> Default for DeviceRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for DeviceRegistry<V> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<V> std::fmt::Debug for DeviceRegistry<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.0.keys().collect();
        names.sort();
        f.debug_struct("DeviceRegistry")
            .field("device_count", &self.0.len())
            .field("device_names", &names)
            .finish()
    }
}

impl<V> From<HashMap<String, Arc<dyn Device<V>>>> for DeviceRegistry<V> {
    fn from(map: HashMap<String, Arc<dyn Device<V>>>) -> Self {
        Self(map)
    }
}
