// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{validate_flow_config, DeviceRegistry, FlowConfig, FlowNodeConfig, TaskConfig};
use crate::engine::{Flow, Leaf, Parallel, Processor, ReadExec, Sequence, TaskId, WriteExec};
use crate::errors::{ConfigError, ValidationError};
use crate::traits::Device;
use crate::value::Value;

/// A flow built from configuration plus handles to its tasks by configured id.
pub struct BuiltFlow {
    pub flow: Flow<Value>,
    pub tasks: HashMap<String, Leaf<Value>>,
}

impl BuiltFlow {
    pub fn task(&self, id: &str) -> Option<&Leaf<Value>> {
        self.tasks.get(id)
    }

    /// Release every task's execution handle
    pub fn cleanup(&self) {
        for task in self.tasks.values() {
            task.cleanup();
        }
    }
}

/// Builds runnable flows from configuration.
///
/// # Example
/// ```
/// use commflow::backends::mock::MockDevice;
/// use commflow::config::{DeviceRegistry, FlowBuilder, FlowConfig};
/// use commflow::value::Value;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let cfg: FlowConfig = serde_yaml::from_str(r#"
/// flow:
///   type: sequence
///   children:
///     - { type: read, id: l1, device: wago, profile: VoltageAC, datapoint: VoltageL1 }
/// "#).unwrap();
/// let devices = DeviceRegistry::<Value>::new()
///     .with("wago", Arc::new(MockDevice::responding("wago", Duration::ZERO, Value::Float32(230.0))));
///
/// let built = FlowBuilder::from_config(&cfg, &devices).unwrap();
/// assert_eq!(built.flow.await_set().len(), 1);
/// assert!(built.task("l1").is_some());
/// ```
pub struct FlowBuilder;

impl FlowBuilder {
    /// Build the processor tree, resolving each task's device by name.
    ///
    /// The definition is validated first; every task is awaited when the
    /// await list is omitted.
    pub fn from_config(
        cfg: &FlowConfig,
        devices: &DeviceRegistry<Value>,
    ) -> Result<BuiltFlow, ConfigError> {
        let root = cfg.root.as_ref().ok_or(ConfigError::MissingFlow)?;
        validate_flow_config(cfg).map_err(ConfigError::Invalid)?;

        let mut tasks = HashMap::new();
        let processor = build_node(root, devices, &mut tasks)?;

        let flow = match &cfg.await_ids {
            None => Flow::await_all(processor),
            Some(ids) => {
                let await_set = ids
                    .iter()
                    .map(|id| {
                        tasks.get(id).map(Leaf::id).ok_or_else(|| {
                            ConfigError::Invalid(vec![ValidationError::UnresolvedAwait {
                                task_id: id.clone(),
                            }])
                        })
                    })
                    .collect::<Result<Vec<TaskId>, ConfigError>>()?;
                Flow::new(processor).awaiting(await_set)
            }
        };

        Ok(BuiltFlow { flow, tasks })
    }
}

fn build_node(
    node: &FlowNodeConfig,
    devices: &DeviceRegistry<Value>,
    tasks: &mut HashMap<String, Leaf<Value>>,
) -> Result<Processor<Value>, ConfigError> {
    match node {
        FlowNodeConfig::Sequence { children } => {
            let mut sequence = Sequence::new();
            for child in children {
                sequence = sequence.add(build_node(child, devices, tasks)?);
            }
            Ok(sequence.into())
        }
        FlowNodeConfig::Parallel { children } => {
            let mut parallel = Parallel::new();
            for child in children {
                parallel = parallel.add(build_node(child, devices, tasks)?);
            }
            Ok(parallel.into())
        }
        FlowNodeConfig::Read(task) => {
            let mut read = ReadExec::with_device(&task.profile, &task.datapoint, resolve(task, devices)?);
            if let Some(ms) = task.timeout_ms {
                read = read.with_timeout(Duration::from_millis(ms));
            }
            Ok(register(task, read.as_leaf(), tasks))
        }
        FlowNodeConfig::Write(task) => {
            let mut write = WriteExec::with_device(&task.profile, &task.datapoint, resolve(task, devices)?);
            if let Some(ms) = task.timeout_ms {
                write = write.with_timeout(Duration::from_millis(ms));
            }
            if let Some(value) = &task.value {
                write.set_write_value(value.clone());
            }
            Ok(register(task, write.as_leaf(), tasks))
        }
    }
}

fn register(
    task: &TaskConfig,
    leaf: &Leaf<Value>,
    tasks: &mut HashMap<String, Leaf<Value>>,
) -> Processor<Value> {
    tasks.insert(task.id.clone(), leaf.clone());
    leaf.into()
}

fn resolve(task: &TaskConfig, devices: &DeviceRegistry<Value>) -> Result<Arc<dyn Device<Value>>, ConfigError> {
    devices
        .get(&task.device)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownDevice {
            task_id: task.id.clone(),
            device: task.device.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::MockDevice;
    use crate::engine::{ExecStatus, TaskKind};

    fn devices() -> (DeviceRegistry<Value>, Arc<MockDevice<Value>>) {
        let garo = Arc::new(MockDevice::accepting("garo", Duration::ZERO));
        let registry = DeviceRegistry::<Value>::new()
            .with(
                "wago",
                Arc::new(MockDevice::responding("wago", Duration::from_millis(5), Value::Float32(230.0))),
            )
            .with("garo", garo.clone());
        (registry, garo)
    }

    fn parse(yaml: &str) -> FlowConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_builds_tree_and_task_handles() {
        let (registry, _) = devices();
        let cfg = parse(
            r#"
flow:
  type: parallel
  children:
    - type: sequence
      children:
        - { type: read, id: l1, device: wago, profile: VoltageAC, datapoint: VoltageL1 }
        - { type: read, id: l2, device: wago, profile: VoltageAC, datapoint: VoltageL2, timeout_ms: 50 }
    - { type: write, id: lim, device: garo, profile: Curtailment, datapoint: HemsCurrentLimit,
        value: { type: float32, value: 10.0 } }
await: [l1, lim]
"#,
        );

        let built = FlowBuilder::from_config(&cfg, &registry).unwrap();

        assert_eq!(built.tasks.len(), 3);
        let (l1, l2, lim) = (
            built.task("l1").unwrap(),
            built.task("l2").unwrap(),
            built.task("lim").unwrap(),
        );
        assert_eq!(lim.kind(), TaskKind::Write);
        assert_eq!(lim.device_name(), "garo");
        assert_eq!(l2.datapoint(), "VoltageL2");
        assert_eq!(built.flow.await_set(), &[l1.id(), lim.id()]);
        assert_eq!(
            built.flow.root().to_string(),
            format!("Parallel[Sequence[{}, {}], {}]", l1.id(), l2.id(), lim.id())
        );
    }

    #[test]
    fn test_omitted_await_list_awaits_every_task() {
        let (registry, _) = devices();
        let cfg = parse(
            r#"
flow:
  type: sequence
  children:
    - { type: read, id: a, device: wago, profile: P, datapoint: A }
    - { type: read, id: b, device: wago, profile: P, datapoint: B }
"#,
        );

        let built = FlowBuilder::from_config(&cfg, &registry).unwrap();
        assert_eq!(built.flow.await_set().len(), 2);
    }

    #[test]
    fn test_unknown_device_is_reported() {
        let (registry, _) = devices();
        let cfg = parse(
            r#"
flow: { type: read, id: p1, device: clemap, profile: ActivePowerAC, datapoint: ActivePowerACtot }
"#,
        );

        match FlowBuilder::from_config(&cfg, &registry) {
            Err(ConfigError::UnknownDevice { task_id, device }) => {
                assert_eq!(task_id, "p1");
                assert_eq!(device, "clemap");
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected unknown device error"),
        }
    }

    #[test]
    fn test_missing_flow_and_invalid_definition() {
        let (registry, _) = devices();
        assert!(matches!(
            FlowBuilder::from_config(&FlowConfig::default(), &registry),
            Err(ConfigError::MissingFlow)
        ));

        let cfg = parse(
            r#"
flow: { type: read, id: a, device: wago, profile: P, datapoint: A }
await: [b]
"#,
        );
        assert!(matches!(
            FlowBuilder::from_config(&cfg, &registry),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_built_flow_runs() {
        let (registry, garo) = devices();
        let cfg = parse(
            r#"
flow:
  type: parallel
  children:
    - { type: read, id: l1, device: wago, profile: VoltageAC, datapoint: VoltageL1 }
    - { type: write, id: lim, device: garo, profile: Curtailment, datapoint: HemsCurrentLimit,
        value: { type: float32, value: 10.0 } }
"#,
        );

        let BuiltFlow { flow, tasks } = FlowBuilder::from_config(&cfg, &registry).unwrap();
        let summary = flow.process().await.unwrap();

        assert_eq!(summary.succeeded, 2);
        let l1 = &tasks["l1"];
        assert_eq!(l1.status(), ExecStatus::Success);
        assert_eq!(l1.value(), Some(Value::Float32(230.0)));
        assert_eq!(
            garo.written(),
            vec![(
                "Curtailment".to_string(),
                "HemsCurrentLimit".to_string(),
                Value::Float32(10.0)
            )]
        );
        for task in tasks.values() {
            task.cleanup();
        }
    }
}
