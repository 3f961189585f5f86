// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::ConfigError;
use crate::value::Value;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Top-level configuration file.
///
/// # Fields
/// * `executor_options` - Concurrency and timeout settings for `process()` (optional)
/// * `flow` - Declarative flow definition and its await list (optional)
///
/// # Example
/// ```yaml
/// executor_options:
///   max_concurrency: 8
///   timeout_ms: 5000
/// flow:
///   type: parallel
///   children:
///     - type: sequence
///       children:
///         - { type: read, id: l1, device: wago, profile: VoltageAC, datapoint: VoltageL1 }
///         - { type: read, id: l2, device: wago, profile: VoltageAC, datapoint: VoltageL2 }
///     - { type: read, id: p1, device: clemap, profile: ActivePowerAC, datapoint: ActivePowerACtot }
/// await: [l1, l2, p1]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub executor_options: ExecutorOptions,
    #[serde(flatten)]
    pub flow: FlowConfig,
}

/// Settings applied to every `process()` call made from this configuration.
///
/// # Fields
/// * `max_concurrency` - Maximum number of device calls in flight (unbounded when absent)
/// * `timeout_ms` - Give up waiting for the await set after this many milliseconds
/// * `task_timeout_ms` - Fail any single device call that takes longer than this
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExecutorOptions {
    pub max_concurrency: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub task_timeout_ms: Option<u64>,
}

/// A flow definition: the processor tree plus the ids to await.
///
/// When `await` is absent every task in the tree is awaited.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowConfig {
    #[serde(rename = "flow")]
    pub root: Option<FlowNodeConfig>,
    #[serde(rename = "await")]
    pub await_ids: Option<Vec<String>>,
}

/// One node of a configured processor tree, selected by `type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowNodeConfig {
    Sequence {
        #[serde(default)]
        children: Vec<FlowNodeConfig>,
    },
    Parallel {
        #[serde(default)]
        children: Vec<FlowNodeConfig>,
    },
    Read(TaskConfig),
    Write(TaskConfig),
}

/// A leaf task definition.
///
/// # Fields
/// * `id` - Name used by the await list and to look the task up after building
/// * `device` - Key into the device registry
/// * `profile` / `datapoint` - Passed through to the device on every call
/// * `value` - Value to send (write tasks only)
/// * `timeout_ms` - Per-task timeout overriding `executor_options.task_timeout_ms`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskConfig {
    pub id: String,
    pub device: String,
    pub profile: String,
    pub datapoint: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl FlowNodeConfig {
    /// Every task definition below this node, depth-first.
    pub fn tasks(&self) -> Vec<&TaskConfig> {
        let mut tasks = Vec::new();
        self.collect_tasks(&mut tasks);
        tasks
    }

    fn collect_tasks<'a>(&'a self, out: &mut Vec<&'a TaskConfig>) {
        match self {
            FlowNodeConfig::Sequence { children } | FlowNodeConfig::Parallel { children } => {
                for child in children {
                    child.collect_tasks(out);
                }
            }
            FlowNodeConfig::Read(task) | FlowNodeConfig::Write(task) => out.push(task),
        }
    }
}

/// Load a config from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    Ok(cfg)
}

/// Load a config and validate its flow definition.
///
/// All problems are reported at once rather than stopping at the first.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let cfg = load_config(path)?;
    crate::config::validate_flow_config(&cfg.flow).map_err(ConfigError::Invalid)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ValidationError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_basic_config() {
        let yaml = r#"
executor_options:
  max_concurrency: 4
  timeout_ms: 2000
flow:
  type: parallel
  children:
    - type: sequence
      children:
        - { type: read, id: l1, device: wago, profile: VoltageAC, datapoint: VoltageL1 }
        - { type: read, id: l2, device: wago, profile: VoltageAC, datapoint: VoltageL2 }
    - type: write
      id: lim
      device: garo
      profile: Curtailment
      datapoint: HemsCurrentLimit
      value: { type: float32, value: 10.0 }
await: [l1, lim]
"#;

        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.executor_options.max_concurrency, Some(4));
        assert_eq!(cfg.executor_options.timeout_ms, Some(2000));
        assert!(cfg.executor_options.task_timeout_ms.is_none());

        let root = cfg.flow.root.as_ref().unwrap();
        let ids: Vec<&str> = root.tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["l1", "l2", "lim"]);
        assert_eq!(root.tasks()[2].value, Some(Value::Float32(10.0)));
        assert_eq!(
            cfg.flow.await_ids,
            Some(vec!["l1".to_string(), "lim".to_string()])
        );
    }

    #[test]
    fn test_flow_section_is_optional() {
        let cfg: Config = serde_yaml::from_str("executor_options:\n  max_concurrency: 2\n").unwrap();
        assert!(cfg.flow.root.is_none());
        assert!(cfg.flow.await_ids.is_none());
        assert_eq!(cfg.executor_options.max_concurrency, Some(2));
    }

    #[test]
    fn test_unknown_node_type_fails_to_parse() {
        let yaml = r#"
flow:
  type: race
  children: []
"#;
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_load_and_validate_valid_config() {
        let file = write_config(
            r#"
flow:
  type: sequence
  children:
    - { type: read, id: a, device: wago, profile: VoltageAC, datapoint: VoltageL1 }
    - { type: read, id: b, device: wago, profile: VoltageAC, datapoint: VoltageL2 }
"#,
        );

        let cfg = load_and_validate_config(file.path()).unwrap();
        assert_eq!(cfg.flow.root.unwrap().tasks().len(), 2);
    }

    #[test]
    fn test_load_and_validate_reports_every_problem() {
        let file = write_config(
            r#"
flow:
  type: parallel
  children:
    - { type: read, id: a, device: wago, profile: VoltageAC, datapoint: VoltageL1 }
    - { type: read, id: a, device: wago, profile: VoltageAC, datapoint: VoltageL2 }
await: [a, nonexistent]
"#,
        );

        match load_and_validate_config(file.path()) {
            Err(ConfigError::Invalid(errors)) => {
                assert_eq!(
                    errors,
                    vec![
                        ValidationError::DuplicateTaskId {
                            task_id: "a".to_string()
                        },
                        ValidationError::UnresolvedAwait {
                            task_id: "nonexistent".to_string()
                        },
                    ]
                );
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let file = write_config("executor_options: [not, a, map");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }
}
