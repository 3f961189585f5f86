// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Validation of configured flow definitions.
//!
//! Runs before any leaf is built, so a bad file is reported in full
//! instead of failing at the first problem:
//!
//! 1. **Task IDs**: non-empty and unique across the whole tree
//! 2. **Await list**: when present, non-empty and naming only defined tasks
//!
//! ```rust
//! use commflow::config::{validate_flow_config, FlowConfig};
//!
//! let flow: FlowConfig = serde_yaml::from_str(r#"
//! flow:
//!   type: sequence
//!   children:
//!     - { type: read, id: l1, device: wago, profile: VoltageAC, datapoint: VoltageL1 }
//! await: [l1, l9]
//! "#).unwrap();
//!
//! let errors = validate_flow_config(&flow).unwrap_err();
//! assert_eq!(errors[0].to_string(), "Await list references task 'l9' which does not exist");
//! ```

use std::collections::HashSet;

use crate::config::{FlowConfig, TaskConfig};
use crate::errors::ValidationError;

/// Validate a flow definition, accumulating every error found.
pub fn validate_flow_config(config: &FlowConfig) -> Result<(), Vec<ValidationError>> {
    let tasks = config
        .root
        .as_ref()
        .map(|root| root.tasks())
        .unwrap_or_default();
    let mut errors = Vec::new();

    if let Err(id_errors) = validate_task_ids(&tasks) {
        errors.extend(id_errors);
    }
    if let Err(await_errors) = validate_await_list(config, &tasks) {
        errors.extend(await_errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_task_ids(tasks: &[&TaskConfig]) -> Result<(), Vec<ValidationError>> {
    let mut seen_ids = HashSet::new();
    let mut reported = HashSet::new();
    let mut errors = Vec::new();

    for task in tasks {
        if task.id.trim().is_empty() {
            errors.push(ValidationError::EmptyTaskId);
            continue;
        }
        // One report per duplicated id, however many times it repeats
        if !seen_ids.insert(task.id.as_str()) && reported.insert(task.id.as_str()) {
            errors.push(ValidationError::DuplicateTaskId {
                task_id: task.id.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_await_list(config: &FlowConfig, tasks: &[&TaskConfig]) -> Result<(), Vec<ValidationError>> {
    let Some(await_ids) = &config.await_ids else {
        return Ok(());
    };
    if await_ids.is_empty() {
        return Err(vec![ValidationError::EmptyAwaitList]);
    }

    let task_ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    let errors: Vec<ValidationError> = await_ids
        .iter()
        .filter(|id| !task_ids.contains(id.as_str()))
        .map(|id| ValidationError::UnresolvedAwait { task_id: id.clone() })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> FlowConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_validate_table_driven() {
        struct TestCase {
            name: &'static str,
            yaml: &'static str,
            expected: Vec<ValidationError>,
        }

        let test_cases = vec![
            TestCase {
                name: "valid nested flow",
                yaml: r#"
flow:
  type: parallel
  children:
    - type: sequence
      children:
        - { type: read, id: a, device: d, profile: P, datapoint: A }
    - { type: read, id: b, device: d, profile: P, datapoint: B }
await: [a, b]
"#,
                expected: vec![],
            },
            TestCase {
                name: "await list omitted",
                yaml: r#"
flow: { type: read, id: a, device: d, profile: P, datapoint: A }
"#,
                expected: vec![],
            },
            TestCase {
                name: "duplicate across branches reported once",
                yaml: r#"
flow:
  type: parallel
  children:
    - { type: read, id: a, device: d, profile: P, datapoint: A }
    - type: sequence
      children:
        - { type: read, id: a, device: d, profile: P, datapoint: B }
        - { type: read, id: a, device: d, profile: P, datapoint: C }
"#,
                expected: vec![ValidationError::DuplicateTaskId {
                    task_id: "a".to_string(),
                }],
            },
            TestCase {
                name: "blank id",
                yaml: r#"
flow: { type: read, id: "  ", device: d, profile: P, datapoint: A }
"#,
                expected: vec![ValidationError::EmptyTaskId],
            },
            TestCase {
                name: "empty await list",
                yaml: r#"
flow: { type: read, id: a, device: d, profile: P, datapoint: A }
await: []
"#,
                expected: vec![ValidationError::EmptyAwaitList],
            },
            TestCase {
                name: "await without a flow",
                yaml: r#"
await: [a]
"#,
                expected: vec![ValidationError::UnresolvedAwait {
                    task_id: "a".to_string(),
                }],
            },
        ];

        for test_case in test_cases {
            let result = validate_flow_config(&parse(test_case.yaml));
            let errors = result.err().unwrap_or_default();
            assert_eq!(errors, test_case.expected, "Test case '{}'", test_case.name);
        }
    }
}
