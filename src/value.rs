// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Ready-made value type for device data points.
//!
//! The engine is generic over the value a leaf reads or writes and never
//! looks inside it. `Value` is the default choice and the type used by
//! YAML flow definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// A data point value as exchanged with a device.
///
/// # Example
/// ```yaml
/// value: { type: float32, value: 10.0 }
/// value: { type: enum, value: { ordinal: 5, literal: WP_DOM_WATER_OP } }
/// value: { type: bitmap, value: { compressor_on: true, defrost: false } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Float32(f32),
    Float64(f64),
    Int64(i64),
    Boolean(bool),
    String(String),
    Enum { ordinal: i64, literal: String },
    Bitmap(BTreeMap<String, bool>),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            Value::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Enum { ordinal, literal } => write!(f, "{}({})", literal, ordinal),
            Value::Bitmap(bits) => {
                let set: Vec<&str> = bits
                    .iter()
                    .filter(|(_, on)| **on)
                    .map(|(name, _)| name.as_str())
                    .collect();
                write!(f, "[{}]", set.join(", "))
            }
        }
    }
}
