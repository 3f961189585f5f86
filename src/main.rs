// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use serde::Serialize;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use commflow::backends::mock::MockDevice;
use commflow::config::{load_and_validate_config, BuiltFlow, DeviceRegistry, FlowBuilder};
use commflow::{Leaf, Parallel, ProcessOptions, ProcessSummary, ReadExec, Sequence, TaskReport, Value, WriteExec};

const DEVICE_ERROR: &str = "DEVICE ERROR";

/// Outcome of one chain, printed as JSON
#[derive(Serialize)]
struct ChainReport {
    chain: String,
    summary: ProcessSummary,
    tasks: Vec<TaskReport<Value>>,
}

impl ChainReport {
    fn new(chain: &str, summary: ProcessSummary, tasks: &[&Leaf<Value>]) -> Self {
        Self {
            chain: chain.to_string(),
            summary,
            tasks: tasks.iter().map(|task| task.report()).collect(),
        }
    }
}

/// Simulated installation: a Modbus meter, two REST gateways and two wallboxes.
fn mock_devices(failing: bool) -> DeviceRegistry<Value> {
    let read = |name: &str, delay_ms: u64, value: Value| -> Arc<MockDevice<Value>> {
        let delay = Duration::from_millis(delay_ms);
        Arc::new(if failing {
            MockDevice::failing(name, delay, DEVICE_ERROR)
        } else {
            MockDevice::responding(name, delay, value)
        })
    };
    let write = |name: &str, delay_ms: u64| -> Arc<MockDevice<Value>> {
        let delay = Duration::from_millis(if failing { 1000 } else { delay_ms });
        Arc::new(if failing {
            MockDevice::failing(name, delay, DEVICE_ERROR)
        } else {
            MockDevice::accepting(name, delay)
        })
    };

    DeviceRegistry::<Value>::new()
        .with("wago", read("wago", 500, Value::Float32(220.0)))
        .with("clemap", read("clemap", 750, Value::Float32(20.0)))
        .with("clemap_2", read("clemap_2", 2000, Value::Float64(50.0)))
        .with("garo_a", write("garo_a", 500))
        .with("garo_b", write("garo_b", 250))
}

fn device(devices: &DeviceRegistry<Value>, name: &str) -> Result<Arc<dyn commflow::Device<Value>>> {
    devices
        .get(name)
        .cloned()
        .with_context(|| format!("no device named '{}'", name))
}

/// Read the meters, derive current limits, then write them to both wallboxes.
async fn run_sample(devices: &DeviceRegistry<Value>) -> Result<Vec<ChainReport>> {
    let wago = device(devices, "wago")?;
    let voltage_l1 = ReadExec::with_device("VoltageAC", "VoltageL1", Arc::clone(&wago));
    let voltage_l2 = ReadExec::with_device("VoltageAC", "VoltageL2", Arc::clone(&wago));
    let voltage_l3 = ReadExec::with_device("VoltageAC", "VoltageL3", wago);
    let power_tot = ReadExec::with_device("ActivePowerAC", "ActivePowerACtot", device(devices, "clemap")?);
    let power_tot_2 = ReadExec::with_device("ActivePowerAC", "ActivePowerACtot", device(devices, "clemap_2")?);

    let limit_a = WriteExec::with_device("Curtailment", "HemsCurrentLimit", device(devices, "garo_a")?);
    let limit_b = WriteExec::with_device("Curtailment", "HemsCurrentLimit", device(devices, "garo_b")?);

    let read_chain = Parallel::new()
        .add(Sequence::new().add(&voltage_l1).add(&voltage_l2).add(&voltage_l3))
        .add(Parallel::new().add(&power_tot).add(&power_tot_2))
        .awaiting([&voltage_l1, &voltage_l2, &voltage_l3, &power_tot, &power_tot_2]);
    tracing::info!(flow = %read_chain, "Processing read chain");
    let read_summary = read_chain.process().await?;

    limit_a.set_write_value(Value::Float32(10.0));
    limit_b.set_write_value(Value::Float32(5.0));

    let write_chain = Parallel::new().add(&limit_a).add(&limit_b).awaiting([&limit_a, &limit_b]);
    tracing::info!(flow = %write_chain, "Processing write chain");
    let write_summary = write_chain.process().await?;

    let reads = [&voltage_l1, &voltage_l2, &voltage_l3, &power_tot, &power_tot_2];
    let writes = [&limit_a, &limit_b];
    for task in reads.iter().map(|t| t.as_leaf()).chain(writes.iter().map(|t| t.as_leaf())) {
        tracing::info!("{}", task);
        task.cleanup();
    }

    let read_leaves: Vec<&Leaf<Value>> = reads.iter().map(|t| t.as_leaf()).collect();
    let write_leaves: Vec<&Leaf<Value>> = writes.iter().map(|t| t.as_leaf()).collect();
    Ok(vec![
        ChainReport::new("read", read_summary, &read_leaves),
        ChainReport::new("write", write_summary, &write_leaves),
    ])
}

/// Run a flow defined in a YAML file against the simulated devices.
async fn run_config(path: &str, devices: &DeviceRegistry<Value>) -> Result<Vec<ChainReport>> {
    let cfg = load_and_validate_config(path).with_context(|| format!("loading {}", path))?;
    let BuiltFlow { flow, tasks } =
        FlowBuilder::from_config(&cfg.flow, devices).with_context(|| format!("building flow from {}", path))?;

    tracing::info!(flow = %flow, "Processing configured flow");
    let summary = flow
        .process_with(ProcessOptions::from_config(&cfg.executor_options))
        .await?;

    let mut leaves: Vec<&Leaf<Value>> = tasks.values().collect();
    leaves.sort_by_key(|leaf| leaf.id());
    for leaf in &leaves {
        tracing::info!("{}", leaf);
        leaf.cleanup();
    }
    Ok(vec![ChainReport::new(path, summary, &leaves)])
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let failing = args.iter().any(|arg| arg == "--fail");
    let config_path = args.iter().find(|arg| !arg.starts_with("--"));

    let devices = mock_devices(failing);
    let reports = match config_path {
        Some(path) => run_config(path, &devices).await?,
        None => run_sample(&devices).await?,
    };

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
