// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `edgeflow run`: execute one inference on this device.

use anyhow::Context;
use model_dag::DagLoader;
use runtime::{EdgeFlow, RuntimeConfig};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

pub fn execute(
    dag_path: PathBuf,
    device_path: PathBuf,
    devices_path: PathBuf,
    input: String,
    timeout_secs: u64,
    config: RuntimeConfig,
) -> anyhow::Result<()> {
    let dag = DagLoader::from_file(&dag_path)
        .with_context(|| format!("loading DAG '{}'", dag_path.display()))?;
    let device = super::load_device(&device_path)?;
    let devices = super::load_devices(&devices_path)?;

    println!("  Model:  {}", dag.summary());
    println!("  Device: {} ({}:{})", device.id, device.ip_address, device.port);
    println!("  Input:  [{input}]");

    let facade = EdgeFlow::new();
    facade.initialize(dag, device, devices, &config)?;

    let (tx, rx) = mpsc::channel();
    facade.register_completion_callback(move |_values: &[f32], text: &str| {
        let _ = tx.send(text.to_string());
    });

    facade.inference_csv(&input)?;
    tracing::info!("inference started, awaiting aggregated output");

    let output = rx
        .recv_timeout(Duration::from_secs(timeout_secs))
        .context("timed out waiting for the aggregated output (did every device join?)")?;

    println!("  Output: [{output}]");
    Ok(())
}
