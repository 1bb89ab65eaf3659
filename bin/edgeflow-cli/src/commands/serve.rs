// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `edgeflow serve`: participate in the cluster until interrupted.
//!
//! A serving device hosts its assigned execution units and reacts to
//! inbound partials; inference is driven from whichever device receives
//! the host input.

use anyhow::Context;
use model_dag::DagLoader;
use runtime::{EdgeFlow, RuntimeConfig};
use std::path::PathBuf;

pub fn execute(
    dag_path: PathBuf,
    device_path: PathBuf,
    devices_path: PathBuf,
    config: RuntimeConfig,
) -> anyhow::Result<()> {
    let dag = DagLoader::from_file(&dag_path)
        .with_context(|| format!("loading DAG '{}'", dag_path.display()))?;
    let device = super::load_device(&device_path)?;
    let devices = super::load_devices(&devices_path)?;

    let hosted = dag.local_eus(&device.id).count();
    println!("  Model:  {}", dag.summary());
    println!(
        "  Device: {} ({}:{}), hosting {hosted} units",
        device.id, device.ip_address, device.port
    );

    let facade = EdgeFlow::new();
    facade.register_completion_callback(|_values: &[f32], text: &str| {
        println!("  Output: [{text}]");
    });
    facade.initialize(dag, device, devices, &config)?;

    println!("  Serving. Press Ctrl-C to stop.");
    loop {
        std::thread::park();
    }
}
