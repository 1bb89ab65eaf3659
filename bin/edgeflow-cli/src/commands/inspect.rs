// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `edgeflow inspect`: print a model's structure and placement.

use anyhow::Context;
use model_dag::DagLoader;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub fn execute(dag_path: PathBuf) -> anyhow::Result<()> {
    let dag = DagLoader::from_file(&dag_path)
        .with_context(|| format!("loading DAG '{}'", dag_path.display()))?;

    println!("{}", dag.summary());
    println!("  input shape:  {}", dag.input_shape);
    println!("  output shape: {}", dag.output_shape);
    println!();

    // Units per device, in stable order.
    let mut per_device: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for eu in dag.iter_eus() {
        per_device
            .entry(eu.device_id.as_str())
            .or_default()
            .push(eu.id.as_str());
    }
    for (device, mut units) in per_device {
        units.sort_unstable();
        println!("  {device}: {} units", units.len());
        for unit_id in units {
            let eu = dag.eu(unit_id).expect("listed unit exists");
            let layer = dag.layer_of(eu).expect("validated unit has a layer");
            let role = match (eu.is_root, eu.is_leaf) {
                (true, true) => " [root+leaf]",
                (true, false) => " [root]",
                (false, true) => " [leaf]",
                (false, false) => "",
            };
            println!(
                "    {unit_id}{role}: {} {}, {} inputs, {} forwards",
                layer.kind.name(),
                eu.output_range,
                eu.input_requirements.len(),
                eu.forward_table.len(),
            );
        }
    }
    Ok(())
}
