// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # edgeflow
//!
//! Command-line interface for the EdgeFlow distributed inference runtime.
//!
//! ## Usage
//! ```bash
//! # Run one inference on this device
//! edgeflow run --dag ./models/xor.json --device ./device0.json \
//!     --devices ./cluster.json --input "1,0"
//!
//! # Inspect a partitioned model
//! edgeflow inspect --dag ./models/xor.json
//!
//! # Participate in a cluster until interrupted
//! edgeflow serve --dag ./models/xor.json --device ./device1.json \
//!     --devices ./cluster.json
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "edgeflow",
    about = "Distributed neural-network inference runtime for edge devices",
    version
)]
struct Cli {
    /// Path to a TOML runtime configuration file.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one inference on this device and print the result.
    Run {
        /// Path to the partitioned-DAG JSON file.
        #[arg(short, long)]
        dag: std::path::PathBuf,

        /// Path to this device's JSON description.
        #[arg(long)]
        device: std::path::PathBuf,

        /// Path to the cluster device-list JSON file.
        #[arg(long)]
        devices: std::path::PathBuf,

        /// Input tensor as comma-separated floats (e.g. "1,0").
        #[arg(short, long)]
        input: String,

        /// Seconds to wait for the aggregated output.
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,
    },

    /// Print the model's layers, units, and per-device placement.
    Inspect {
        /// Path to the partitioned-DAG JSON file.
        #[arg(short, long)]
        dag: std::path::PathBuf,
    },

    /// Join the cluster as a device and serve until interrupted.
    Serve {
        /// Path to the partitioned-DAG JSON file.
        #[arg(short, long)]
        dag: std::path::PathBuf,

        /// Path to this device's JSON description.
        #[arg(long)]
        device: std::path::PathBuf,

        /// Path to the cluster device-list JSON file.
        #[arg(long)]
        devices: std::path::PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::init_tracing(cli.verbose);

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            dag,
            device,
            devices,
            input,
            timeout_secs,
        } => commands::run::execute(dag, device, devices, input, timeout_secs, config),
        Commands::Inspect { dag } => commands::inspect::execute(dag),
        Commands::Serve {
            dag,
            device,
            devices,
        } => commands::serve::execute(dag, device, devices, config),
    }
}
