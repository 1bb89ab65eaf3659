// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CLI subcommand implementations and shared setup.

pub mod inspect;
pub mod run;
pub mod serve;

use anyhow::Context;
use model_dag::DeviceInfo;
use runtime::RuntimeConfig;
use std::path::Path;

/// Initializes the tracing subscriber based on `-v` count.
///
/// `RUST_LOG` takes precedence when set.
pub fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Loads the runtime configuration, defaulting when no file is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("loading config '{}'", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

/// Reads a single-device JSON description.
pub fn load_device(path: &Path) -> anyhow::Result<DeviceInfo> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading device file '{}'", path.display()))?;
    let device: DeviceInfo = serde_json::from_str(&content)
        .with_context(|| format!("parsing device file '{}'", path.display()))?;
    Ok(device)
}

/// Reads the cluster device-list JSON file.
pub fn load_devices(path: &Path) -> anyhow::Result<Vec<DeviceInfo>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading device list '{}'", path.display()))?;
    let devices = model_dag::load_device_list(&content)
        .with_context(|| format!("parsing device list '{}'", path.display()))?;
    Ok(devices)
}
