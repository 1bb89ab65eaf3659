// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed
//! programmatically.
//!
//! # TOML Format
//! ```toml
//! worker_threads = 4
//! max_message_bytes = 67108864
//! connect_timeout_ms = 5000
//! ```

use std::path::Path;
use std::time::Duration;

/// Configuration for the per-device runtime.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfig {
    /// Number of engine worker threads. Defaults to three quarters of the
    /// hardware concurrency, with a floor of one.
    pub worker_threads: Option<usize>,
    /// Maximum accepted wire-frame size in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Timeout for outbound connections to peer devices.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_max_message_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, super::RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            super::RuntimeError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, super::RuntimeError> {
        toml::from_str(toml_str)
            .map_err(|e| super::RuntimeError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, super::RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| super::RuntimeError::Config(format!("TOML serialise error: {e}")))
    }

    /// Resolves the number of worker threads.
    ///
    /// Uses the override when present, otherwise
    /// `max(1, 0.75 × hardware_concurrency)`.
    pub fn resolve_workers(&self) -> usize {
        self.worker_threads.unwrap_or_else(|| {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4);
            (cores * 3 / 4).max(1)
        })
    }

    /// Returns the outbound connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            max_message_bytes: default_max_message_bytes(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}
