// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! The per-device distributed inference runtime.
//!
//! One process per device runs an [`Orchestrator`] that coordinates the
//! dataflow of a partitioned model:
//!
//! ```text
//! caller ──▶ EdgeFlow ──▶ Orchestrator::start_inference
//!                              │ submit root units
//!                              ▼
//!                     ComputationEngine (worker pool)
//!                              │ on_computation_complete
//!                              ▼
//!                     forward-table dispatch
//!                     ┌────────┴─────────┐
//!                     ▼                  ▼
//!            local accumulation   NetworkEventHandler
//!            (InputState, then    (framed TCP to the
//!             re-submit)           destination device)
//!                     │
//!                     ▼
//!            leaf collection ──▶ aggregated completion callback
//! ```
//!
//! # Concurrency Model
//! Shared-memory OS threads throughout: the engine owns a condvar-fed
//! worker pool, the network handler owns a listener thread plus short-lived
//! per-connection readers, and the host caller drives `start_inference`.
//! The DAG is immutable after initialization and shared by reference; all
//! mutable state sits behind fine-grained locks or atomics.

mod config;
mod engine;
mod error;
mod facade;
mod metrics;
mod network;
mod operators;
mod orchestrator;
mod queue;
mod wire;

pub use config::RuntimeConfig;
pub use engine::ComputationEngine;
pub use error::RuntimeError;
pub use facade::{parse_csv_input, CompletionSink, EdgeFlow};
pub use metrics::{EngineStats, EngineStatsSnapshot};
pub use network::NetworkEventHandler;
pub use orchestrator::{InferenceCallback, Orchestrator};
pub use queue::TaskQueue;
pub use wire::{WireMessage, DTYPE_F32};
