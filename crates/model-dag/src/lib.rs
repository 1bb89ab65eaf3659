// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-dag
//!
//! The data model of a partitioned neural network: a DAG of layers, each
//! split into one or more *execution units* (EUs) statically assigned to
//! devices. An EU is responsible for a slice (its *output range*) of its
//! layer's output; forward tables describe where that slice flows next and
//! input requirements describe which upstream slices the EU consumes.
//!
//! # Type-State Validation
//! The DAG transitions through states enforced at compile time:
//!
//! ```text
//! ModelDag<Unchecked>    — built or parsed, invariants not yet verified.
//!       │  .validate()
//!       ▼
//! ModelDag<Validated>    — references resolved, flags consistent, acyclic.
//! ```
//!
//! The runtime only accepts a `Validated` DAG, so a malformed description
//! can never reach the execution path.
//!
//! # Loading
//! [`DagLoader`] parses the JSON manifest format (layers with base-64
//! parameter tensors, EUs with ranges and forward tables) and returns a
//! validated DAG. [`load_device_list`] parses the companion device list.

mod dag;
mod device;
mod error;
mod loader;
mod manifest;
mod operator;
mod range;
mod unit;

pub use dag::{DagState, Layer, ModelDag, Unchecked, Validated};
pub use device::{load_device_list, DeviceInfo, DeviceMap};
pub use error::DagError;
pub use loader::DagLoader;
pub use manifest::{
    DagManifest, ManifestForward, ManifestInput, ManifestLayer, ManifestOperator,
    ManifestTensor, ManifestUnit,
};
pub use operator::{ActivationKind, ConvHParams, OperatorKind, PoolHParams};
pub use range::Range;
pub use unit::{ExecutionUnit, ForwardEntry, InputRequirement, Prepad};

/// Opaque device identifier.
pub type DeviceId = String;
/// Opaque layer identifier.
pub type LayerId = String;
/// Opaque execution-unit identifier. By convention `"<layer>::<suffix>"`,
/// but nothing in the runtime depends on that structure.
pub type ExecutionUnitId = String;
