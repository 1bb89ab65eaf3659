// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for DAG construction, validation, and loading.

/// Errors that can occur when building or loading a partitioned model DAG.
///
/// All of these are fatal at initialization time: a DAG that fails
/// validation never reaches the runtime.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// The manifest file could not be read.
    #[error("failed to read manifest: {0}")]
    ManifestRead(#[from] std::io::Error),

    /// The manifest JSON is malformed.
    #[error("failed to parse manifest: {0}")]
    ManifestParse(#[from] serde_json::Error),

    /// The DAG declares no execution units.
    #[error("model DAG contains no execution units")]
    EmptyDag,

    /// Two execution units share an identifier.
    #[error("duplicate execution unit id '{0}'")]
    DuplicateUnit(String),

    /// Two layers share an identifier.
    #[error("duplicate layer id '{0}'")]
    DuplicateLayer(String),

    /// An execution unit references a layer that does not exist.
    #[error("unit '{unit}' references unknown layer '{layer}'")]
    UnknownLayer { unit: String, layer: String },

    /// A forward-table entry or input requirement references a unit that
    /// does not exist.
    #[error("unit '{referrer}' references unknown unit '{missing}'")]
    UnknownUnit { referrer: String, missing: String },

    /// A root/leaf flag disagrees with the unit's edge lists.
    #[error("unit '{unit}': {detail}")]
    FlagMismatch { unit: String, detail: String },

    /// A range has `start > end`.
    #[error("unit '{unit}' carries invalid range {range}")]
    InvalidRange { unit: String, range: crate::Range },

    /// A forward-table entry requires a slice outside the producer's output.
    #[error(
        "unit '{unit}' forwards range {required} to '{dest}' outside its output range {output}"
    )]
    ForwardRangeOutsideOutput {
        unit: String,
        dest: String,
        required: crate::Range,
        output: crate::Range,
    },

    /// The execution-unit graph contains a cycle.
    #[error("execution unit graph contains a cycle through '{0}'")]
    CycleDetected(String),

    /// No root (or no leaf) unit exists.
    #[error("model DAG has no {0} execution unit")]
    MissingTerminal(&'static str),

    /// An operator description in the manifest is inconsistent.
    #[error("layer '{layer}': {detail}")]
    InvalidOperator { layer: String, detail: String },

    /// A base-64 parameter payload could not be decoded.
    #[error("layer '{layer}': weight decode failed: {detail}")]
    WeightDecode { layer: String, detail: String },
}
