// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the inference runtime.
//!
//! Errors never unwind across threads: worker and handler failures are
//! logged where they happen, and only the originating public call reports
//! a `Result`.

use tensor_core::TensorError;

/// Errors that can occur in the distributed runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The DAG failed structural validation at initialization.
    #[error("DAG validation failed: {0}")]
    DagValidation(#[from] model_dag::DagError),

    /// A runtime operation was invoked before `initialize`.
    #[error("runtime is not initialized")]
    NotInitialized,

    /// An inference was submitted while another is active.
    #[error("an inference is already in progress")]
    InferenceActive,

    /// The caller-supplied input could not be turned into a model input.
    #[error("invalid inference input: {0}")]
    InvalidInput(String),

    /// The local device id is missing from the device map.
    #[error("local device '{device}' is not present in the device map")]
    UnknownLocalDevice { device: String },

    /// A dispatch targeted a device the map does not know.
    #[error("unknown destination device '{device}'")]
    UnknownDevice { device: String },

    /// A root execution unit unexpectedly carries input requirements.
    #[error("root unit '{unit}' has non-empty input requirements")]
    RootHasInputs { unit: String },

    /// The operator kind cannot be executed under the single-input task shape.
    #[error("operator '{op}' is not supported for unit '{unit}'")]
    OperatorUnsupported { unit: String, op: &'static str },

    /// A kernel failed while executing a unit's operator.
    #[error("execution failed for unit '{unit}': {source}")]
    Execution {
        unit: String,
        #[source]
        source: TensorError,
    },

    /// Received partial inputs could not be assembled into the unit's input.
    #[error("input assembly failed for unit '{unit}': {detail}")]
    InputAssembly { unit: String, detail: String },

    /// A wire frame was malformed or exceeded the configured maximum.
    #[error("malformed wire message: {0}")]
    WireFormat(String),

    /// A socket operation failed.
    #[error("network I/O failed: {0}")]
    Network(#[from] std::io::Error),

    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}
