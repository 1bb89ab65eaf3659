// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON manifest types for the partitioned-DAG file format.
//!
//! The manifest describes the whole distributed model in one document:
//! layers (operator kind, hyperparameters, base-64 parameter tensors) and
//! execution units (placement, ranges, forward tables, pre-padding).
//!
//! # Format
//! ```json
//! {
//!   "name": "simple_xor",
//!   "input_shape": [2],
//!   "output_shape": [1],
//!   "layers": [
//!     {
//!       "id": "linear0",
//!       "op": {
//!         "kind": "linear",
//!         "in_features": 2,
//!         "out_features": 2,
//!         "weight": { "shape": [2, 2], "data": "AACAPwAAgD8AAIA/AACAPw==" },
//!         "bias":   { "shape": [2],    "data": "AAAAAAAAgL8=" }
//!       },
//!       "input_shape": [2],
//!       "output_shape": [2]
//!     }
//!   ],
//!   "eus": [
//!     {
//!       "id": "linear0::eu0",
//!       "layer": "linear0",
//!       "device": "device0",
//!       "inputs": [],
//!       "output_range": [0, 2],
//!       "forward": [ { "dest": "relu0::eu0", "range": [0, 2] } ],
//!       "input_shape": [2],
//!       "output_shape": [2],
//!       "prepad": [0, 0, 0, 0],
//!       "root": true,
//!       "leaf": false
//!     }
//!   ]
//! }
//! ```
//!
//! Parameter payloads are little-endian `f32` values, base-64 encoded.

use crate::DagError;
use std::path::Path;

/// Top-level manifest document.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DagManifest {
    /// Model name.
    pub name: String,
    /// Shape of the raw model input.
    pub input_shape: Vec<usize>,
    /// Shape of the aggregated model output.
    pub output_shape: Vec<usize>,
    /// Layer declarations.
    pub layers: Vec<ManifestLayer>,
    /// Execution-unit declarations.
    pub eus: Vec<ManifestUnit>,
}

impl DagManifest {
    /// Loads a manifest from a JSON file path.
    pub fn from_file(path: &Path) -> Result<Self, DagError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, DagError> {
        let manifest: Self = serde_json::from_str(json)?;
        Ok(manifest)
    }
}

/// A single layer entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestLayer {
    /// Layer identifier.
    pub id: String,
    /// Operator description with embedded parameters.
    pub op: ManifestOperator,
    /// Shape of the layer's full input.
    pub input_shape: Vec<usize>,
    /// Shape of the layer's full output.
    pub output_shape: Vec<usize>,
}

/// A base-64 encoded parameter tensor.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestTensor {
    /// Tensor shape.
    pub shape: Vec<usize>,
    /// Little-endian `f32` payload, base-64 encoded.
    pub data: String,
}

/// Operator description, tagged by `kind`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManifestOperator {
    Activation {
        /// Activation name: `relu`, `sigmoid`, `softmax`, `swish`/`silu`.
        function: String,
    },
    Linear {
        in_features: usize,
        out_features: usize,
        weight: ManifestTensor,
        bias: ManifestTensor,
    },
    Convolution {
        kernel: [usize; 2],
        stride: [usize; 2],
        padding: [usize; 2],
        weight: ManifestTensor,
        bias: ManifestTensor,
    },
    PoolingAvg {
        pool: [usize; 2],
        stride: [usize; 2],
        #[serde(default)]
        padding: [usize; 2],
    },
    PoolingMax {
        pool: [usize; 2],
        stride: [usize; 2],
        #[serde(default)]
        padding: [usize; 2],
    },
    BatchNorm {
        mean: ManifestTensor,
        variance: ManifestTensor,
        gamma: ManifestTensor,
        beta: ManifestTensor,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
    },
    Concatenation {
        axis: usize,
    },
    Flatten,
    Reshape,
    Identity,
}

fn default_epsilon() -> f32 {
    1e-5
}

/// A single execution-unit entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestUnit {
    /// Unit identifier.
    pub id: String,
    /// Owning layer id.
    pub layer: String,
    /// Assigned device id.
    pub device: String,
    /// Input requirements: source unit and required range.
    #[serde(default)]
    pub inputs: Vec<ManifestInput>,
    /// The slice of the layer output this unit produces.
    pub output_range: [i64; 2],
    /// Forward-table entries: destination unit and required range.
    #[serde(default)]
    pub forward: Vec<ManifestForward>,
    /// Shape of the assembled operator input.
    pub input_shape: Vec<usize>,
    /// Shape of the produced output.
    pub output_shape: Vec<usize>,
    /// Halo pre-padding `[top, bottom, left, right]`.
    #[serde(default)]
    pub prepad: [usize; 4],
    /// Root flag (cross-checked against `inputs` at validation).
    #[serde(default)]
    pub root: bool,
    /// Leaf flag (cross-checked against `forward` at validation).
    #[serde(default)]
    pub leaf: bool,
}

/// One input requirement in the manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestInput {
    /// Source unit id.
    pub src: String,
    /// Required range into the source layer's output.
    pub range: [i64; 2],
}

/// One forward-table entry in the manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestForward {
    /// Destination unit id.
    pub dest: String,
    /// The slice of the producer's output the destination needs.
    pub range: [i64; 2],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_manifest() {
        let json = r#"{
            "name": "tiny",
            "input_shape": [2],
            "output_shape": [2],
            "layers": [
                {
                    "id": "relu0",
                    "op": { "kind": "activation", "function": "relu" },
                    "input_shape": [2],
                    "output_shape": [2]
                }
            ],
            "eus": [
                {
                    "id": "relu0::eu0",
                    "layer": "relu0",
                    "device": "device0",
                    "output_range": [0, 2],
                    "input_shape": [2],
                    "output_shape": [2],
                    "root": true,
                    "leaf": true
                }
            ]
        }"#;
        let m = DagManifest::from_json(json).unwrap();
        assert_eq!(m.name, "tiny");
        assert_eq!(m.layers.len(), 1);
        assert_eq!(m.eus.len(), 1);
        assert!(m.eus[0].inputs.is_empty());
        assert!(m.eus[0].forward.is_empty());
        assert_eq!(m.eus[0].prepad, [0, 0, 0, 0]);
        assert!(matches!(
            m.layers[0].op,
            ManifestOperator::Activation { .. }
        ));
    }

    #[test]
    fn test_parse_operator_variants() {
        let json = r#"{
            "kind": "pooling_max",
            "pool": [2, 2],
            "stride": [2, 2]
        }"#;
        let op: ManifestOperator = serde_json::from_str(json).unwrap();
        assert!(matches!(
            op,
            ManifestOperator::PoolingMax {
                padding: [0, 0],
                ..
            }
        ));
    }

    #[test]
    fn test_parse_batch_norm_default_epsilon() {
        let json = r#"{
            "kind": "batch_norm",
            "mean": { "shape": [1], "data": "AAAAAA==" },
            "variance": { "shape": [1], "data": "AACAPw==" },
            "gamma": { "shape": [1], "data": "AACAPw==" },
            "beta": { "shape": [1], "data": "AAAAAA==" }
        }"#;
        let op: ManifestOperator = serde_json::from_str(json).unwrap();
        match op {
            ManifestOperator::BatchNorm { epsilon, .. } => {
                assert!((epsilon - 1e-5).abs() < 1e-9)
            }
            other => panic!("unexpected operator: {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown_kind_rejected() {
        let json = r#"{ "kind": "quantum_fft" }"#;
        let op: Result<ManifestOperator, _> = serde_json::from_str(json);
        assert!(op.is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let m = DagManifest {
            name: "rt".into(),
            input_shape: vec![2],
            output_shape: vec![2],
            layers: vec![ManifestLayer {
                id: "id0".into(),
                op: ManifestOperator::Identity,
                input_shape: vec![2],
                output_shape: vec![2],
            }],
            eus: vec![],
        };
        let json = serde_json::to_string_pretty(&m).unwrap();
        let back = DagManifest::from_json(&json).unwrap();
        assert_eq!(back.name, m.name);
        assert_eq!(back.layers.len(), 1);
    }
}
