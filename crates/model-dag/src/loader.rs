// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Manifest-to-DAG conversion.
//!
//! The loader turns a parsed [`DagManifest`] into an in-memory
//! [`ModelDag`], decoding base-64 parameter tensors along the way, and runs
//! full validation before handing the DAG out. Malformed input never
//! produces a usable DAG.

use crate::{
    dag::{Layer, ModelDag, Validated},
    manifest::{DagManifest, ManifestOperator, ManifestTensor, ManifestUnit},
    ActivationKind, ConvHParams, DagError, ExecutionUnit, ForwardEntry, InputRequirement,
    OperatorKind, PoolHParams, Prepad, Range,
};
use base64::Engine as _;
use std::path::Path;
use tensor_core::{Shape, Tensor};

/// Loads a partitioned model DAG from its JSON description.
///
/// # Example
/// ```no_run
/// use model_dag::DagLoader;
/// use std::path::Path;
///
/// let dag = DagLoader::from_file(Path::new("./models/xor.json")).unwrap();
/// println!("{}", dag.summary());
/// ```
pub struct DagLoader;

impl DagLoader {
    /// Loads and validates a DAG from a JSON file.
    pub fn from_file(path: &Path) -> Result<ModelDag<Validated>, DagError> {
        let manifest = DagManifest::from_file(path)?;
        Self::from_manifest(manifest)
    }

    /// Loads and validates a DAG from a JSON string.
    pub fn from_json(json: &str) -> Result<ModelDag<Validated>, DagError> {
        let manifest = DagManifest::from_json(json)?;
        Self::from_manifest(manifest)
    }

    /// Converts a parsed manifest into a validated DAG.
    pub fn from_manifest(manifest: DagManifest) -> Result<ModelDag<Validated>, DagError> {
        let mut layers = Vec::with_capacity(manifest.layers.len());
        for ml in &manifest.layers {
            layers.push(Layer {
                id: ml.id.clone(),
                kind: build_operator(&ml.id, &ml.op)?,
                input_shape: Shape::new(ml.input_shape.clone()),
                output_shape: Shape::new(ml.output_shape.clone()),
            });
        }

        let eus = manifest.eus.iter().map(build_unit).collect();

        let dag = ModelDag::new(
            manifest.name,
            layers,
            eus,
            Shape::new(manifest.input_shape),
            Shape::new(manifest.output_shape),
        )?;
        let dag = dag.validate()?;
        tracing::info!("{}", dag.summary());
        Ok(dag)
    }
}

fn build_unit(mu: &ManifestUnit) -> ExecutionUnit {
    ExecutionUnit {
        id: mu.id.clone(),
        layer_id: mu.layer.clone(),
        device_id: mu.device.clone(),
        input_requirements: mu
            .inputs
            .iter()
            .map(|inp| InputRequirement {
                src_eu_id: inp.src.clone(),
                src_range: Range::new(inp.range[0], inp.range[1]),
            })
            .collect(),
        output_range: Range::new(mu.output_range[0], mu.output_range[1]),
        forward_table: mu
            .forward
            .iter()
            .map(|fwd| ForwardEntry {
                dest_eu_id: fwd.dest.clone(),
                required_range: Range::new(fwd.range[0], fwd.range[1]),
            })
            .collect(),
        expected_input_shape: Shape::new(mu.input_shape.clone()),
        expected_output_shape: Shape::new(mu.output_shape.clone()),
        prepad: Prepad {
            top: mu.prepad[0],
            bottom: mu.prepad[1],
            left: mu.prepad[2],
            right: mu.prepad[3],
        },
        is_root: mu.root,
        is_leaf: mu.leaf,
    }
}

fn build_operator(layer_id: &str, op: &ManifestOperator) -> Result<OperatorKind, DagError> {
    match op {
        ManifestOperator::Activation { function } => {
            let kind = ActivationKind::from_str_loose(function).ok_or_else(|| {
                DagError::InvalidOperator {
                    layer: layer_id.into(),
                    detail: format!("unknown activation '{function}'"),
                }
            })?;
            Ok(OperatorKind::Activation { kind })
        }
        ManifestOperator::Linear {
            in_features,
            out_features,
            weight,
            bias,
        } => {
            let weight = decode_tensor(layer_id, weight)?;
            let bias = decode_tensor(layer_id, bias)?;
            if weight.shape() != &Shape::matrix(*in_features, *out_features) {
                return Err(DagError::InvalidOperator {
                    layer: layer_id.into(),
                    detail: format!(
                        "weight shape {} does not match {}x{}",
                        weight.shape(),
                        in_features,
                        out_features
                    ),
                });
            }
            if bias.num_elements() != *out_features {
                return Err(DagError::InvalidOperator {
                    layer: layer_id.into(),
                    detail: format!(
                        "bias has {} elements, expected {}",
                        bias.num_elements(),
                        out_features
                    ),
                });
            }
            Ok(OperatorKind::Linear {
                in_features: *in_features,
                out_features: *out_features,
                weight,
                bias,
            })
        }
        ManifestOperator::Convolution {
            kernel,
            stride,
            padding,
            weight,
            bias,
        } => Ok(OperatorKind::Convolution {
            hparams: ConvHParams {
                kernel_h: kernel[0],
                kernel_w: kernel[1],
                stride_h: stride[0],
                stride_w: stride[1],
                padding_h: padding[0],
                padding_w: padding[1],
            },
            weight: decode_tensor(layer_id, weight)?,
            bias: decode_tensor(layer_id, bias)?,
        }),
        ManifestOperator::PoolingAvg {
            pool,
            stride,
            padding,
        } => Ok(OperatorKind::PoolingAvg {
            hparams: pool_hparams(pool, stride, padding),
        }),
        ManifestOperator::PoolingMax {
            pool,
            stride,
            padding,
        } => Ok(OperatorKind::PoolingMax {
            hparams: pool_hparams(pool, stride, padding),
        }),
        ManifestOperator::BatchNorm {
            mean,
            variance,
            gamma,
            beta,
            epsilon,
        } => Ok(OperatorKind::BatchNorm {
            mean: decode_tensor(layer_id, mean)?,
            variance: decode_tensor(layer_id, variance)?,
            gamma: decode_tensor(layer_id, gamma)?,
            beta: decode_tensor(layer_id, beta)?,
            epsilon: *epsilon,
        }),
        ManifestOperator::Concatenation { axis } => {
            Ok(OperatorKind::Concatenation { axis: *axis })
        }
        ManifestOperator::Flatten => Ok(OperatorKind::Flatten),
        ManifestOperator::Reshape => Ok(OperatorKind::Reshape),
        ManifestOperator::Identity => Ok(OperatorKind::Identity),
    }
}

fn pool_hparams(pool: &[usize; 2], stride: &[usize; 2], padding: &[usize; 2]) -> PoolHParams {
    PoolHParams {
        pool_h: pool[0],
        pool_w: pool[1],
        stride_h: stride[0],
        stride_w: stride[1],
        pad_h: padding[0],
        pad_w: padding[1],
    }
}

/// Decodes a base-64 little-endian `f32` payload into a tensor.
fn decode_tensor(layer_id: &str, mt: &ManifestTensor) -> Result<Tensor, DagError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&mt.data)
        .map_err(|e| DagError::WeightDecode {
            layer: layer_id.into(),
            detail: e.to_string(),
        })?;
    let shape = Shape::new(mt.shape.clone());
    Tensor::from_le_bytes(shape, &bytes).map_err(|e| DagError::WeightDecode {
        layer: layer_id.into(),
        detail: e.to_string(),
    })
}
