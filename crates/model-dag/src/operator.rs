// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Operator kinds and their hyperparameters.
//!
//! Each variant carries the layer's hyperparameters plus owning copies of
//! any constant tensors (weights, biases, running statistics). Layers own
//! their parameters; execution units reach them through their layer.

use tensor_core::Tensor;

/// The activation function applied by an activation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationKind {
    ReLU,
    Sigmoid,
    /// Softmax along the last axis.
    Softmax,
    /// Swish / SiLU: `x * sigmoid(x)`.
    Swish,
}

impl ActivationKind {
    /// Parses an activation name from a manifest string.
    ///
    /// Accepts common aliases (`"silu"` for swish, `"logistic"` for
    /// sigmoid).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "relu" => Some(Self::ReLU),
            "sigmoid" | "logistic" => Some(Self::Sigmoid),
            "softmax" => Some(Self::Softmax),
            "swish" | "silu" => Some(Self::Swish),
            _ => None,
        }
    }

    /// Returns a human-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReLU => "relu",
            Self::Sigmoid => "sigmoid",
            Self::Softmax => "softmax",
            Self::Swish => "swish",
        }
    }
}

impl std::fmt::Display for ActivationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hyperparameters of a 2-D convolution layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvHParams {
    pub kernel_h: usize,
    pub kernel_w: usize,
    pub stride_h: usize,
    pub stride_w: usize,
    /// The layer's own padding. Forced to zero at execution time when an
    /// execution unit carries non-zero pre-padding.
    pub padding_h: usize,
    pub padding_w: usize,
}

/// Hyperparameters of a 2-D pooling layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolHParams {
    pub pool_h: usize,
    pub pool_w: usize,
    pub stride_h: usize,
    pub stride_w: usize,
    pub pad_h: usize,
    pub pad_w: usize,
}

/// The computation a layer performs, with its constant tensors.
#[derive(Debug, Clone)]
pub enum OperatorKind {
    /// Element-wise activation (softmax along the last axis).
    Activation { kind: ActivationKind },
    /// Fully-connected projection: `output = input · weight + bias`.
    Linear {
        in_features: usize,
        out_features: usize,
        weight: Tensor,
        bias: Tensor,
    },
    /// 2-D convolution over `[H, W, C]` activations.
    Convolution {
        hparams: ConvHParams,
        weight: Tensor,
        bias: Tensor,
    },
    /// 2-D average pooling.
    PoolingAvg { hparams: PoolHParams },
    /// 2-D max pooling.
    PoolingMax { hparams: PoolHParams },
    /// Affine normalization with running statistics.
    BatchNorm {
        mean: Tensor,
        variance: Tensor,
        gamma: Tensor,
        beta: Tensor,
        epsilon: f32,
    },
    /// Concatenation along an axis. Not executable under the single-input
    /// task shape; kept in the model so planners can express it.
    Concatenation { axis: usize },
    /// Shape reinterpretation to 1-D.
    Flatten,
    /// Shape reinterpretation to the layer's output shape.
    Reshape,
    /// Pass-through copy.
    Identity,
}

impl OperatorKind {
    /// Returns a stable label for logging and summaries.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Activation { .. } => "activation",
            Self::Linear { .. } => "linear",
            Self::Convolution { .. } => "convolution",
            Self::PoolingAvg { .. } => "pooling_avg",
            Self::PoolingMax { .. } => "pooling_max",
            Self::BatchNorm { .. } => "batch_norm",
            Self::Concatenation { .. } => "concatenation",
            Self::Flatten => "flatten",
            Self::Reshape => "reshape",
            Self::Identity => "identity",
        }
    }

    /// Total bytes of constant tensors owned by this operator.
    pub fn parameter_bytes(&self) -> usize {
        match self {
            Self::Linear { weight, bias, .. } | Self::Convolution { weight, bias, .. } => {
                weight.size_bytes() + bias.size_bytes()
            }
            Self::BatchNorm {
                mean,
                variance,
                gamma,
                beta,
                ..
            } => {
                mean.size_bytes()
                    + variance.size_bytes()
                    + gamma.size_bytes()
                    + beta.size_bytes()
            }
            _ => 0,
        }
    }
}
