// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The operator dispatch shim.
//!
//! Maps an execution unit's operator kind onto the tensor-core kernels.
//! The output tensor is allocated once per task with the unit's expected
//! output shape; ownership of the result passes back to the orchestrator.

use crate::RuntimeError;
use model_dag::{ActivationKind, ExecutionUnit, Layer, OperatorKind};
use tensor_core::{self as ops, Tensor};

/// Executes one unit's operator on its assembled input.
///
/// Pre-padding: when the unit carries non-zero halo amounts, the input is
/// zero-padded first and the conv/pool runs with the layer's own padding
/// forced to zero, so the halo is never applied twice.
pub(crate) fn execute_operator(
    eu: &ExecutionUnit,
    layer: &Layer,
    input: Tensor,
) -> Result<Tensor, RuntimeError> {
    let mut output = Tensor::zeros(eu.expected_output_shape.clone());
    let exec_err = |source| RuntimeError::Execution {
        unit: eu.id.clone(),
        source,
    };

    match &layer.kind {
        OperatorKind::Activation { kind } => {
            let apply = match kind {
                ActivationKind::ReLU => ops::relu,
                ActivationKind::Sigmoid => ops::sigmoid,
                ActivationKind::Softmax => ops::softmax,
                ActivationKind::Swish => ops::swish,
            };
            apply(&input, &mut output).map_err(exec_err)?;
        }
        OperatorKind::Linear { weight, bias, .. } => {
            ops::linear(&input, weight, bias, &mut output).map_err(exec_err)?;
        }
        OperatorKind::Convolution {
            hparams,
            weight,
            bias,
        } => {
            let (input, padding) = if eu.prepad.is_zero() {
                (input, (hparams.padding_h, hparams.padding_w))
            } else {
                let padded = ops::zero_pad2d(
                    &input,
                    eu.prepad.top,
                    eu.prepad.bottom,
                    eu.prepad.left,
                    eu.prepad.right,
                )
                .map_err(exec_err)?;
                (padded, (0, 0))
            };
            ops::conv2d(
                &input,
                weight,
                bias,
                &mut output,
                (hparams.stride_h, hparams.stride_w),
                padding,
            )
            .map_err(exec_err)?;
        }
        OperatorKind::PoolingAvg { hparams } | OperatorKind::PoolingMax { hparams } => {
            let (input, padding) = if eu.prepad.is_zero() {
                (input, (hparams.pad_h, hparams.pad_w))
            } else {
                let padded = ops::zero_pad2d(
                    &input,
                    eu.prepad.top,
                    eu.prepad.bottom,
                    eu.prepad.left,
                    eu.prepad.right,
                )
                .map_err(exec_err)?;
                (padded, (0, 0))
            };
            let pool = match &layer.kind {
                OperatorKind::PoolingAvg { .. } => ops::avg_pool2d,
                _ => ops::max_pool2d,
            };
            pool(
                &input,
                &mut output,
                (hparams.pool_h, hparams.pool_w),
                (hparams.stride_h, hparams.stride_w),
                padding,
            )
            .map_err(exec_err)?;
        }
        OperatorKind::BatchNorm {
            mean,
            variance,
            gamma,
            beta,
            epsilon,
        } => {
            ops::batch_norm(&input, mean, variance, gamma, beta, *epsilon, &mut output)
                .map_err(exec_err)?;
        }
        OperatorKind::Identity | OperatorKind::Flatten | OperatorKind::Reshape => {
            // Shape reinterpretation; the buffer moves untouched.
            return input
                .reshaped(eu.expected_output_shape.clone())
                .map_err(exec_err);
        }
        OperatorKind::Concatenation { .. } => {
            // Needs every input tensor at once, which the single-input task
            // shape cannot provide.
            return Err(RuntimeError::OperatorUnsupported {
                unit: eu.id.clone(),
                op: layer.kind.name(),
            });
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_dag::{ConvHParams, Prepad, Range};
    use tensor_core::Shape;

    fn unit(id: &str, layer: &str, in_shape: Shape, out_shape: Shape) -> ExecutionUnit {
        ExecutionUnit {
            id: id.into(),
            layer_id: layer.into(),
            device_id: "device0".into(),
            input_requirements: vec![],
            output_range: Range::new(0, out_shape.leading_dim() as i64),
            forward_table: vec![],
            expected_input_shape: in_shape,
            expected_output_shape: out_shape,
            prepad: Prepad::default(),
            is_root: true,
            is_leaf: true,
        }
    }

    fn layer(id: &str, kind: OperatorKind, in_shape: Shape, out_shape: Shape) -> Layer {
        Layer {
            id: id.into(),
            kind,
            input_shape: in_shape,
            output_shape: out_shape,
        }
    }

    #[test]
    fn test_dispatch_relu() {
        let shape = Shape::vector(3);
        let eu = unit("relu::eu0", "relu", shape.clone(), shape.clone());
        let l = layer(
            "relu",
            OperatorKind::Activation {
                kind: ActivationKind::ReLU,
            },
            shape.clone(),
            shape.clone(),
        );
        let input = Tensor::from_vec(shape, vec![-1.0, 0.5, 2.0]).unwrap();
        let out = execute_operator(&eu, &l, input).unwrap();
        assert_eq!(out.as_slice(), &[0.0, 0.5, 2.0]);
    }

    #[test]
    fn test_dispatch_linear() {
        let eu = unit("lin::eu0", "lin", Shape::vector(2), Shape::vector(2));
        let l = layer(
            "lin",
            OperatorKind::Linear {
                in_features: 2,
                out_features: 2,
                weight: Tensor::from_vec(Shape::matrix(2, 2), vec![1.0, 1.0, 1.0, 1.0])
                    .unwrap(),
                bias: Tensor::from_vec(Shape::vector(2), vec![0.0, -1.0]).unwrap(),
            },
            Shape::vector(2),
            Shape::vector(2),
        );
        let input = Tensor::from_vec(Shape::vector(2), vec![1.0, 0.0]).unwrap();
        let out = execute_operator(&eu, &l, input).unwrap();
        assert_eq!(out.as_slice(), &[1.0, 0.0]);
    }

    #[test]
    fn test_dispatch_conv_with_prepad() {
        // A split conv row: 1x2 input slice, 3x3 kernel of ones, halo rows
        // arrive as prepad so the layer's own padding must not re-apply.
        let mut eu = unit(
            "conv::eu0",
            "conv",
            Shape::new(vec![1, 2, 1]),
            Shape::new(vec![1, 2, 1]),
        );
        eu.prepad = Prepad {
            top: 1,
            bottom: 1,
            left: 1,
            right: 1,
        };
        let l = layer(
            "conv",
            OperatorKind::Convolution {
                hparams: ConvHParams {
                    kernel_h: 3,
                    kernel_w: 3,
                    stride_h: 1,
                    stride_w: 1,
                    padding_h: 1,
                    padding_w: 1,
                },
                weight: Tensor::from_vec(Shape::new(vec![3, 3, 1, 1]), vec![1.0; 9])
                    .unwrap(),
                bias: Tensor::from_vec(Shape::vector(1), vec![0.0]).unwrap(),
            },
            Shape::new(vec![1, 2, 1]),
            Shape::new(vec![1, 2, 1]),
        );
        let input =
            Tensor::from_vec(Shape::new(vec![1, 2, 1]), vec![1.0, 2.0]).unwrap();
        let out = execute_operator(&eu, &l, input).unwrap();
        // Each output tap sums the whole (padded) neighborhood: 1 + 2.
        assert_eq!(out.as_slice(), &[3.0, 3.0]);
    }

    #[test]
    fn test_dispatch_identity_reshape() {
        let eu = unit("id::eu0", "id", Shape::matrix(2, 2), Shape::vector(4));
        let l = layer(
            "id",
            OperatorKind::Flatten,
            Shape::matrix(2, 2),
            Shape::vector(4),
        );
        let input =
            Tensor::from_vec(Shape::matrix(2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let out = execute_operator(&eu, &l, input).unwrap();
        assert_eq!(out.shape(), &Shape::vector(4));
        assert_eq!(out.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_dispatch_concatenation_unsupported() {
        let eu = unit("cat::eu0", "cat", Shape::vector(2), Shape::vector(2));
        let l = layer(
            "cat",
            OperatorKind::Concatenation { axis: 0 },
            Shape::vector(2),
            Shape::vector(2),
        );
        let input = Tensor::zeros(Shape::vector(2));
        assert!(matches!(
            execute_operator(&eu, &l, input),
            Err(RuntimeError::OperatorUnsupported { .. })
        ));
    }

    #[test]
    fn test_dispatch_shape_error_surfaces() {
        let eu = unit("lin::eu0", "lin", Shape::vector(3), Shape::vector(2));
        let l = layer(
            "lin",
            OperatorKind::Linear {
                in_features: 2,
                out_features: 2,
                weight: Tensor::zeros(Shape::matrix(2, 2)),
                bias: Tensor::zeros(Shape::vector(2)),
            },
            Shape::vector(2),
            Shape::vector(2),
        );
        let input = Tensor::zeros(Shape::vector(3));
        assert!(matches!(
            execute_operator(&eu, &l, input),
            Err(RuntimeError::Execution { .. })
        ));
    }
}
