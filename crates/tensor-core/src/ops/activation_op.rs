// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element-wise activation functions and softmax.

use crate::{Tensor, TensorError};

/// Validates that input and output have the same element count.
fn check_same_size(op: &'static str, input: &Tensor, output: &Tensor) -> Result<(), TensorError> {
    if input.num_elements() != output.num_elements() {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: input.shape().clone(),
            rhs: output.shape().clone(),
        });
    }
    Ok(())
}

/// Rectified linear unit: `output[i] = max(0, input[i])`.
pub fn relu(input: &Tensor, output: &mut Tensor) -> Result<(), TensorError> {
    check_same_size("relu", input, output)?;
    for (d, &s) in output.as_mut_slice().iter_mut().zip(input.as_slice()) {
        *d = s.max(0.0);
    }
    Ok(())
}

/// Logistic sigmoid: `output[i] = 1 / (1 + exp(-input[i]))`.
pub fn sigmoid(input: &Tensor, output: &mut Tensor) -> Result<(), TensorError> {
    check_same_size("sigmoid", input, output)?;
    for (d, &s) in output.as_mut_slice().iter_mut().zip(input.as_slice()) {
        *d = 1.0 / (1.0 + (-s).exp());
    }
    Ok(())
}

/// Swish (SiLU): `output[i] = input[i] * sigmoid(input[i])`.
pub fn swish(input: &Tensor, output: &mut Tensor) -> Result<(), TensorError> {
    check_same_size("swish", input, output)?;
    for (d, &s) in output.as_mut_slice().iter_mut().zip(input.as_slice()) {
        *d = s / (1.0 + (-s).exp());
    }
    Ok(())
}

/// Computes softmax along the last axis.
///
/// Uses the numerically stable variant that subtracts the row maximum
/// before exponentiation.
pub fn softmax(input: &Tensor, output: &mut Tensor) -> Result<(), TensorError> {
    check_same_size("softmax", input, output)?;

    let dims = input.shape().dims();
    let last_dim = dims.last().copied().unwrap_or(1);
    if last_dim == 0 {
        return Ok(());
    }

    let src = input.as_slice();
    let dst = output.as_mut_slice();
    let num_rows = src.len() / last_dim;

    for row in 0..num_rows {
        let offset = row * last_dim;
        let row_src = &src[offset..offset + last_dim];
        let row_dst = &mut dst[offset..offset + last_dim];

        let max_val = row_src.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let mut sum = 0.0f32;
        for (d, &s) in row_dst.iter_mut().zip(row_src.iter()) {
            let e = (s - max_val).exp();
            *d = e;
            sum += e;
        }

        if sum > 0.0 {
            let inv_sum = 1.0 / sum;
            for d in row_dst.iter_mut() {
                *d *= inv_sum;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Shape;

    fn run(f: fn(&Tensor, &mut Tensor) -> Result<(), TensorError>, values: &[f32]) -> Vec<f32> {
        let input = Tensor::from_vec(Shape::vector(values.len()), values.to_vec()).unwrap();
        let mut output = Tensor::zeros(Shape::vector(values.len()));
        f(&input, &mut output).unwrap();
        output.into_vec()
    }

    #[test]
    fn test_relu() {
        assert_eq!(run(relu, &[-1.0, 0.0, 2.5]), vec![0.0, 0.0, 2.5]);
    }

    #[test]
    fn test_sigmoid() {
        let out = run(sigmoid, &[0.0, 100.0, -100.0]);
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!((out[1] - 1.0).abs() < 1e-6);
        assert!(out[2].abs() < 1e-6);
    }

    #[test]
    fn test_swish() {
        let out = run(swish, &[0.0, 1.0]);
        assert!(out[0].abs() < 1e-6);
        // 1 * sigmoid(1) = 0.73105857...
        assert!((out[1] - 0.731_058_6).abs() < 1e-5);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let out = run(softmax, &[1.0, 2.0, 3.0]);
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(out[2] > out[1] && out[1] > out[0]);
    }

    #[test]
    fn test_softmax_stable_for_large_inputs() {
        let out = run(softmax, &[1000.0, 1000.0]);
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_softmax_last_axis() {
        // Two independent rows of a [2, 2] tensor.
        let input =
            Tensor::from_vec(Shape::matrix(2, 2), vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        let mut output = Tensor::zeros(Shape::matrix(2, 2));
        softmax(&input, &mut output).unwrap();
        for &v in output.as_slice() {
            assert!((v - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_size_mismatch() {
        let input = Tensor::zeros(Shape::vector(3));
        let mut output = Tensor::zeros(Shape::vector(4));
        assert!(relu(&input, &mut output).is_err());
    }
}
