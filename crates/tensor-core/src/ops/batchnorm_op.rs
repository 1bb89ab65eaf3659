// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Batch normalization (inference mode).

use crate::{Tensor, TensorError};

/// Applies affine batch normalization using running statistics:
/// `output = gamma * (input - mean) / sqrt(variance + epsilon) + beta`.
///
/// The channel axis is the last axis: a `[H, W, C]` input is normalized
/// per channel `C`; a 1-D input of length `F` is normalized per feature.
/// `mean`, `variance`, `gamma`, and `beta` must all have `C` elements.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] on any length disagreement.
pub fn batch_norm(
    input: &Tensor,
    mean: &Tensor,
    variance: &Tensor,
    gamma: &Tensor,
    beta: &Tensor,
    epsilon: f32,
    output: &mut Tensor,
) -> Result<(), TensorError> {
    let channels = input.shape().dims().last().copied().unwrap_or(1);
    for param in [mean, variance, gamma, beta] {
        if param.num_elements() != channels {
            return Err(TensorError::ShapeMismatch {
                op: "batch_norm",
                lhs: input.shape().clone(),
                rhs: param.shape().clone(),
            });
        }
    }
    if output.num_elements() != input.num_elements() {
        return Err(TensorError::ShapeMismatch {
            op: "batch_norm (output)",
            lhs: input.shape().clone(),
            rhs: output.shape().clone(),
        });
    }

    let m = mean.as_slice();
    let v = variance.as_slice();
    let g = gamma.as_slice();
    let b = beta.as_slice();

    // Precompute per-channel scale and shift so the inner loop is a fused
    // multiply-add.
    let scale: Vec<f32> = (0..channels)
        .map(|c| g[c] / (v[c] + epsilon).sqrt())
        .collect();

    let src = input.as_slice();
    let dst = output.as_mut_slice();
    for (i, (&x, d)) in src.iter().zip(dst.iter_mut()).enumerate() {
        let c = i % channels;
        *d = scale[c] * (x - m[c]) + b[c];
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Shape;

    #[test]
    fn test_identity_normalization() {
        // mean 0, variance 1, gamma 1, beta 0: output equals input.
        let input = Tensor::from_vec(Shape::vector(3), vec![1.0, -2.0, 3.0]).unwrap();
        let zeros = Tensor::from_vec(Shape::vector(3), vec![0.0; 3]).unwrap();
        let ones = Tensor::from_vec(Shape::vector(3), vec![1.0; 3]).unwrap();
        let mut output = Tensor::zeros(Shape::vector(3));

        batch_norm(&input, &zeros, &ones, &ones, &zeros, 0.0, &mut output).unwrap();
        for (o, i) in output.as_slice().iter().zip(input.as_slice()) {
            assert!((o - i).abs() < 1e-6);
        }
    }

    #[test]
    fn test_affine_transform() {
        // (x - 1) / sqrt(4) * 2 + 10 = x - 1 + 10 for variance 4, gamma 2.
        let input = Tensor::from_vec(Shape::vector(2), vec![1.0, 5.0]).unwrap();
        let mean = Tensor::from_vec(Shape::vector(2), vec![1.0, 1.0]).unwrap();
        let var = Tensor::from_vec(Shape::vector(2), vec![4.0, 4.0]).unwrap();
        let gamma = Tensor::from_vec(Shape::vector(2), vec![2.0, 2.0]).unwrap();
        let beta = Tensor::from_vec(Shape::vector(2), vec![10.0, 10.0]).unwrap();
        let mut output = Tensor::zeros(Shape::vector(2));

        batch_norm(&input, &mean, &var, &gamma, &beta, 0.0, &mut output).unwrap();
        assert!((output.as_slice()[0] - 10.0).abs() < 1e-6);
        assert!((output.as_slice()[1] - 14.0).abs() < 1e-6);
    }

    #[test]
    fn test_per_channel_on_spatial_input() {
        // [1, 2, 2] input: channel 0 shifted by -1, channel 1 by -10.
        let input = Tensor::from_vec(
            Shape::new(vec![1, 2, 2]),
            vec![1.0, 10.0, 2.0, 20.0],
        )
        .unwrap();
        let mean = Tensor::from_vec(Shape::vector(2), vec![1.0, 10.0]).unwrap();
        let var = Tensor::from_vec(Shape::vector(2), vec![1.0, 1.0]).unwrap();
        let gamma = Tensor::from_vec(Shape::vector(2), vec![1.0, 1.0]).unwrap();
        let beta = Tensor::from_vec(Shape::vector(2), vec![0.0, 0.0]).unwrap();
        let mut output = Tensor::zeros(Shape::new(vec![1, 2, 2]));

        batch_norm(&input, &mean, &var, &gamma, &beta, 0.0, &mut output).unwrap();
        let out = output.as_slice();
        assert!((out[0]).abs() < 1e-6);
        assert!((out[1]).abs() < 1e-6);
        assert!((out[2] - 1.0).abs() < 1e-6);
        assert!((out[3] - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_param_length_mismatch() {
        let input = Tensor::zeros(Shape::vector(3));
        let short = Tensor::zeros(Shape::vector(2));
        let ok = Tensor::zeros(Shape::vector(3));
        let mut output = Tensor::zeros(Shape::vector(3));
        assert!(batch_norm(&input, &short, &ok, &ok, &ok, 1e-5, &mut output).is_err());
    }
}
