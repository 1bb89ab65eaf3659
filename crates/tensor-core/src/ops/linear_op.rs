// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fully-connected (linear) layer: `output = input · W + b`.

use crate::{Shape, Tensor, TensorError};

/// Applies a fully-connected layer.
///
/// Shapes: `input` is `[..., in]`, `weight` is `[in, out]`, `bias` is
/// `[out]`, and `output` must provide `[..., out]` with the same number of
/// rows as the input. A 1-D input of length `in` produces a 1-D output of
/// length `out`.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if dimensions are incompatible.
pub fn linear(
    input: &Tensor,
    weight: &Tensor,
    bias: &Tensor,
    output: &mut Tensor,
) -> Result<(), TensorError> {
    let w_dims = weight.shape().dims();
    if w_dims.len() != 2 {
        return Err(TensorError::ShapeMismatch {
            op: "linear (weight)",
            lhs: weight.shape().clone(),
            rhs: Shape::matrix(0, 0),
        });
    }
    let in_features = w_dims[0];
    let out_features = w_dims[1];

    if bias.num_elements() != out_features {
        return Err(TensorError::ShapeMismatch {
            op: "linear (bias)",
            lhs: bias.shape().clone(),
            rhs: Shape::vector(out_features),
        });
    }
    if in_features == 0 || input.num_elements() % in_features != 0 {
        return Err(TensorError::ShapeMismatch {
            op: "linear (input)",
            lhs: input.shape().clone(),
            rhs: weight.shape().clone(),
        });
    }

    let rows = input.num_elements() / in_features;
    if output.num_elements() != rows * out_features {
        return Err(TensorError::ShapeMismatch {
            op: "linear (output)",
            lhs: output.shape().clone(),
            rhs: Shape::matrix(rows, out_features),
        });
    }

    let a = input.as_slice();
    let w = weight.as_slice();
    let b = bias.as_slice();
    let c = output.as_mut_slice();

    // Initialize each output row with the bias, then accumulate. The ikj
    // loop order keeps the inner loop sequential over a row of the output.
    for i in 0..rows {
        let c_row = &mut c[i * out_features..(i + 1) * out_features];
        c_row.copy_from_slice(b);
        for p in 0..in_features {
            let a_ip = a[i * in_features + p];
            let w_row = &w[p * out_features..(p + 1) * out_features];
            for j in 0..out_features {
                c_row[j] += a_ip * w_row[j];
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_vector() {
        // [1, 0] · [[1, 1], [1, 1]] + [0, -1] = [1, 0]
        let input = Tensor::from_vec(Shape::vector(2), vec![1.0, 0.0]).unwrap();
        let weight =
            Tensor::from_vec(Shape::matrix(2, 2), vec![1.0, 1.0, 1.0, 1.0]).unwrap();
        let bias = Tensor::from_vec(Shape::vector(2), vec![0.0, -1.0]).unwrap();
        let mut output = Tensor::zeros(Shape::vector(2));

        linear(&input, &weight, &bias, &mut output).unwrap();
        assert_eq!(output.as_slice(), &[1.0, 0.0]);
    }

    #[test]
    fn test_linear_matrix_batch() {
        // Two rows through W = [[1], [2]], b = [0.5].
        let input =
            Tensor::from_vec(Shape::matrix(2, 2), vec![1.0, 1.0, 2.0, 0.0]).unwrap();
        let weight = Tensor::from_vec(Shape::matrix(2, 1), vec![1.0, 2.0]).unwrap();
        let bias = Tensor::from_vec(Shape::vector(1), vec![0.5]).unwrap();
        let mut output = Tensor::zeros(Shape::matrix(2, 1));

        linear(&input, &weight, &bias, &mut output).unwrap();
        assert_eq!(output.as_slice(), &[3.5, 2.5]);
    }

    #[test]
    fn test_linear_xor_hidden_layer() {
        // The XOR first layer: W = [[1, 1], [1, 1]], b = [0, -1].
        let weight =
            Tensor::from_vec(Shape::matrix(2, 2), vec![1.0, 1.0, 1.0, 1.0]).unwrap();
        let bias = Tensor::from_vec(Shape::vector(2), vec![0.0, -1.0]).unwrap();

        let cases = [
            ([0.0, 0.0], [0.0, -1.0]),
            ([0.0, 1.0], [1.0, 0.0]),
            ([1.0, 0.0], [1.0, 0.0]),
            ([1.0, 1.0], [2.0, 1.0]),
        ];
        for (inp, expected) in cases {
            let input = Tensor::from_vec(Shape::vector(2), inp.to_vec()).unwrap();
            let mut output = Tensor::zeros(Shape::vector(2));
            linear(&input, &weight, &bias, &mut output).unwrap();
            assert_eq!(output.as_slice(), &expected);
        }
    }

    #[test]
    fn test_linear_bad_shapes() {
        let input = Tensor::zeros(Shape::vector(3));
        let weight = Tensor::zeros(Shape::matrix(2, 2));
        let bias = Tensor::zeros(Shape::vector(2));
        let mut output = Tensor::zeros(Shape::vector(2));
        assert!(linear(&input, &weight, &bias, &mut output).is_err());

        let input = Tensor::zeros(Shape::vector(2));
        let bad_bias = Tensor::zeros(Shape::vector(3));
        assert!(linear(&input, &weight, &bad_bias, &mut output).is_err());
    }
}
