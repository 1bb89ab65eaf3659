// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! 2-D average and max pooling.

use crate::{Shape, Tensor, TensorError};

enum PoolKind {
    Avg,
    Max,
}

/// Applies 2-D average pooling over a `[H, W, C]` input.
///
/// Average pooling divides by the full window size, counting padded
/// positions as zeros.
pub fn avg_pool2d(
    input: &Tensor,
    output: &mut Tensor,
    window: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
) -> Result<(), TensorError> {
    pool2d(input, output, window, stride, padding, PoolKind::Avg)
}

/// Applies 2-D max pooling over a `[H, W, C]` input.
///
/// Padded positions never win: the maximum is taken over in-bounds
/// elements only.
pub fn max_pool2d(
    input: &Tensor,
    output: &mut Tensor,
    window: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
) -> Result<(), TensorError> {
    pool2d(input, output, window, stride, padding, PoolKind::Max)
}

fn pool2d(
    input: &Tensor,
    output: &mut Tensor,
    window: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
    kind: PoolKind,
) -> Result<(), TensorError> {
    let in_dims = input.shape().dims();
    if in_dims.len() != 3 {
        return Err(TensorError::ShapeMismatch {
            op: "pool2d",
            lhs: input.shape().clone(),
            rhs: Shape::new(vec![0, 0, 0]),
        });
    }
    let (h, w, c) = (in_dims[0], in_dims[1], in_dims[2]);
    let (kh, kw) = window;
    let (sh, sw) = stride;
    let (ph, pw) = padding;

    if kh == 0 || kw == 0 || sh == 0 || sw == 0 || h + 2 * ph < kh || w + 2 * pw < kw {
        return Err(TensorError::ShapeMismatch {
            op: "pool2d (window)",
            lhs: input.shape().clone(),
            rhs: Shape::matrix(kh, kw),
        });
    }
    let h_out = (h + 2 * ph - kh) / sh + 1;
    let w_out = (w + 2 * pw - kw) / sw + 1;

    let expected = Shape::new(vec![h_out, w_out, c]);
    if output.shape() != &expected {
        return Err(TensorError::ShapeMismatch {
            op: "pool2d (output)",
            lhs: expected,
            rhs: output.shape().clone(),
        });
    }

    let src = input.as_slice();
    let dst = output.as_mut_slice();
    let window_size = (kh * kw) as f32;

    for oy in 0..h_out {
        for ox in 0..w_out {
            for ch in 0..c {
                let mut acc = match kind {
                    PoolKind::Avg => 0.0f32,
                    PoolKind::Max => f32::NEG_INFINITY,
                };
                for ky in 0..kh {
                    let iy = (oy * sh + ky) as isize - ph as isize;
                    if iy < 0 || iy as usize >= h {
                        continue;
                    }
                    for kx in 0..kw {
                        let ix = (ox * sw + kx) as isize - pw as isize;
                        if ix < 0 || ix as usize >= w {
                            continue;
                        }
                        let v = src[((iy as usize) * w + ix as usize) * c + ch];
                        match kind {
                            PoolKind::Avg => acc += v,
                            PoolKind::Max => acc = acc.max(v),
                        }
                    }
                }
                dst[(oy * w_out + ox) * c + ch] = match kind {
                    PoolKind::Avg => acc / window_size,
                    // A window fully inside the padding never occurs for
                    // valid shapes, but keep the value finite regardless.
                    PoolKind::Max => {
                        if acc == f32::NEG_INFINITY {
                            0.0
                        } else {
                            acc
                        }
                    }
                };
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_4x4() -> Tensor {
        Tensor::from_vec(
            Shape::new(vec![4, 4, 1]),
            (1..=16).map(|v| v as f32).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_max_pool_2x2() {
        let input = input_4x4();
        let mut output = Tensor::zeros(Shape::new(vec![2, 2, 1]));
        max_pool2d(&input, &mut output, (2, 2), (2, 2), (0, 0)).unwrap();
        assert_eq!(output.as_slice(), &[6.0, 8.0, 14.0, 16.0]);
    }

    #[test]
    fn test_avg_pool_2x2() {
        let input = input_4x4();
        let mut output = Tensor::zeros(Shape::new(vec![2, 2, 1]));
        avg_pool2d(&input, &mut output, (2, 2), (2, 2), (0, 0)).unwrap();
        assert_eq!(output.as_slice(), &[3.5, 5.5, 11.5, 13.5]);
    }

    #[test]
    fn test_avg_pool_padding_counts_zeros() {
        // Single value with padding 1 and a 2x2 window: the top-left window
        // covers three padded zeros and the value itself.
        let input = Tensor::from_vec(Shape::new(vec![1, 1, 1]), vec![4.0]).unwrap();
        let mut output = Tensor::zeros(Shape::new(vec![2, 2, 1]));
        avg_pool2d(&input, &mut output, (2, 2), (1, 1), (1, 1)).unwrap();
        assert_eq!(output.as_slice(), &[1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_max_pool_ignores_padding() {
        let input = Tensor::from_vec(Shape::new(vec![1, 1, 1]), vec![-4.0]).unwrap();
        let mut output = Tensor::zeros(Shape::new(vec![2, 2, 1]));
        max_pool2d(&input, &mut output, (2, 2), (1, 1), (1, 1)).unwrap();
        // Padding does not contribute a zero that would beat -4.
        assert_eq!(output.as_slice(), &[-4.0, -4.0, -4.0, -4.0]);
    }

    #[test]
    fn test_pool_channels_independent() {
        let input = Tensor::from_vec(
            Shape::new(vec![2, 2, 2]),
            vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0, 4.0, 40.0],
        )
        .unwrap();
        let mut output = Tensor::zeros(Shape::new(vec![1, 1, 2]));
        max_pool2d(&input, &mut output, (2, 2), (1, 1), (0, 0)).unwrap();
        assert_eq!(output.as_slice(), &[4.0, 40.0]);
    }

    #[test]
    fn test_pool_bad_output_shape() {
        let input = input_4x4();
        let mut output = Tensor::zeros(Shape::new(vec![3, 3, 1]));
        assert!(max_pool2d(&input, &mut output, (2, 2), (2, 2), (0, 0)).is_err());
    }
}
