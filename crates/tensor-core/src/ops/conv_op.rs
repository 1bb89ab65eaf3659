// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! 2-D convolution.

use crate::{Shape, Tensor, TensorError};

/// Applies a 2-D convolution.
///
/// Shapes: `input` is `[H, W, C_in]`, `weight` is `[KH, KW, C_in, C_out]`,
/// `bias` is `[C_out]`, `output` must be `[H_out, W_out, C_out]` with
/// `H_out = (H + 2·ph - KH) / sh + 1` and the analogous width formula.
/// Padding is zero-filled.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if any dimension is incompatible.
pub fn conv2d(
    input: &Tensor,
    weight: &Tensor,
    bias: &Tensor,
    output: &mut Tensor,
    stride: (usize, usize),
    padding: (usize, usize),
) -> Result<(), TensorError> {
    let in_dims = input.shape().dims();
    let w_dims = weight.shape().dims();
    if in_dims.len() != 3 || w_dims.len() != 4 {
        return Err(TensorError::ShapeMismatch {
            op: "conv2d",
            lhs: input.shape().clone(),
            rhs: weight.shape().clone(),
        });
    }

    let (h, w, c_in) = (in_dims[0], in_dims[1], in_dims[2]);
    let (kh, kw, wc_in, c_out) = (w_dims[0], w_dims[1], w_dims[2], w_dims[3]);
    let (sh, sw) = stride;
    let (ph, pw) = padding;

    if wc_in != c_in || sh == 0 || sw == 0 {
        return Err(TensorError::ShapeMismatch {
            op: "conv2d (channels)",
            lhs: input.shape().clone(),
            rhs: weight.shape().clone(),
        });
    }
    if bias.num_elements() != c_out {
        return Err(TensorError::ShapeMismatch {
            op: "conv2d (bias)",
            lhs: bias.shape().clone(),
            rhs: Shape::vector(c_out),
        });
    }

    let h_padded = h + 2 * ph;
    let w_padded = w + 2 * pw;
    if h_padded < kh || w_padded < kw {
        return Err(TensorError::ShapeMismatch {
            op: "conv2d (kernel larger than input)",
            lhs: input.shape().clone(),
            rhs: weight.shape().clone(),
        });
    }
    let h_out = (h_padded - kh) / sh + 1;
    let w_out = (w_padded - kw) / sw + 1;

    let expected = Shape::new(vec![h_out, w_out, c_out]);
    if output.shape() != &expected {
        return Err(TensorError::ShapeMismatch {
            op: "conv2d (output)",
            lhs: expected,
            rhs: output.shape().clone(),
        });
    }

    let src = input.as_slice();
    let ker = weight.as_slice();
    let b = bias.as_slice();
    let dst = output.as_mut_slice();

    for oy in 0..h_out {
        for ox in 0..w_out {
            let out_base = (oy * w_out + ox) * c_out;
            dst[out_base..out_base + c_out].copy_from_slice(b);

            for ky in 0..kh {
                // Input row for this kernel row; skip rows inside the padding.
                let iy = (oy * sh + ky) as isize - ph as isize;
                if iy < 0 || iy as usize >= h {
                    continue;
                }
                for kx in 0..kw {
                    let ix = (ox * sw + kx) as isize - pw as isize;
                    if ix < 0 || ix as usize >= w {
                        continue;
                    }
                    let in_base = ((iy as usize) * w + ix as usize) * c_in;
                    let k_base = ((ky * kw + kx) * c_in) * c_out;
                    for ci in 0..c_in {
                        let v = src[in_base + ci];
                        let k_row = &ker[k_base + ci * c_out..k_base + (ci + 1) * c_out];
                        let out_row = &mut dst[out_base..out_base + c_out];
                        for co in 0..c_out {
                            out_row[co] += v * k_row[co];
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
