// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Spatial zero padding.
//!
//! Distributed convolution and pooling stages receive their halo rows as
//! explicit pre-padding amounts; this kernel materializes them before the
//! core operation runs with its own padding set to zero.

use crate::{Shape, Tensor, TensorError};

/// Pads the spatial borders of a `[H, W, C]` (or `[H, W]`) tensor with zeros.
///
/// Returns a new tensor shaped `[H + top + bottom, W + left + right, C]`.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if the input rank is not 2 or 3.
pub fn zero_pad2d(
    input: &Tensor,
    top: usize,
    bottom: usize,
    left: usize,
    right: usize,
) -> Result<Tensor, TensorError> {
    let dims = input.shape().dims();
    let (h, w, c) = match dims.len() {
        2 => (dims[0], dims[1], 1),
        3 => (dims[0], dims[1], dims[2]),
        _ => {
            return Err(TensorError::ShapeMismatch {
                op: "zero_pad2d",
                lhs: input.shape().clone(),
                rhs: Shape::new(vec![0, 0, 0]),
            })
        }
    };

    let out_h = h + top + bottom;
    let out_w = w + left + right;
    let out_shape = if dims.len() == 2 {
        Shape::matrix(out_h, out_w)
    } else {
        Shape::new(vec![out_h, out_w, c])
    };

    let mut output = Tensor::zeros(out_shape);
    let src = input.as_slice();
    let dst = output.as_mut_slice();

    for y in 0..h {
        let src_row = &src[y * w * c..(y + 1) * w * c];
        let dst_offset = ((y + top) * out_w + left) * c;
        dst[dst_offset..dst_offset + w * c].copy_from_slice(src_row);
    }

    Ok(output)
}
