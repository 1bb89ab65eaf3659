// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor operations.

use crate::Shape;

/// Errors that can occur during tensor construction and kernel execution.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The provided buffer length does not match the shape's element count.
    #[error("buffer size mismatch: expected {expected} elements, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Two tensors have incompatible shapes for the requested operation.
    #[error("incompatible shapes for {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// A row-range slice falls outside the tensor's leading dimension.
    #[error("slice [{start}, {end}) out of bounds for {rows} rows")]
    SliceOutOfBounds {
        start: usize,
        end: usize,
        rows: usize,
    },

    /// Concatenation was requested over an empty list of tensors.
    #[error("cannot concatenate an empty list of tensors")]
    EmptyConcat,

    /// Tensors being concatenated disagree on their trailing dimensions.
    #[error("row length mismatch in {op}: expected {expected}, got {actual}")]
    RowMismatch {
        op: &'static str,
        expected: usize,
        actual: usize,
    },
}
