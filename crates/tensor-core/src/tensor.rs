// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Core tensor type.

use crate::{Shape, TensorError};

/// An owned, n-dimensional `f32` tensor stored in contiguous memory.
///
/// `Tensor` is the primary data carrier in the inference pipeline. Data is
/// stored in row-major (C) order. Ownership is transferred along the
/// dataflow: queue push, forward dispatch, and wire serialization all
/// consume the tensor.
#[derive(Debug, Clone)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f32>,
}

impl Tensor {
    /// Creates a new tensor filled with zeros.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, Shape};
    /// let t = Tensor::zeros(Shape::matrix(2, 3));
    /// assert_eq!(t.num_elements(), 6);
    /// ```
    pub fn zeros(shape: Shape) -> Self {
        let n = shape.num_elements();
        Self {
            shape,
            data: vec![0.0; n],
        }
    }

    /// Creates a tensor from a vector of values.
    ///
    /// Returns an error if the vector length does not match the shape's
    /// element count.
    pub fn from_vec(shape: Shape, data: Vec<f32>) -> Result<Self, TensorError> {
        let expected = shape.num_elements();
        if data.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Returns the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the total number of elements.
    pub fn num_elements(&self) -> usize {
        self.data.len()
    }

    /// Returns the memory footprint in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Returns the values as an immutable slice.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Returns the values as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consumes the tensor and returns the underlying buffer.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Reinterprets the buffer under a new shape with the same element count.
    pub fn reshaped(self, shape: Shape) -> Result<Self, TensorError> {
        Tensor::from_vec(shape, self.data)
    }

    /// Returns the size of the leading (partition) dimension.
    pub fn rows(&self) -> usize {
        self.shape.leading_dim()
    }

    /// Returns the number of elements in one leading-dimension slice.
    pub fn row_len(&self) -> usize {
        self.shape.row_len()
    }

    /// Copies rows `[start, end)` of the leading dimension into a new tensor.
    ///
    /// The result keeps the trailing dimensions and has `end - start` rows.
    ///
    /// # Errors
    /// Returns [`TensorError::SliceOutOfBounds`] if the range exceeds the
    /// leading dimension or `start > end`.
    pub fn slice_rows(&self, start: usize, end: usize) -> Result<Tensor, TensorError> {
        let rows = self.rows();
        if start > end || end > rows {
            return Err(TensorError::SliceOutOfBounds { start, end, rows });
        }
        let row_len = self.row_len();
        let data = self.data[start * row_len..end * row_len].to_vec();
        Ok(Tensor {
            shape: self.shape.with_leading_dim(end - start),
            data,
        })
    }

    /// Concatenates tensors along the leading dimension.
    ///
    /// All inputs must agree on their trailing dimensions.
    ///
    /// # Errors
    /// Returns [`TensorError::EmptyConcat`] for an empty input list and
    /// [`TensorError::RowMismatch`] on trailing-dimension disagreement.
    pub fn concat_rows(parts: &[&Tensor]) -> Result<Tensor, TensorError> {
        let first = parts.first().ok_or(TensorError::EmptyConcat)?;
        let row_len = first.row_len();
        let mut total_rows = 0;
        for part in parts {
            if part.row_len() != row_len {
                return Err(TensorError::RowMismatch {
                    op: "concat_rows",
                    expected: row_len,
                    actual: part.row_len(),
                });
            }
            total_rows += part.rows();
        }
        let mut data = Vec::with_capacity(total_rows * row_len);
        for part in parts {
            data.extend_from_slice(part.as_slice());
        }
        Ok(Tensor {
            shape: first.shape.with_leading_dim(total_rows),
            data,
        })
    }

    /// Serializes the values as little-endian bytes for the wire.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size_bytes());
        for v in &self.data {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    /// Rebuilds a tensor from little-endian bytes received off the wire.
    ///
    /// # Errors
    /// Returns [`TensorError::BufferSizeMismatch`] if the byte count does
    /// not equal `shape.num_elements() * 4`.
    pub fn from_le_bytes(shape: Shape, bytes: &[u8]) -> Result<Self, TensorError> {
        let expected = shape.num_elements();
        if bytes.len() != expected * 4 {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: bytes.len() / 4,
            });
        }
        let data = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self { shape, data })
    }
}
