// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Execution units: device-placed slices of a layer's computation.

use crate::{DeviceId, ExecutionUnitId, LayerId, Range};
use tensor_core::Shape;

/// A single input dependency of an execution unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRequirement {
    /// The unit whose output feeds this unit.
    pub src_eu_id: ExecutionUnitId,
    /// The range of the source layer's output this unit consumes. May
    /// extend outside the source's bounds when expressing a halo.
    pub src_range: Range,
}

/// One outgoing edge of an execution unit's forward table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardEntry {
    /// The destination unit.
    pub dest_eu_id: ExecutionUnitId,
    /// The slice of *this* unit's output the destination needs. Always
    /// within the unit's own output range.
    pub required_range: Range,
}

/// Halo pre-padding amounts for distributed convolution and pooling.
///
/// Non-zero amounts mean the unit pads its assembled input with zeros
/// before running the operator, and the operator runs with the layer's own
/// padding forced to zero so the halo is never applied twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Prepad {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl Prepad {
    /// Returns `true` when no pre-padding is required.
    pub fn is_zero(&self) -> bool {
        self.top == 0 && self.bottom == 0 && self.left == 0 && self.right == 0
    }
}

/// A device-placed subset of a layer's output computation.
///
/// The unit is responsible for producing the slice `output_range` of its
/// layer's output. Roots consume the raw model input (empty input
/// requirements); leaves produce a piece of the final model output (empty
/// forward table).
#[derive(Debug, Clone)]
pub struct ExecutionUnit {
    /// Identifier of this unit.
    pub id: ExecutionUnitId,
    /// The layer this unit belongs to.
    pub layer_id: LayerId,
    /// The device this unit is assigned to.
    pub device_id: DeviceId,
    /// Upstream slices this unit must receive before it can run.
    pub input_requirements: Vec<InputRequirement>,
    /// The slice of the layer's output this unit produces.
    pub output_range: Range,
    /// Where this unit's output flows, and which slice each destination needs.
    pub forward_table: Vec<ForwardEntry>,
    /// Shape of the assembled input handed to the operator.
    pub expected_input_shape: Shape,
    /// Shape of the output this unit produces.
    pub expected_output_shape: Shape,
    /// Halo pre-padding applied before conv/pool execution.
    pub prepad: Prepad,
    /// `true` iff `input_requirements` is empty.
    pub is_root: bool,
    /// `true` iff `forward_table` is empty.
    pub is_leaf: bool,
}

impl ExecutionUnit {
    /// Finds the input requirement sourced from the given unit.
    pub fn find_input_requirement(&self, src_eu_id: &str) -> Option<&InputRequirement> {
        self.input_requirements
            .iter()
            .find(|req| req.src_eu_id == src_eu_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_unit() -> ExecutionUnit {
        ExecutionUnit {
            id: "layer0::eu0".into(),
            layer_id: "layer0".into(),
            device_id: "device0".into(),
            input_requirements: vec![
                InputRequirement {
                    src_eu_id: "input::eu0".into(),
                    src_range: Range::new(0, 2),
                },
                InputRequirement {
                    src_eu_id: "input::eu1".into(),
                    src_range: Range::new(2, 4),
                },
            ],
            output_range: Range::new(0, 4),
            forward_table: vec![],
            expected_input_shape: Shape::vector(4),
            expected_output_shape: Shape::vector(4),
            prepad: Prepad::default(),
            is_root: false,
            is_leaf: true,
        }
    }

    #[test]
    fn test_find_input_requirement() {
        let eu = sample_unit();
        let req = eu.find_input_requirement("input::eu1").unwrap();
        assert_eq!(req.src_range, Range::new(2, 4));
        assert!(eu.find_input_requirement("missing").is_none());
    }

    #[test]
    fn test_prepad_is_zero() {
        assert!(Prepad::default().is_zero());
        let p = Prepad {
            top: 1,
            ..Default::default()
        };
        assert!(!p.is_zero());
    }
}
