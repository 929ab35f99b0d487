//! Ordered sets of space-group operations, optionally doubled by time reversal.

use std::fmt;

use itertools::Itertools;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::symmetry::space_group_operation::{OperationKind, SpaceGroupOperation};

#[cfg(test)]
#[path = "operation_set_tests.rs"]
mod operation_set_tests;

/// Structure managing the ordered operations used for $`\mathbf{k}`$-point reduction.
///
/// When time reversal is included, the set is conceptually doubled: the operation with doubled
/// index `s` acts on scaled $`\mathbf{k}`$-points with the reciprocal rotation of operation
/// `s % nop`, negated if `s >= nop`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationSet {
    /// The proper operations.
    operations: Vec<SpaceGroupOperation>,

    /// The transport classification of each proper operation.
    kinds: Vec<OperationKind>,

    /// Boolean indicating if the set is doubled by time reversal.
    time_reversal: bool,
}

impl OperationSet {
    /// Constructs an operation set.
    ///
    /// # Arguments
    ///
    /// * `operations` - The proper operations, in the order they are to be indexed.
    /// * `time_reversal` - Boolean indicating if the set is to be doubled by time reversal.
    pub fn new(operations: Vec<SpaceGroupOperation>, time_reversal: bool) -> Self {
        Self::from_indexed(operations.into_iter().enumerate().collect_vec(), time_reversal)
    }

    /// Constructs an operation set from operations carrying their own representation handles.
    ///
    /// This is used when the operations are a selection from a longer list, so that
    /// [`OperationKind::Generic`] still refers to the positions in that list.
    ///
    /// # Arguments
    ///
    /// * `operations` - Pairs of representation handles and proper operations.
    /// * `time_reversal` - Boolean indicating if the set is to be doubled by time reversal.
    pub fn from_indexed(
        operations: Vec<(usize, SpaceGroupOperation)>,
        time_reversal: bool,
    ) -> Self {
        let (kinds, operations): (Vec<_>, Vec<_>) = operations
            .into_iter()
            .map(|(handle, op)| (op.kind(handle), op))
            .unzip();
        Self {
            operations,
            kinds,
            time_reversal,
        }
    }

    /// Returns the number of proper operations.
    pub fn nop(&self) -> usize {
        self.operations.len()
    }

    /// Returns the number of operations including the time-reversed ones.
    pub fn n_total(&self) -> usize {
        if self.time_reversal {
            2 * self.nop()
        } else {
            self.nop()
        }
    }

    /// Returns a boolean indicating if the set is doubled by time reversal.
    pub fn time_reversal(&self) -> bool {
        self.time_reversal
    }

    /// Returns the proper operations.
    pub fn operations(&self) -> &[SpaceGroupOperation] {
        &self.operations
    }

    /// Returns the proper operation with index `iop`.
    pub fn get(&self, iop: usize) -> Option<&SpaceGroupOperation> {
        self.operations.get(iop)
    }

    /// Returns the transport classification of the proper operation with index `iop`.
    pub fn kind(&self, iop: usize) -> Option<OperationKind> {
        self.kinds.get(iop).copied()
    }

    /// Checks if any proper operation is the spatial inversion.
    pub fn has_inversion(&self) -> bool {
        self.operations.iter().any(|op| op.is_inversion())
    }

    /// Returns the index of the identity operation, if present.
    pub fn identity_index(&self) -> Option<usize> {
        self.operations.iter().position(|op| op.is_identity())
    }

    /// Splits a doubled operation index into the proper operation index and a boolean
    /// indicating whether time reversal is involved.
    pub fn split_index(&self, s: usize) -> (usize, bool) {
        let nop = self.nop();
        (s % nop, s >= nop)
    }

    /// Returns the reciprocal rotations of all operations in doubled index order, or `None` if
    /// any rotation is singular.
    pub fn reciprocal_rotations(&self) -> Option<Vec<Matrix3<f64>>> {
        let proper = self
            .operations
            .iter()
            .map(|op| op.reciprocal_rotation())
            .collect::<Option<Vec<_>>>()?;
        if self.time_reversal {
            Some(
                proper
                    .iter()
                    .cloned()
                    .chain(proper.iter().map(|rot| -rot))
                    .collect_vec(),
            )
        } else {
            Some(proper)
        }
    }
}

impl fmt::Display for OperationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} proper {}{}",
            self.nop(),
            if self.nop() == 1 {
                "operation"
            } else {
                "operations"
            },
            if self.time_reversal {
                ", doubled by time reversal"
            } else {
                ""
            }
        )?;
        for (i, (op, kind)) in self.operations.iter().zip(self.kinds.iter()).enumerate() {
            writeln!(f, "  {i:>3} [{kind}] {op}")?;
        }
        Ok(())
    }
}
