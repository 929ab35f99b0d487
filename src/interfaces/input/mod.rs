//! YAML input for kpsym.

use anyhow::{self, format_err};
use itertools::Itertools;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::drivers::kpoint_reduction::KPointReductionDriver;
use crate::drivers::KpsymDriver;
use crate::interfaces::InputHandle;
use crate::kpoints::{KPointSymmetryParams, RawKPointInput};
use crate::lattice::{KPointBasis, Lattice};
use crate::symmetry::SpaceGroupOperation;

#[cfg(test)]
#[path = "input_tests.rs"]
mod input_tests;

// ================
// Enum definitions
// ================

/// An enumerated type representing possible ways of specifying the $`\mathbf{k}`$-points in a
/// YAML input file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum KPointsInputKind {
    /// Variant for a uniform mesh.
    Mesh {
        /// The number of points along each reciprocal-lattice vector.
        divisions: [usize; 3],

        /// Boolean indicating if the mesh is $`\Gamma`$-centred.
        #[serde(default = "default_true")]
        with_gamma_point: bool,

        /// Boolean indicating if scaled coordinates $`\ge 1/2`$ are shifted down by one.
        #[serde(default)]
        wrap_around: bool,
    },

    /// Variant for an explicit list of points in scaled coordinates.
    Scaled(Vec<[f64; 3]>),
}

fn default_true() -> bool {
    true
}

impl KPointsInputKind {
    /// Generates the absolute $`\mathbf{k}`$-points in `lattice`.
    fn kpts(&self, lattice: &Lattice) -> Result<Vec<Vector3<f64>>, anyhow::Error> {
        match self {
            Self::Mesh {
                divisions,
                with_gamma_point,
                wrap_around,
            } => lattice.make_kpts(*divisions, *with_gamma_point, *wrap_around),
            Self::Scaled(kpts_scaled) => Ok(lattice.abs_kpts(
                &kpts_scaled
                    .iter()
                    .map(|k| Vector3::from_column_slice(k))
                    .collect_vec(),
            )),
        }
    }
}

// ==================
// Struct definitions
// ==================

/// A space-group operation as specified in a YAML input file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationInput {
    /// The rows of the rotation matrix in the direct-lattice fractional basis.
    pub rotation: [[i32; 3]; 3],

    /// The fractional translation.
    #[serde(default)]
    pub translation: [f64; 3],
}

impl OperationInput {
    fn to_operation(&self) -> Result<SpaceGroupOperation, anyhow::Error> {
        let r = &self.rotation;
        SpaceGroupOperation::new(
            Matrix3::new(
                r[0][0], r[0][1], r[0][2], r[1][0], r[1][1], r[1][2], r[2][0], r[2][1], r[2][2],
            ),
            Vector3::from_column_slice(&self.translation),
        )
    }
}

/// A structure containing `kpsym` input parameters which can be serialised into and deserialised
/// from a YAML input file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Input {
    /// The real-space lattice vectors, one per row.
    pub lattice: [[f64; 3]; 3],

    /// The $`\mathbf{k}`$-point specification.
    pub kpoints: KPointsInputKind,

    /// The space-group operations. If not specified, only the identity is used.
    #[serde(default)]
    pub operations: Vec<OperationInput>,

    /// The control parameters for the reduction.
    ///
    /// # Default
    ///
    /// If not specified, [`KPointSymmetryParams::default`] is used.
    #[serde(default)]
    pub parameters: KPointSymmetryParams,
}

impl Input {
    /// Constructs the lattice, the $`\mathbf{k}`$-points and the operations specified in this
    /// input.
    fn prepare(
        &self,
    ) -> Result<(Lattice, Vec<Vector3<f64>>, Vec<SpaceGroupOperation>), anyhow::Error> {
        let lattice = Lattice::from_rows(&self.lattice)?;
        let kpts = self.kpoints.kpts(&lattice)?;
        let operations = if self.operations.is_empty() {
            vec![SpaceGroupOperation::identity()]
        } else {
            self.operations
                .iter()
                .map(OperationInput::to_operation)
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok((lattice, kpts, operations))
    }
}

impl InputHandle for Input {
    fn handle(&self) -> Result<(), anyhow::Error> {
        let (lattice, kpts, operations) = self.prepare()?;
        let raw_input = RawKPointInput::builder()
            .kpts(&kpts)
            .basis(&lattice)
            .operations(operations)
            .build()
            .map_err(|err| format_err!(err))?;
        let mut driver = KPointReductionDriver::builder()
            .parameters(&self.parameters)
            .input(&raw_input)
            .build()
            .map_err(|err| format_err!(err))?;
        driver.run()
    }
}
