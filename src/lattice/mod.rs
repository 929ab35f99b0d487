//! Conversions between absolute and scaled $`\mathbf{k}`$-point coordinates.

use std::f64::consts::PI;
use std::fmt;

use anyhow::{self, ensure, format_err};
use itertools::Itertools;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};


// =================
// Trait definitions
// =================

/// Trait for objects able to convert $`\mathbf{k}`$-points between absolute (Cartesian)
/// coordinates and scaled coordinates in the basis of the reciprocal-lattice vectors.
pub trait KPointBasis {
    /// Converts absolute $`\mathbf{k}`$-points into scaled ones.
    fn scaled_kpts(&self, abs_kpts: &[Vector3<f64>]) -> Vec<Vector3<f64>>;

    /// Converts scaled $`\mathbf{k}`$-points into absolute ones.
    fn abs_kpts(&self, scaled_kpts: &[Vector3<f64>]) -> Vec<Vector3<f64>>;
}

// ==================
// Struct definitions
// ==================

/// Structure holding the direct-lattice vectors of a crystal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// The direct-lattice vectors, one per row.
    vectors: Matrix3<f64>,

    /// The reciprocal-lattice vectors $`2\pi (A^{-1})^{\mathsf{T}}`$, one per row.
    reciprocal_vectors: Matrix3<f64>,
}

impl Lattice {
    /// Constructs a lattice from its direct-lattice vectors.
    ///
    /// # Arguments
    ///
    /// * `vectors` - The three direct-lattice vectors, one per row.
    ///
    /// # Returns
    ///
    /// The lattice, or an error if the vectors are linearly dependent.
    pub fn new(vectors: Matrix3<f64>) -> Result<Self, anyhow::Error> {
        ensure!(
            vectors.determinant().abs() > 1e-12,
            "The lattice vectors are linearly dependent."
        );
        let inv = vectors
            .try_inverse()
            .ok_or_else(|| format_err!("Unable to invert the lattice vectors."))?;
        Ok(Self {
            vectors,
            reciprocal_vectors: 2.0 * PI * inv.transpose(),
        })
    }

    /// Constructs a lattice from the rows given as arrays.
    pub fn from_rows(rows: &[[f64; 3]; 3]) -> Result<Self, anyhow::Error> {
        Self::new(Matrix3::from_fn(|i, j| rows[i][j]))
    }

    /// Returns the direct-lattice vectors, one per row.
    pub fn vectors(&self) -> &Matrix3<f64> {
        &self.vectors
    }

    /// Returns the reciprocal-lattice vectors, one per row.
    pub fn reciprocal_vectors(&self) -> &Matrix3<f64> {
        &self.reciprocal_vectors
    }

    /// Generates a uniform $`\mathbf{k}`$-point mesh in absolute coordinates.
    ///
    /// The scaled coordinates along each axis are $`i/n`$ when the mesh contains the
    /// $`\Gamma`$ point, and $`(i + 1/2)/n - 1/2`$ otherwise. The last axis runs fastest.
    ///
    /// # Arguments
    ///
    /// * `divisions` - The number of points along each reciprocal-lattice vector.
    /// * `with_gamma_point` - Boolean indicating if the mesh is $`\Gamma`$-centred.
    /// * `wrap_around` - Boolean indicating if scaled coordinates $`\ge 1/2`$ are shifted down
    /// by one.
    pub fn make_kpts(
        &self,
        divisions: [usize; 3],
        with_gamma_point: bool,
        wrap_around: bool,
    ) -> Result<Vec<Vector3<f64>>, anyhow::Error> {
        ensure!(
            divisions.iter().all(|&n| n > 0),
            "Every mesh division must be positive."
        );
        let ks_each_axis = divisions
            .iter()
            .map(|&n| {
                (0..n)
                    .map(|i| {
                        let k = if with_gamma_point {
                            i as f64 / n as f64
                        } else {
                            (i as f64 + 0.5) / n as f64 - 0.5
                        };
                        if wrap_around && k >= 0.5 {
                            k - 1.0
                        } else {
                            k
                        }
                    })
                    .collect_vec()
            })
            .collect_vec();
        let scaled = ks_each_axis[0]
            .iter()
            .cartesian_product(ks_each_axis[1].iter())
            .cartesian_product(ks_each_axis[2].iter())
            .map(|((&k0, &k1), &k2)| Vector3::new(k0, k1, k2))
            .collect_vec();
        Ok(self.abs_kpts(&scaled))
    }
}

impl KPointBasis for Lattice {
    fn scaled_kpts(&self, abs_kpts: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        abs_kpts
            .iter()
            .map(|k| self.vectors * k / (2.0 * PI))
            .collect()
    }

    fn abs_kpts(&self, scaled_kpts: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        scaled_kpts
            .iter()
            .map(|k| self.reciprocal_vectors.transpose() * k)
            .collect()
    }
}

impl fmt::Display for Lattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Lattice vectors:")?;
        for (i, row) in self.vectors.row_iter().enumerate() {
            writeln!(
                f,
                "  a{}: ({})",
                i + 1,
                row.iter().map(|x| format!("{x:+.6}")).join(", ")
            )?;
        }
        Ok(())
    }
}
