//! Symmetrisation of real-space grid quantities.

use std::fmt;
use std::ops::AddAssign;

use duplicate::duplicate_item;
use itertools::Itertools;
use nalgebra::{Matrix3, Vector3};
use ndarray::{Array1, Array3, ArrayView1, ArrayViewMut1, Axis};
use num_complex::Complex;
use num_traits::Zero;

use crate::kpoints::{KPointSymmetryTable, KPointsError};
use crate::symmetry::space_group_operation::TRANSLATION_THRESHOLD;
use crate::symmetry::OperationKind;

#[cfg(test)]
#[path = "grid_tests.rs"]
mod grid_tests;

mod private {
    pub trait Sealed {}
}

// =================
// Trait definitions
// =================

/// Trait for the element types of real-space grid quantities. This is implemented for [`f64`]
/// and [`Complex<f64>`] only.
pub trait GridScalar: private::Sealed + Copy + Zero + AddAssign + fmt::Debug {
    /// Returns the complex conjugate.
    fn conjugate(self) -> Self;
}

#[duplicate_item(dtype_; [f64]; [Complex<f64>])]
impl private::Sealed for dtype_ {}

#[duplicate_item(
    [
        dtype_ [ f64 ]
        conj_ [ self ]
    ]
    [
        dtype_ [ Complex<f64> ]
        conj_ [ self.conj() ]
    ]
)]
impl GridScalar for dtype_ {
    fn conjugate(self) -> Self {
        conj_
    }
}

/// Trait for kernels accumulating rotated copies of grid quantities.
///
/// Grids are flattened in row-major order over a mesh of shape `[n0, n1, n2]`. A kernel must
/// either complete and fully accumulate into `out`, or return an error without touching it.
pub trait GridKernel<T: GridScalar> {
    /// Accumulates `out[r] += input[W r]` for every grid point `r`.
    ///
    /// # Arguments
    ///
    /// * `out` - The accumulator.
    /// * `input` - The grid quantity to be rotated.
    /// * `rotation` - The rotation $`W`$ in the direct-lattice fractional basis.
    /// * `mesh` - The shape of the grid.
    fn symmetrize(
        &self,
        out: ArrayViewMut1<T>,
        input: ArrayView1<T>,
        rotation: &Matrix3<i32>,
        mesh: [usize; 3],
    ) -> Result<(), KPointsError>;

    /// Accumulates `out[r] += input[W r + t]` for every grid point `r`.
    ///
    /// # Arguments
    ///
    /// * `out` - The accumulator.
    /// * `input` - The grid quantity to be rotated.
    /// * `rotation` - The rotation $`W`$ in the direct-lattice fractional basis.
    /// * `translation` - The fractional translation $`\mathbf{t}`$.
    /// * `mesh` - The shape of the grid.
    fn symmetrize_ft(
        &self,
        out: ArrayViewMut1<T>,
        input: ArrayView1<T>,
        rotation: &Matrix3<i32>,
        translation: &Vector3<f64>,
        mesh: [usize; 3],
    ) -> Result<(), KPointsError>;
}

// ==================
// Struct definitions
// ==================

/// A reference grid kernel working directly on grid indices.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeGridKernel;

impl NativeGridKernel {
    /// Computes, for every grid point `r`, the flat index of `W r + t`.
    fn source_indices(
        ngrid_in: usize,
        ngrid_out: usize,
        rotation: &Matrix3<i32>,
        translation: &Vector3<f64>,
        mesh: [usize; 3],
    ) -> Result<Vec<usize>, KPointsError> {
        let ngrid = mesh.iter().product::<usize>();
        if ngrid == 0 || ngrid_in != ngrid || ngrid_out != ngrid {
            return Err(KPointsError::Kernel(format!(
                "Grid buffers of sizes {ngrid_in} (input) and {ngrid_out} (output) do not match \
                the mesh {mesh:?}."
            )));
        }
        let n = mesh.map(|x| x as i64);

        // Entry (a, b) of the index-space rotation is W_ab n_a / n_b, which must be integral.
        let mut wgrid = [[0i64; 3]; 3];
        for (a, b) in (0..3).cartesian_product(0..3) {
            let scaled = i64::from(rotation[(a, b)]) * n[a];
            if scaled % n[b] != 0 {
                return Err(KPointsError::Kernel(format!(
                    "Rotation does not map the mesh {mesh:?} onto itself."
                )));
            }
            wgrid[a][b] = scaled / n[b];
        }

        let mut shift = [0i64; 3];
        for a in 0..3 {
            let scaled = translation[a] * n[a] as f64;
            if (scaled - scaled.round()).abs() > TRANSLATION_THRESHOLD {
                return Err(KPointsError::Kernel(format!(
                    "Translation ({}) is not commensurate with the mesh {mesh:?}.",
                    translation.iter().map(|x| format!("{x:.6}")).join(", ")
                )));
            }
            shift[a] = scaled.round() as i64;
        }

        let indices = (0..n[0])
            .cartesian_product(0..n[1])
            .cartesian_product(0..n[2])
            .map(|((i0, i1), i2)| {
                let r = [i0, i1, i2];
                let src = (0..3)
                    .map(|a| {
                        let x = (0..3).map(|b| wgrid[a][b] * r[b]).sum::<i64>() + shift[a];
                        x.rem_euclid(n[a])
                    })
                    .collect_vec();
                ((src[0] * n[1] + src[1]) * n[2] + src[2]) as usize
            })
            .collect_vec();
        Ok(indices)
    }
}

impl<T: GridScalar> GridKernel<T> for NativeGridKernel {
    fn symmetrize(
        &self,
        out: ArrayViewMut1<T>,
        input: ArrayView1<T>,
        rotation: &Matrix3<i32>,
        mesh: [usize; 3],
    ) -> Result<(), KPointsError> {
        self.symmetrize_ft(out, input, rotation, &Vector3::zeros(), mesh)
    }

    fn symmetrize_ft(
        &self,
        mut out: ArrayViewMut1<T>,
        input: ArrayView1<T>,
        rotation: &Matrix3<i32>,
        translation: &Vector3<f64>,
        mesh: [usize; 3],
    ) -> Result<(), KPointsError> {
        let src = Self::source_indices(input.len(), out.len(), rotation, translation, mesh)?;
        out.iter_mut()
            .zip(src.iter())
            .for_each(|(o, &s)| *o += input[s]);
        Ok(())
    }
}

// =====================
// Transport operations
// =====================

impl KPointSymmetryTable {
    /// Accumulates into `out` the image of `rho` under the proper operation `iop`.
    fn accumulate_rotated<T, K>(
        &self,
        kernel: &K,
        mut out: ArrayViewMut1<T>,
        rho: ArrayView1<T>,
        iop: usize,
        mesh: [usize; 3],
    ) -> Result<(), KPointsError>
    where
        T: GridScalar,
        K: GridKernel<T> + ?Sized,
    {
        let (op, kind) = self
            .operations()
            .get(iop)
            .zip(self.operation_kind(iop))
            .ok_or_else(|| {
                KPointsError::InvalidInput(format!("Operation index {iop} out of range."))
            })?;
        match kind {
            OperationKind::Identity | OperationKind::Inversion => {
                if out.len() != rho.len() {
                    return Err(KPointsError::Kernel(format!(
                        "Grid buffers of sizes {} and {} differ.",
                        rho.len(),
                        out.len()
                    )));
                }
                out += &rho;
                Ok(())
            }
            OperationKind::Generic(_) => {
                let inv = op.inverse().ok_or_else(|| {
                    KPointsError::InvalidInput(format!("Operation {iop} is not invertible."))
                })?;
                if inv.translation_is_zero() {
                    kernel.symmetrize(out, rho, inv.rotation(), mesh)
                } else {
                    kernel.symmetrize_ft(out, rho, inv.rotation(), inv.translation(), mesh)
                }
            }
        }
    }

    fn symmetrize_density_over<T, K>(
        &self,
        kernel: &K,
        rho: ArrayView1<T>,
        ops: impl Iterator<Item = usize>,
        mesh: [usize; 3],
    ) -> Result<Array1<T>, KPointsError>
    where
        T: GridScalar,
        K: GridKernel<T> + ?Sized,
    {
        let mut out = Array1::<T>::zeros(rho.len());
        for iop in ops {
            self.accumulate_rotated(kernel, out.view_mut(), rho.view(), iop, mesh)?;
        }
        Ok(out)
    }

    /// Symmetrises a real-space density at an IBZ point by summing its images under the
    /// little group of the point.
    ///
    /// # Arguments
    ///
    /// * `kernel` - The grid kernel.
    /// * `rho` - The flattened density at the IBZ point.
    /// * `ibz` - The index of the IBZ point.
    /// * `mesh` - The shape of the grid.
    pub fn symmetrize_density<T, K>(
        &self,
        kernel: &K,
        rho: ArrayView1<T>,
        ibz: usize,
        mesh: [usize; 3],
    ) -> Result<Array1<T>, KPointsError>
    where
        T: GridScalar,
        K: GridKernel<T> + ?Sized,
    {
        let stabilizer = self.stabilizer(ibz)?;
        self.symmetrize_density_over(kernel, rho, stabilizer.into_iter(), mesh)
    }

    /// Symmetrises a real-space density at an IBZ point by summing its images under the
    /// connecting operations of every member of the star of the point.
    pub fn symmetrize_density_over_star<T, K>(
        &self,
        kernel: &K,
        rho: ArrayView1<T>,
        ibz: usize,
        mesh: [usize; 3],
    ) -> Result<Array1<T>, KPointsError>
    where
        T: GridScalar,
        K: GridKernel<T> + ?Sized,
    {
        let ops = self.stars_ops().get(ibz).ok_or_else(|| {
            KPointsError::InvalidInput(format!(
                "IBZ index {ibz} out of range for {} IBZ k-points.",
                self.nkpts_ibz()
            ))
        })?;
        self.symmetrize_density_over(kernel, rho, ops.iter().copied(), mesh)
    }

    /// Transforms real-space wavefunctions from the IBZ to the full BZ.
    ///
    /// # Arguments
    ///
    /// * `kernel` - The grid kernel.
    /// * `psi_ibz` - The wavefunctions of shape `[nkpts_ibz, nao, ngrid]`.
    /// * `mesh` - The shape of the grid.
    ///
    /// # Returns
    ///
    /// The wavefunctions of shape `[nkpts, nao, ngrid]`.
    pub fn symmetrize_wavefunction<T, K>(
        &self,
        kernel: &K,
        psi_ibz: &Array3<T>,
        mesh: [usize; 3],
    ) -> Result<Array3<T>, KPointsError>
    where
        T: GridScalar,
        K: GridKernel<T> + ?Sized,
    {
        let (nkpts_ibz, nao, ngrid) = psi_ibz.dim();
        if nkpts_ibz != self.nkpts_ibz() {
            return Err(KPointsError::InvalidInput(format!(
                "Wavefunctions given for {nkpts_ibz} k-points, but there are {} IBZ k-points.",
                self.nkpts_ibz()
            )));
        }
        let mut psi = Array3::<T>::zeros((self.nkpts(), nao, ngrid));
        for (ibz, psi_k_ibz) in psi_ibz.outer_iter().enumerate() {
            let star = &self.stars()[ibz];
            let ops = &self.stars_ops()[ibz];
            let trs = &self.stars_time_reversal()[ibz];
            for ((&k, &iop), &time_reversal) in star.iter().zip(ops.iter()).zip(trs.iter()) {
                let mut psi_k = psi.index_axis_mut(Axis(0), k);
                match self.operation_kind(iop) {
                    Some(OperationKind::Identity) => psi_k.assign(&psi_k_ibz),
                    Some(OperationKind::Inversion) => {
                        psi_k.assign(&psi_k_ibz.mapv(GridScalar::conjugate))
                    }
                    Some(OperationKind::Generic(_)) => {
                        for (out, input) in psi_k.outer_iter_mut().zip(psi_k_ibz.outer_iter()) {
                            self.accumulate_rotated(kernel, out, input, iop, mesh)?;
                        }
                    }
                    None => {
                        return Err(KPointsError::InvalidInput(format!(
                            "Operation index {iop} out of range."
                        )))
                    }
                }
                if time_reversal {
                    psi_k.mapv_inplace(GridScalar::conjugate);
                }
            }
        }
        Ok(psi)
    }
}
