//! Transport of $`\mathbf{k}`$-dependent quantities from the IBZ to the full BZ.
//!
//! Every BZ point $`\mathbf{k}`$ is reached from its IBZ representative by a connecting proper
//! operation, possibly combined with time reversal. Quantities expressed in an orbital basis
//! are transported with the AO transformation matrix of the connecting operation, and
//! real-space grid quantities with a [`grid::GridKernel`].

use itertools::Itertools;
use ndarray::{Array1, Array2, Array3, Array4, Axis};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::kpoints::{KPointSymmetryTable, KPointsError};
use crate::symmetry::OperationKind;

pub mod ao_representation;
pub mod grid;

use ao_representation::OrbitalRepresentation;


// ================
// Enum definitions
// ================

/// Enumerated type for quantities that are either shared by both spin channels or given
/// separately for each.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SpinChannels<T> {
    /// Variant for quantities shared by both spin channels.
    Restricted(T),

    /// Variant for quantities given separately for the $`\alpha`$ and $`\beta`$ spin channels.
    Unrestricted { alpha: T, beta: T },
}

impl<T> SpinChannels<T> {
    /// Applies a fallible map to every spin channel.
    pub fn try_map<U, E, F>(&self, mut f: F) -> Result<SpinChannels<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        match self {
            Self::Restricted(x) => Ok(SpinChannels::Restricted(f(x)?)),
            Self::Unrestricted { alpha, beta } => Ok(SpinChannels::Unrestricted {
                alpha: f(alpha)?,
                beta: f(beta)?,
            }),
        }
    }

    /// Returns the number of spin channels.
    pub fn nspins(&self) -> usize {
        match self {
            Self::Restricted(_) => 1,
            Self::Unrestricted { .. } => 2,
        }
    }
}

/// Enumerated type for stacks of BZ density matrices.
#[derive(Clone, Debug, PartialEq)]
pub enum DensityMatrixStack {
    /// Density matrices of shape `[nkpts, nao, nao]`.
    Restricted(Array3<Complex<f64>>),

    /// Density matrices of shape `[2, nkpts, nao, nao]`.
    Unrestricted(Array4<Complex<f64>>),
}

/// Enumerated type for the ways an orbital-basis quantity is rotated by an AO transformation
/// matrix.
#[derive(Clone, Copy, Debug)]
enum QuantityRank {
    /// Coefficient matrices $`\mathbf{C} \mapsto \mathbf{U}\mathbf{C}`$.
    Coefficients,

    /// Density matrices $`\mathbf{D} \mapsto \mathbf{U}\mathbf{D}\mathbf{U}^{\dagger}`$.
    DensityMatrix,
}

impl QuantityRank {
    fn rotate(
        &self,
        quantity: &Array2<Complex<f64>>,
        umat: &Array2<Complex<f64>>,
    ) -> Result<Array2<Complex<f64>>, KPointsError> {
        if umat.ncols() != quantity.nrows() {
            return Err(KPointsError::InvalidInput(format!(
                "AO transformation matrix of shape {:?} is incompatible with quantity of shape \
                {:?}.",
                umat.dim(),
                quantity.dim()
            )));
        }
        match self {
            Self::Coefficients => Ok(umat.dot(quantity)),
            Self::DensityMatrix => {
                if quantity.ncols() != umat.ncols() {
                    return Err(KPointsError::InvalidInput(format!(
                        "Density matrix of shape {:?} is not square in the AO basis.",
                        quantity.dim()
                    )));
                }
                Ok(umat
                    .dot(quantity)
                    .dot(&umat.t().mapv(|x| x.conj())))
            }
        }
    }
}

// =====================
// Transport operations
// =====================

impl KPointSymmetryTable {
    fn check_ibz_len<T>(&self, quantity: &[T], name: &str) -> Result<(), KPointsError> {
        if quantity.len() != self.nkpts_ibz() {
            return Err(KPointsError::InvalidInput(format!(
                "{name} given for {} k-points, but there are {} IBZ k-points.",
                quantity.len(),
                self.nkpts_ibz()
            )));
        }
        Ok(())
    }

    fn check_bz_len<T>(&self, quantity: &[T], name: &str) -> Result<(), KPointsError> {
        if quantity.len() != self.nkpts() {
            return Err(KPointsError::InvalidInput(format!(
                "{name} given for {} k-points, but there are {} BZ k-points.",
                quantity.len(),
                self.nkpts()
            )));
        }
        Ok(())
    }

    /// Transports a single orbital-basis quantity from the representative of BZ point `k` onto
    /// `k`.
    fn transport_orbital_quantity(
        &self,
        rep: &dyn OrbitalRepresentation,
        quantity_ibz: &Array2<Complex<f64>>,
        k: usize,
        rank: QuantityRank,
    ) -> Result<Array2<Complex<f64>>, KPointsError> {
        let ibz = self.bz2ibz()[k];
        let iop = self.stars_ops_bz()[k];
        let time_reversal = self.time_reversal_symm_bz()[k];
        let kind = self.operation_kind(iop).ok_or_else(|| {
            KPointsError::InvalidInput(format!("Operation index {iop} out of range."))
        })?;
        let transported = match kind {
            OperationKind::Identity => quantity_ibz.clone(),
            OperationKind::Inversion => return Ok(quantity_ibz.mapv(|x| x.conj())),
            OperationKind::Generic(handle) => {
                let op = self.operations().get(iop).ok_or_else(|| {
                    KPointsError::InvalidInput(format!("Operation index {iop} out of range."))
                })?;
                let kpt_scaled_ibz = self.kpts_scaled()[self.ibz2bz()[ibz]];
                let umat = rep.ao_transformation(handle, op, &kpt_scaled_ibz)?;
                rank.rotate(quantity_ibz, &umat)?
            }
        };
        if time_reversal {
            Ok(transported.mapv(|x| x.conj()))
        } else {
            Ok(transported)
        }
    }

    /// Transforms molecular-orbital coefficients from the IBZ to the full BZ.
    ///
    /// # Arguments
    ///
    /// * `rep` - The provider of AO transformation matrices.
    /// * `mo_coeff_ibz` - The coefficient matrices of shape `[nao, nmo]` at every IBZ point.
    ///
    /// # Returns
    ///
    /// The coefficient matrices at every BZ point.
    pub fn transform_mo_coeff(
        &self,
        rep: &dyn OrbitalRepresentation,
        mo_coeff_ibz: &SpinChannels<Vec<Array2<Complex<f64>>>>,
    ) -> Result<SpinChannels<Vec<Array2<Complex<f64>>>>, KPointsError> {
        mo_coeff_ibz.try_map(|mo_coeff_ibz| {
            self.check_ibz_len(mo_coeff_ibz, "MO coefficients")?;
            (0..self.nkpts())
                .map(|k| {
                    self.transport_orbital_quantity(
                        rep,
                        &mo_coeff_ibz[self.bz2ibz()[k]],
                        k,
                        QuantityRank::Coefficients,
                    )
                })
                .collect::<Result<Vec<_>, _>>()
        })
    }

    /// Transforms the molecular-orbital coefficients of a single spin channel onto one BZ point.
    ///
    /// # Arguments
    ///
    /// * `rep` - The provider of AO transformation matrices.
    /// * `mo_coeff_ibz` - The coefficient matrices of shape `[nao, nmo]` at every IBZ point.
    /// * `k` - The index of the BZ point.
    pub fn transform_mo_coeff_k(
        &self,
        rep: &dyn OrbitalRepresentation,
        mo_coeff_ibz: &[Array2<Complex<f64>>],
        k: usize,
    ) -> Result<Array2<Complex<f64>>, KPointsError> {
        self.check_ibz_len(mo_coeff_ibz, "MO coefficients")?;
        if k >= self.nkpts() {
            return Err(KPointsError::InvalidInput(format!(
                "BZ index {k} out of range for {} BZ k-points.",
                self.nkpts()
            )));
        }
        self.transport_orbital_quantity(
            rep,
            &mo_coeff_ibz[self.bz2ibz()[k]],
            k,
            QuantityRank::Coefficients,
        )
    }

    /// Transforms density matrices from the IBZ to the full BZ.
    ///
    /// # Arguments
    ///
    /// * `rep` - The provider of AO transformation matrices.
    /// * `dm_ibz` - The density matrices of shape `[nkpts_ibz, nao, nao]`.
    ///
    /// # Returns
    ///
    /// The density matrices of shape `[nkpts, nao, nao]`, or `[2, nkpts, nao, nao]` for
    /// unrestricted input.
    pub fn transform_dm(
        &self,
        rep: &dyn OrbitalRepresentation,
        dm_ibz: &SpinChannels<Array3<Complex<f64>>>,
    ) -> Result<DensityMatrixStack, KPointsError> {
        let dms = dm_ibz.try_map(|dm_ibz| {
            let dm_ibz = dm_ibz.outer_iter().map(|dm| dm.to_owned()).collect_vec();
            self.check_ibz_len(&dm_ibz, "Density matrices")?;
            let dms_bz = (0..self.nkpts())
                .map(|k| {
                    self.transport_orbital_quantity(
                        rep,
                        &dm_ibz[self.bz2ibz()[k]],
                        k,
                        QuantityRank::DensityMatrix,
                    )
                })
                .collect::<Result<Vec<_>, _>>()?;
            let views = dms_bz.iter().map(|dm| dm.view()).collect_vec();
            ndarray::stack(Axis(0), &views)
                .map_err(|err| KPointsError::InvalidInput(err.to_string()))
        })?;
        match dms {
            SpinChannels::Restricted(dms) => Ok(DensityMatrixStack::Restricted(dms)),
            SpinChannels::Unrestricted { alpha, beta } => {
                ndarray::stack(Axis(0), &[alpha.view(), beta.view()])
                    .map(DensityMatrixStack::Unrestricted)
                    .map_err(|err| KPointsError::InvalidInput(err.to_string()))
            }
        }
    }

    /// Transforms molecular-orbital energies from the IBZ to the full BZ. Orbital energies are
    /// invariant within every orbit, so this is a lookup.
    pub fn transform_mo_energy(
        &self,
        mo_energy_ibz: &SpinChannels<Vec<Array1<f64>>>,
    ) -> Result<SpinChannels<Vec<Array1<f64>>>, KPointsError> {
        mo_energy_ibz.try_map(|mo_energy_ibz| {
            self.check_ibz_len(mo_energy_ibz, "MO energies")?;
            Ok(self
                .bz2ibz()
                .iter()
                .map(|&ibz| mo_energy_ibz[ibz].clone())
                .collect_vec())
        })
    }

    /// Transforms molecular-orbital occupation numbers from the IBZ to the full BZ.
    pub fn transform_mo_occ(
        &self,
        mo_occ_ibz: &SpinChannels<Vec<Array1<f64>>>,
    ) -> Result<SpinChannels<Vec<Array1<f64>>>, KPointsError> {
        mo_occ_ibz.try_map(|mo_occ_ibz| {
            self.check_ibz_len(mo_occ_ibz, "MO occupations")?;
            Ok(self
                .bz2ibz()
                .iter()
                .map(|&ibz| mo_occ_ibz[ibz].clone())
                .collect_vec())
        })
    }

    /// Checks that a BZ quantity agrees, element by element and within `tol`, between all
    /// members of every orbit, and extracts its values at the representatives.
    fn check_orbit_invariance(
        &self,
        quantity: &[Array1<f64>],
        name: &str,
        tol: f64,
    ) -> Result<Vec<Array1<f64>>, KPointsError> {
        self.check_bz_len(quantity, name)?;
        for (orbit, star) in self.stars().iter().enumerate() {
            for (&first, &second) in star.iter().tuple_combinations() {
                let (q1, q2) = (&quantity[first], &quantity[second]);
                let agree = q1.len() == q2.len()
                    && q1.iter().zip(q2.iter()).all(|(x, y)| (x - y).abs() < tol);
                if !agree {
                    return Err(KPointsError::SymmetryBroken {
                        orbit,
                        first,
                        second,
                    });
                }
            }
        }
        Ok(self
            .ibz2bz()
            .iter()
            .map(|&k| quantity[k].clone())
            .collect_vec())
    }

    /// Checks that occupation numbers are invariant within every orbit.
    ///
    /// # Arguments
    ///
    /// * `mo_occ` - The occupation numbers at every BZ point.
    /// * `tol` - The tolerance for comparing occupation numbers.
    ///
    /// # Returns
    ///
    /// The occupation numbers at the IBZ points.
    ///
    /// # Errors
    ///
    /// Errors with [`KPointsError::SymmetryBroken`] if two members of an orbit disagree.
    pub fn check_mo_occ_symmetry(
        &self,
        mo_occ: &SpinChannels<Vec<Array1<f64>>>,
        tol: f64,
    ) -> Result<SpinChannels<Vec<Array1<f64>>>, KPointsError> {
        mo_occ.try_map(|mo_occ| self.check_orbit_invariance(mo_occ, "MO occupations", tol))
    }

    /// Checks that orbital energies are invariant within every orbit.
    ///
    /// # Returns
    ///
    /// The orbital energies at the IBZ points.
    pub fn check_mo_energy_symmetry(
        &self,
        mo_energy: &SpinChannels<Vec<Array1<f64>>>,
        tol: f64,
    ) -> Result<SpinChannels<Vec<Array1<f64>>>, KPointsError> {
        mo_energy.try_map(|mo_energy| self.check_orbit_invariance(mo_energy, "MO energies", tol))
    }
}
