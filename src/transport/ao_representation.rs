//! Representations of space-group operations in atomic-orbital bases.

use std::f64::consts::PI;
use std::fmt;

use derive_builder::Builder;
use indexmap::IndexMap;
use itertools::Itertools;
use nalgebra::Vector3;
use ndarray::{s, Array2};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::kpoints::KPointsError;
use crate::symmetry::SpaceGroupOperation;

#[cfg(test)]
#[path = "ao_representation_tests.rs"]
mod ao_representation_tests;

// =================
// Trait definitions
// =================

/// Trait for providers of the atomic-orbital (AO) transformation matrices of space-group
/// operations at $`\mathbf{k}`$-points.
pub trait OrbitalRepresentation {
    /// Returns the number of AO basis functions.
    fn nao(&self) -> usize;

    /// Returns the AO transformation matrix $`\mathbf{U}`$ that maps a quantity at the IBZ
    /// point $`\mathbf{k}`$ onto the corresponding quantity at the rotated point
    /// $`\hat{g}\mathbf{k}`$.
    ///
    /// # Arguments
    ///
    /// * `handle` - The handle of the operation, as stored in
    /// [`crate::symmetry::OperationKind::Generic`].
    /// * `operation` - The operation $`\hat{g}`$.
    /// * `kpt_scaled_ibz` - The scaled IBZ $`\mathbf{k}`$-point.
    ///
    /// # Errors
    ///
    /// Errors with [`KPointsError::MissingRepresentation`] if no representation is available for
    /// `handle`.
    fn ao_transformation(
        &self,
        handle: usize,
        operation: &SpaceGroupOperation,
        kpt_scaled_ibz: &Vector3<f64>,
    ) -> Result<Array2<Complex<f64>>, KPointsError>;
}

// ==================
// Struct definitions
// ==================

// ------------
// Basis layout
// ------------

/// Structure describing how spherical AO shells are laid out over the atoms of a unit cell.
///
/// Basis functions are ordered atom by atom, then shell by shell, and each shell of angular
/// momentum $`l`$ contributes $`2l + 1`$ functions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasisLayout {
    /// The angular momenta of the shells on each atom.
    shells: Vec<Vec<u32>>,
}

impl BasisLayout {
    /// Constructs a basis layout from the angular momenta of the shells on each atom.
    pub fn new(shells: Vec<Vec<u32>>) -> Self {
        Self { shells }
    }

    /// Returns the number of atoms.
    pub fn natoms(&self) -> usize {
        self.shells.len()
    }

    /// Returns the angular momenta of the shells on atom `atom`.
    pub fn shells(&self, atom: usize) -> Option<&[u32]> {
        self.shells.get(atom).map(|shells| shells.as_slice())
    }

    /// Returns the number of basis functions on atom `atom`.
    fn nao_atom(&self, atom: usize) -> usize {
        self.shells[atom]
            .iter()
            .map(|&l| 2 * l as usize + 1)
            .sum()
    }

    /// Returns the number of basis functions.
    pub fn nao(&self) -> usize {
        (0..self.natoms()).map(|atom| self.nao_atom(atom)).sum()
    }

    /// Returns the index of the first basis function on each atom.
    pub fn atom_offsets(&self) -> Vec<usize> {
        (0..self.natoms())
            .scan(0, |offset, atom| {
                let start = *offset;
                *offset += self.nao_atom(atom);
                Some(start)
            })
            .collect_vec()
    }

    /// Returns the largest angular momentum in the basis, or `None` if the basis is empty.
    pub fn lmax(&self) -> Option<u32> {
        self.shells.iter().flatten().max().copied()
    }
}

// -------------------
// Per-operation Dmats
// -------------------

/// Structure containing the data of a single operation required to build its AO transformation
/// matrices.
#[derive(Builder, Clone, Debug, Serialize, Deserialize)]
pub struct OperationDmats {
    /// For each atom `a`, the atom `b` onto which the operation maps it.
    atom_map: Vec<usize>,

    /// For each atom `a`, the lattice vector $`\mathbf{L}_a`$ (in the direct-lattice
    /// fractional basis) such that the image of atom `a` is atom `b` displaced by
    /// $`\mathbf{L}_a`$.
    lattice_shifts: Vec<Vector3<i32>>,

    /// The real orbital-rotation matrices of the operation, indexed by the angular momentum
    /// $`l`$, each of shape $`(2l + 1) \times (2l + 1)`$.
    dmats: Vec<Array2<f64>>,
}

impl OperationDmats {
    /// Returns a builder to construct a new [`OperationDmats`] structure.
    pub fn builder() -> OperationDmatsBuilder {
        OperationDmatsBuilder::default()
    }

    fn validate_against(&self, layout: &BasisLayout) -> Result<(), KPointsError> {
        let natoms = layout.natoms();
        if self.atom_map.len() != natoms || self.lattice_shifts.len() != natoms {
            return Err(KPointsError::InvalidInput(format!(
                "Operation data cover {} atoms and {} lattice shifts, but the basis has {natoms} \
                atoms.",
                self.atom_map.len(),
                self.lattice_shifts.len()
            )));
        }
        if !self.atom_map.iter().copied().sorted().eq(0..natoms) {
            return Err(KPointsError::InvalidInput(
                "The atom map is not a permutation of the atoms.".to_string(),
            ));
        }
        if let Some((a, b)) = self
            .atom_map
            .iter()
            .enumerate()
            .find(|(a, b)| layout.shells[*a] != layout.shells[**b])
        {
            return Err(KPointsError::InvalidInput(format!(
                "Atoms {a} and {b} are related by symmetry but carry different shells."
            )));
        }
        if let Some(lmax) = layout.lmax() {
            for l in 0..=lmax as usize {
                let n = 2 * l + 1;
                match self.dmats.get(l) {
                    Some(dmat) if dmat.dim() == (n, n) => {}
                    Some(dmat) => {
                        return Err(KPointsError::InvalidInput(format!(
                            "The Dmat for l = {l} has shape {:?}, but ({n}, {n}) is required.",
                            dmat.dim()
                        )))
                    }
                    None => {
                        return Err(KPointsError::InvalidInput(format!(
                            "No Dmat found for l = {l}."
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}

// -------------------
// Dmat representation
// -------------------

/// Structure assembling AO transformation matrices from per-operation atom maps, lattice shifts
/// and orbital-rotation matrices.
///
/// For an operation mapping atom `a` onto atom `b` displaced by $`\mathbf{L}_a`$, the block of
/// $`\mathbf{U}`$ coupling the shell functions $`\mu`$ on `a` to $`\nu`$ on `b` is
/// ```math
///     U_{b\nu, a\mu} = e^{-2\pi i \mathbf{k}' \cdot \mathbf{L}_a} D^{(l)}_{\nu\mu},
/// ```
/// where $`\mathbf{k}'`$ is the image of the IBZ point under the operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DmatRepresentation {
    /// The layout of the basis functions.
    layout: BasisLayout,

    /// The operation data, keyed by operation handles.
    operations: IndexMap<usize, OperationDmats>,
}

impl DmatRepresentation {
    /// Constructs a representation without any operations.
    pub fn new(layout: BasisLayout) -> Self {
        Self {
            layout,
            operations: IndexMap::new(),
        }
    }

    /// Returns the basis layout.
    pub fn layout(&self) -> &BasisLayout {
        &self.layout
    }

    /// Adds the data of an operation.
    ///
    /// # Arguments
    ///
    /// * `handle` - The handle of the operation.
    /// * `dmats` - The data of the operation.
    ///
    /// # Errors
    ///
    /// Errors if `dmats` is inconsistent with the basis layout.
    pub fn add_operation(
        &mut self,
        handle: usize,
        dmats: OperationDmats,
    ) -> Result<&mut Self, KPointsError> {
        dmats.validate_against(&self.layout)?;
        self.operations.insert(handle, dmats);
        Ok(self)
    }

    /// Returns the handles of the operations available, in insertion order.
    pub fn handles(&self) -> impl Iterator<Item = &usize> + '_ {
        self.operations.keys()
    }
}

impl OrbitalRepresentation for DmatRepresentation {
    fn nao(&self) -> usize {
        self.layout.nao()
    }

    fn ao_transformation(
        &self,
        handle: usize,
        operation: &SpaceGroupOperation,
        kpt_scaled_ibz: &Vector3<f64>,
    ) -> Result<Array2<Complex<f64>>, KPointsError> {
        let op_dmats = self
            .operations
            .get(&handle)
            .ok_or(KPointsError::MissingRepresentation(handle))?;
        let kpt_rotated = operation.act_on_kpoint(kpt_scaled_ibz).ok_or_else(|| {
            KPointsError::InvalidInput(format!("Operation with handle {handle} is not invertible."))
        })?;
        let offsets = self.layout.atom_offsets();
        let nao = self.layout.nao();
        let mut umat = Array2::<Complex<f64>>::zeros((nao, nao));
        for (a, (&b, shift)) in op_dmats
            .atom_map
            .iter()
            .zip(op_dmats.lattice_shifts.iter())
            .enumerate()
        {
            let phase =
                Complex::from_polar(1.0, -2.0 * PI * kpt_rotated.dot(&shift.map(f64::from)));
            let mut off_a = offsets[a];
            let mut off_b = offsets[b];
            for &l in self.layout.shells[a].iter() {
                let n = 2 * l as usize + 1;
                umat.slice_mut(s![off_b..off_b + n, off_a..off_a + n])
                    .assign(&op_dmats.dmats[l as usize].mapv(|x| phase * x));
                off_a += n;
                off_b += n;
            }
        }
        Ok(umat)
    }
}

impl fmt::Display for DmatRepresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Orbital-basis representation: {} atoms, {} basis functions",
            self.layout.natoms(),
            self.layout.nao()
        )?;
        writeln!(
            f,
            "Operations with Dmats: {}",
            self.operations.keys().map(|h| h.to_string()).join(", ")
        )?;
        Ok(())
    }
}
