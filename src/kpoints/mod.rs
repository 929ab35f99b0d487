//! Symmetry reduction of $`\mathbf{k}`$-point meshes.
//!
//! A [`KPointSymmetryTable`] is built from a [`RawKPointInput`] by [`build`] in three stages:
//! the point matcher locates the images of all $`\mathbf{k}`$-points under all operations, the
//! orbit builder partitions the Brillouin zone (BZ) into orbits whose representatives form the
//! irreducible Brillouin zone (IBZ), and the optional pair orbit builder does the same for
//! ordered pairs of $`\mathbf{k}`$-points.

use std::error::Error;
use std::fmt;

use derive_builder::Builder;
use indexmap::IndexSet;
use itertools::Itertools;
use nalgebra::Vector3;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::io::format::{kpsym_warn, nice_bool, write_subtitle};
use crate::lattice::KPointBasis;
use crate::symmetry::{OperationKind, OperationSet, SpaceGroupOperation};

pub mod orbit;
pub mod pair_orbit;
pub mod point_matcher;

use orbit::{build_orbits, KPointOrbits};
use pair_orbit::{build_pair_orbits, KPairOrbits};
use point_matcher::map_k_points;

#[cfg(test)]
#[path = "kpoints_tests.rs"]
mod kpoints_tests;

/// Default tolerance for comparing scaled $`\mathbf{k}`$-points.
pub const KPTS_DIFF_TOL: f64 = 1e-6;

// ================
// Enum definitions
// ================

/// Enumerated type for errors arising from $`\mathbf{k}`$-point symmetry reduction and from
/// the transport of quantities between the IBZ and the BZ.
#[derive(Debug, Clone, PartialEq)]
pub enum KPointsError {
    /// An equivalence class found by the point matcher does not pair exactly one original point
    /// with exactly one mapped point.
    MatcherContract(String),

    /// A quantity that must be invariant within every orbit differs between two members.
    SymmetryBroken {
        /// The index of the offending orbit.
        orbit: usize,

        /// The BZ index of the first disagreeing member.
        first: usize,

        /// The BZ index of the second disagreeing member.
        second: usize,
    },

    /// The input is malformed.
    InvalidInput(String),

    /// No orbital-basis representation is available for the operation with this handle.
    MissingRepresentation(usize),

    /// A grid kernel refused to act.
    Kernel(String),
}

impl fmt::Display for KPointsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MatcherContract(msg) => write!(f, "Point matcher contract violated: {msg}"),
            Self::SymmetryBroken {
                orbit,
                first,
                second,
            } => write!(
                f,
                "Symmetry broken: BZ k-points {first} and {second} of orbit {orbit} disagree."
            ),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            Self::MissingRepresentation(handle) => write!(
                f,
                "No orbital-basis representation available for operation {handle}."
            ),
            Self::Kernel(msg) => write!(f, "Grid kernel error: {msg}"),
        }
    }
}

impl Error for KPointsError {}

// ==================
// Struct definitions
// ==================

// ----------
// Parameters
// ----------

/// A structure containing control parameters for $`\mathbf{k}`$-point symmetry reduction.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct KPointSymmetryParams {
    /// Tolerance for comparing scaled $`\mathbf{k}`$-points.
    #[builder(default = "KPTS_DIFF_TOL")]
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Boolean indicating if the space-group operations are to be used. If `false`, only the
    /// identity is kept.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub space_group_symmetry: bool,

    /// Boolean indicating if time-reversal symmetry is to be used. This only takes effect when
    /// the operations do not contain the spatial inversion.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub time_reversal_symmetry: bool,

    /// Boolean indicating if only operations without fractional translations are to be kept.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub symmorphic: bool,

    /// Boolean indicating if orbits of $`\mathbf{k}`$-point pairs are to be constructed.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub make_kpairs: bool,

    /// Boolean indicating if pair orbits are to be further reduced by pair-permutation symmetry.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub permutation_symmetry: bool,

    /// Optional name for saving the result as a binary file of type
    /// [`crate::io::KpsymFileType::Kpt`]. If `None`, the result will not be saved.
    #[builder(default = "None")]
    #[serde(default)]
    pub result_save_name: Option<String>,
}

fn default_tolerance() -> f64 {
    KPTS_DIFF_TOL
}

fn default_true() -> bool {
    true
}

impl KPointSymmetryParamsBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(tolerance) = self.tolerance {
            if tolerance <= 0.0 || !tolerance.is_finite() {
                return Err(format!("Invalid k-point tolerance {tolerance:.3e}."));
            }
        }
        Ok(())
    }
}

impl KPointSymmetryParams {
    /// Returns a builder to construct a [`KPointSymmetryParams`] structure.
    pub fn builder() -> KPointSymmetryParamsBuilder {
        KPointSymmetryParamsBuilder::default()
    }
}

impl Default for KPointSymmetryParams {
    fn default() -> Self {
        Self {
            tolerance: KPTS_DIFF_TOL,
            space_group_symmetry: true,
            time_reversal_symmetry: true,
            symmorphic: true,
            make_kpairs: true,
            permutation_symmetry: true,
            result_save_name: None,
        }
    }
}

impl fmt::Display for KPointSymmetryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "K-point comparison tolerance: {:.3e}", self.tolerance)?;
        writeln!(
            f,
            "Space-group symmetry: {}",
            nice_bool(self.space_group_symmetry)
        )?;
        writeln!(
            f,
            "Time-reversal symmetry: {}",
            nice_bool(self.time_reversal_symmetry)
        )?;
        writeln!(
            f,
            "Symmorphic operations only: {}",
            nice_bool(self.symmorphic)
        )?;
        writeln!(f, "K-point pairs: {}", nice_bool(self.make_kpairs))?;
        if self.make_kpairs {
            writeln!(
                f,
                "Pair-permutation symmetry: {}",
                nice_bool(self.permutation_symmetry)
            )?;
        }
        writeln!(
            f,
            "Save reduction result to file: {}",
            if let Some(name) = self.result_save_name.as_ref() {
                name.clone()
            } else {
                nice_bool(false)
            }
        )?;
        Ok(())
    }
}

// -----
// Input
// -----

/// Structure containing everything needed to build a [`KPointSymmetryTable`].
#[derive(Clone, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct RawKPointInput<'a> {
    /// The BZ $`\mathbf{k}`$-points in absolute coordinates.
    #[builder(setter(custom))]
    kpts: Vec<Vector3<f64>>,

    /// The converter between absolute and scaled $`\mathbf{k}`$-point coordinates.
    basis: &'a dyn KPointBasis,

    /// The space-group operations of the crystal. The identity must be present. The position of
    /// each operation in this list is the handle with which its orbital-basis representation is
    /// looked up.
    operations: Vec<SpaceGroupOperation>,
}

impl<'a> RawKPointInputBuilder<'a> {
    /// Sets the BZ $`\mathbf{k}`$-points in absolute coordinates.
    pub fn kpts(&mut self, kpts: &[Vector3<f64>]) -> &mut Self {
        self.kpts = Some(kpts.to_vec());
        self
    }

    fn validate(&self) -> Result<(), String> {
        let kpts = self.kpts.as_ref().ok_or("No k-points found.".to_string())?;
        if kpts.is_empty() {
            return Err("The k-point set is empty.".to_string());
        }
        let operations = self
            .operations
            .as_ref()
            .ok_or("No operations found.".to_string())?;
        if !operations.iter().any(SpaceGroupOperation::is_identity) {
            return Err("The identity operation is missing.".to_string());
        }
        Ok(())
    }
}

impl<'a> RawKPointInput<'a> {
    /// Returns a builder to construct a [`RawKPointInput`] structure.
    pub fn builder() -> RawKPointInputBuilder<'a> {
        RawKPointInputBuilder::default()
    }

    /// Returns the BZ $`\mathbf{k}`$-points in absolute coordinates.
    pub fn kpts(&self) -> &[Vector3<f64>] {
        &self.kpts
    }

    /// Returns the space-group operations.
    pub fn operations(&self) -> &[SpaceGroupOperation] {
        &self.operations
    }
}

// -----
// Table
// -----

/// Structure holding a fully built $`\mathbf{k}`$-point symmetry table.
///
/// All indices are 0-based. Operation indices in [`Self::stars_ops`] and
/// [`Self::stars_ops_bz`] refer to proper operations, whereas those in [`Self::k2opk`] and in
/// the pair bookkeeping are doubled indices (see [`OperationSet`]).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KPointSymmetryTable {
    /// The BZ $`\mathbf{k}`$-points in absolute coordinates.
    kpts: Vec<Vector3<f64>>,

    /// The BZ $`\mathbf{k}`$-points in scaled coordinates.
    kpts_scaled: Vec<Vector3<f64>>,

    /// The IBZ $`\mathbf{k}`$-points in absolute coordinates.
    kpts_ibz: Vec<Vector3<f64>>,

    /// The operations used for the reduction.
    operations: OperationSet,

    /// The tolerance for comparing scaled $`\mathbf{k}`$-points.
    tolerance: f64,

    /// The mapping table of shape `[nkpts, n_total]`.
    k2opk: Array2<Option<usize>>,

    /// The single-$`\mathbf{k}`$ orbits.
    orbits: KPointOrbits,

    /// The pair orbits, if constructed.
    pairs: Option<KPairOrbits>,
}

impl KPointSymmetryTable {
    /// Returns the number of BZ $`\mathbf{k}`$-points.
    pub fn nkpts(&self) -> usize {
        self.kpts.len()
    }

    /// Returns the number of IBZ $`\mathbf{k}`$-points.
    pub fn nkpts_ibz(&self) -> usize {
        self.orbits.ibz2bz.len()
    }

    /// Returns the BZ $`\mathbf{k}`$-points in absolute coordinates.
    pub fn kpts(&self) -> &[Vector3<f64>] {
        &self.kpts
    }

    /// Returns the BZ $`\mathbf{k}`$-points in scaled coordinates.
    pub fn kpts_scaled(&self) -> &[Vector3<f64>] {
        &self.kpts_scaled
    }

    /// Returns the IBZ $`\mathbf{k}`$-points in absolute coordinates.
    pub fn kpts_ibz(&self) -> &[Vector3<f64>] {
        &self.kpts_ibz
    }

    /// Returns the IBZ $`\mathbf{k}`$-points in scaled coordinates.
    pub fn kpts_scaled_ibz(&self) -> Vec<Vector3<f64>> {
        self.orbits
            .ibz2bz
            .iter()
            .map(|&k| self.kpts_scaled[k])
            .collect()
    }

    /// Returns the operations used for the reduction.
    pub fn operations(&self) -> &OperationSet {
        &self.operations
    }

    /// Returns the number of proper operations.
    pub fn nop(&self) -> usize {
        self.operations.nop()
    }

    /// Returns the transport classification of the proper operation with index `iop`.
    pub fn operation_kind(&self, iop: usize) -> Option<OperationKind> {
        self.operations.kind(iop)
    }

    /// Returns a boolean indicating if time reversal has been used.
    pub fn time_reversal(&self) -> bool {
        self.operations.time_reversal()
    }

    /// Returns the tolerance for comparing scaled $`\mathbf{k}`$-points.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Returns the mapping table: entry `[k, s]` is the index of the image of BZ point `k` under
    /// the operation with doubled index `s`, or `None` if the image is not in the mesh.
    pub fn k2opk(&self) -> &Array2<Option<usize>> {
        &self.k2opk
    }

    /// Returns the single-$`\mathbf{k}`$ orbits.
    pub fn orbits(&self) -> &KPointOrbits {
        &self.orbits
    }

    /// Returns, for every BZ point, the index of its orbit in the IBZ.
    pub fn bz2ibz(&self) -> &[usize] {
        &self.orbits.bz2ibz
    }

    /// Returns the BZ index of the representative of every IBZ point.
    pub fn ibz2bz(&self) -> &[usize] {
        &self.orbits.ibz2bz
    }

    /// Returns the normalised weights of the IBZ points.
    pub fn weights_ibz(&self) -> &[f64] {
        &self.orbits.weights_ibz
    }

    /// Returns the BZ members of every orbit.
    pub fn stars(&self) -> &[Vec<usize>] {
        &self.orbits.stars
    }

    /// Returns the connecting operation of every star member, parallel to [`Self::stars`].
    pub fn stars_ops(&self) -> &[Vec<usize>] {
        &self.orbits.stars_ops
    }

    /// Returns whether time reversal is involved for every star member.
    pub fn stars_time_reversal(&self) -> &[Vec<bool>] {
        &self.orbits.stars_time_reversal
    }

    /// Returns the proper connecting operation of every BZ point.
    pub fn stars_ops_bz(&self) -> &[usize] {
        &self.orbits.stars_ops_bz
    }

    /// Returns whether every BZ point is reached from its representative with time reversal.
    pub fn time_reversal_symm_bz(&self) -> &[bool] {
        &self.orbits.time_reversal_symm_bz
    }

    /// Returns the pair orbits, or `None` if they have not been constructed.
    pub fn pairs(&self) -> Option<&KPairOrbits> {
        self.pairs.as_ref()
    }

    /// Returns the proper operations fixing the representative of an IBZ point, *i.e.* its
    /// little group. An operation that fixes the representative only together with time
    /// reversal is included through its proper part.
    ///
    /// # Arguments
    ///
    /// * `ibz` - The index of the IBZ point.
    pub fn stabilizer(&self, ibz: usize) -> Result<IndexSet<usize>, KPointsError> {
        let rep = *self.orbits.ibz2bz.get(ibz).ok_or_else(|| {
            KPointsError::InvalidInput(format!(
                "IBZ index {ibz} out of range for {} IBZ k-points.",
                self.nkpts_ibz()
            ))
        })?;
        Ok(self
            .k2opk
            .row(rep)
            .iter()
            .positions(|img| *img == Some(rep))
            .map(|s| self.operations.split_index(s).0)
            .collect())
    }

    /// Constructs the list of $`\mathbf{k}`$-point pairs required by density-fitted Coulomb
    /// and exchange builds.
    ///
    /// # Returns
    ///
    /// All pairs $`(\mathbf{k}, \mathbf{k})`$ over the BZ, followed by, for every IBZ point
    /// $`\mathbf{k}_i`$, the pairs $`(\mathbf{k}_i, \mathbf{k}_j)`$ for every BZ point
    /// $`\mathbf{k}_j`$ differing from $`\mathbf{k}_i`$. All points are in absolute coordinates.
    pub fn make_kptij_lst_jk(&self) -> Vec<(Vector3<f64>, Vector3<f64>)> {
        let diagonal = self.kpts.iter().map(|k| (*k, *k));
        let off_diagonal = self.kpts_ibz.iter().flat_map(|ki| {
            self.kpts
                .iter()
                .filter(move |kj| (*kj - ki).iter().any(|x| x.abs() >= self.tolerance))
                .map(move |kj| (*ki, *kj))
        });
        diagonal.chain(off_diagonal).collect()
    }
}

impl fmt::Display for KPointSymmetryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_subtitle(f, "K-point symmetry reduction")?;
        writeln!(f, "Number of BZ k-points: {}", self.nkpts())?;
        writeln!(f, "Number of IBZ k-points: {}", self.nkpts_ibz())?;
        writeln!(f, "Time reversal: {}", nice_bool(self.time_reversal()))?;
        writeln!(f)?;

        let nkpts = self.nkpts();
        writeln!(f, "{}", "┈".repeat(60))?;
        writeln!(f, " {:>4}  {:<36}  {:>14}", "#", "IBZ k-point (scaled)", "Weight")?;
        writeln!(f, "{}", "┈".repeat(60))?;
        for (i, (kpt, star)) in self
            .kpts_scaled_ibz()
            .iter()
            .zip(self.orbits.stars.iter())
            .enumerate()
        {
            writeln!(
                f,
                " {i:>4}  {:<36}  {:>14}",
                kpt.iter().map(|x| format!("{x:+11.8}")).join(", "),
                format!("{}/{nkpts}", star.len())
            )?;
        }
        writeln!(f, "{}", "┈".repeat(60))?;

        if let Some(pairs) = self.pairs.as_ref() {
            writeln!(f)?;
            writeln!(f, "Number of k-point pairs: {}", nkpts * nkpts)?;
            writeln!(f, "Number of IBZ k-point pairs: {}", pairs.ibz2bz_kk.len())?;
            if let Some(reps_s2) = pairs.ibz2bz_kk_s2.as_ref() {
                writeln!(
                    f,
                    "Number of IBZ k-point pairs with permutation symmetry: {}",
                    reps_s2.len()
                )?;
            }
        }
        Ok(())
    }
}

// =========
// Functions
// =========

/// Builds a $`\mathbf{k}`$-point symmetry table.
///
/// # Arguments
///
/// * `input` - The $`\mathbf{k}`$-points, their coordinate basis, and the crystal operations.
/// * `params` - The control parameters.
///
/// # Returns
///
/// The fully built table.
///
/// # Errors
///
/// Errors if the point matcher contract is violated or the input is inconsistent. Operations
/// under which the mesh is not closed only produce a warning.
pub fn build(
    input: &RawKPointInput,
    params: &KPointSymmetryParams,
) -> Result<KPointSymmetryTable, KPointsError> {
    let tol = params.tolerance;
    let selected = input
        .operations
        .iter()
        .cloned()
        .enumerate()
        .filter(|(_, op)| {
            if params.space_group_symmetry {
                !params.symmorphic || op.translation_is_zero()
            } else {
                op.is_identity()
            }
        })
        .collect_vec();
    let has_inversion = selected.iter().any(|(_, op)| op.is_inversion());
    let operations = OperationSet::from_indexed(
        selected,
        params.time_reversal_symmetry && !has_inversion,
    );
    let identity = operations.identity_index().ok_or_else(|| {
        KPointsError::InvalidInput("The identity operation is missing.".to_string())
    })?;
    log::debug!("Operations used for k-point reduction:\n{operations}");

    let kpts_scaled = input.basis.scaled_kpts(&input.kpts);
    let rotations = operations.reciprocal_rotations().ok_or_else(|| {
        KPointsError::InvalidInput("An operation has a singular rotation.".to_string())
    })?;
    let k2opk = map_k_points(&kpts_scaled, &rotations, tol)?;
    if k2opk.iter().any(Option::is_none) {
        kpsym_warn!("k-points have lower symmetry than lattice.");
    }

    let orbits = build_orbits(
        &k2opk,
        &kpts_scaled,
        &rotations,
        operations.nop(),
        identity,
        tol,
    )?;
    let kpts_ibz = input.basis.abs_kpts(
        &orbits
            .ibz2bz
            .iter()
            .map(|&k| kpts_scaled[k])
            .collect_vec(),
    );

    let pairs = if params.make_kpairs {
        log::info!("Number of k-point pairs: {}", input.kpts.len().pow(2));
        let pairs = build_pair_orbits(&k2opk, params.permutation_symmetry)?;
        log::info!("Number of IBZ k-point pairs: {}", pairs.ibz2bz_kk.len());
        if let Some(reps_s2) = pairs.ibz2bz_kk_s2.as_ref() {
            log::info!(
                "Number of IBZ k-point pairs with permutation symmetry: {}",
                reps_s2.len()
            );
        }
        Some(pairs)
    } else {
        None
    };

    Ok(KPointSymmetryTable {
        kpts: input.kpts.clone(),
        kpts_scaled,
        kpts_ibz,
        operations,
        tolerance: tol,
        k2opk,
        orbits,
        pairs,
    })
}
