//! Orbits of ordered $`\mathbf{k}`$-point pairs.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::kpoints::orbit::{claim_orbits, invert_claims, orbit_weights};
use crate::kpoints::KPointsError;

#[cfg(test)]
#[path = "pair_orbit_tests.rs"]
mod pair_orbit_tests;

/// Structure containing the orbit bookkeeping of ordered $`\mathbf{k}`$-point pairs.
///
/// A pair $`(\mathbf{k}_i, \mathbf{k}_j)`$ of an `N`-point mesh has the flat index `i * N + j`.
/// All operation indices are given in doubled index order, *i.e.* indices `s >= nop` denote
/// operations combined with time reversal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KPairOrbits {
    /// For each pair, the index of the pair orbit it belongs to.
    pub bz2ibz_kk: Vec<usize>,

    /// For each pair orbit, the flat index of its representative pair.
    pub ibz2bz_kk: Vec<usize>,

    /// The weight of each pair orbit, *i.e.* its size divided by `N²`.
    pub ibz_kk_weight: Vec<f64>,

    /// For each pair orbit, the sorted distinct images of the representative pair.
    pub kk_group: Vec<Vec<usize>>,

    /// For each member of [`Self::kk_group`], the first operation mapping the representative
    /// pair onto it.
    pub kk_sym_group: Vec<Vec<usize>>,

    /// For each pair orbit, all operations mapping the representative pair onto itself.
    pub kk_stabilizer: Vec<Vec<usize>>,

    /// The representatives remaining after reduction by pair-permutation symmetry, ordered by
    /// their sorted components.
    pub ibz2bz_kk_s2: Option<Vec<usize>>,

    /// The weights of [`Self::ibz2bz_kk_s2`].
    pub ibz_kk_s2_weight: Option<Vec<f64>>,
}

/// Computes the images of all pairs under all operations.
///
/// A pair image is undefined whenever the image of either component is.
fn map_k_pairs(table: &Array2<Option<usize>>) -> Array2<Option<usize>> {
    let (nkpts, nops) = table.dim();
    Array2::from_shape_fn((nkpts * nkpts, nops), |(p, s)| {
        let (i, j) = (p / nkpts, p % nkpts);
        table[(i, s)]
            .zip(table[(j, s)])
            .map(|(ii, jj)| ii * nkpts + jj)
    })
}

/// Builds the orbits of all ordered pairs of a $`\mathbf{k}`$-point mesh.
///
/// Both time and memory scale as $`\mathcal{O}(N^2 \times n_{\mathrm{op}})`$, where `N` is the
/// number of $`\mathbf{k}`$-points and $`n_{\mathrm{op}}`$ the number of operations including
/// time-reversed ones.
///
/// # Arguments
///
/// * `table` - The mapping table of shape `[nkpts, n_total]` from the point matcher.
/// * `permutation_symmetry` - Boolean indicating if the pair orbits are to be further reduced
/// by the symmetry $`(\mathbf{k}_i, \mathbf{k}_j) \leftrightarrow (\mathbf{k}_j, \mathbf{k}_i)`$.
pub fn build_pair_orbits(
    table: &Array2<Option<usize>>,
    permutation_symmetry: bool,
) -> Result<KPairOrbits, KPointsError> {
    let nkpts = table.nrows();
    let pair_table = map_k_pairs(table);
    let (claimed, ibz2bz_kk) = claim_orbits(&pair_table)?;
    let bz2ibz_kk = invert_claims(&claimed, &ibz2bz_kk);
    let ibz_kk_weight = orbit_weights(&bz2ibz_kk, ibz2bz_kk.len());

    let (kk_group, kk_sym_group): (Vec<Vec<usize>>, Vec<Vec<usize>>) = ibz2bz_kk
        .iter()
        .map(|&rep| {
            let mut first_ops = BTreeMap::new();
            pair_table
                .row(rep)
                .iter()
                .enumerate()
                .filter_map(|(s, img)| img.map(|img| (img, s)))
                .for_each(|(img, s)| {
                    first_ops.entry(img).or_insert(s);
                });
            first_ops.into_iter().unzip()
        })
        .unzip();
    let kk_stabilizer = ibz2bz_kk
        .iter()
        .map(|&rep| {
            pair_table
                .row(rep)
                .iter()
                .positions(|img| *img == Some(rep))
                .collect_vec()
        })
        .collect_vec();

    let (ibz2bz_kk_s2, ibz_kk_s2_weight) = if permutation_symmetry {
        let (reps, weights) = reduce_by_permutation(&ibz2bz_kk, &ibz_kk_weight, nkpts);
        (Some(reps), Some(weights))
    } else {
        (None, None)
    };

    Ok(KPairOrbits {
        bz2ibz_kk,
        ibz2bz_kk,
        ibz_kk_weight,
        kk_group,
        kk_sym_group,
        kk_stabilizer,
        ibz2bz_kk_s2,
        ibz_kk_s2_weight,
    })
}

/// Reduces pair-orbit representatives by pair-permutation symmetry.
///
/// Representatives with the same sorted components are merged, keeping the first one. The
/// weight of an off-diagonal survivor `(i, j)` is doubled only when the swapped pair `(j, i)` is
/// itself a representative of the unreduced orbits. Otherwise, `(j, i)` lies in the orbit of
/// `(i, j)` and is already accounted for.
fn reduce_by_permutation(
    ibz2bz_kk: &[usize],
    ibz_kk_weight: &[f64],
    nkpts: usize,
) -> (Vec<usize>, Vec<f64>) {
    let mut first_by_sorted = BTreeMap::new();
    ibz2bz_kk.iter().enumerate().for_each(|(ip, &rep)| {
        let (i, j) = (rep / nkpts, rep % nkpts);
        first_by_sorted.entry((i.min(j), i.max(j))).or_insert(ip);
    });
    let reps_unreduced = ibz2bz_kk.iter().collect::<HashSet<_>>();
    first_by_sorted
        .into_values()
        .map(|ip| {
            let rep = ibz2bz_kk[ip];
            let (i, j) = (rep / nkpts, rep % nkpts);
            let mut weight = ibz_kk_weight[ip];
            if i != j {
                weight *= 2.0;
                if !reps_unreduced.contains(&(j * nkpts + i)) {
                    weight /= 2.0;
                }
            }
            (rep, weight)
        })
        .unzip()
}
