//! Orbits of single $`\mathbf{k}`$-points and the irreducible Brillouin zone.

use itertools::Itertools;
use nalgebra::{Matrix3, Vector3};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::io::format::kpsym_warn;
use crate::kpoints::KPointsError;

#[cfg(test)]
#[path = "orbit_tests.rs"]
mod orbit_tests;

/// Structure containing the orbit bookkeeping of a $`\mathbf{k}`$-point mesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KPointOrbits {
    /// For each BZ point, the index of the IBZ point (orbit) it belongs to.
    pub bz2ibz: Vec<usize>,

    /// For each IBZ point, the index of its representative BZ point.
    pub ibz2bz: Vec<usize>,

    /// The weight of each IBZ point, *i.e.* its orbit size divided by the number of BZ points.
    pub weights_ibz: Vec<f64>,

    /// The BZ points of each orbit, in increasing order.
    pub stars: Vec<Vec<usize>>,

    /// For each member of [`Self::stars`], the proper operation mapping the representative onto
    /// that member.
    pub stars_ops: Vec<Vec<usize>>,

    /// For each member of [`Self::stars`], whether the mapping involves time reversal.
    pub stars_time_reversal: Vec<Vec<bool>>,

    /// For each BZ point, the proper operation mapping its IBZ representative onto it.
    pub stars_ops_bz: Vec<usize>,

    /// For each BZ point, whether the mapping from its IBZ representative involves time
    /// reversal.
    pub time_reversal_symm_bz: Vec<bool>,
}

/// Runs the decreasing-index claim pass over a mapping table.
///
/// Points are visited from the highest index down. An unclaimed point becomes a representative
/// and claims every image listed in its row. Hence, the representative of every orbit is its
/// highest-indexed member.
///
/// # Returns
///
/// The claiming representative of every point, and the representatives in increasing order.
pub(crate) fn claim_orbits(
    table: &Array2<Option<usize>>,
) -> Result<(Vec<usize>, Vec<usize>), KPointsError> {
    let n = table.nrows();
    let mut claimed: Vec<Option<usize>> = vec![None; n];
    let mut reps = Vec::new();
    for k in (0..n).rev() {
        if claimed[k].is_none() {
            table.row(k).iter().flatten().for_each(|&img| {
                claimed[img] = Some(k);
            });
            reps.push(k);
        }
    }
    reps.reverse();
    let claimed = claimed
        .into_iter()
        .enumerate()
        .map(|(k, c)| {
            c.ok_or_else(|| {
                KPointsError::InvalidInput(format!(
                    "Point {k} does not map onto itself under any operation. Is the identity \
                    missing?"
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((claimed, reps))
}

/// Converts claiming representatives into orbit indices.
pub(crate) fn invert_claims(claimed: &[usize], reps: &[usize]) -> Vec<usize> {
    let mut rep2orbit = vec![usize::MAX; claimed.len()];
    reps.iter().enumerate().for_each(|(i, &rep)| rep2orbit[rep] = i);
    claimed.iter().map(|&rep| rep2orbit[rep]).collect()
}

/// Computes the weight of each orbit as its size divided by the number of points.
pub(crate) fn orbit_weights(point2orbit: &[usize], norbits: usize) -> Vec<f64> {
    let counts = point2orbit.iter().counts();
    let npts = point2orbit.len() as f64;
    (0..norbits)
        .map(|i| counts.get(&i).copied().unwrap_or(0) as f64 / npts)
        .collect()
}

/// Builds the orbits of a $`\mathbf{k}`$-point mesh.
///
/// # Arguments
///
/// * `table` - The mapping table of shape `[nkpts, n_total]` from the point matcher.
/// * `kpts_scaled` - The scaled BZ $`\mathbf{k}`$-points.
/// * `rotations` - The reciprocal rotations in doubled index order.
/// * `nop` - The number of proper operations.
/// * `default_op` - The proper operation recorded for BZ points that no closed operation
/// connects with their representatives. This is normally the identity.
/// * `tol` - The tolerance for comparing scaled $`\mathbf{k}`$-points.
pub fn build_orbits(
    table: &Array2<Option<usize>>,
    kpts_scaled: &[Vector3<f64>],
    rotations: &[Matrix3<f64>],
    nop: usize,
    default_op: usize,
    tol: f64,
) -> Result<KPointOrbits, KPointsError> {
    let nkpts = kpts_scaled.len();
    if table.shape() != [nkpts, rotations.len()] || nop == 0 {
        return Err(KPointsError::InvalidInput(format!(
            "Mapping table of shape {:?} is incompatible with {nkpts} k-points and {} operations.",
            table.shape(),
            rotations.len()
        )));
    }
    let (claimed, ibz2bz) = claim_orbits(table)?;
    let bz2ibz = invert_claims(&claimed, &ibz2bz);
    let weights_ibz = orbit_weights(&bz2ibz, ibz2bz.len());

    // Operations whose images are not all present in the mesh cannot be used to connect points.
    let closed_ops = table
        .columns()
        .into_iter()
        .map(|col| col.iter().all(Option::is_some))
        .collect_vec();

    let (stars_ops_bz, time_reversal_symm_bz): (Vec<usize>, Vec<bool>) = (0..nkpts)
        .map(|k| {
            let kpt_ibz = &kpts_scaled[ibz2bz[bz2ibz[k]]];
            let connecting = rotations
                .iter()
                .enumerate()
                .filter(|(s, _)| closed_ops[*s])
                .find(|(_, rot)| {
                    let diff = kpts_scaled[k] - *rot * kpt_ibz;
                    diff.iter().all(|x| (x - x.round()).abs() < tol)
                })
                .map(|(s, _)| (s % nop, s >= nop));
            connecting.unwrap_or_else(|| {
                kpsym_warn!(
                    "No closed operation connects BZ k-point {k} with its IBZ representative {}.",
                    ibz2bz[bz2ibz[k]]
                );
                (default_op, false)
            })
        })
        .unzip();

    let stars = (0..ibz2bz.len())
        .map(|i| (0..nkpts).filter(|&k| bz2ibz[k] == i).collect_vec())
        .collect_vec();
    let stars_ops = stars
        .iter()
        .map(|star| star.iter().map(|&k| stars_ops_bz[k]).collect_vec())
        .collect_vec();
    let stars_time_reversal = stars
        .iter()
        .map(|star| star.iter().map(|&k| time_reversal_symm_bz[k]).collect_vec())
        .collect_vec();

    Ok(KPointOrbits {
        bz2ibz,
        ibz2bz,
        weights_ibz,
        stars,
        stars_ops,
        stars_time_reversal,
        stars_ops_bz,
        time_reversal_symm_bz,
    })
}
