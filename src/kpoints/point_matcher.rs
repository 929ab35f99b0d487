//! Tolerant matching of scaled $`\mathbf{k}`$-points under linear maps.

use itertools::Itertools;
use nalgebra::{Matrix3, Vector3};
use ndarray::Array2;
use ordered_float::OrderedFloat;

use crate::kpoints::KPointsError;

#[cfg(test)]
#[path = "point_matcher_tests.rs"]
mod point_matcher_tests;

/// Finds symmetry-related $`\mathbf{k}`$-points.
///
/// # Arguments
///
/// * `kpts_scaled` - The scaled $`\mathbf{k}`$-points.
/// * `rotations` - The linear maps acting on scaled $`\mathbf{k}`$-points.
/// * `tol` - Points differing by less than `tol` (modulo reciprocal-lattice vectors) are
/// considered identical.
///
/// # Returns
///
/// The mapping table of shape `[nkpts, nop]`: entry `[k1, s]` is `Some(k2)` if
/// `rotations[s] · kpts_scaled[k1] = kpts_scaled[k2] + K` for some reciprocal-lattice vector
/// `K`, and `None` if the image is not in the set.
///
/// # Errors
///
/// Returns [`KPointsError::MatcherContract`] if an equivalence does not pair exactly one
/// original point with exactly one mapped point, *e.g.* when the input set contains duplicates.
pub fn map_k_points(
    kpts_scaled: &[Vector3<f64>],
    rotations: &[Matrix3<f64>],
    tol: f64,
) -> Result<Array2<Option<usize>>, KPointsError> {
    if tol <= 0.0 || !tol.is_finite() {
        return Err(KPointsError::InvalidInput(format!(
            "Invalid matching tolerance {tol:.3e}."
        )));
    }
    let nkpts = kpts_scaled.len();
    let decimals = (-tol.log10() + 1e-9).floor() as i32;
    let mut table = Array2::from_elem((nkpts, rotations.len()), None);
    for (s, rot) in rotations.iter().enumerate() {
        let mut k_kc = kpts_scaled
            .iter()
            .cloned()
            .chain(kpts_scaled.iter().map(|k| rot * k))
            .map(|k| k.map(|x| x.rem_euclid(1.0).rem_euclid(1.0)))
            .collect_vec();
        agglomerate_points(&mut k_kc, tol);
        k_kc.iter_mut().for_each(|k| {
            *k = k.map(|x| round_to_decimals(x, decimals).rem_euclid(1.0) + 0.0);
        });

        // Stable lexicographic order with the last component most significant. Ties keep the
        // original points ahead of the mapped ones.
        let order = (0..2 * nkpts)
            .sorted_by_key(|&i| {
                (
                    OrderedFloat(k_kc[i][2]),
                    OrderedFloat(k_kc[i][1]),
                    OrderedFloat(k_kc[i][0]),
                )
            })
            .collect_vec();
        for (&a, &b) in order.iter().tuple_windows() {
            if k_kc[a] != k_kc[b] {
                continue;
            }
            if a >= nkpts || b < nkpts {
                return Err(KPointsError::MatcherContract(format!(
                    "Under operation {s}, points {a} and {b} of the combined original/mapped \
                    set (of size {}) are equivalent, but exactly one original point must pair \
                    with exactly one mapped point.",
                    2 * nkpts
                )));
            }
            table[(b - nkpts, s)] = Some(a);
        }
    }
    Ok(table)
}

/// Removes numerical noise from a set of points by snapping, independently along each axis,
/// every run of sorted coordinates whose consecutive gaps do not exceed `tol` onto the first
/// coordinate of the run.
pub(crate) fn agglomerate_points(k_kc: &mut [Vector3<f64>], tol: f64) {
    for c in 0..3 {
        let inds = (0..k_kc.len())
            .sorted_by_key(|&i| OrderedFloat(k_kc[i][c]))
            .collect_vec();
        let sorted = inds.iter().map(|&i| k_kc[i][c]).collect_vec();
        let mut start = 0;
        for pos in 1..=inds.len() {
            if pos == inds.len() || sorted[pos] - sorted[pos - 1] > tol {
                let snapped = sorted[start];
                inds[start..pos].iter().for_each(|&i| k_kc[i][c] = snapped);
                start = pos;
            }
        }
    }
}

/// Rounds `x` to `decimals` decimal places with ties rounded to even.
fn round_to_decimals(x: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (x * scale).round_ties_even() / scale
}
