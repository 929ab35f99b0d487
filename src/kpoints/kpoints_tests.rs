use approx;
use itertools::Itertools;
use nalgebra::{Matrix3, Vector3};

use crate::kpoints::{build, KPointSymmetryParams, KPointsError, RawKPointInput};
use crate::lattice::{KPointBasis, Lattice};
use crate::symmetry::{OperationKind, SpaceGroupOperation};

fn cubic_operations(proper_only: bool) -> Vec<SpaceGroupOperation> {
    (0..3)
        .permutations(3)
        .cartesian_product(
            [1, -1]
                .into_iter()
                .cartesian_product([1, -1])
                .cartesian_product([1, -1]),
        )
        .map(|(perm, ((s0, s1), s2))| {
            let signs = [s0, s1, s2];
            Matrix3::from_fn(|i, j| if perm[i] == j { signs[i] } else { 0 })
        })
        .filter(|rot| !proper_only || rot.map(f64::from).determinant() > 0.0)
        .map(|rot| SpaceGroupOperation::new(rot, Vector3::zeros()).unwrap())
        .collect_vec()
}

fn c2z() -> SpaceGroupOperation {
    SpaceGroupOperation::new(Matrix3::new(-1, 0, 0, 0, -1, 0, 0, 0, 1), Vector3::zeros()).unwrap()
}

fn c4z() -> SpaceGroupOperation {
    SpaceGroupOperation::new(Matrix3::new(0, -1, 0, 1, 0, 0, 0, 0, 1), Vector3::zeros()).unwrap()
}

fn cubic_lattice() -> Lattice {
    Lattice::new(Matrix3::identity() * 5.0).unwrap()
}

#[test]
fn test_kpoints_cubic_3x3x3() {
    let lat = cubic_lattice();
    let kpts = lat.make_kpts([3, 3, 3], true, false).unwrap();
    let ops = cubic_operations(false);
    assert_eq!(ops.len(), 48);
    let input = RawKPointInput::builder()
        .kpts(&kpts)
        .basis(&lat)
        .operations(ops)
        .build()
        .unwrap();
    let table = build(&input, &KPointSymmetryParams::default()).unwrap();

    assert_eq!(table.nkpts(), 27);
    assert_eq!(table.nkpts_ibz(), 4);
    assert!(!table.time_reversal());
    let mut sizes = table.stars().iter().map(|star| star.len()).collect_vec();
    sizes.sort();
    assert_eq!(sizes, vec![1, 6, 8, 12]);
    let total: f64 = table.weights_ibz().iter().sum();
    approx::assert_relative_eq!(total, 1.0, epsilon = 1e-12);

    // The Γ point is fixed by every operation.
    let gamma = table.bz2ibz()[0];
    assert_eq!(table.stars()[gamma], vec![0]);
    assert_eq!(table.stabilizer(gamma).unwrap().len(), 48);
    assert!(table.stabilizer(table.nkpts_ibz()).is_err());

    let pairs = table.pairs().unwrap();
    let total_kk: f64 = pairs.ibz_kk_weight.iter().sum();
    approx::assert_relative_eq!(total_kk, 1.0, epsilon = 1e-12);
    let total_s2: f64 = pairs.ibz_kk_s2_weight.as_ref().unwrap().iter().sum();
    approx::assert_relative_eq!(total_s2, 1.0, epsilon = 1e-12);
}

#[test]
fn test_kpoints_cubic_4x4x4() {
    let lat = cubic_lattice();
    let kpts = lat.make_kpts([4, 4, 4], true, false).unwrap();
    let input = RawKPointInput::builder()
        .kpts(&kpts)
        .basis(&lat)
        .operations(cubic_operations(false))
        .build()
        .unwrap();
    let params = KPointSymmetryParams::builder()
        .make_kpairs(false)
        .build()
        .unwrap();
    let table = build(&input, &params).unwrap();
    assert_eq!(table.nkpts_ibz(), 10);
    assert!(table.pairs().is_none());

    // Representatives are the highest-indexed members of their stars.
    for (i, star) in table.stars().iter().enumerate() {
        assert_eq!(Some(&table.ibz2bz()[i]), star.iter().max());
        approx::assert_relative_eq!(table.weights_ibz()[i], star.len() as f64 / 64.0);
    }

    // Connecting operations map every representative onto its star members.
    let kpts_scaled = table.kpts_scaled();
    for k in 0..table.nkpts() {
        let op = table.operations().get(table.stars_ops_bz()[k]).unwrap();
        let image = op
            .act_on_kpoint(&kpts_scaled[table.ibz2bz()[table.bz2ibz()[k]]])
            .unwrap();
        let diff = kpts_scaled[k] - image;
        assert!(diff.iter().all(|x| (x - x.round()).abs() < 1e-6));
    }
}

#[test]
fn test_kpoints_proper_rotations_with_time_reversal() {
    let lat = cubic_lattice();
    let kpts = lat.make_kpts([3, 3, 3], true, false).unwrap();
    let ops = cubic_operations(true);
    assert_eq!(ops.len(), 24);
    let input = RawKPointInput::builder()
        .kpts(&kpts)
        .basis(&lat)
        .operations(ops)
        .build()
        .unwrap();
    let table = build(&input, &KPointSymmetryParams::default()).unwrap();
    assert!(table.time_reversal());
    assert_eq!(table.k2opk().ncols(), 48);
    assert_eq!(table.nkpts_ibz(), 4);
}

#[test]
fn test_kpoints_time_reversal_only() {
    let lat = cubic_lattice();
    let kpts = lat.make_kpts([4, 1, 1], true, false).unwrap();
    let input = RawKPointInput::builder()
        .kpts(&kpts)
        .basis(&lat)
        .operations(vec![SpaceGroupOperation::identity()])
        .build()
        .unwrap();
    let table = build(&input, &KPointSymmetryParams::default()).unwrap();
    assert!(table.time_reversal());
    assert_eq!(table.ibz2bz(), &[0, 2, 3]);
    assert_eq!(table.stars_ops_bz(), &[0, 0, 0, 0]);
    assert_eq!(table.time_reversal_symm_bz(), &[false, true, false, false]);
    assert_eq!(table.stars_time_reversal()[2], vec![true, false]);

    let params = KPointSymmetryParams::builder()
        .time_reversal_symmetry(false)
        .build()
        .unwrap();
    let table_no_tr = build(&input, &params).unwrap();
    assert!(!table_no_tr.time_reversal());
    assert_eq!(table_no_tr.nkpts_ibz(), 4);
    assert_eq!(table_no_tr.bz2ibz(), &[0, 1, 2, 3]);
    assert_eq!(table_no_tr.ibz2bz(), &[0, 1, 2, 3]);
    table_no_tr
        .weights_ibz()
        .iter()
        .for_each(|&w| approx::assert_relative_eq!(w, 0.25));
}

#[test]
fn test_kpoints_singular_operation() {
    // Deserialisation skips builder validation, so a singular rotation can still reach `build`.
    let singular: SpaceGroupOperation = serde_yaml::from_str(
        "rotation: [1, 0, 0, 0, 1, 0, 0, 0, 0]\ntranslation: [0.0, 0.0, 0.0]\nthreshold: 1.0e-6\n",
    )
    .unwrap();
    let lat = cubic_lattice();
    let kpts = lat.make_kpts([2, 1, 1], true, false).unwrap();
    let input = RawKPointInput::builder()
        .kpts(&kpts)
        .basis(&lat)
        .operations(vec![SpaceGroupOperation::identity(), singular])
        .build()
        .unwrap();
    assert!(matches!(
        build(&input, &KPointSymmetryParams::default()),
        Err(KPointsError::InvalidInput(_))
    ));
}

#[test]
fn test_kpoints_two_points_with_inversion() {
    let lat = cubic_lattice();
    let kpts = lat.abs_kpts(&[Vector3::zeros(), Vector3::new(0.5, 0.0, 0.0)]);
    let input = RawKPointInput::builder()
        .kpts(&kpts)
        .basis(&lat)
        .operations(vec![
            SpaceGroupOperation::identity(),
            SpaceGroupOperation::inversion(),
        ])
        .build()
        .unwrap();
    let table = build(&input, &KPointSymmetryParams::default()).unwrap();
    assert_eq!(table.nkpts_ibz(), 2);
    assert!(!table.time_reversal());
    assert_eq!(table.operation_kind(1), Some(OperationKind::Inversion));
    assert_eq!(table.stabilizer(1).unwrap().len(), 2);
}

#[test]
fn test_kpoints_lower_symmetry_mesh() {
    let _ = env_logger::builder().is_test(true).try_init();

    // The 2×1×1 mesh is not closed under a fourfold rotation about z.
    let lat = cubic_lattice();
    let kpts = lat.make_kpts([2, 1, 1], true, false).unwrap();
    let input = RawKPointInput::builder()
        .kpts(&kpts)
        .basis(&lat)
        .operations(vec![SpaceGroupOperation::identity(), c4z(), c2z()])
        .build()
        .unwrap();
    let table = build(&input, &KPointSymmetryParams::default()).unwrap();
    assert!(table.k2opk().iter().any(Option::is_none));
    assert_eq!(table.nkpts_ibz(), 2);
    assert!(table.orbits().stars.iter().all(|star| star.len() == 1));
}

#[test]
fn test_kpoints_operation_selection() {
    let lat = cubic_lattice();
    let kpts = lat.make_kpts([4, 1, 1], true, false).unwrap();
    let screw = SpaceGroupOperation::new(
        Matrix3::new(-1, 0, 0, 0, -1, 0, 0, 0, 1),
        Vector3::new(0.0, 0.0, 0.5),
    )
    .unwrap();
    let input = RawKPointInput::builder()
        .kpts(&kpts)
        .basis(&lat)
        .operations(vec![SpaceGroupOperation::identity(), screw])
        .build()
        .unwrap();

    let symmorphic = build(&input, &KPointSymmetryParams::default()).unwrap();
    assert_eq!(symmorphic.nop(), 1);

    let params = KPointSymmetryParams::builder()
        .symmorphic(false)
        .build()
        .unwrap();
    let nonsymmorphic = build(&input, &params).unwrap();
    assert_eq!(nonsymmorphic.nop(), 2);
    assert_eq!(nonsymmorphic.operation_kind(1), Some(OperationKind::Generic(1)));

    let params = KPointSymmetryParams::builder()
        .symmorphic(false)
        .space_group_symmetry(false)
        .build()
        .unwrap();
    assert_eq!(build(&input, &params).unwrap().nop(), 1);
}

#[test]
fn test_kpoints_missing_identity() {
    let lat = cubic_lattice();
    let kpts = lat.make_kpts([2, 1, 1], true, false).unwrap();
    let res = RawKPointInput::builder()
        .kpts(&kpts)
        .basis(&lat)
        .operations(vec![c2z()])
        .build();
    assert!(res.is_err());
}

#[test]
fn test_kpoints_duplicate_points() {
    let lat = cubic_lattice();
    let kpts = lat.abs_kpts(&[Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0)]);
    let input = RawKPointInput::builder()
        .kpts(&kpts)
        .basis(&lat)
        .operations(vec![SpaceGroupOperation::identity()])
        .build()
        .unwrap();
    assert!(matches!(
        build(&input, &KPointSymmetryParams::default()),
        Err(KPointsError::MatcherContract(_))
    ));
}

#[test]
fn test_kpoints_kptij_list() {
    let lat = cubic_lattice();
    let kpts = lat.make_kpts([4, 1, 1], true, false).unwrap();
    let input = RawKPointInput::builder()
        .kpts(&kpts)
        .basis(&lat)
        .operations(vec![
            SpaceGroupOperation::identity(),
            SpaceGroupOperation::inversion(),
        ])
        .build()
        .unwrap();
    let table = build(&input, &KPointSymmetryParams::default()).unwrap();
    let kptij = table.make_kptij_lst_jk();

    // Four diagonal pairs, then three partners for each of the three IBZ points.
    assert_eq!(kptij.len(), 4 + 3 * 3);
    for (k, (ki, kj)) in kptij.iter().take(4).enumerate() {
        assert_eq!(ki, &kpts[k]);
        assert_eq!(kj, &kpts[k]);
    }
    assert!(kptij.iter().skip(4).all(|(ki, kj)| ki != kj));
    assert_eq!(kptij[4].0, table.kpts_ibz()[0]);
}

#[test]
fn test_kpoints_display() {
    let lat = cubic_lattice();
    let kpts = lat.make_kpts([2, 2, 2], true, false).unwrap();
    let input = RawKPointInput::builder()
        .kpts(&kpts)
        .basis(&lat)
        .operations(cubic_operations(false))
        .build()
        .unwrap();
    let table = build(&input, &KPointSymmetryParams::default()).unwrap();
    let dump = table.to_string();
    assert!(dump.contains("Number of IBZ k-points: 4"));
    assert!(dump.contains("3/8"));
}
