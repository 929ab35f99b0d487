use nalgebra::{Matrix3, Vector3};
use ndarray::{array, Array1, Array3, Axis};
use num_complex::Complex;

use crate::kpoints::{build, KPointSymmetryParams, KPointSymmetryTable, KPointsError, RawKPointInput};
use crate::lattice::Lattice;
use crate::symmetry::SpaceGroupOperation;
use crate::transport::grid::{GridKernel, NativeGridKernel};

fn c2z() -> SpaceGroupOperation {
    SpaceGroupOperation::new(Matrix3::new(-1, 0, 0, 0, -1, 0, 0, 0, 1), Vector3::zeros()).unwrap()
}

fn line_table(operations: Vec<SpaceGroupOperation>, time_reversal: bool) -> KPointSymmetryTable {
    let lat = Lattice::new(Matrix3::identity() * 5.0).unwrap();
    let kpts = lat.make_kpts([4, 1, 1], true, false).unwrap();
    let input = RawKPointInput::builder()
        .kpts(&kpts)
        .basis(&lat)
        .operations(operations)
        .build()
        .unwrap();
    let params = KPointSymmetryParams::builder()
        .time_reversal_symmetry(time_reversal)
        .make_kpairs(false)
        .build()
        .unwrap();
    build(&input, &params).unwrap()
}

#[test]
fn test_native_kernel_translation() {
    let input = array![1.0, 2.0, 3.0, 4.0];
    let mut out = Array1::<f64>::zeros(4);
    NativeGridKernel
        .symmetrize_ft(
            out.view_mut(),
            input.view(),
            &Matrix3::identity(),
            &Vector3::new(0.5, 0.0, 0.0),
            [4, 1, 1],
        )
        .unwrap();
    assert_eq!(out, array![3.0, 4.0, 1.0, 2.0]);

    // Accumulation adds onto existing values.
    NativeGridKernel
        .symmetrize(out.view_mut(), input.view(), &Matrix3::identity(), [4, 1, 1])
        .unwrap();
    assert_eq!(out, array![4.0, 6.0, 4.0, 6.0]);
}

#[test]
fn test_native_kernel_rejects_incommensurate_input() {
    let input = array![1.0, 2.0, 3.0, 4.0];
    let mut out = Array1::<f64>::zeros(4);
    let res = NativeGridKernel.symmetrize_ft(
        out.view_mut(),
        input.view(),
        &Matrix3::identity(),
        &Vector3::new(0.3, 0.0, 0.0),
        [4, 1, 1],
    );
    assert!(matches!(res, Err(KPointsError::Kernel(_))));
    assert_eq!(out, Array1::<f64>::zeros(4));

    // A fourfold rotation does not map a 4 x 2 mesh onto itself.
    let c4z = Matrix3::new(0, -1, 0, 1, 0, 0, 0, 0, 1);
    let input_2d = Array1::from_iter((0..8).map(f64::from));
    let mut out_2d = Array1::<f64>::zeros(8);
    let res = NativeGridKernel.symmetrize(out_2d.view_mut(), input_2d.view(), &c4z, [4, 2, 1]);
    assert!(matches!(res, Err(KPointsError::Kernel(_))));
    assert_eq!(out_2d, Array1::<f64>::zeros(8));

    let short = array![1.0, 2.0, 3.0];
    let res = NativeGridKernel.symmetrize(out.view_mut(), short.view(), &Matrix3::identity(), [4, 1, 1]);
    assert!(matches!(res, Err(KPointsError::Kernel(_))));
}

#[test]
fn test_native_kernel_rotation_complex() {
    let input = array![
        Complex::new(1.0, 1.0),
        Complex::new(2.0, 0.0),
        Complex::new(3.0, -1.0),
        Complex::new(4.0, 0.5)
    ];
    let mut out = Array1::<Complex<f64>>::zeros(4);
    NativeGridKernel
        .symmetrize(out.view_mut(), input.view(), c2z().rotation(), [4, 1, 1])
        .unwrap();
    assert_eq!(out, array![input[0], input[3], input[2], input[1]]);

    // On a 4 x 4 mesh the fourfold rotation sends (1, 0) to (0, 1).
    let c4z = Matrix3::new(0, -1, 0, 1, 0, 0, 0, 0, 1);
    let mut input_2d = Array1::<f64>::zeros(16);
    input_2d[1] = 1.0;
    let mut out_2d = Array1::<f64>::zeros(16);
    NativeGridKernel
        .symmetrize(out_2d.view_mut(), input_2d.view(), &c4z, [4, 4, 1])
        .unwrap();
    // out[(i0, i1)] = input[(-i1, i0)], so only (i0, i1) = (1, 0) picks up input[(0, 1)].
    let mut expected = Array1::<f64>::zeros(16);
    expected[4] = 1.0;
    assert_eq!(out_2d, expected);
}

#[test]
fn test_symmetrize_density_over_little_group() {
    let table = line_table(vec![SpaceGroupOperation::identity(), c2z()], true);
    assert_eq!(table.stabilizer(0).unwrap().len(), 2);
    let rho = array![1.0, 2.0, 3.0, 4.0];
    let rho_sym = table
        .symmetrize_density(&NativeGridKernel, rho.view(), 0, [4, 1, 1])
        .unwrap();
    assert_eq!(rho_sym, array![2.0, 6.0, 6.0, 6.0]);

    assert!(table
        .symmetrize_density(&NativeGridKernel, rho.view(), 3, [4, 1, 1])
        .is_err());
    assert!(table
        .symmetrize_density(&NativeGridKernel, rho.view(), 0, [2, 1, 1])
        .is_err());
}

#[test]
fn test_symmetrize_density_stabilizer_and_star() {
    // With time reversal only, the star of point 3 contains point 1, but only the identity fixes
    // point 3.
    let table = line_table(vec![SpaceGroupOperation::identity()], true);
    let rho = array![1.0, 2.0, 3.0, 4.0];
    let rho_stab = table
        .symmetrize_density(&NativeGridKernel, rho.view(), 2, [4, 1, 1])
        .unwrap();
    assert_eq!(rho_stab, rho);
    let rho_star = table
        .symmetrize_density_over_star(&NativeGridKernel, rho.view(), 2, [4, 1, 1])
        .unwrap();
    assert_eq!(rho_star, &rho * 2.0);
}

#[test]
fn test_symmetrize_wavefunction_time_reversal() {
    let table = line_table(vec![SpaceGroupOperation::identity()], true);
    let psi_ibz = Array3::from_shape_fn((3, 1, 4), |(k, _, r)| {
        Complex::new((k + r) as f64, (r as f64) - 1.0)
    });
    let psi = table
        .symmetrize_wavefunction(&NativeGridKernel, &psi_ibz, [4, 1, 1])
        .unwrap();
    assert_eq!(psi.dim(), (4, 1, 4));
    assert_eq!(
        psi.index_axis(Axis(0), 1),
        psi_ibz.index_axis(Axis(0), 2).mapv(|x| x.conj())
    );
    assert_eq!(psi.index_axis(Axis(0), 3), psi_ibz.index_axis(Axis(0), 2));
    assert_eq!(psi.index_axis(Axis(0), 0), psi_ibz.index_axis(Axis(0), 0));
}

#[test]
fn test_symmetrize_wavefunction_rotation() {
    let table = line_table(vec![SpaceGroupOperation::identity(), c2z()], true);
    let psi_ibz = Array3::from_shape_fn((3, 2, 4), |(k, mu, r)| (100 * k + 10 * mu + r) as f64);
    let psi = table
        .symmetrize_wavefunction(&NativeGridKernel, &psi_ibz, [4, 1, 1])
        .unwrap();
    assert_eq!(psi.index_axis(Axis(0), 1), array![[200.0, 203.0, 202.0, 201.0], [210.0, 213.0, 212.0, 211.0]]);
    assert_eq!(psi.index_axis(Axis(0), 2), psi_ibz.index_axis(Axis(0), 1));

    let psi_short = Array3::<f64>::zeros((2, 2, 4));
    assert!(table
        .symmetrize_wavefunction(&NativeGridKernel, &psi_short, [4, 1, 1])
        .is_err());
}
