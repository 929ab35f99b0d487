use std::env;
use std::fs;

use approx;
use itertools::Itertools;
use nalgebra::{Matrix3, Vector3};

use crate::drivers::kpoint_reduction::{KPointReductionDriver, KPointReductionResult};
use crate::drivers::KpsymDriver;
use crate::io::{read_kpsym_binary, KpsymFileType};
use crate::kpoints::{KPointSymmetryParams, RawKPointInput};
use crate::lattice::Lattice;
use crate::symmetry::SpaceGroupOperation;

/// The 8 operations of the point group D2h, all diagonal.
fn d2h_operations() -> Vec<SpaceGroupOperation> {
    [1, -1]
        .into_iter()
        .cartesian_product([1, -1])
        .cartesian_product([1, -1])
        .map(|((a, b), c)| {
            SpaceGroupOperation::new(Matrix3::from_diagonal(&Vector3::new(a, b, c)), Vector3::zeros())
                .unwrap()
        })
        .collect_vec()
}

#[test]
fn test_drivers_kpoint_reduction_orthorhombic() {
    let lat = Lattice::from_rows(&[[4.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 6.0]]).unwrap();
    let kpts = lat.make_kpts([4, 4, 1], true, false).unwrap();
    let input = RawKPointInput::builder()
        .kpts(&kpts)
        .basis(&lat)
        .operations(d2h_operations())
        .build()
        .unwrap();
    let params = KPointSymmetryParams::builder()
        .permutation_symmetry(false)
        .build()
        .unwrap();
    let mut driver = KPointReductionDriver::builder()
        .parameters(&params)
        .input(&input)
        .build()
        .unwrap();
    assert!(driver.result().is_err());
    driver.run().unwrap();
    let res = driver.result().unwrap();

    // Along each axis, 0 and 1/2 are fixed and 1/4 pairs with 3/4.
    assert_eq!(res.table.nkpts(), 16);
    assert_eq!(res.table.nkpts_ibz(), 9);
    assert!(!res.table.time_reversal());
    approx::assert_relative_eq!(
        res.table.weights_ibz().iter().sum::<f64>(),
        1.0,
        epsilon = 1e-12
    );
    let pairs = res.table.pairs().unwrap();
    assert!(pairs.ibz2bz_kk_s2.is_none());
    approx::assert_relative_eq!(
        pairs.ibz_kk_weight.iter().sum::<f64>(),
        1.0,
        epsilon = 1e-12
    );
    assert!(res.to_string().contains("Number of IBZ k-points: 9"));
}

#[test]
fn test_drivers_kpoint_reduction_save() {
    let lat = Lattice::new(Matrix3::identity() * 3.0).unwrap();
    let kpts = lat.make_kpts([2, 2, 2], false, false).unwrap();
    let input = RawKPointInput::builder()
        .kpts(&kpts)
        .basis(&lat)
        .operations(vec![SpaceGroupOperation::identity()])
        .build()
        .unwrap();
    let name = env::temp_dir()
        .join(format!("kpsym_driver_{}", std::process::id()))
        .to_string_lossy()
        .to_string();
    let params = KPointSymmetryParams::builder()
        .make_kpairs(false)
        .result_save_name(Some(name.clone()))
        .build()
        .unwrap();
    let mut driver = KPointReductionDriver::builder()
        .parameters(&params)
        .input(&input)
        .build()
        .unwrap();
    driver.run().unwrap();

    // Only time reversal is available, pairing k with -k.
    let res = driver.result().unwrap();
    assert!(res.table.time_reversal());
    assert_eq!(res.table.nkpts_ibz(), 4);
    assert!(res.table.pairs().is_none());

    let read = read_kpsym_binary::<KPointReductionResult, _>(&name, KpsymFileType::Kpt).unwrap();
    assert_eq!(read.table.bz2ibz(), res.table.bz2ibz());
    assert_eq!(read.parameters.result_save_name, Some(name.clone()));
    fs::remove_file(format!("{name}.{}", KpsymFileType::Kpt.ext())).unwrap();
}
