use crate::interfaces::InputHandle;
use crate::io::read_kpsym_yaml;

use super::{Input, KPointsInputKind, OperationInput};

const ROOT: &str = env!("CARGO_MANIFEST_DIR");

#[test]
fn test_interfaces_input_mesh() {
    let name = format!("{ROOT}/tests/input/test_input_mesh.yml");
    let inp = read_kpsym_yaml::<Input, _>(&name).unwrap();

    if let KPointsInputKind::Mesh {
        divisions,
        with_gamma_point,
        wrap_around,
    } = inp.kpoints
    {
        assert_eq!(divisions, [2, 2, 2]);
        assert!(with_gamma_point);
        assert!(!wrap_around);
    } else {
        panic!("Unexpected k-point specification.");
    }
    assert_eq!(inp.parameters.tolerance, 1e-5);
    assert!(!inp.parameters.make_kpairs);
    assert!(inp.parameters.symmorphic);
    assert_eq!(inp.operations.len(), 2);

    let (_, kpts, operations) = inp.prepare().unwrap();
    assert_eq!(kpts.len(), 8);
    assert!(operations[1].is_inversion());
    assert!(inp.handle().is_ok());
}

#[test]
fn test_interfaces_input_scaled() {
    let name = format!("{ROOT}/tests/input/test_input_scaled.yml");
    let inp = read_kpsym_yaml::<Input, _>(&name).unwrap();
    assert!(matches!(&inp.kpoints, KPointsInputKind::Scaled(kpts) if kpts.len() == 4));
    assert_eq!(inp.operations[0].translation, [0.0, 0.0, 0.0]);
    assert_eq!(inp.operations[1].translation, [0.0, 0.0, 0.5]);
    assert!(inp.parameters.make_kpairs);

    let (_, _, operations) = inp.prepare().unwrap();
    assert!(!operations[1].translation_is_zero());
    assert!(inp.handle().is_ok());
}

#[test]
fn test_interfaces_input_missing_identity() {
    let inp = Input {
        lattice: [[3.0, 0.0, 0.0], [0.0, 3.0, 0.0], [0.0, 0.0, 3.0]],
        kpoints: KPointsInputKind::Mesh {
            divisions: [2, 1, 1],
            with_gamma_point: true,
            wrap_around: false,
        },
        operations: vec![OperationInput {
            rotation: [[-1, 0, 0], [0, -1, 0], [0, 0, -1]],
            translation: [0.0; 3],
        }],
        parameters: Default::default(),
    };
    assert!(inp.handle().is_err());

    let inp_default_ops = Input {
        operations: vec![],
        ..inp
    };
    let (_, _, operations) = inp_default_ops.prepare().unwrap();
    assert_eq!(operations.len(), 1);
    assert!(operations[0].is_identity());
}
