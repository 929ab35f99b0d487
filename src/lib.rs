//! # kpsym: k-point symmetry reduction
//!
//! kpsym reduces uniform or arbitrary $`\mathbf{k}`$-point sets of periodic electronic-structure
//! calculations by the space-group symmetry of the crystal, with the following capabilities:
//! - tolerant matching of $`\mathbf{k}`$-points under the reciprocal action of space-group
//!   operations, modulo reciprocal-lattice vectors,
//! - construction of the irreducible Brillouin zone (IBZ), its weights, and the connecting
//!   operation of every Brillouin-zone (BZ) point,
//! - construction of orbits of $`\mathbf{k}`$-point pairs, optionally further reduced by
//!   pair-permutation symmetry, and
//! - inclusion of time-reversal symmetry when the crystal lacks spatial inversion
//!
//! for the following quantities transported from the IBZ to the full BZ:
//! - molecular-orbital coefficients and density matrices in atomic-orbital bases,
//! - orbital energies and occupation numbers, and
//! - real-space densities and wavefunctions defined on a grid.
//!
//! ## Getting started
//!
//! A [`kpoints::KPointSymmetryTable`] is built from the $`\mathbf{k}`$-points, a
//! [`lattice::KPointBasis`] implementor such as [`lattice::Lattice`], and the space-group
//! operations of the crystal given in the direct-lattice fractional basis:
//!
//! ```
//! use nalgebra::Matrix3;
//! use kpsym::kpoints::{build, KPointSymmetryParams, RawKPointInput};
//! use kpsym::lattice::Lattice;
//! use kpsym::symmetry::SpaceGroupOperation;
//!
//! let lattice = Lattice::new(Matrix3::identity() * 5.0).unwrap();
//! let kpts = lattice.make_kpts([4, 1, 1], true, false).unwrap();
//! let input = RawKPointInput::builder()
//!     .kpts(&kpts)
//!     .basis(&lattice)
//!     .operations(vec![
//!         SpaceGroupOperation::identity(),
//!         SpaceGroupOperation::inversion(),
//!     ])
//!     .build()
//!     .unwrap();
//! let table = build(&input, &KPointSymmetryParams::default()).unwrap();
//! assert_eq!(table.nkpts_ibz(), 3);
//! ```
//!
//! The `kpsym` binary performs the same reduction from a YAML input file (see
//! [`interfaces::input::Input`]).
//!
//! ## Examples and usage
//!
//! For most items (structs, enums, functions, and traits), their usages are illustrated in test
//! functions.
//!
//! ## License
//!
//! GNU Lesser General Public License v3.0.

pub mod drivers;
pub mod interfaces;
pub mod io;
pub mod kpoints;
pub mod lattice;
pub mod symmetry;
pub mod transport;
