//! Space-group operations used for $`\mathbf{k}`$-point reduction.

pub mod operation_set;
pub mod space_group_operation;

pub use operation_set::OperationSet;
pub use space_group_operation::{OperationKind, SpaceGroupOperation};
