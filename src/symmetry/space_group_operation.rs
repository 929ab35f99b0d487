//! Space-group operations acting on crystals and on their reciprocal space.

use std::fmt;
use std::ops::Mul;

use anyhow::format_err;
use derive_builder::Builder;
use itertools::Itertools;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "space_group_operation_tests.rs"]
mod space_group_operation_tests;

/// Default threshold for deciding whether a fractional translation vanishes modulo the lattice.
pub const TRANSLATION_THRESHOLD: f64 = 1e-6;

// ================
// Enum definitions
// ================

/// Enumerated type for the kinds of action a proper operation has on $`\mathbf{k}`$-dependent
/// quantities expressed in an orbital basis.
///
/// This is decided once for every operation when a k-point symmetry table is built, so that
/// transports only need to match on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// The identity operation.
    Identity,

    /// The spatial inversion without fractional translation.
    Inversion,

    /// Any other operation. The contained value is the handle with which the orbital-basis
    /// representation of this operation is looked up.
    Generic(usize),
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "E"),
            Self::Inversion => write!(f, "i"),
            Self::Generic(handle) => write!(f, "g[{handle}]"),
        }
    }
}

// ==================
// Struct definitions
// ==================

/// Structure for managing a space-group operation $`\{W | \mathbf{t}\}`$ on a crystal.
///
/// The rotation $`W`$ is an integer matrix expressed in the basis of the direct-lattice
/// vectors, and the translation $`\mathbf{t}`$ is fractional, so that a fractional position
/// $`\mathbf{r}`$ is mapped onto $`W\mathbf{r} + \mathbf{t}`$.
#[derive(Builder, Clone, Debug, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct SpaceGroupOperation {
    /// The rotation part in the direct-lattice fractional basis.
    rotation: Matrix3<i32>,

    /// The fractional translation part. This is reduced into $`[0, 1)`$ upon construction.
    #[builder(default = "Vector3::zeros()")]
    translation: Vector3<f64>,

    /// The threshold for deciding whether the translation vanishes modulo the lattice.
    #[builder(default = "TRANSLATION_THRESHOLD")]
    threshold: f64,
}

impl SpaceGroupOperationBuilder {
    fn validate(&self) -> Result<(), String> {
        let rotation = self
            .rotation
            .as_ref()
            .ok_or("No rotation found.".to_string())?;
        let det = rotation.map(f64::from).determinant().round() as i32;
        if det.abs() != 1 {
            return Err(format!(
                "The rotation matrix has determinant {det}, but ±1 is required."
            ));
        }
        if let Some(threshold) = self.threshold {
            if threshold <= 0.0 {
                return Err(format!("Invalid translation threshold {threshold:.3e}."));
            }
        }
        Ok(())
    }
}

impl SpaceGroupOperation {
    /// Returns a builder to construct a new space-group operation.
    pub fn builder() -> SpaceGroupOperationBuilder {
        SpaceGroupOperationBuilder::default()
    }

    /// Constructs a space-group operation from its rotation and translation parts.
    ///
    /// # Arguments
    ///
    /// * `rotation` - The integer rotation in the direct-lattice fractional basis.
    /// * `translation` - The fractional translation.
    ///
    /// # Returns
    ///
    /// The constructed operation, or an error if `rotation` is not unimodular.
    pub fn new(rotation: Matrix3<i32>, translation: Vector3<f64>) -> Result<Self, anyhow::Error> {
        let op = Self::builder()
            .rotation(rotation)
            .translation(translation)
            .build()
            .map_err(|err| format_err!(err))?;
        Ok(op.reduced())
    }

    /// Constructs the identity operation.
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
            threshold: TRANSLATION_THRESHOLD,
        }
    }

    /// Constructs the spatial inversion through the origin.
    pub fn inversion() -> Self {
        Self {
            rotation: -Matrix3::<i32>::identity(),
            translation: Vector3::zeros(),
            threshold: TRANSLATION_THRESHOLD,
        }
    }

    fn reduced(mut self) -> Self {
        let thresh = self.threshold;
        self.translation = self.translation.map(|x| {
            let r = x.rem_euclid(1.0);
            if (1.0 - r).abs() < thresh {
                0.0
            } else {
                r + 0.0
            }
        });
        self
    }

    /// Returns the rotation part in the direct-lattice fractional basis.
    pub fn rotation(&self) -> &Matrix3<i32> {
        &self.rotation
    }

    /// Returns the fractional translation part.
    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    /// Checks if the translation part vanishes modulo the lattice.
    pub fn translation_is_zero(&self) -> bool {
        self.translation
            .iter()
            .all(|x| (x - x.round()).abs() < self.threshold)
    }

    /// Checks if this operation is the identity, *i.e.* has identity rotation and no
    /// translation.
    pub fn is_identity(&self) -> bool {
        self.rotation == Matrix3::identity() && self.translation_is_zero()
    }

    /// Checks if this operation is the spatial inversion through the origin, *i.e.* has negated
    /// identity rotation and no translation.
    pub fn is_inversion(&self) -> bool {
        self.rotation == -Matrix3::<i32>::identity() && self.translation_is_zero()
    }

    /// Returns the inverse operation $`\{W^{-1} | -W^{-1}\mathbf{t}\}`$.
    ///
    /// # Returns
    ///
    /// The inverse operation, or `None` if the rotation is singular. This can only happen for
    /// operations that bypassed validation, *e.g.* by deserialisation.
    pub fn inverse(&self) -> Option<Self> {
        let winv = self.rotation.map(f64::from).try_inverse()?;
        let translation = -(winv * self.translation);
        Some(
            Self {
                rotation: winv.map(|x| x.round() as i32),
                translation,
                threshold: self.threshold,
            }
            .reduced(),
        )
    }

    /// Returns the rotation acting on scaled $`\mathbf{k}`$-points, *i.e.* the rotation
    /// expressed in the reciprocal-lattice basis, $`(W^{-1})^{\mathsf{T}}`$, or `None` if the
    /// rotation is singular.
    pub fn reciprocal_rotation(&self) -> Option<Matrix3<f64>> {
        self.rotation
            .map(f64::from)
            .try_inverse()
            .map(|winv| winv.transpose())
    }

    /// Applies this operation to a scaled $`\mathbf{k}`$-point. Translations have no effect on
    /// wavevectors.
    pub fn act_on_kpoint(&self, kpt_scaled: &Vector3<f64>) -> Option<Vector3<f64>> {
        self.reciprocal_rotation().map(|rrot| rrot * kpt_scaled)
    }

    /// Applies this operation to a fractional position.
    pub fn act_on_position(&self, position: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.map(f64::from) * position + self.translation
    }

    /// Classifies this operation for transports.
    ///
    /// # Arguments
    ///
    /// * `handle` - The handle stored in [`OperationKind::Generic`] if this operation is
    /// neither the identity nor the inversion.
    pub fn kind(&self, handle: usize) -> OperationKind {
        if self.is_identity() {
            OperationKind::Identity
        } else if self.is_inversion() {
            OperationKind::Inversion
        } else {
            OperationKind::Generic(handle)
        }
    }
}

// =====================
// Trait implementations
// =====================

impl PartialEq for SpaceGroupOperation {
    fn eq(&self, other: &Self) -> bool {
        let thresh = self.threshold.max(other.threshold);
        self.rotation == other.rotation
            && (self.translation - other.translation)
                .iter()
                .all(|x| (x - x.round()).abs() < thresh)
    }
}

impl Mul<&'_ SpaceGroupOperation> for &SpaceGroupOperation {
    type Output = SpaceGroupOperation;

    /// Composes two operations so that `rhs` acts first.
    fn mul(self, rhs: &SpaceGroupOperation) -> Self::Output {
        SpaceGroupOperation {
            rotation: self.rotation * rhs.rotation,
            translation: self.rotation.map(f64::from) * rhs.translation + self.translation,
            threshold: self.threshold.max(rhs.threshold),
        }
        .reduced()
    }
}

impl fmt::Display for SpaceGroupOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self
            .rotation
            .row_iter()
            .map(|row| row.iter().map(|x| format!("{x:>2}")).join(" "))
            .join(" | ");
        write!(
            f,
            "{{[{rows}] ; ({})}}",
            self.translation.iter().map(|x| format!("{x:.4}")).join(", ")
        )
    }
}
