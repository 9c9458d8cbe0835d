//! Manifold representations for optimization on non-Euclidean spaces.
//!
//! This module provides the Lie groups used by the pose and calibration factors:
//! - **SO(2)**: Rotations in 2D (unit complex number)
//! - **SE(2)**: Rigid transformations in 2D
//! - **SO(3)**: Rotations in 3D (unit quaternion)
//! - **SE(3)**: Rigid transformations in 3D
//!
//! Lie group M,° | ambient | dof | X ∈ M             | Constraint | T_X M         | Exp(τ)          | Comp.
//! ------------- | ------- | --- | ----------------- | ---------- | ------------- | --------------- | -----
//! n-D vector    | n       | n   | v ∈ Rⁿ            | none       | v ∈ Rⁿ        | v               | v₁+v₂
//! Rotation      | 2       | 1   | z ∈ C             | z*z = 1    | θ ∈ R         | z = exp(iθ)     | z₁z₂
//! Rigid motion  | 4       | 3   | M = [R t; 0 1]    | RᵀR = I    | [ρ, θ] ∈ R³   | Exp([ρ, θ])     | M₁M₂
//! Rotation      | 4       | 3   | q ∈ H             | q*q = 1    | θ ∈ R³        | q = exp(uθ/2)   | q₁q₂
//! Rigid motion  | 7       | 6   | M = [R t; 0 1]    | RᵀR = I    | [ρ, θ] ∈ R⁶   | Exp([ρ, θ])     | M₁M₂
//!
//! The notation and the Jacobian formulas follow "A micro Lie theory for state estimation
//! in robotics" (Solà et al.) and the [manif](https://github.com/artivis/manif) library.
//!
//! # Perturbation convention
//!
//! All tangent perturbations in this crate are **right** (local) perturbations:
//!
//! ```text
//! X ⊞ τ = X ∘ Exp(τ)          X ⊟ Y = Log(Y⁻¹ ∘ X)
//! ```
//!
//! The choice is fixed once in [`PERTURBATION`]. Every Jacobian returned by a group
//! operation is expressed with respect to right perturbations of its inputs and output.
//!
//! # Ambient layout
//!
//! Solver-owned parameter blocks use the following flat layouts:
//! - SO(2): `[cos θ, sin θ]`
//! - SE(2): `[x, y, cos θ, sin θ]`
//! - SO(3): `[qw, qx, qy, qz]`
//! - SE(3): `[tx, ty, tz, qw, qx, qy, qz]`

use nalgebra::{DMatrix, DVector};
use std::ops::{Mul, Neg};
use std::{
    error, fmt,
    fmt::{Display, Formatter},
};

pub mod parameterization;
pub mod se2;
pub mod se3;
pub mod so2;
pub mod so3;

pub use parameterization::Parameterization;

/// Side on which tangent perturbations are applied to group elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perturbation {
    /// `X ⊞ τ = X ∘ Exp(τ)`, `X ⊟ Y = Log(Y⁻¹ ∘ X)`
    Right,
    /// `X ⊞ τ = Exp(τ) ∘ X`, `X ⊟ Y = Log(X ∘ Y⁻¹)`
    Left,
}

/// Global perturbation convention used by [`LieGroup::plus`] and [`LieGroup::minus`].
pub const PERTURBATION: Perturbation = Perturbation::Right;

/// Below this squared angle, exponential/logarithm maps and their Jacobians switch to
/// Taylor expansions.
pub const SMALL_ANGLE_EPSILON: f64 = 1e-8;

/// Below this squared angle the SE(3) `Q` block uses its series expansion. The closed form
/// divides by θ⁵ and loses precision much earlier than the SO(3) terms do.
pub const SE3_Q_SERIES_EPSILON: f64 = 1e-4;

/// Unit quaternions/complex numbers whose norm is within this distance of one are used
/// as-is; anything further away is renormalized.
pub const NORM_TOLERANCE: f64 = 1e-12;

/// Renormalizing an element whose norm is further than this from one is logged as a warning.
pub const RENORMALIZE_WARN_TOLERANCE: f64 = 1e-3;

/// Errors that can occur during manifold operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifoldError {
    /// Invalid tangent vector dimension
    InvalidTangentDimension { expected: usize, actual: usize },
    /// Ambient parameter block has the wrong length
    DimensionMismatch { expected: usize, actual: usize },
    /// Jacobian has the wrong number of columns for the manifold's tangent space
    JacobianShape { expected: usize, actual: usize },
}

impl Display for ManifoldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ManifoldError::InvalidTangentDimension { expected, actual } => {
                write!(
                    f,
                    "Invalid tangent dimension: expected {expected}, got {actual}"
                )
            }
            ManifoldError::DimensionMismatch { expected, actual } => {
                write!(
                    f,
                    "Ambient dimension mismatch: expected {expected}, got {actual}"
                )
            }
            ManifoldError::JacobianShape { expected, actual } => {
                write!(
                    f,
                    "Jacobian column count mismatch: expected {expected}, got {actual}"
                )
            }
        }
    }
}

impl error::Error for ManifoldError {}

/// Result type for manifold operations.
pub type ManifoldResult<T> = Result<T, ManifoldError>;

/// Core trait for Lie group operations.
///
/// Every operation that takes optional Jacobian outputs writes the derivative with respect
/// to right perturbations of the corresponding input, evaluated in the right tangent space
/// of the result.
///
/// # Dimensions
///
/// - `DOF` of the group is `Self::TangentVector::DIM`
/// - the ambient (parameter block) size is given by [`LieGroup::to_ambient`]
pub trait LieGroup: Clone + PartialEq {
    /// The tangent space vector type
    type TangentVector: Tangent<Self>;

    /// The Jacobian matrix type (DOF × DOF)
    type JacobianMatrix: Clone
        + PartialEq
        + Neg<Output = Self::JacobianMatrix>
        + Mul<Output = Self::JacobianMatrix>
        + std::ops::Index<(usize, usize), Output = f64>;

    /// Associated Lie algebra type
    type LieAlgebra: Clone + PartialEq;

    /// Compute the inverse g⁻¹.
    ///
    /// # Arguments
    /// * `jacobian` - Optional Jacobian ∂(g⁻¹)/∂g = -Ad(g)
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self;

    /// Compose this element with another: g₁ ∘ g₂.
    ///
    /// # Arguments
    /// * `other` - The right operand
    /// * `jacobian_self` - Optional Jacobian ∂(g₁ ∘ g₂)/∂g₁ = Ad(g₂⁻¹)
    /// * `jacobian_other` - Optional Jacobian ∂(g₁ ∘ g₂)/∂g₂ = I
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self;

    /// Logarithmic map from the group to its tangent space.
    ///
    /// # Arguments
    /// * `jacobian` - Optional Jacobian ∂Log(g)/∂g = Jr⁻¹(Log(g))
    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self::TangentVector;

    /// Adjoint matrix Ad(g), such that g ∘ Exp(τ) = Exp(Ad(g) τ) ∘ g.
    fn adjoint(&self) -> Self::JacobianMatrix;

    /// Generate a random element (useful for testing and initialization).
    fn random() -> Self;

    /// Identity matrix in the Jacobian dimension.
    fn jacobian_identity() -> Self::JacobianMatrix;

    /// Zero matrix in the Jacobian dimension.
    fn zero_jacobian() -> Self::JacobianMatrix;

    /// Project the element back onto the manifold.
    fn normalize(&mut self);

    /// Check if the element is on the manifold within `tolerance`.
    fn is_valid(&self, tolerance: f64) -> bool;

    /// Check if the element is approximately equal to another element.
    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.right_minus(other, None, None).is_zero(tolerance)
    }

    /// Build an element from its flat ambient representation.
    ///
    /// Non-normalized rotations are renormalized; the caller guarantees the slice length.
    fn from_ambient(data: &[f64]) -> Self;

    /// Flat ambient representation of the element.
    fn to_ambient(&self) -> DVector<f64>;

    /// ∂(g ⊞ τ)/∂τ at τ = 0, mapping tangent space to ambient space (ambient × DOF).
    fn plus_jacobian(&self) -> DMatrix<f64>;

    /// Left pseudo-inverse of [`LieGroup::plus_jacobian`] (DOF × ambient).
    fn plus_jacobian_pinv(&self) -> DMatrix<f64>;

    /// Right plus: g ⊞ τ = g ∘ Exp(τ).
    ///
    /// # Arguments
    /// * `tangent` - Tangent vector perturbation
    /// * `jacobian_self` - Optional Jacobian ∂(g ⊞ τ)/∂g = Ad(Exp(τ)⁻¹)
    /// * `jacobian_tangent` - Optional Jacobian ∂(g ⊞ τ)/∂τ = Jr(τ)
    fn right_plus(
        &self,
        tangent: &Self::TangentVector,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_tangent: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let exp_tangent = tangent.exp(None);

        if let Some(jac_tangent) = jacobian_tangent {
            *jac_tangent = tangent.right_jacobian();
        }

        self.compose(&exp_tangent, jacobian_self, None)
    }

    /// Right minus: g₁ ⊟ g₂ = Log(g₂⁻¹ ∘ g₁).
    ///
    /// # Arguments
    /// * `other` - The reference element g₂
    /// * `jacobian_self` - Optional Jacobian ∂(g₁ ⊟ g₂)/∂g₁ = Jr⁻¹(τ)
    /// * `jacobian_other` - Optional Jacobian ∂(g₁ ⊟ g₂)/∂g₂ = -Jl⁻¹(τ)
    fn right_minus(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self::TangentVector {
        let difference = other.inverse(None).compose(self, None, None);
        let result = difference.log(None);

        if let Some(jac_self) = jacobian_self {
            *jac_self = result.right_jacobian_inv();
        }

        if let Some(jac_other) = jacobian_other {
            *jac_other = -result.left_jacobian_inv();
        }

        result
    }

    /// Left plus: τ ⊞ g = Exp(τ) ∘ g.
    ///
    /// # Arguments
    /// * `tangent` - Tangent vector perturbation
    /// * `jacobian_self` - Optional Jacobian ∂(τ ⊞ g)/∂g = I
    /// * `jacobian_tangent` - Optional Jacobian ∂(τ ⊞ g)/∂τ = Ad((τ ⊞ g)⁻¹) Jl(τ)
    fn left_plus(
        &self,
        tangent: &Self::TangentVector,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_tangent: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let result = tangent.exp(None).compose(self, None, None);

        if let Some(jac_self) = jacobian_self {
            *jac_self = Self::jacobian_identity();
        }

        if let Some(jac_tangent) = jacobian_tangent {
            *jac_tangent = result.inverse(None).adjoint() * tangent.left_jacobian();
        }

        result
    }

    /// Left minus: g₁ ⊟ g₂ = Log(g₁ ∘ g₂⁻¹).
    ///
    /// # Arguments
    /// * `other` - The reference element g₂
    /// * `jacobian_self` - Optional Jacobian ∂(g₁ ⊟ g₂)/∂g₁ = Jr⁻¹(τ) Ad(g₂)
    /// * `jacobian_other` - Optional Jacobian ∂(g₁ ⊟ g₂)/∂g₂ = -Jr⁻¹(τ) Ad(g₂)
    fn left_minus(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self::TangentVector {
        let difference = self.compose(&other.inverse(None), None, None);
        let result = difference.log(None);

        if jacobian_self.is_some() || jacobian_other.is_some() {
            let jac = result.right_jacobian_inv() * other.adjoint();
            if let Some(jac_other) = jacobian_other {
                *jac_other = -jac.clone();
            }
            if let Some(jac_self) = jacobian_self {
                *jac_self = jac;
            }
        }

        result
    }

    /// Plus operation under the global [`PERTURBATION`] convention.
    fn plus(
        &self,
        tangent: &Self::TangentVector,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_tangent: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        match PERTURBATION {
            Perturbation::Right => self.right_plus(tangent, jacobian_self, jacobian_tangent),
            Perturbation::Left => self.left_plus(tangent, jacobian_self, jacobian_tangent),
        }
    }

    /// Minus operation under the global [`PERTURBATION`] convention.
    fn minus(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self::TangentVector {
        match PERTURBATION {
            Perturbation::Right => self.right_minus(other, jacobian_self, jacobian_other),
            Perturbation::Left => self.left_minus(other, jacobian_self, jacobian_other),
        }
    }

    /// Relative element g₁⁻¹ ∘ g₂.
    ///
    /// # Arguments
    /// * `other` - The target element g₂
    /// * `jacobian_self` - Optional Jacobian ∂(g₁⁻¹ ∘ g₂)/∂g₁ = -Ad(g₂⁻¹ ∘ g₁)
    /// * `jacobian_other` - Optional Jacobian ∂(g₁⁻¹ ∘ g₂)/∂g₂ = I
    fn between(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let result = self.inverse(None).compose(other, None, None);

        if let Some(jac_self) = jacobian_self {
            *jac_self = -result.inverse(None).adjoint();
        }

        if let Some(jac_other) = jacobian_other {
            *jac_other = Self::jacobian_identity();
        }

        result
    }

    /// Dimension of the tangent space (degrees of freedom).
    fn tangent_dim(&self) -> usize {
        Self::TangentVector::DIM
    }
}

/// Trait for Lie algebra (tangent space) operations.
pub trait Tangent<Group: LieGroup>: Clone + PartialEq {
    /// Dimension of the tangent space
    const DIM: usize;

    /// Exponential map to the group: Exp(τ).
    ///
    /// # Arguments
    /// * `jacobian` - Optional Jacobian ∂Exp(τ)/∂τ = Jr(τ)
    fn exp(&self, jacobian: Option<&mut Group::JacobianMatrix>) -> Group;

    /// Right Jacobian Jr: Exp(τ + δτ) ≈ Exp(τ) ∘ Exp(Jr δτ).
    fn right_jacobian(&self) -> Group::JacobianMatrix;

    /// Left Jacobian Jl: Exp(τ + δτ) ≈ Exp(Jl δτ) ∘ Exp(τ).
    fn left_jacobian(&self) -> Group::JacobianMatrix;

    /// Inverse of the right Jacobian Jr⁻¹.
    fn right_jacobian_inv(&self) -> Group::JacobianMatrix;

    /// Inverse of the left Jacobian Jl⁻¹.
    fn left_jacobian_inv(&self) -> Group::JacobianMatrix;

    /// Hat operator: τ^∧ (vector to Lie algebra matrix).
    fn hat(&self) -> Group::LieAlgebra;

    /// Build a tangent vector from a slice of length `DIM`.
    fn from_slice(data: &[f64]) -> Self;

    /// Tangent vector as a dynamic vector.
    fn to_vector(&self) -> DVector<f64>;

    /// Zero tangent vector.
    fn zero() -> Self;

    /// Random tangent vector (useful for testing).
    fn random() -> Self;

    /// Check if the tangent vector is approximately zero.
    fn is_zero(&self, tolerance: f64) -> bool;

    /// Check if the tangent vector is approximately equal to another tangent vector.
    fn is_approx(&self, other: &Self, tolerance: f64) -> bool;
}
