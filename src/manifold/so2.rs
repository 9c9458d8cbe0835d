//! SO(2) - rotations in the plane.
//!
//! Elements are stored as nalgebra unit complex numbers with ambient layout
//! `[cos θ, sin θ]`. The tangent space is the scalar angle θ, and all Jacobians are 1×1.

use crate::manifold::{LieGroup, NORM_TOLERANCE, RENORMALIZE_WARN_TOLERANCE, Tangent};
use nalgebra::{Complex, DMatrix, DVector, Matrix1, Matrix2, UnitComplex, Vector2};
use std::{
    f64::consts::PI,
    fmt,
    fmt::{Display, Formatter},
};
use tracing::warn;

/// SO(2) group element.
#[derive(Debug, Clone, PartialEq)]
pub struct SO2 {
    complex: UnitComplex<f64>,
}

impl Display for SO2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SO2(angle: {:.4})", self.angle())
    }
}

/// Unit complex number from its components, renormalizing only when the norm has drifted.
pub(crate) fn renormalized(re: f64, im: f64) -> UnitComplex<f64> {
    let norm = re.hypot(im);
    let drift = (norm - 1.0).abs();
    if drift <= NORM_TOLERANCE {
        return UnitComplex::new_unchecked(Complex::new(re, im));
    }
    if drift > RENORMALIZE_WARN_TOLERANCE {
        warn!("Renormalizing unit complex number with norm {:.6}", norm);
    }
    UnitComplex::new_unchecked(Complex::new(re / norm, im / norm))
}

impl SO2 {
    /// Degrees of freedom
    pub const DOF: usize = 1;

    /// Size of the ambient parameter block
    pub const REP_SIZE: usize = 2;

    pub fn identity() -> Self {
        SO2 {
            complex: UnitComplex::identity(),
        }
    }

    pub fn new(complex: UnitComplex<f64>) -> Self {
        SO2 { complex }
    }

    pub fn from_angle(angle: f64) -> Self {
        SO2 {
            complex: UnitComplex::new(angle),
        }
    }

    /// Create SO(2) from `[cos θ, sin θ]`, renormalizing if needed.
    pub fn from_cos_sin(cos: f64, sin: f64) -> Self {
        SO2 {
            complex: renormalized(cos, sin),
        }
    }

    pub fn angle(&self) -> f64 {
        self.complex.im.atan2(self.complex.re)
    }

    pub fn cos(&self) -> f64 {
        self.complex.re
    }

    pub fn sin(&self) -> f64 {
        self.complex.im
    }

    pub fn rotation_matrix(&self) -> Matrix2<f64> {
        self.complex.to_rotation_matrix().into_inner()
    }

    /// Rotate a 2D vector.
    pub fn act(&self, vector: &Vector2<f64>) -> Vector2<f64> {
        self.rotation_matrix() * vector
    }
}

impl LieGroup for SO2 {
    type TangentVector = SO2Tangent;
    type JacobianMatrix = Matrix1<f64>;
    type LieAlgebra = Matrix2<f64>;

    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -Matrix1::identity();
        }
        SO2 {
            complex: self.complex.inverse(),
        }
    }

    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        if let Some(jac_self) = jacobian_self {
            *jac_self = Matrix1::identity();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix1::identity();
        }
        let product = self.complex.into_inner() * other.complex.into_inner();
        SO2 {
            complex: renormalized(product.re, product.im),
        }
    }

    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> SO2Tangent {
        if let Some(jac) = jacobian {
            *jac = Matrix1::identity();
        }
        SO2Tangent::new(self.angle())
    }

    fn adjoint(&self) -> Self::JacobianMatrix {
        Matrix1::identity()
    }

    fn random() -> Self {
        SO2::from_angle(rand::random::<f64>() * 2.0 * PI - PI)
    }

    fn jacobian_identity() -> Self::JacobianMatrix {
        Matrix1::identity()
    }

    fn zero_jacobian() -> Self::JacobianMatrix {
        Matrix1::zeros()
    }

    fn normalize(&mut self) {
        self.complex = UnitComplex::new_normalize(self.complex.into_inner());
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        (self.complex.norm() - 1.0).abs() < tolerance
    }

    fn from_ambient(data: &[f64]) -> Self {
        SO2::from_cos_sin(data[0], data[1])
    }

    fn to_ambient(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.cos(), self.sin()])
    }

    fn plus_jacobian(&self) -> DMatrix<f64> {
        DMatrix::from_column_slice(2, 1, &[-self.sin(), self.cos()])
    }

    fn plus_jacobian_pinv(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(1, 2, &[-self.sin(), self.cos()])
    }
}

/// SO(2) tangent vector (angle in radians).
#[derive(Debug, Clone, PartialEq)]
pub struct SO2Tangent {
    angle: f64,
}

impl Display for SO2Tangent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "so2(θ: {:.4})", self.angle)
    }
}

impl SO2Tangent {
    pub fn new(angle: f64) -> Self {
        SO2Tangent { angle }
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }
}

impl Tangent<SO2> for SO2Tangent {
    const DIM: usize = 1;

    fn exp(&self, jacobian: Option<&mut Matrix1<f64>>) -> SO2 {
        if let Some(jac) = jacobian {
            *jac = Matrix1::identity();
        }
        SO2::from_angle(self.angle)
    }

    fn right_jacobian(&self) -> Matrix1<f64> {
        Matrix1::identity()
    }

    fn left_jacobian(&self) -> Matrix1<f64> {
        Matrix1::identity()
    }

    fn right_jacobian_inv(&self) -> Matrix1<f64> {
        Matrix1::identity()
    }

    fn left_jacobian_inv(&self) -> Matrix1<f64> {
        Matrix1::identity()
    }

    fn hat(&self) -> Matrix2<f64> {
        Matrix2::new(0.0, -self.angle, self.angle, 0.0)
    }

    fn from_slice(data: &[f64]) -> Self {
        SO2Tangent::new(data[0])
    }

    fn to_vector(&self) -> DVector<f64> {
        DVector::from_element(1, self.angle)
    }

    fn zero() -> Self {
        SO2Tangent::new(0.0)
    }

    fn random() -> Self {
        SO2Tangent::new(rand::random::<f64>() * 2.0 - 1.0)
    }

    fn is_zero(&self, tolerance: f64) -> bool {
        self.angle.abs() < tolerance
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        (self.angle - other.angle).abs() < tolerance
    }
}
