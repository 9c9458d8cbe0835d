//! SE(2) - rigid body transformations in the plane.
//!
//! Elements are a translation plus an [`SO2`] rotation with ambient layout
//! `[x, y, cos θ, sin θ]`. Tangent vectors are ordered `[ρx, ρy, θ]`.

use crate::manifold::{LieGroup, SMALL_ANGLE_EPSILON, Tangent, so2::SO2};
use nalgebra::{DMatrix, DVector, Matrix2, Matrix3, Vector2, Vector3};
use std::{
    fmt,
    fmt::{Display, Formatter},
};

/// SE(2) group element.
#[derive(Debug, Clone, PartialEq)]
pub struct SE2 {
    rotation: SO2,
    translation: Vector2<f64>,
}

impl Display for SE2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SE2(translation: [{:.4}, {:.4}], angle: {:.4})",
            self.translation.x,
            self.translation.y,
            self.rotation.angle()
        )
    }
}

impl SE2 {
    /// Degrees of freedom
    pub const DOF: usize = 3;

    /// Size of the ambient parameter block
    pub const REP_SIZE: usize = 4;

    pub fn identity() -> Self {
        SE2 {
            rotation: SO2::identity(),
            translation: Vector2::zeros(),
        }
    }

    pub fn new(translation: Vector2<f64>, rotation: SO2) -> Self {
        SE2 {
            rotation,
            translation,
        }
    }

    pub fn from_xy_angle(x: f64, y: f64, angle: f64) -> Self {
        SE2::new(Vector2::new(x, y), SO2::from_angle(angle))
    }

    pub fn translation(&self) -> Vector2<f64> {
        self.translation
    }

    pub fn rotation(&self) -> &SO2 {
        &self.rotation
    }

    pub fn rotation_matrix(&self) -> Matrix2<f64> {
        self.rotation.rotation_matrix()
    }

    pub fn angle(&self) -> f64 {
        self.rotation.angle()
    }

    pub fn x(&self) -> f64 {
        self.translation.x
    }

    pub fn y(&self) -> f64 {
        self.translation.y
    }

    /// Transform a point: R p + t.
    pub fn act(&self, point: &Vector2<f64>) -> Vector2<f64> {
        self.rotation_matrix() * point + self.translation
    }
}

impl LieGroup for SE2 {
    type TangentVector = SE2Tangent;
    type JacobianMatrix = Matrix3<f64>;
    type LieAlgebra = Matrix3<f64>;

    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }
        let rotation = self.rotation.inverse(None);
        let translation = -(rotation.rotation_matrix() * self.translation);
        SE2::new(translation, rotation)
    }

    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        if let Some(jac_self) = jacobian_self {
            *jac_self = other.inverse(None).adjoint();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix3::identity();
        }
        SE2::new(
            self.rotation_matrix() * other.translation + self.translation,
            self.rotation.compose(&other.rotation, None, None),
        )
    }

    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> SE2Tangent {
        let theta = self.rotation.angle();
        let (a, b) = v_coefficients(theta);
        let denominator = a * a + b * b;
        let t = self.translation;
        let rho = Vector2::new(a * t.x + b * t.y, -b * t.x + a * t.y) / denominator;

        let result = SE2Tangent::new(rho.x, rho.y, theta);
        if let Some(jac) = jacobian {
            *jac = result.right_jacobian_inv();
        }
        result
    }

    /// Ad(T) = [[R, (y, -x)ᵀ], [0, 1]]
    fn adjoint(&self) -> Self::JacobianMatrix {
        let r = self.rotation_matrix();
        let t = self.translation;
        Matrix3::new(
            r[(0, 0)], r[(0, 1)], t.y, //
            r[(1, 0)], r[(1, 1)], -t.x, //
            0.0, 0.0, 1.0,
        )
    }

    fn random() -> Self {
        SE2::new(
            Vector2::new(
                rand::random::<f64>() * 2.0 - 1.0,
                rand::random::<f64>() * 2.0 - 1.0,
            ),
            SO2::random(),
        )
    }

    fn jacobian_identity() -> Self::JacobianMatrix {
        Matrix3::identity()
    }

    fn zero_jacobian() -> Self::JacobianMatrix {
        Matrix3::zeros()
    }

    fn normalize(&mut self) {
        self.rotation.normalize();
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        self.rotation.is_valid(tolerance) && self.translation.iter().all(|v| v.is_finite())
    }

    fn from_ambient(data: &[f64]) -> Self {
        SE2::new(
            Vector2::new(data[0], data[1]),
            SO2::from_cos_sin(data[2], data[3]),
        )
    }

    fn to_ambient(&self) -> DVector<f64> {
        DVector::from_vec(vec![
            self.translation.x,
            self.translation.y,
            self.rotation.cos(),
            self.rotation.sin(),
        ])
    }

    /// 4×3 block-diagonal matrix diag(R, [-sin, cos]ᵀ).
    fn plus_jacobian(&self) -> DMatrix<f64> {
        let mut jacobian = DMatrix::zeros(4, 3);
        jacobian
            .view_mut((0, 0), (2, 2))
            .copy_from(&self.rotation_matrix());
        jacobian[(2, 2)] = -self.rotation.sin();
        jacobian[(3, 2)] = self.rotation.cos();
        jacobian
    }

    fn plus_jacobian_pinv(&self) -> DMatrix<f64> {
        let mut pinv = DMatrix::zeros(3, 4);
        pinv.view_mut((0, 0), (2, 2))
            .copy_from(&self.rotation_matrix().transpose());
        pinv[(2, 2)] = -self.rotation.sin();
        pinv[(2, 3)] = self.rotation.cos();
        pinv
    }
}

/// Coefficients (sin θ/θ, (1 - cos θ)/θ) of V(θ) = [[a, -b], [b, a]].
fn v_coefficients(theta: f64) -> (f64, f64) {
    let theta_squared = theta * theta;
    if theta_squared > SMALL_ANGLE_EPSILON {
        (theta.sin() / theta, (1.0 - theta.cos()) / theta)
    } else {
        (
            1.0 - theta_squared / 6.0,
            0.5 * theta - theta * theta_squared / 24.0,
        )
    }
}

/// SE(2) tangent vector `[ρx, ρy, θ]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SE2Tangent {
    data: Vector3<f64>,
}

impl Display for SE2Tangent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "se2(ρ: [{:.4}, {:.4}], θ: {:.4})",
            self.data.x, self.data.y, self.data.z
        )
    }
}

impl SE2Tangent {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        SE2Tangent {
            data: Vector3::new(x, y, theta),
        }
    }

    pub fn coeffs(&self) -> Vector3<f64> {
        self.data
    }

    pub fn x(&self) -> f64 {
        self.data.x
    }

    pub fn y(&self) -> f64 {
        self.data.y
    }

    pub fn angle(&self) -> f64 {
        self.data.z
    }

    /// Inverse of an upper block-triangular Jacobian [[V, w], [0, 1]] with V = [[a, b], [-b, a]].
    fn invert_block(jacobian: &Matrix3<f64>) -> Matrix3<f64> {
        let a = jacobian[(0, 0)];
        let b = jacobian[(0, 1)];
        let scale = 1.0 / (a * a + b * b);
        let v_inv = Matrix2::new(a, -b, b, a) * scale;
        let w = Vector2::new(jacobian[(0, 2)], jacobian[(1, 2)]);
        let w_inv = -(v_inv * w);

        Matrix3::new(
            v_inv[(0, 0)], v_inv[(0, 1)], w_inv.x, //
            v_inv[(1, 0)], v_inv[(1, 1)], w_inv.y, //
            0.0, 0.0, 1.0,
        )
    }
}

impl Tangent<SE2> for SE2Tangent {
    const DIM: usize = 3;

    fn exp(&self, jacobian: Option<&mut Matrix3<f64>>) -> SE2 {
        let theta = self.angle();
        let (a, b) = v_coefficients(theta);
        let translation = Vector2::new(a * self.x() - b * self.y(), b * self.x() + a * self.y());

        if let Some(jac) = jacobian {
            *jac = self.right_jacobian();
        }

        SE2::new(translation, SO2::from_angle(theta))
    }

    /// ```text
    /// Jr = [[ sθ/θ,     (1-cθ)/θ, (θρx - ρy + ρy cθ - ρx sθ)/θ²],
    ///       [(cθ-1)/θ,  sθ/θ,     (ρx + θρy - ρx cθ - ρy sθ)/θ²],
    ///       [ 0,        0,         1                          ]]
    /// ```
    fn right_jacobian(&self) -> Matrix3<f64> {
        let (x, y, theta) = (self.x(), self.y(), self.angle());
        let theta_squared = theta * theta;
        let (a, b) = v_coefficients(theta);

        let (w0, w1) = if theta_squared > SMALL_ANGLE_EPSILON {
            let (sin, cos) = theta.sin_cos();
            (
                (theta * x - y + y * cos - x * sin) / theta_squared,
                (x + theta * y - x * cos - y * sin) / theta_squared,
            )
        } else {
            (-0.5 * y + theta * x / 6.0, 0.5 * x + theta * y / 6.0)
        };

        Matrix3::new(
            a, b, w0, //
            -b, a, w1, //
            0.0, 0.0, 1.0,
        )
    }

    /// Jl(τ) = Jr(-τ)
    fn left_jacobian(&self) -> Matrix3<f64> {
        SE2Tangent {
            data: -self.data,
        }
        .right_jacobian()
    }

    fn right_jacobian_inv(&self) -> Matrix3<f64> {
        Self::invert_block(&self.right_jacobian())
    }

    fn left_jacobian_inv(&self) -> Matrix3<f64> {
        Self::invert_block(&self.left_jacobian())
    }

    fn hat(&self) -> Matrix3<f64> {
        Matrix3::new(
            0.0,
            -self.angle(),
            self.x(),
            self.angle(),
            0.0,
            self.y(),
            0.0,
            0.0,
            0.0,
        )
    }

    fn from_slice(data: &[f64]) -> Self {
        SE2Tangent::new(data[0], data[1], data[2])
    }

    fn to_vector(&self) -> DVector<f64> {
        DVector::from_column_slice(self.data.as_slice())
    }

    fn zero() -> Self {
        SE2Tangent {
            data: Vector3::zeros(),
        }
    }

    fn random() -> Self {
        SE2Tangent {
            data: Vector3::from_fn(|_, _| rand::random::<f64>() * 2.0 - 1.0),
        }
    }

    fn is_zero(&self, tolerance: f64) -> bool {
        self.data.norm() < tolerance
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        (self.data - other.data).norm() < tolerance
    }
}
