//! SO(3) - rotations in 3D.
//!
//! Group elements are stored as nalgebra unit quaternions. The ambient parameter layout
//! is `[qw, qx, qy, qz]`. Tangent elements are rotation vectors θ ∈ R³ whose direction is
//! the rotation axis and whose norm is the angle.

use crate::manifold::{
    LieGroup, NORM_TOLERANCE, RENORMALIZE_WARN_TOLERANCE, SMALL_ANGLE_EPSILON, Tangent,
};
use nalgebra::{DMatrix, DVector, Matrix3, Quaternion, UnitQuaternion, Vector3};
use std::{
    fmt,
    fmt::{Display, Formatter},
};
use tracing::warn;

/// SO(3) group element.
#[derive(Debug, Clone, PartialEq)]
pub struct SO3 {
    quaternion: UnitQuaternion<f64>,
}

impl Display for SO3 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let q = self.quaternion.quaternion();
        write!(
            f,
            "SO3(quaternion: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            q.w, q.i, q.j, q.k
        )
    }
}

/// Wrap a quaternion as a unit quaternion, renormalizing only when its norm has drifted.
///
/// Inputs already within [`NORM_TOLERANCE`] of unit norm are kept bit-for-bit. NaN
/// components propagate.
pub(crate) fn renormalized(quaternion: Quaternion<f64>) -> UnitQuaternion<f64> {
    let norm = quaternion.norm();
    let drift = (norm - 1.0).abs();
    if drift <= NORM_TOLERANCE {
        return UnitQuaternion::new_unchecked(quaternion);
    }
    if drift > RENORMALIZE_WARN_TOLERANCE {
        warn!("Renormalizing quaternion with norm {:.6}", norm);
    }
    UnitQuaternion::new_unchecked(Quaternion::from(quaternion.coords / norm))
}

impl SO3 {
    /// Degrees of freedom
    pub const DOF: usize = 3;

    /// Size of the ambient parameter block
    pub const REP_SIZE: usize = 4;

    pub fn identity() -> Self {
        SO3 {
            quaternion: UnitQuaternion::identity(),
        }
    }

    pub fn new(quaternion: UnitQuaternion<f64>) -> Self {
        SO3 { quaternion }
    }

    /// Create SO(3) from quaternion coefficients, renormalizing if needed.
    pub fn from_wxyz(w: f64, x: f64, y: f64, z: f64) -> Self {
        SO3 {
            quaternion: renormalized(Quaternion::new(w, x, y, z)),
        }
    }

    /// Create SO(3) from roll, pitch and yaw (radians).
    pub fn from_euler_angles(roll: f64, pitch: f64, yaw: f64) -> Self {
        SO3 {
            quaternion: UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        }
    }

    /// Create SO(3) from a rotation vector (axis times angle).
    pub fn from_scaled_axis(axis_angle: Vector3<f64>) -> Self {
        SO3Tangent::new(axis_angle).exp(None)
    }

    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.quaternion
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.quaternion.to_rotation_matrix().into_inner()
    }

    pub fn w(&self) -> f64 {
        self.quaternion.w
    }

    pub fn x(&self) -> f64 {
        self.quaternion.i
    }

    pub fn y(&self) -> f64 {
        self.quaternion.j
    }

    pub fn z(&self) -> f64 {
        self.quaternion.k
    }

    /// Rotate a vector: R v.
    ///
    /// # Arguments
    /// * `vector` - Vector to rotate
    /// * `jacobian_self` - Optional Jacobian ∂(R v)/∂R = -R [v]×
    /// * `jacobian_vector` - Optional Jacobian ∂(R v)/∂v = R
    pub fn act(
        &self,
        vector: &Vector3<f64>,
        jacobian_self: Option<&mut Matrix3<f64>>,
        jacobian_vector: Option<&mut Matrix3<f64>>,
    ) -> Vector3<f64> {
        let rotation = self.rotation_matrix();

        if let Some(jac_self) = jacobian_self {
            *jac_self = -rotation * skew(vector);
        }

        if let Some(jac_vector) = jacobian_vector {
            *jac_vector = rotation;
        }

        rotation * vector
    }

    /// Geodesic distance ‖Log(other⁻¹ ∘ self)‖.
    pub fn distance(&self, other: &Self) -> f64 {
        self.right_minus(other, None, None).angle()
    }

    /// The 4×3 matrix ∂(q ⊗ Exp(θ))/∂θ at θ = 0, unscaled by ½.
    fn quaternion_plus_basis(&self) -> nalgebra::Matrix4x3<f64> {
        let (w, x, y, z) = (self.w(), self.x(), self.y(), self.z());
        nalgebra::Matrix4x3::new(
            -x, -y, -z, //
            w, -z, y, //
            z, w, -x, //
            -y, x, w,
        )
    }
}

impl From<UnitQuaternion<f64>> for SO3 {
    fn from(quaternion: UnitQuaternion<f64>) -> Self {
        SO3::new(quaternion)
    }
}

/// Skew-symmetric matrix [v]× such that [v]× u = v × u.
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y, //
        v.z, 0.0, -v.x, //
        -v.y, v.x, 0.0,
    )
}

impl LieGroup for SO3 {
    type TangentVector = SO3Tangent;
    type JacobianMatrix = Matrix3<f64>;
    type LieAlgebra = Matrix3<f64>;

    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }
        SO3 {
            quaternion: self.quaternion.inverse(),
        }
    }

    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        if let Some(jac_self) = jacobian_self {
            *jac_self = other.rotation_matrix().transpose();
        }
        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix3::identity();
        }
        SO3 {
            quaternion: renormalized(self.quaternion.into_inner() * other.quaternion.into_inner()),
        }
    }

    /// Logarithmic map.
    ///
    /// Uses θ = 2 atan2(‖v‖, w) v/‖v‖ with the sign of `w` folded into both arguments so the
    /// result always has angle in [0, π]. Near identity, 2 atan(s/w)/s is replaced by its
    /// series 2/w (1 - s²/(3w²)).
    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> SO3Tangent {
        let q = self.quaternion.quaternion();
        let imag = q.imag();
        let sin_squared = imag.norm_squared();
        let w = q.w;

        let scale = if sin_squared > SMALL_ANGLE_EPSILON {
            let sin_half = sin_squared.sqrt();
            let two_angle = if w < 0.0 {
                2.0 * f64::atan2(-sin_half, -w)
            } else {
                2.0 * f64::atan2(sin_half, w)
            };
            two_angle / sin_half
        } else {
            2.0 / w * (1.0 - sin_squared / (3.0 * w * w))
        };

        let result = SO3Tangent::new(imag * scale);
        if let Some(jac) = jacobian {
            *jac = result.right_jacobian_inv();
        }
        result
    }

    fn adjoint(&self) -> Self::JacobianMatrix {
        self.rotation_matrix()
    }

    fn random() -> Self {
        SO3::from_scaled_axis(Vector3::new(
            rand::random::<f64>() * 2.0 - 1.0,
            rand::random::<f64>() * 2.0 - 1.0,
            rand::random::<f64>() * 2.0 - 1.0,
        ))
    }

    fn jacobian_identity() -> Self::JacobianMatrix {
        Matrix3::identity()
    }

    fn zero_jacobian() -> Self::JacobianMatrix {
        Matrix3::zeros()
    }

    fn normalize(&mut self) {
        self.quaternion = UnitQuaternion::new_normalize(self.quaternion.into_inner());
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        (self.quaternion.norm() - 1.0).abs() < tolerance
    }

    fn from_ambient(data: &[f64]) -> Self {
        SO3::from_wxyz(data[0], data[1], data[2], data[3])
    }

    fn to_ambient(&self) -> DVector<f64> {
        DVector::from_vec(vec![self.w(), self.x(), self.y(), self.z()])
    }

    fn plus_jacobian(&self) -> DMatrix<f64> {
        let basis = 0.5 * self.quaternion_plus_basis();
        DMatrix::from_column_slice(4, 3, basis.as_slice())
    }

    /// For unit q the basis has orthonormal columns, so the pseudo-inverse of ½B is 2Bᵀ.
    fn plus_jacobian_pinv(&self) -> DMatrix<f64> {
        let pinv = 2.0 * self.quaternion_plus_basis().transpose();
        DMatrix::from_column_slice(3, 4, pinv.as_slice())
    }
}

/// SO(3) tangent vector (rotation vector).
#[derive(Debug, Clone, PartialEq)]
pub struct SO3Tangent {
    data: Vector3<f64>,
}

impl Display for SO3Tangent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "so3(θ: [{:.4}, {:.4}, {:.4}])",
            self.data.x, self.data.y, self.data.z
        )
    }
}

impl SO3Tangent {
    pub fn new(data: Vector3<f64>) -> Self {
        SO3Tangent { data }
    }

    pub fn coeffs(&self) -> Vector3<f64> {
        self.data
    }

    pub fn angle(&self) -> f64 {
        self.data.norm()
    }

    pub fn x(&self) -> f64 {
        self.data.x
    }

    pub fn y(&self) -> f64 {
        self.data.y
    }

    pub fn z(&self) -> f64 {
        self.data.z
    }
}

impl From<Vector3<f64>> for SO3Tangent {
    fn from(data: Vector3<f64>) -> Self {
        SO3Tangent::new(data)
    }
}

impl Tangent<SO3> for SO3Tangent {
    const DIM: usize = 3;

    /// Exponential map q = [cos(θ/2), sin(θ/2) u].
    ///
    /// For θ² below [`SMALL_ANGLE_EPSILON`] the series w = 1 - θ²/8, v = θ/2 (1 - θ²/24) is
    /// used, so Exp(0) is exactly the identity.
    fn exp(&self, jacobian: Option<&mut Matrix3<f64>>) -> SO3 {
        let theta_squared = self.data.norm_squared();

        let (real, imag_scale) = if theta_squared > SMALL_ANGLE_EPSILON {
            let theta = theta_squared.sqrt();
            let half_theta = 0.5 * theta;
            (half_theta.cos(), half_theta.sin() / theta)
        } else {
            (1.0 - theta_squared / 8.0, 0.5 - theta_squared / 48.0)
        };

        if let Some(jac) = jacobian {
            *jac = self.right_jacobian();
        }

        let imag = self.data * imag_scale;
        SO3 {
            quaternion: renormalized(Quaternion::new(real, imag.x, imag.y, imag.z)),
        }
    }

    /// Jr(θ) = Jl(-θ) = Jl(θ)ᵀ
    fn right_jacobian(&self) -> Matrix3<f64> {
        self.left_jacobian().transpose()
    }

    /// Jl(θ) = I + (1 - cos θ)/θ² [θ]× + (θ - sin θ)/θ³ [θ]×²
    fn left_jacobian(&self) -> Matrix3<f64> {
        let theta_squared = self.data.norm_squared();
        let theta_skew = skew(&self.data);
        let theta_skew_squared = theta_skew * theta_skew;

        let (a, b) = if theta_squared > SMALL_ANGLE_EPSILON {
            let theta = theta_squared.sqrt();
            (
                (1.0 - theta.cos()) / theta_squared,
                (theta - theta.sin()) / (theta_squared * theta),
            )
        } else {
            (
                0.5 - theta_squared / 24.0,
                1.0 / 6.0 - theta_squared / 120.0,
            )
        };

        Matrix3::identity() + a * theta_skew + b * theta_skew_squared
    }

    fn right_jacobian_inv(&self) -> Matrix3<f64> {
        self.left_jacobian_inv().transpose()
    }

    /// Jl⁻¹(θ) = I - ½[θ]× + (1/θ² - cot(θ/2)/(2θ)) [θ]×²
    fn left_jacobian_inv(&self) -> Matrix3<f64> {
        let theta_squared = self.data.norm_squared();
        let theta_skew = skew(&self.data);
        let theta_skew_squared = theta_skew * theta_skew;

        let c = if theta_squared > SMALL_ANGLE_EPSILON {
            let theta = theta_squared.sqrt();
            let half_theta = 0.5 * theta;
            1.0 / theta_squared - half_theta.cos() / (2.0 * theta * half_theta.sin())
        } else {
            1.0 / 12.0 + theta_squared / 720.0
        };

        Matrix3::identity() - 0.5 * theta_skew + c * theta_skew_squared
    }

    fn hat(&self) -> Matrix3<f64> {
        skew(&self.data)
    }

    fn from_slice(data: &[f64]) -> Self {
        SO3Tangent::new(Vector3::new(data[0], data[1], data[2]))
    }

    fn to_vector(&self) -> DVector<f64> {
        DVector::from_column_slice(self.data.as_slice())
    }

    fn zero() -> Self {
        SO3Tangent::new(Vector3::zeros())
    }

    fn random() -> Self {
        SO3Tangent::new(Vector3::new(
            rand::random::<f64>() * 2.0 - 1.0,
            rand::random::<f64>() * 2.0 - 1.0,
            rand::random::<f64>() * 2.0 - 1.0,
        ))
    }

    fn is_zero(&self, tolerance: f64) -> bool {
        self.data.norm() < tolerance
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        (self.data - other.data).norm() < tolerance
    }
}
