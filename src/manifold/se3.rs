//! SE(3) - rigid body transformations in 3D.
//!
//! Elements are stored as a translation plus an [`SO3`] rotation. The ambient parameter
//! layout is `[tx, ty, tz, qw, qx, qy, qz]`. Tangent vectors are ordered `[ρ, θ]`, with
//! ρ the translational part and θ the rotation vector, so that
//!
//! ```text
//! Exp([ρ, θ]) = (Exp_SO3(θ), Jl_SO3(θ) ρ)
//! ```

use crate::manifold::{
    LieGroup, SE3_Q_SERIES_EPSILON, Tangent,
    so3::{SO3, SO3Tangent, skew},
};
use nalgebra::{DMatrix, DVector, Isometry3, Matrix3, Matrix4, Matrix6, Translation3, Vector3, Vector6};
use std::{
    fmt,
    fmt::{Display, Formatter},
};

/// SE(3) group element.
#[derive(Debug, Clone, PartialEq)]
pub struct SE3 {
    rotation: SO3,
    translation: Vector3<f64>,
}

impl Display for SE3 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let t = self.translation;
        write!(
            f,
            "SE3(translation: [{:.4}, {:.4}, {:.4}], rotation: {})",
            t.x, t.y, t.z, self.rotation
        )
    }
}

impl SE3 {
    /// Degrees of freedom
    pub const DOF: usize = 6;

    /// Size of the ambient parameter block
    pub const REP_SIZE: usize = 7;

    pub fn identity() -> Self {
        SE3 {
            rotation: SO3::identity(),
            translation: Vector3::zeros(),
        }
    }

    pub fn new(translation: Vector3<f64>, rotation: SO3) -> Self {
        SE3 {
            rotation,
            translation,
        }
    }

    /// Create SE(3) from a translation and roll, pitch, yaw.
    pub fn from_translation_euler(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        SE3::new(
            Vector3::new(x, y, z),
            SO3::from_euler_angles(roll, pitch, yaw),
        )
    }

    pub fn from_isometry(isometry: Isometry3<f64>) -> Self {
        SE3::new(isometry.translation.vector, SO3::new(isometry.rotation))
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.translation
    }

    pub fn rotation(&self) -> &SO3 {
        &self.rotation
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.rotation_matrix()
    }

    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.translation),
            self.rotation.quaternion(),
        )
    }

    /// Homogeneous 4×4 transformation matrix.
    pub fn matrix(&self) -> Matrix4<f64> {
        self.isometry().to_homogeneous()
    }

    pub fn x(&self) -> f64 {
        self.translation.x
    }

    pub fn y(&self) -> f64 {
        self.translation.y
    }

    pub fn z(&self) -> f64 {
        self.translation.z
    }

    /// Transform a point: R p + t.
    ///
    /// # Arguments
    /// * `point` - Point to transform
    /// * `jacobian_self` - Optional 3×6 Jacobian ∂(T p)/∂T = [R, -R [p]×]
    /// * `jacobian_point` - Optional Jacobian ∂(T p)/∂p = R
    pub fn act(
        &self,
        point: &Vector3<f64>,
        jacobian_self: Option<&mut nalgebra::Matrix3x6<f64>>,
        jacobian_point: Option<&mut Matrix3<f64>>,
    ) -> Vector3<f64> {
        let rotation = self.rotation_matrix();

        if let Some(jac_self) = jacobian_self {
            jac_self.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
            jac_self
                .fixed_view_mut::<3, 3>(0, 3)
                .copy_from(&(-rotation * skew(point)));
        }

        if let Some(jac_point) = jacobian_point {
            *jac_point = rotation;
        }

        rotation * point + self.translation
    }
}

impl From<Isometry3<f64>> for SE3 {
    fn from(isometry: Isometry3<f64>) -> Self {
        SE3::from_isometry(isometry)
    }
}

impl LieGroup for SE3 {
    type TangentVector = SE3Tangent;
    type JacobianMatrix = Matrix6<f64>;
    type LieAlgebra = Matrix4<f64>;

    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }
        let rotation = self.rotation.inverse(None);
        let translation = -(rotation.rotation_matrix() * self.translation);
        SE3::new(translation, rotation)
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
            *jac_other = Matrix6::identity();
        }
        SE3::new(
            self.rotation_matrix() * other.translation + self.translation,
            self.rotation.compose(&other.rotation, None, None),
        )
    }

    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> SE3Tangent {
        let theta = self.rotation.log(None);
        let rho = theta.left_jacobian_inv() * self.translation;
        let result = SE3Tangent::new(rho, theta.coeffs());
        if let Some(jac) = jacobian {
            *jac = result.right_jacobian_inv();
        }
        result
    }

    /// Ad(T) = [[R, [t]× R], [0, R]]
    fn adjoint(&self) -> Self::JacobianMatrix {
        let rotation = self.rotation_matrix();
        let mut adjoint = Matrix6::zeros();
        adjoint.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        adjoint.fixed_view_mut::<3, 3>(3, 3).copy_from(&rotation);
        adjoint
            .fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(skew(&self.translation) * rotation));
        adjoint
    }

    fn random() -> Self {
        let translation = Vector3::new(
            rand::random::<f64>() * 2.0 - 1.0,
            rand::random::<f64>() * 2.0 - 1.0,
            rand::random::<f64>() * 2.0 - 1.0,
        );
        SE3::new(translation, SO3::random())
    }

    fn jacobian_identity() -> Self::JacobianMatrix {
        Matrix6::identity()
    }

    fn zero_jacobian() -> Self::JacobianMatrix {
        Matrix6::zeros()
    }

    fn normalize(&mut self) {
        self.rotation.normalize();
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        self.rotation.is_valid(tolerance) && self.translation.iter().all(|v| v.is_finite())
    }

    fn from_ambient(data: &[f64]) -> Self {
        SE3::new(
            Vector3::new(data[0], data[1], data[2]),
            SO3::from_wxyz(data[3], data[4], data[5], data[6]),
        )
    }

    fn to_ambient(&self) -> DVector<f64> {
        let t = self.translation;
        let r = &self.rotation;
        DVector::from_vec(vec![t.x, t.y, t.z, r.w(), r.x(), r.y(), r.z()])
    }

    /// 7×6 block-diagonal matrix diag(R, P_q).
    fn plus_jacobian(&self) -> DMatrix<f64> {
        let mut jacobian = DMatrix::zeros(7, 6);
        jacobian
            .view_mut((0, 0), (3, 3))
            .copy_from(&self.rotation_matrix());
        jacobian
            .view_mut((3, 3), (4, 3))
            .copy_from(&self.rotation.plus_jacobian());
        jacobian
    }

    /// 6×7 block-diagonal matrix diag(Rᵀ, P_q⁺).
    fn plus_jacobian_pinv(&self) -> DMatrix<f64> {
        let mut pinv = DMatrix::zeros(6, 7);
        pinv.view_mut((0, 0), (3, 3))
            .copy_from(&self.rotation_matrix().transpose());
        pinv.view_mut((3, 3), (3, 4))
            .copy_from(&self.rotation.plus_jacobian_pinv());
        pinv
    }
}

/// SE(3) tangent vector `[ρ, θ]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SE3Tangent {
    data: Vector6<f64>,
}

impl Display for SE3Tangent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let d = &self.data;
        write!(
            f,
            "se3(ρ: [{:.4}, {:.4}, {:.4}], θ: [{:.4}, {:.4}, {:.4}])",
            d[0], d[1], d[2], d[3], d[4], d[5]
        )
    }
}

impl SE3Tangent {
    pub fn new(rho: Vector3<f64>, theta: Vector3<f64>) -> Self {
        SE3Tangent {
            data: Vector6::new(rho.x, rho.y, rho.z, theta.x, theta.y, theta.z),
        }
    }

    pub fn from_vector(data: Vector6<f64>) -> Self {
        SE3Tangent { data }
    }

    pub fn coeffs(&self) -> Vector6<f64> {
        self.data
    }

    pub fn rho(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(0).into_owned()
    }

    pub fn theta(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(3).into_owned()
    }

    /// Off-diagonal block Q(ρ, θ) of the SE(3) left Jacobian.
    ///
    /// ```text
    /// Q = ½ρ× + a₂ (θ×ρ× + ρ×θ× + θ×ρ×θ×)
    ///         + a₃ (θ×²ρ× + ρ×θ×² - 3 θ×ρ×θ×)
    ///         + a₄ (θ×ρ×θ×² + θ×²ρ×θ×)
    /// a₂ = (θ - sin θ)/θ³
    /// a₃ = (θ² + 2 cos θ - 2)/(2θ⁴)
    /// a₄ = (2θ - 3 sin θ + θ cos θ)/(2θ⁵)
    /// ```
    pub fn q_block_jacobian_matrix(rho: Vector3<f64>, theta: Vector3<f64>) -> Matrix3<f64> {
        let rho_skew = skew(&rho);
        let theta_skew = skew(&theta);
        let theta_squared = theta.norm_squared();

        let (a2, a3, a4) = if theta_squared > SE3_Q_SERIES_EPSILON {
            let angle = theta_squared.sqrt();
            let (sin, cos) = angle.sin_cos();
            let angle_4 = theta_squared * theta_squared;
            (
                (angle - sin) / (theta_squared * angle),
                (theta_squared + 2.0 * cos - 2.0) / (2.0 * angle_4),
                (2.0 * angle - 3.0 * sin + angle * cos) / (2.0 * angle_4 * angle),
            )
        } else {
            (
                1.0 / 6.0 - theta_squared / 120.0,
                1.0 / 24.0 - theta_squared / 720.0,
                1.0 / 120.0 - theta_squared / 2520.0,
            )
        };

        let theta_rho = theta_skew * rho_skew;
        let rho_theta = rho_skew * theta_skew;
        let theta_rho_theta = theta_rho * theta_skew;
        let theta_skew_squared = theta_skew * theta_skew;

        0.5 * rho_skew
            + a2 * (theta_rho + rho_theta + theta_rho_theta)
            + a3 * (theta_skew_squared * rho_skew + rho_skew * theta_skew_squared
                - 3.0 * theta_rho_theta)
            + a4 * (theta_rho_theta * theta_skew + theta_skew * theta_rho_theta)
    }

    fn negated(&self) -> Self {
        SE3Tangent { data: -self.data }
    }
}

impl Tangent<SE3> for SE3Tangent {
    const DIM: usize = 6;

    fn exp(&self, jacobian: Option<&mut Matrix6<f64>>) -> SE3 {
        let theta = SO3Tangent::new(self.theta());
        let rotation = theta.exp(None);
        let translation = theta.left_jacobian() * self.rho();

        if let Some(jac) = jacobian {
            *jac = self.right_jacobian();
        }

        SE3::new(translation, rotation)
    }

    /// Jr(τ) = Jl(-τ)
    fn right_jacobian(&self) -> Matrix6<f64> {
        self.negated().left_jacobian()
    }

    /// Jl = [[Jl_SO3(θ), Q(ρ, θ)], [0, Jl_SO3(θ)]]
    fn left_jacobian(&self) -> Matrix6<f64> {
        let rotation_jacobian = SO3Tangent::new(self.theta()).left_jacobian();
        let q_block = Self::q_block_jacobian_matrix(self.rho(), self.theta());

        let mut jacobian = Matrix6::zeros();
        jacobian
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&rotation_jacobian);
        jacobian
            .fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&rotation_jacobian);
        jacobian.fixed_view_mut::<3, 3>(0, 3).copy_from(&q_block);
        jacobian
    }

    fn right_jacobian_inv(&self) -> Matrix6<f64> {
        self.negated().left_jacobian_inv()
    }

    /// Jl⁻¹ = [[Jl⁻¹, -Jl⁻¹ Q Jl⁻¹], [0, Jl⁻¹]]
    fn left_jacobian_inv(&self) -> Matrix6<f64> {
        let rotation_jacobian_inv = SO3Tangent::new(self.theta()).left_jacobian_inv();
        let q_block = Self::q_block_jacobian_matrix(self.rho(), self.theta());

        let mut jacobian = Matrix6::zeros();
        jacobian
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&rotation_jacobian_inv);
        jacobian
            .fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&rotation_jacobian_inv);
        jacobian
            .fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(-rotation_jacobian_inv * q_block * rotation_jacobian_inv));
        jacobian
    }

    fn hat(&self) -> Matrix4<f64> {
        let mut lie_algebra = Matrix4::zeros();
        lie_algebra
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&skew(&self.theta()));
        lie_algebra
            .fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&self.rho());
        lie_algebra
    }

    fn from_slice(data: &[f64]) -> Self {
        SE3Tangent {
            data: Vector6::from_column_slice(&data[..6]),
        }
    }

    fn to_vector(&self) -> DVector<f64> {
        DVector::from_column_slice(self.data.as_slice())
    }

    fn zero() -> Self {
        SE3Tangent {
            data: Vector6::zeros(),
        }
    }

    fn random() -> Self {
        SE3Tangent {
            data: Vector6::from_fn(|_, _| rand::random::<f64>() * 2.0 - 1.0),
        }
    }

    fn is_zero(&self, tolerance: f64) -> bool {
        self.data.norm() < tolerance
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        (self.data - other.data).norm() < tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const TOLERANCE: f64 = 1e-10;

    #[test]
    fn test_se3_identity() {
        let se3 = SE3::identity();
        assert_eq!(se3.translation(), Vector3::zeros());
        assert_eq!(se3.rotation(), &SO3::identity());
        assert_eq!(
            se3.to_ambient().as_slice(),
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_se3_exp_pure_translation() {
        let se3 = SE3Tangent::new(Vector3::new(1.0, 2.0, 3.0), Vector3::zeros()).exp(None);
        assert_eq!(se3.translation(), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(se3.rotation(), &SO3::identity());
    }

    #[test]
    fn test_se3_exp_screw_motion() {
        // Quarter turn about z while moving along x traces a quarter circle.
        let tangent = SE3Tangent::new(Vector3::new(PI / 2.0, 0.0, 0.0), Vector3::new(0.0, 0.0, PI / 2.0));
        let se3 = tangent.exp(None);
        assert!((se3.translation() - Vector3::new(1.0, 1.0, 0.0)).norm() < TOLERANCE);
    }

    #[test]
    fn test_se3_log_exp_round_trip() {
        for _ in 0..20 {
            let tangent = SE3Tangent::random();
            let recovered = tangent.exp(None).log(None);
            assert!(tangent.is_approx(&recovered, TOLERANCE));
        }
    }

    #[test]
    fn test_se3_inverse() {
        let se3 = SE3::random();
        let identity = se3.compose(&se3.inverse(None), None, None);
        assert!(identity.is_approx(&SE3::identity(), TOLERANCE));
    }

    #[test]
    fn test_se3_adjoint_identity() {
        let se3 = SE3::random();
        let tangent = SE3Tangent::random();

        let lhs = se3.compose(&tangent.exp(None), None, None);
        let rhs = SE3Tangent::from_vector(se3.adjoint() * tangent.coeffs())
            .exp(None)
            .compose(&se3, None, None);

        assert!(lhs.is_approx(&rhs, TOLERANCE));
    }

    #[test]
    fn test_se3_jacobian_inverses() {
        let tangent = SE3Tangent::new(Vector3::new(0.4, -1.1, 2.0), Vector3::new(0.5, 0.3, -0.8));
        let jr = tangent.right_jacobian();
        let jl = tangent.left_jacobian();
        assert!((jr * tangent.right_jacobian_inv() - Matrix6::identity()).norm() < TOLERANCE);
        assert!((jl * tangent.left_jacobian_inv() - Matrix6::identity()).norm() < TOLERANCE);
    }

    #[test]
    fn test_se3_right_jacobian_definition() {
        let tangent = SE3Tangent::new(Vector3::new(0.4, -1.1, 2.0), Vector3::new(0.5, 0.3, -0.8));
        let delta = Vector6::new(1e-7, -2e-7, 3e-7, -1e-7, 2e-7, 1e-7);

        let perturbed = SE3Tangent::from_vector(tangent.coeffs() + delta).exp(None);
        let linearized = tangent.exp(None).compose(
            &SE3Tangent::from_vector(tangent.right_jacobian() * delta).exp(None),
            None,
            None,
        );

        assert!(perturbed.is_approx(&linearized, 1e-12));
    }

    #[test]
    fn test_se3_q_block_series_matches_closed_form() {
        let rho = Vector3::new(0.7, -0.2, 1.3);
        let axis = Vector3::new(0.3, -0.5, 0.8).normalize();

        // Just below the series threshold, where the closed form is still accurate.
        let theta = axis * 0.99e-2;
        let series = SE3Tangent::q_block_jacobian_matrix(rho, theta);
        let closed = closed_form_q(rho, theta);
        assert!((series - closed).norm() < 1e-9);

        let large = axis * 1.3;
        assert!(
            (SE3Tangent::q_block_jacobian_matrix(rho, large) - closed_form_q(rho, large)).norm()
                < 1e-12
        );
    }

    fn closed_form_q(rho: Vector3<f64>, theta: Vector3<f64>) -> Matrix3<f64> {
        let rho_skew = skew(&rho);
        let theta_skew = skew(&theta);
        let angle = theta.norm();
        let angle_2 = angle * angle;
        let a2 = (angle - angle.sin()) / (angle_2 * angle);
        let a3 = (angle_2 + 2.0 * angle.cos() - 2.0) / (2.0 * angle_2 * angle_2);
        let a4 = (2.0 * angle - 3.0 * angle.sin() + angle * angle.cos())
            / (2.0 * angle_2 * angle_2 * angle);
        let trt = theta_skew * rho_skew * theta_skew;
        let tt = theta_skew * theta_skew;
        0.5 * rho_skew
            + a2 * (theta_skew * rho_skew + rho_skew * theta_skew + trt)
            + a3 * (tt * rho_skew + rho_skew * tt - 3.0 * trt)
            + a4 * (trt * theta_skew + theta_skew * trt)
    }

    #[test]
    fn test_se3_plus_jacobian_pinv() {
        let se3 = SE3::random();
        let product = se3.plus_jacobian_pinv() * se3.plus_jacobian();
        assert!((product - DMatrix::<f64>::identity(6, 6)).norm() < 1e-12);
    }

    #[test]
    fn test_se3_act() {
        let se3 = SE3::from_translation_euler(1.0, 2.0, 3.0, 0.0, 0.0, PI / 2.0);
        let point = Vector3::new(1.0, 0.0, 0.0);
        let transformed = se3.act(&point, None, None);
        assert!((transformed - Vector3::new(1.0, 3.0, 3.0)).norm() < TOLERANCE);
        assert!((se3.matrix() * point.push(1.0) - transformed.push(1.0)).norm() < TOLERANCE);
    }
}
