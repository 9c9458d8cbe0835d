use super::{Factor, FactorResult, NoiseModel};
use crate::manifold::{LieGroup, Parameterization, Tangent, se3::SE3};
use nalgebra::{DMatrix, DVector, Matrix6};
use tracing::debug;

/// Relative pose measurement between two SE(3) blocks `[T_a, T_b]`.
///
/// # Mathematical Formulation
///
/// ```text
/// e   = Log(T_meas⁻¹ ∘ T_a⁻¹ ∘ T_b)
/// r   = W · e
/// J_a = -W · Jr⁻¹(e) · Ad(T_b⁻¹ ∘ T_a)
/// J_b =  W · Jr⁻¹(e)
/// ```
///
/// The residual is ordered `[ρ, θ]`, translation first. The Jacobian is 6×12 with the
/// `T_a` block in the first six columns.
#[derive(Debug, Clone)]
pub struct RelSE3Factor {
    measured: SE3,
    noise: NoiseModel,
}

impl RelSE3Factor {
    pub fn new(measured: SE3, noise: NoiseModel) -> FactorResult<Self> {
        noise.require_dim(6, "RelSE3Factor")?;
        debug!("RelSE3Factor created with measurement {}", measured);
        Ok(RelSE3Factor { measured, noise })
    }

    pub fn measured(&self) -> &SE3 {
        &self.measured
    }
}

impl Factor for RelSE3Factor {
    fn linearize(
        &self,
        params: &[DVector<f64>],
        compute_jacobian: bool,
    ) -> (DVector<f64>, Option<DMatrix<f64>>) {
        let pose_a = SE3::from_ambient(params[0].as_slice());
        let pose_b = SE3::from_ambient(params[1].as_slice());

        let mut relative_wrt_a = Matrix6::zeros();
        let mut relative_wrt_b = Matrix6::zeros();
        let relative = pose_a.between(
            &pose_b,
            Some(&mut relative_wrt_a),
            Some(&mut relative_wrt_b),
        );

        let mut error_wrt_relative = Matrix6::zeros();
        let error = relative.minus(&self.measured, Some(&mut error_wrt_relative), None);
        let residual = self.noise.whiten(&error.to_vector());

        if !compute_jacobian {
            return (residual, None);
        }

        let mut jacobian = DMatrix::zeros(6, 12);
        jacobian
            .view_mut((0, 0), (6, 6))
            .copy_from(&(error_wrt_relative * relative_wrt_a));
        jacobian
            .view_mut((0, 6), (6, 6))
            .copy_from(&(error_wrt_relative * relative_wrt_b));

        (residual, Some(self.noise.whiten_jacobian(&jacobian)))
    }

    fn get_dimension(&self) -> usize {
        6
    }

    fn parameter_blocks(&self) -> Vec<Parameterization> {
        vec![Parameterization::se3(), Parameterization::se3()]
    }
}
