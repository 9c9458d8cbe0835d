use super::{Factor, FactorResult, NoiseModel};
use crate::manifold::{LieGroup, Parameterization, Tangent, so3::SO3};
use crate::numeric::to_dmatrix;
use nalgebra::{DMatrix, DVector, Matrix3};
use tracing::debug;

/// Absolute attitude measurement on a single SO(3) block.
///
/// # Mathematical Formulation
///
/// ```text
/// r = W · Log(q_meas⁻¹ ∘ q)
/// J = W · Jr⁻¹(Log(q_meas⁻¹ ∘ q))
/// ```
///
/// where `W` is the square-root information matrix of the noise model.
///
/// # Example
///
/// ```
/// use pose_factors::factors::{Factor, NoiseModel, SO3Factor};
/// use pose_factors::manifold::so3::SO3;
/// use nalgebra::DVector;
///
/// let measured = SO3::from_euler_angles(0.1, 0.0, 0.0);
/// let factor = SO3Factor::new(measured, NoiseModel::isotropic(3, 0.01).unwrap()).unwrap();
///
/// let identity = DVector::from_vec(vec![1.0, 0.0, 0.0, 0.0]);
/// let (residual, jacobian) = factor.linearize(&[identity], true);
/// assert_eq!(residual.len(), 3);
/// assert_eq!(jacobian.unwrap().shape(), (3, 3));
/// ```
#[derive(Debug, Clone)]
pub struct SO3Factor {
    measured: SO3,
    noise: NoiseModel,
}

impl SO3Factor {
    pub fn new(measured: SO3, noise: NoiseModel) -> FactorResult<Self> {
        noise.require_dim(3, "SO3Factor")?;
        debug!("SO3Factor created with measurement {}", measured);
        Ok(SO3Factor { measured, noise })
    }

    pub fn measured(&self) -> &SO3 {
        &self.measured
    }
}

impl Factor for SO3Factor {
    fn linearize(
        &self,
        params: &[DVector<f64>],
        compute_jacobian: bool,
    ) -> (DVector<f64>, Option<DMatrix<f64>>) {
        let attitude = SO3::from_ambient(params[0].as_slice());

        let mut jacobian_error = Matrix3::zeros();
        let error = attitude.minus(&self.measured, Some(&mut jacobian_error), None);

        let residual = self.noise.whiten(&error.to_vector());
        let jacobian =
            compute_jacobian.then(|| self.noise.whiten_jacobian(&to_dmatrix(&jacobian_error)));

        (residual, jacobian)
    }

    fn get_dimension(&self) -> usize {
        3
    }

    fn parameter_blocks(&self) -> Vec<Parameterization> {
        vec![Parameterization::so3()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::so3::SO3Tangent;
    use crate::numeric::{FINITE_DIFFERENCE_STEP, numerical_jacobian};
    use nalgebra::Vector3;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn test_so3_factor_zero_at_measurement() -> Result<(), Box<dyn std::error::Error>> {
        let measured = SO3::random();
        let factor = SO3Factor::new(measured.clone(), NoiseModel::isotropic(3, 1.0)?)?;

        let (residual, jacobian) = factor.linearize(&[measured.to_ambient()], true);
        let jacobian = jacobian.ok_or("jacobian requested")?;

        assert!(residual.norm() < 1e-12);
        assert!((jacobian - DMatrix::<f64>::identity(3, 3)).norm() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_so3_factor_identity_against_x_rotation() -> Result<(), Box<dyn std::error::Error>> {
        let measured = SO3Tangent::new(Vector3::new(0.1, 0.0, 0.0)).exp(None);
        let factor = SO3Factor::new(measured, NoiseModel::isotropic(3, 1.0)?)?;

        let (residual, _) = factor.linearize(&[SO3::identity().to_ambient()], false);
        assert!((residual[0] + 0.1).abs() < 1e-12);
        assert!(residual[1].abs() < 1e-12);
        assert!(residual[2].abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_so3_factor_whitening() -> Result<(), Box<dyn std::error::Error>> {
        let measured = SO3Tangent::new(Vector3::new(0.0, 0.2, 0.0)).exp(None);
        let factor = SO3Factor::new(measured, NoiseModel::isotropic(3, 0.1)?)?;

        let (residual, _) = factor.linearize(&[SO3::identity().to_ambient()], false);
        assert!((residual[1] + 2.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_so3_factor_numerical_jacobian() -> Result<(), Box<dyn std::error::Error>> {
        let factor = SO3Factor::new(SO3::random(), NoiseModel::from_sigmas(&[0.1, 0.2, 0.3])?)?;
        let params = vec![SO3::random().to_ambient()];

        let (_, analytic) = factor.linearize(&params, true);
        let analytic = analytic.ok_or("jacobian requested")?;
        let numeric = numerical_jacobian(&factor, &params, FINITE_DIFFERENCE_STEP)?;

        assert!((analytic - numeric).amax() < TOLERANCE * 1e3);
        Ok(())
    }

    #[test]
    fn test_so3_factor_rejects_wrong_noise_dimension() -> Result<(), Box<dyn std::error::Error>> {
        let result = SO3Factor::new(SO3::identity(), NoiseModel::isotropic(6, 1.0)?);
        assert!(result.is_err());
        Ok(())
    }
}
