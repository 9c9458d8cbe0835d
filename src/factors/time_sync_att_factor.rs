use super::{Factor, FactorError, FactorResult, NoiseModel};
use crate::manifold::{LieGroup, Parameterization, Tangent, so3::{SO3, SO3Tangent}};
use crate::numeric::to_dmatrix;
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use tracing::debug;

/// Time offset between two attitude streams.
///
/// A sensor reports attitude `q` at a timestamp that lags the reference stream by `dt`.
/// Propagating `q` forward with the angular rate `ω` over `dt` should match the reference
/// attitude `q_ref` sampled at the same nominal time. The single block is `[dt] ∈ R¹`.
///
/// # Mathematical Formulation
///
/// ```text
/// e = Log(q_ref⁻¹ ∘ q ∘ Exp(dt · ω))
/// r = W · e
/// J = W · Jr⁻¹(e) · Jr(dt · ω) · ω
/// ```
#[derive(Debug, Clone)]
pub struct TimeSyncAttFactor {
    reference: SO3,
    attitude: SO3,
    angular_rate: Vector3<f64>,
    noise: NoiseModel,
}

impl TimeSyncAttFactor {
    /// # Arguments
    /// * `reference` - Reference attitude `q_ref`
    /// * `attitude` - Attitude `q` reported by the delayed sensor
    /// * `angular_rate` - Body angular rate `ω` at the sample (rad/s)
    /// * `noise` - 3-dimensional attitude noise
    pub fn new(
        reference: SO3,
        attitude: SO3,
        angular_rate: Vector3<f64>,
        noise: NoiseModel,
    ) -> FactorResult<Self> {
        noise.require_dim(3, "TimeSyncAttFactor")?;
        if angular_rate.iter().any(|v| !v.is_finite()) {
            return Err(FactorError::InvalidParameters(format!(
                "angular rate must be finite, got {angular_rate:?}"
            ))
            .log());
        }
        debug!(
            "TimeSyncAttFactor created: reference {}, attitude {}, rate {:?}",
            reference, attitude, angular_rate
        );
        Ok(TimeSyncAttFactor {
            reference,
            attitude,
            angular_rate,
            noise,
        })
    }
}

impl Factor for TimeSyncAttFactor {
    fn linearize(
        &self,
        params: &[DVector<f64>],
        compute_jacobian: bool,
    ) -> (DVector<f64>, Option<DMatrix<f64>>) {
        let time_offset = params[0][0];
        let rotation = SO3Tangent::new(self.angular_rate * time_offset);

        let mut corrected_wrt_rotation = Matrix3::zeros();
        let corrected = self
            .attitude
            .plus(&rotation, None, Some(&mut corrected_wrt_rotation));

        let mut error_wrt_corrected = Matrix3::zeros();
        let error = corrected.minus(&self.reference, Some(&mut error_wrt_corrected), None);
        let residual = self.noise.whiten(&error.to_vector());

        let jacobian = compute_jacobian.then(|| {
            let wrt_offset = error_wrt_corrected * corrected_wrt_rotation * self.angular_rate;
            self.noise.whiten_jacobian(&to_dmatrix(&wrt_offset))
        });

        (residual, jacobian)
    }

    fn get_dimension(&self) -> usize {
        3
    }

    fn parameter_blocks(&self) -> Vec<Parameterization> {
        vec![Parameterization::euclidean(1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::{FINITE_DIFFERENCE_STEP, numerical_jacobian};

    #[test]
    fn test_time_sync_zero_offset_matches() -> Result<(), Box<dyn std::error::Error>> {
        let attitude = SO3::random();
        let factor = TimeSyncAttFactor::new(
            attitude.clone(),
            attitude,
            Vector3::new(0.5, 1.0, -2.0),
            NoiseModel::isotropic(3, 1.0)?,
        )?;

        let (residual, jacobian) = factor.linearize(&[DVector::zeros(1)], true);
        let jacobian = jacobian.ok_or("jacobian requested")?;

        assert!(residual.norm() < 1e-12);
        assert!((jacobian - DMatrix::from_column_slice(3, 1, &[0.5, 1.0, -2.0])).norm() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_time_sync_recovers_known_offset() -> Result<(), Box<dyn std::error::Error>> {
        let reference = SO3::random();
        let rate = Vector3::new(0.5, 1.0, -2.0);
        let attitude = reference.plus(&SO3Tangent::new(-0.2 * rate), None, None);
        let factor =
            TimeSyncAttFactor::new(reference, attitude, rate, NoiseModel::isotropic(3, 0.01)?)?;

        let (residual, _) = factor.linearize(&[DVector::from_element(1, 0.2)], false);
        assert!(residual.norm() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_time_sync_numerical_jacobian() -> Result<(), Box<dyn std::error::Error>> {
        let factor = TimeSyncAttFactor::new(
            SO3::random(),
            SO3::random(),
            Vector3::new(-0.3, 0.8, 1.4),
            NoiseModel::from_sigmas(&[0.1, 0.2, 0.1])?,
        )?;
        let params = vec![DVector::from_element(1, 0.35)];

        let (_, analytic) = factor.linearize(&params, true);
        let analytic = analytic.ok_or("jacobian requested")?;
        let numeric = numerical_jacobian(&factor, &params, FINITE_DIFFERENCE_STEP)?;

        assert_eq!(analytic.shape(), (3, 1));
        assert!((analytic - numeric).amax() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_time_sync_rejects_non_finite_rate() -> Result<(), Box<dyn std::error::Error>> {
        let result = TimeSyncAttFactor::new(
            SO3::identity(),
            SO3::identity(),
            Vector3::new(f64::NAN, 0.0, 0.0),
            NoiseModel::isotropic(3, 1.0)?,
        );
        assert!(result.is_err());
        Ok(())
    }
}
