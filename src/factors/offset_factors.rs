//! Mounting offset between a sensor and a reference frame.
//!
//! Both factors estimate a fixed transform `X_off` such that the sensor reading composed
//! with the offset matches the reference:
//!
//! ```text
//! e = Log(X_ref⁻¹ ∘ X ∘ X_off)
//! r = W · e
//! J = W · Jr⁻¹(e)
//! ```
//!
//! Since `X_off` is the rightmost term, the derivative of the composition with respect to a
//! right perturbation of the offset is the identity.

use super::{Factor, FactorResult, NoiseModel};
use crate::manifold::{LieGroup, Parameterization, Tangent, se3::SE3, so3::SO3};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

/// Rotation offset between a sensor attitude and a reference attitude. Block `[q_off]`.
#[derive(Debug, Clone)]
pub struct SO3OffsetFactor {
    reference: SO3,
    attitude: SO3,
    noise: NoiseModel,
}

impl SO3OffsetFactor {
    /// # Arguments
    /// * `reference` - Reference attitude `q_ref`
    /// * `attitude` - Attitude reported by the sensor
    /// * `noise` - 3-dimensional attitude noise
    pub fn new(reference: SO3, attitude: SO3, noise: NoiseModel) -> FactorResult<Self> {
        noise.require_dim(3, "SO3OffsetFactor")?;
        debug!(
            "SO3OffsetFactor created: reference {}, attitude {}",
            reference, attitude
        );
        Ok(SO3OffsetFactor {
            reference,
            attitude,
            noise,
        })
    }
}

impl Factor for SO3OffsetFactor {
    fn linearize(
        &self,
        params: &[DVector<f64>],
        compute_jacobian: bool,
    ) -> (DVector<f64>, Option<DMatrix<f64>>) {
        let offset = SO3::from_ambient(params[0].as_slice());
        offset_residual(
            &self.reference,
            &self.attitude,
            &offset,
            &self.noise,
            compute_jacobian,
        )
    }

    fn get_dimension(&self) -> usize {
        3
    }

    fn parameter_blocks(&self) -> Vec<Parameterization> {
        vec![Parameterization::so3()]
    }
}

/// Rigid mounting offset between a sensor pose and a reference pose. Block `[T_off]`.
#[derive(Debug, Clone)]
pub struct SE3OffsetFactor {
    reference: SE3,
    pose: SE3,
    noise: NoiseModel,
}

impl SE3OffsetFactor {
    /// # Arguments
    /// * `reference` - Reference pose `T_ref`
    /// * `pose` - Pose reported by the sensor
    /// * `noise` - 6-dimensional pose noise, ordered `[ρ, θ]`
    pub fn new(reference: SE3, pose: SE3, noise: NoiseModel) -> FactorResult<Self> {
        noise.require_dim(6, "SE3OffsetFactor")?;
        debug!("SE3OffsetFactor created: reference {}, pose {}", reference, pose);
        Ok(SE3OffsetFactor {
            reference,
            pose,
            noise,
        })
    }
}

impl Factor for SE3OffsetFactor {
    fn linearize(
        &self,
        params: &[DVector<f64>],
        compute_jacobian: bool,
    ) -> (DVector<f64>, Option<DMatrix<f64>>) {
        let offset = SE3::from_ambient(params[0].as_slice());
        offset_residual(
            &self.reference,
            &self.pose,
            &offset,
            &self.noise,
            compute_jacobian,
        )
    }

    fn get_dimension(&self) -> usize {
        6
    }

    fn parameter_blocks(&self) -> Vec<Parameterization> {
        vec![Parameterization::se3()]
    }
}

fn offset_residual<G>(
    reference: &G,
    sensor: &G,
    offset: &G,
    noise: &NoiseModel,
    compute_jacobian: bool,
) -> (DVector<f64>, Option<DMatrix<f64>>)
where
    G: LieGroup,
{
    let mut corrected_wrt_offset = G::zero_jacobian();
    let corrected = sensor.compose(offset, None, Some(&mut corrected_wrt_offset));

    let mut error_wrt_corrected = G::zero_jacobian();
    let error = corrected.minus(reference, Some(&mut error_wrt_corrected), None);
    let residual = noise.whiten(&error.to_vector());

    let jacobian = compute_jacobian.then(|| {
        let chained = error_wrt_corrected * corrected_wrt_offset;
        let dim = G::TangentVector::DIM;
        let dense = DMatrix::from_fn(dim, dim, |i, j| chained[(i, j)]);
        noise.whiten_jacobian(&dense)
    });

    (residual, jacobian)
}
