use super::{Factor, FactorError, FactorResult};
use crate::manifold::{LieGroup, Parameterization, se3::SE3};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

/// Altitude (z-up height) measurement of an SE(3) pose, optionally with an additive bias.
///
/// # Mathematical Formulation
///
/// ```text
/// h   = t_z + b
/// r   = (h - h_meas) / σ
/// J_T = [e_zᵀ R / σ, 0₁ₓ₃]
/// J_b = 1 / σ
/// ```
///
/// Without a bias block `b = 0` and the factor has the single block `[T]`; with
/// [`AltitudeFactor::with_bias`] the blocks are `[T, b]` with `b ∈ R¹`.
#[derive(Debug, Clone)]
pub struct AltitudeFactor {
    altitude: f64,
    sigma: f64,
    estimate_bias: bool,
}

/// Short name kept for parity with other estimation toolkits.
pub type AltFactor = AltitudeFactor;

impl AltitudeFactor {
    pub fn new(altitude: f64, sigma: f64) -> FactorResult<Self> {
        Self::build(altitude, sigma, false)
    }

    /// Altitude measurement with an additive bias estimated as a separate R¹ block.
    pub fn with_bias(altitude: f64, sigma: f64) -> FactorResult<Self> {
        Self::build(altitude, sigma, true)
    }

    fn build(altitude: f64, sigma: f64, estimate_bias: bool) -> FactorResult<Self> {
        if !altitude.is_finite() {
            return Err(FactorError::InvalidParameters(format!(
                "altitude must be finite, got {altitude}"
            ))
            .log());
        }
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(FactorError::InvalidParameters(format!(
                "sigma must be positive and finite, got {sigma}"
            ))
            .log());
        }
        debug!("AltitudeFactor created: altitude {altitude}, sigma {sigma}, bias {estimate_bias}");
        Ok(AltitudeFactor {
            altitude,
            sigma,
            estimate_bias,
        })
    }

    pub fn altitude(&self) -> f64 {
        self.altitude
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl Factor for AltitudeFactor {
    fn linearize(
        &self,
        params: &[DVector<f64>],
        compute_jacobian: bool,
    ) -> (DVector<f64>, Option<DMatrix<f64>>) {
        let pose = SE3::from_ambient(params[0].as_slice());
        let bias = if self.estimate_bias { params[1][0] } else { 0.0 };

        let height = pose.z() + bias;
        let residual = DVector::from_element(1, (height - self.altitude) / self.sigma);

        let jacobian = compute_jacobian.then(|| {
            let columns = if self.estimate_bias { 7 } else { 6 };
            let mut jacobian = DMatrix::zeros(1, columns);
            let up_row = pose.rotation_matrix().row(2) / self.sigma;
            jacobian.view_mut((0, 0), (1, 3)).copy_from(&up_row);
            if self.estimate_bias {
                jacobian[(0, 6)] = 1.0 / self.sigma;
            }
            jacobian
        });

        (residual, jacobian)
    }

    fn get_dimension(&self) -> usize {
        1
    }

    fn parameter_blocks(&self) -> Vec<Parameterization> {
        if self.estimate_bias {
            vec![Parameterization::se3(), Parameterization::euclidean(1)]
        } else {
            vec![Parameterization::se3()]
        }
    }
}
