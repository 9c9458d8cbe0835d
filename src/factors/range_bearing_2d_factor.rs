use super::{Factor, FactorError, FactorResult};
use crate::manifold::{LieGroup, Parameterization, so2::SO2};
use crate::numeric::{MIN_RANGE, floor_range, wrap_angle};
use nalgebra::{DMatrix, DVector, Vector2};
use tracing::debug;

/// Range and bearing to a 2D landmark observed from a known position and nominal heading.
///
/// The blocks are `[l, R_err]`: the landmark position `l ∈ R²` and an SO(2) heading
/// error applied on top of the nominal heading `φ`. Position `p` and `φ` are constants of
/// the factor.
///
/// # Mathematical Formulation
///
/// ```text
/// R     = R(φ) · R_err
/// l_B   = Rᵀ (l - p)
/// r     = [ (‖l_B‖ - d) / σ_d,  wrap(atan2(l_B.y, l_B.x) - β) / σ_β ]
/// J_l   = [ (l - p)ᵀ / ‖l - p‖ / σ_d ;  [-l_B.y, l_B.x] / ‖l_B‖² · Rᵀ / σ_β ]
/// J_err = [ 0 ; -1 / σ_β ]
/// ```
///
/// The bearing residual is wrapped to (-π, π]. The landmark Jacobian is zero while the
/// distance is below [`MIN_RANGE`].
#[derive(Debug, Clone)]
pub struct RangeBearing2DFactor {
    range: f64,
    range_sigma: f64,
    bearing: f64,
    bearing_sigma: f64,
    position: Vector2<f64>,
    heading: SO2,
}

impl RangeBearing2DFactor {
    /// # Arguments
    /// * `range` / `range_sigma` - Measured distance and its standard deviation
    /// * `bearing` / `bearing_sigma` - Measured bearing in the sensor frame (radians)
    /// * `position` - Sensor position in the world frame
    /// * `heading` - Nominal sensor heading in the world frame (radians)
    pub fn new(
        range: f64,
        range_sigma: f64,
        bearing: f64,
        bearing_sigma: f64,
        position: Vector2<f64>,
        heading: f64,
    ) -> FactorResult<Self> {
        let constants = [range, bearing, position.x, position.y, heading];
        if constants.iter().any(|v| !v.is_finite()) {
            return Err(FactorError::InvalidParameters(format!(
                "measurement and pose must be finite, got {constants:?}"
            ))
            .log());
        }
        for sigma in [range_sigma, bearing_sigma] {
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(FactorError::InvalidParameters(format!(
                    "sigma must be positive and finite, got {sigma}"
                ))
                .log());
            }
        }
        debug!(
            "RangeBearing2DFactor created: range {range}, bearing {bearing}, position {:?}, heading {heading}",
            position
        );
        Ok(RangeBearing2DFactor {
            range,
            range_sigma,
            bearing,
            bearing_sigma,
            position,
            heading: SO2::from_angle(heading),
        })
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    pub fn bearing(&self) -> f64 {
        self.bearing
    }
}

impl Factor for RangeBearing2DFactor {
    fn linearize(
        &self,
        params: &[DVector<f64>],
        compute_jacobian: bool,
    ) -> (DVector<f64>, Option<DMatrix<f64>>) {
        let landmark = Vector2::new(params[0][0], params[0][1]);
        let heading_error = SO2::from_ambient(params[1].as_slice());

        let rotation = self
            .heading
            .compose(&heading_error, None, None)
            .rotation_matrix();
        let offset = landmark - self.position;
        let local = rotation.transpose() * offset;
        let distance = local.norm();

        let residual = DVector::from_vec(vec![
            (floor_range(distance) - self.range) / self.range_sigma,
            wrap_angle(local.y.atan2(local.x) - self.bearing) / self.bearing_sigma,
        ]);

        if !compute_jacobian {
            return (residual, None);
        }

        let mut jacobian = DMatrix::zeros(2, 3);
        if distance >= MIN_RANGE {
            let range_row = offset.transpose() / (distance * self.range_sigma);
            let bearing_row = Vector2::new(-local.y, local.x).transpose() * rotation.transpose()
                / (distance * distance * self.bearing_sigma);
            jacobian.view_mut((0, 0), (1, 2)).copy_from(&range_row);
            jacobian.view_mut((1, 0), (1, 2)).copy_from(&bearing_row);
        }
        jacobian[(1, 2)] = -1.0 / self.bearing_sigma;

        (residual, Some(jacobian))
    }

    fn get_dimension(&self) -> usize {
        2
    }

    fn parameter_blocks(&self) -> Vec<Parameterization> {
        vec![Parameterization::euclidean(2), Parameterization::so2()]
    }
}
