use super::{Factor, FactorError, FactorResult};
use crate::manifold::{LieGroup, Parameterization, se3::SE3};
use crate::numeric::{MIN_RANGE, floor_range};
use nalgebra::{DMatrix, DVector, Vector3};
use tracing::debug;

/// Distance measurement between the position of an SE(3) pose and a point.
///
/// The point is either a fixed anchor ([`RangeFactor::new`], one block `[T]`) or an
/// estimated landmark ([`RangeFactor::with_landmark`], blocks `[T, l]` with `l ∈ R³`).
///
/// # Mathematical Formulation
///
/// ```text
/// d      = max(‖t - l‖, MIN_RANGE)
/// r      = (d - d_meas) / σ
/// J_T    = [uᵀ R / σ, 0₁ₓ₃]        u = (t - l) / ‖t - l‖
/// J_l    = -uᵀ / σ
/// ```
///
/// While the distance is clamped to [`MIN_RANGE`] the Jacobian is zero.
#[derive(Debug, Clone)]
pub struct RangeFactor {
    range: f64,
    sigma: f64,
    anchor: Option<Vector3<f64>>,
}

impl RangeFactor {
    /// Range to a fixed anchor point.
    pub fn new(range: f64, sigma: f64, anchor: Vector3<f64>) -> FactorResult<Self> {
        validate(range, sigma)?;
        if anchor.iter().any(|v| !v.is_finite()) {
            return Err(
                FactorError::InvalidParameters(format!("anchor must be finite, got {anchor:?}"))
                    .log(),
            );
        }
        debug!("RangeFactor created: range {range}, sigma {sigma}, anchor {anchor:?}");
        Ok(RangeFactor {
            range,
            sigma,
            anchor: Some(anchor),
        })
    }

    /// Range to a landmark that is estimated as its own R³ block.
    pub fn with_landmark(range: f64, sigma: f64) -> FactorResult<Self> {
        validate(range, sigma)?;
        debug!("RangeFactor created: range {range}, sigma {sigma}, landmark block");
        Ok(RangeFactor {
            range,
            sigma,
            anchor: None,
        })
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn anchor(&self) -> Option<&Vector3<f64>> {
        self.anchor.as_ref()
    }
}

fn validate(range: f64, sigma: f64) -> FactorResult<()> {
    if !range.is_finite() {
        return Err(FactorError::InvalidParameters(format!("range must be finite, got {range}")).log());
    }
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(FactorError::InvalidParameters(format!(
            "sigma must be positive and finite, got {sigma}"
        ))
        .log());
    }
    Ok(())
}

impl Factor for RangeFactor {
    fn linearize(
        &self,
        params: &[DVector<f64>],
        compute_jacobian: bool,
    ) -> (DVector<f64>, Option<DMatrix<f64>>) {
        let pose = SE3::from_ambient(params[0].as_slice());
        let point = match self.anchor {
            Some(anchor) => anchor,
            None => Vector3::new(params[1][0], params[1][1], params[1][2]),
        };

        let offset = pose.translation() - point;
        let distance = offset.norm();
        let residual = DVector::from_element(1, (floor_range(distance) - self.range) / self.sigma);

        if !compute_jacobian {
            return (residual, None);
        }

        let columns = if self.anchor.is_some() { 6 } else { 9 };
        let mut jacobian = DMatrix::zeros(1, columns);
        if distance >= MIN_RANGE {
            let direction = offset / distance;
            let wrt_translation = direction.transpose() * pose.rotation_matrix() / self.sigma;
            jacobian
                .view_mut((0, 0), (1, 3))
                .copy_from(&wrt_translation);
            if self.anchor.is_none() {
                jacobian
                    .view_mut((0, 6), (1, 3))
                    .copy_from(&(-direction.transpose() / self.sigma));
            }
        }

        (residual, Some(jacobian))
    }

    fn get_dimension(&self) -> usize {
        1
    }

    fn parameter_blocks(&self) -> Vec<Parameterization> {
        match self.anchor {
            Some(_) => vec![Parameterization::se3()],
            None => vec![Parameterization::se3(), Parameterization::euclidean(3)],
        }
    }
}
