//! Numeric helpers shared by the factors: angle wrapping, range flooring, static-to-dense
//! matrix conversion and finite-difference Jacobians for verifying analytic derivatives.

use crate::factors::{Factor, FactorError, FactorResult};
use nalgebra::{DMatrix, DVector, SMatrix};
use std::f64::consts::{PI, TAU};

/// Smallest distance used by range residuals; below it the prediction is clamped and the
/// range Jacobian is zero.
pub const MIN_RANGE: f64 = 1e-6;

/// Default step for central finite differences.
pub const FINITE_DIFFERENCE_STEP: f64 = 1e-6;

/// Wrap an angle to (-π, π]. NaN stays NaN.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Clamp a predicted distance to at least [`MIN_RANGE`]. NaN stays NaN.
pub fn floor_range(distance: f64) -> f64 {
    if distance < MIN_RANGE {
        MIN_RANGE
    } else {
        distance
    }
}

pub(crate) fn to_dmatrix<const R: usize, const C: usize>(
    matrix: &SMatrix<f64, R, C>,
) -> DMatrix<f64> {
    DMatrix::from_column_slice(R, C, matrix.as_slice())
}

/// Central-difference Jacobian of `factor`'s residual with respect to right tangent
/// perturbations of each block, stacked in block order.
///
/// The result has the same layout as the Jacobian returned by [`Factor::linearize`].
pub fn numerical_jacobian(
    factor: &dyn Factor,
    params: &[DVector<f64>],
    step: f64,
) -> FactorResult<DMatrix<f64>> {
    let blocks = factor.parameter_blocks();
    if params.len() != blocks.len() {
        return Err(FactorError::InvalidBlockCount {
            expected: blocks.len(),
            actual: params.len(),
        }
        .log());
    }
    if !(step.is_finite() && step > 0.0) {
        return Err(FactorError::InvalidParameters(format!(
            "finite difference step must be positive, got {step}"
        ))
        .log());
    }

    let total_dof: usize = blocks.iter().map(|b| b.tangent_size()).sum();
    let mut jacobian = DMatrix::zeros(factor.get_dimension(), total_dof);
    let mut column = 0;

    for (index, block) in blocks.iter().enumerate() {
        for k in 0..block.tangent_size() {
            let mut delta = vec![0.0; block.tangent_size()];

            delta[k] = step;
            let mut forward = params.to_vec();
            forward[index] = block.plus(params[index].as_slice(), &delta)?;

            delta[k] = -step;
            let mut backward = params.to_vec();
            backward[index] = block.plus(params[index].as_slice(), &delta)?;

            let (residual_forward, _) = factor.linearize(&forward, false);
            let (residual_backward, _) = factor.linearize(&backward, false);

            jacobian.set_column(column, &((residual_forward - residual_backward) / (2.0 * step)));
            column += 1;
        }
    }

    Ok(jacobian)
}
