//! Residual functions for pose estimation and sensor calibration.
//!
//! Each factor turns a measurement and the current values of its parameter blocks into a
//! whitened residual vector and its analytic Jacobian. Whitening uses the factor's
//! [`NoiseModel`], so a solver minimizing
//!
//! ```text
//! minimize Σ_i ||r_i(x)||²
//! ```
//!
//! is maximizing the likelihood under Gaussian measurement noise.
//!
//! # Factor Types
//!
//! ## Attitude and pose
//! - [`SO3Factor`]: Absolute attitude measurement
//! - [`RelSE3Factor`]: Relative pose between two SE(3) blocks
//!
//! ## Scalar measurements
//! - [`RangeFactor`]: Distance from a pose to a fixed anchor or a landmark block
//! - [`AltitudeFactor`]: Height of a pose, optionally with an estimated bias
//!
//! ## Planar landmarks
//! - [`RangeBearing2DFactor`]: Range and bearing from a known 2D pose with a heading error
//!
//! ## Calibration
//! - [`TimeSyncAttFactor`]: Time offset between two attitude streams
//! - [`SO3OffsetFactor`] / [`SE3OffsetFactor`]: Mounting offset between a sensor and a reference
//!
//! # Linearization
//!
//! [`Factor::linearize`] works on the tangent space: the Jacobian has one column per degree of
//! freedom of each block, stacked in block order. [`Factor::evaluate`] is the solver-facing
//! entry point on flat ambient parameter blocks; it validates the input and returns one
//! ambient Jacobian per block, lifted through the block's [`Parameterization`].
//!
//! All Jacobians are derived for right perturbations, `x ⊞ δ = x ∘ Exp(δ)`.

use crate::manifold::{ManifoldError, PERTURBATION, Parameterization, Perturbation};
use nalgebra::{DMatrix, DVector};
use thiserror::Error;
use tracing::error;

pub mod altitude_factor;
pub mod noise_model;
pub mod offset_factors;
pub mod range_bearing_2d_factor;
pub mod range_factor;
pub mod rel_se3_factor;
pub mod so3_factor;
pub mod time_sync_att_factor;

pub use altitude_factor::{AltFactor, AltitudeFactor};
pub use noise_model::NoiseModel;
pub use offset_factors::{SE3OffsetFactor, SO3OffsetFactor};
pub use range_bearing_2d_factor::RangeBearing2DFactor;
pub use range_factor::RangeFactor;
pub use rel_se3_factor::RelSE3Factor;
pub use so3_factor::SO3Factor;
pub use time_sync_att_factor::TimeSyncAttFactor;

const _: () = assert!(
    matches!(PERTURBATION, Perturbation::Right),
    "factor Jacobians are derived for right perturbations"
);

/// Factor-specific error types
#[derive(Debug, Clone, Error)]
pub enum FactorError {
    /// Invalid dimension mismatch between expected and actual
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    /// Wrong number of parameter blocks passed to a factor
    #[error("Invalid parameter block count: expected {expected}, got {actual}")]
    InvalidBlockCount { expected: usize, actual: usize },

    /// Noise model is not a valid square root information matrix
    #[error("Invalid noise model: {0}")]
    InvalidNoiseModel(String),

    /// Invalid parameter values
    #[error("Invalid parameter values: {0}")]
    InvalidParameters(String),

    /// Manifold operation on a parameter block failed
    #[error(transparent)]
    Manifold(#[from] ManifoldError),
}

impl FactorError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// operation()
    ///     .map_err(|e| FactorError::from(e).log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error together with the underlying error that caused it
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for factor operations
pub type FactorResult<T> = Result<T, FactorError>;

/// Residual and per-block ambient Jacobians returned by [`Factor::evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Whitened residual
    pub residual: DVector<f64>,
    /// One `residual_dim × ambient_size` matrix per parameter block, when requested
    pub jacobians: Option<Vec<DMatrix<f64>>>,
}

/// A residual function over one or more parameter blocks.
///
/// # Thread Safety
///
/// Factors are immutable after construction and must be `Send + Sync`, so a solver can
/// evaluate them from several threads at once.
///
/// # Example
///
/// ```
/// use pose_factors::factors::{Factor, RangeFactor};
/// use nalgebra::{DVector, Vector3};
///
/// let factor = RangeFactor::new(5.0, 0.1, Vector3::zeros()).unwrap();
/// let pose = DVector::from_vec(vec![3.0, 4.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
///
/// let (residual, jacobian) = factor.linearize(&[pose], true);
/// assert!(residual[0].abs() < 1e-12);
/// assert_eq!(jacobian.unwrap().shape(), (1, 6));
/// ```
pub trait Factor: Send + Sync {
    /// Compute the whitened residual and tangent-space Jacobian.
    ///
    /// # Arguments
    ///
    /// * `params` - One ambient vector per parameter block, in [`Factor::parameter_blocks`] order
    /// * `compute_jacobian` - Whether to compute the Jacobian matrix
    ///
    /// # Returns
    ///
    /// Tuple `(residual, jacobian)` where:
    /// - `residual`: whitened error vector of length [`Factor::get_dimension`]
    /// - `jacobian`: residual_dim × Σ tangent_size, blocks stacked left to right
    ///
    /// Block sizes are not checked here; use [`Factor::evaluate`] on untrusted input.
    fn linearize(
        &self,
        params: &[DVector<f64>],
        compute_jacobian: bool,
    ) -> (DVector<f64>, Option<DMatrix<f64>>);

    /// Get the dimension of the residual vector.
    fn get_dimension(&self) -> usize;

    /// Parameterizations of the blocks this factor depends on, in order.
    fn parameter_blocks(&self) -> Vec<Parameterization>;

    /// Evaluate on flat ambient parameter blocks.
    ///
    /// Returns `FactorError::InvalidBlockCount` or `FactorError::InvalidDimension` on
    /// malformed input. Jacobians, when requested, are taken with respect to the ambient
    /// coordinates of each block.
    fn evaluate(&self, params: &[&[f64]], compute_jacobians: bool) -> FactorResult<Evaluation> {
        let blocks = self.parameter_blocks();
        if params.len() != blocks.len() {
            return Err(FactorError::InvalidBlockCount {
                expected: blocks.len(),
                actual: params.len(),
            }
            .log());
        }
        for (block, data) in blocks.iter().zip(params) {
            if data.len() != block.ambient_size() {
                return Err(FactorError::InvalidDimension {
                    expected: block.ambient_size(),
                    actual: data.len(),
                }
                .log());
            }
        }

        let values: Vec<DVector<f64>> = params
            .iter()
            .map(|data| DVector::from_column_slice(data))
            .collect();
        let (residual, jacobian) = self.linearize(&values, compute_jacobians);

        let jacobians = match jacobian {
            Some(stacked) => {
                let mut lifted = Vec::with_capacity(blocks.len());
                let mut offset = 0;
                for (block, data) in blocks.iter().zip(params) {
                    let dof = block.tangent_size();
                    let tangent_jacobian = stacked.columns(offset, dof).into_owned();
                    lifted.push(block.lift_jacobian(data, &tangent_jacobian)?);
                    offset += dof;
                }
                Some(lifted)
            }
            None => None,
        };

        Ok(Evaluation {
            residual,
            jacobians,
        })
    }
}
