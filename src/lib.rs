//! # Pose Factors
//!
//! Lie-group parameterizations and analytic-Jacobian residual functions for pose estimation
//! and sensor calibration with nonlinear least-squares solvers.
//!
//! ## Features
//!
//! - **Manifold parameterizations**: SO(2), SE(2), SO(3), SE(3) and Rⁿ parameter blocks with
//!   `plus`/`minus` steps and tangent-to-ambient Jacobian lifting
//! - **Pose factors**: absolute attitude, relative SE(3) pose, range and altitude
//! - **Landmark factors**: range-bearing to 2D landmarks with heading error estimation
//! - **Calibration factors**: attitude stream time offset, SO(3)/SE(3) mounting offsets
//! - **Noise models**: covariance or information matrices, whitened residuals
//!
//! ## Conventions
//!
//! Every tangent step is a right perturbation, `x ⊞ δ = x ∘ Exp(δ)`. Quaternions are stored
//! scalar-first and SE(3) tangents are ordered `[ρ, θ]`, translation first.
//!
//! ## Example
//!
//! ```
//! use pose_factors::factors::{Factor, NoiseModel, RelSE3Factor};
//! use pose_factors::manifold::{LieGroup, se3::SE3};
//!
//! let measured = SE3::from_translation_euler(1.0, 0.0, 0.0, 0.0, 0.0, 0.1);
//! let factor = RelSE3Factor::new(measured, NoiseModel::isotropic(6, 0.1)?)?;
//!
//! let a = SE3::identity().to_ambient();
//! let b = SE3::from_translation_euler(1.0, 0.0, 0.0, 0.0, 0.0, 0.1).to_ambient();
//! let evaluation = factor.evaluate(&[a.as_slice(), b.as_slice()], true)?;
//! assert!(evaluation.residual.norm() < 1e-9);
//! # Ok::<(), pose_factors::PoseFactorsError>(())
//! ```

pub mod error;
pub mod factors;
#[cfg(feature = "logging")]
pub mod logger;
pub mod manifold;
pub mod numeric;

pub use error::{PoseFactorsError, PoseFactorsResult};
pub use factors::{Evaluation, Factor, FactorError, FactorResult, NoiseModel};
#[cfg(feature = "logging")]
pub use logger::{init_logger, init_logger_with_level};
pub use manifold::{LieGroup, Parameterization, Tangent};
