//! Gaussian noise models for residual whitening.
//!
//! A noise model stores the square-root information matrix `W`, with `WᵀW = Σ⁻¹`. Factors
//! multiply their raw residual and Jacobian by `W`, so the squared norm of the whitened
//! residual is the Mahalanobis distance of the raw error.

use super::{FactorError, FactorResult};
use nalgebra::{DMatrix, DVector, linalg::Cholesky};

/// Relative asymmetry tolerated in covariance and information matrices.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Gaussian noise model represented by its square-root information matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseModel {
    sqrt_information: DMatrix<f64>,
}

impl NoiseModel {
    /// Same standard deviation on every component: `W = I / σ`.
    pub fn isotropic(dim: usize, sigma: f64) -> FactorResult<Self> {
        Self::from_sigmas(&vec![sigma; dim])
    }

    /// Independent components with the given standard deviations: `W = diag(1/σᵢ)`.
    pub fn from_sigmas(sigmas: &[f64]) -> FactorResult<Self> {
        if sigmas.is_empty() {
            return Err(FactorError::InvalidNoiseModel("no dimensions".to_string()).log());
        }
        if let Some(sigma) = sigmas.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(FactorError::InvalidNoiseModel(format!(
                "standard deviation must be positive and finite, got {sigma}"
            ))
            .log());
        }
        let inverse: Vec<f64> = sigmas.iter().map(|s| 1.0 / s).collect();
        Ok(NoiseModel {
            sqrt_information: DMatrix::from_diagonal(&DVector::from_vec(inverse)),
        })
    }

    /// From a covariance `Σ = LLᵀ`; the whitening matrix is `L⁻¹`.
    pub fn from_covariance(covariance: DMatrix<f64>) -> FactorResult<Self> {
        let lower = cholesky_factor(covariance, "covariance")?;
        let sqrt_information = lower.try_inverse().ok_or_else(|| {
            FactorError::InvalidNoiseModel("covariance factor is singular".to_string()).log()
        })?;
        Ok(NoiseModel { sqrt_information })
    }

    /// From an information matrix `Λ = LLᵀ`; the whitening matrix is `Lᵀ`.
    pub fn from_information(information: DMatrix<f64>) -> FactorResult<Self> {
        let lower = cholesky_factor(information, "information")?;
        Ok(NoiseModel {
            sqrt_information: lower.transpose(),
        })
    }

    /// Residual dimension the model applies to.
    pub fn dim(&self) -> usize {
        self.sqrt_information.nrows()
    }

    pub fn sqrt_information(&self) -> &DMatrix<f64> {
        &self.sqrt_information
    }

    /// Information matrix `WᵀW`.
    pub fn information(&self) -> DMatrix<f64> {
        self.sqrt_information.transpose() * &self.sqrt_information
    }

    pub fn whiten(&self, residual: &DVector<f64>) -> DVector<f64> {
        &self.sqrt_information * residual
    }

    pub fn whiten_jacobian(&self, jacobian: &DMatrix<f64>) -> DMatrix<f64> {
        &self.sqrt_information * jacobian
    }

    /// Check that the model matches a factor's residual dimension.
    pub(crate) fn require_dim(&self, expected: usize, factor: &str) -> FactorResult<()> {
        if self.dim() != expected {
            return Err(FactorError::InvalidNoiseModel(format!(
                "{factor} expects a {expected}-dimensional noise model, got {}",
                self.dim()
            ))
            .log());
        }
        Ok(())
    }
}

fn cholesky_factor(matrix: DMatrix<f64>, kind: &str) -> FactorResult<DMatrix<f64>> {
    if matrix.is_empty() || !matrix.is_square() {
        return Err(FactorError::InvalidNoiseModel(format!(
            "{kind} matrix must be square and non-empty, got {}x{}",
            matrix.nrows(),
            matrix.ncols()
        ))
        .log());
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(
            FactorError::InvalidNoiseModel(format!("{kind} matrix has non-finite entries")).log(),
        );
    }
    let scale = matrix.amax().max(1.0);
    if (&matrix - matrix.transpose()).amax() > SYMMETRY_TOLERANCE * scale {
        return Err(
            FactorError::InvalidNoiseModel(format!("{kind} matrix is not symmetric")).log(),
        );
    }
    Cholesky::new(matrix).map(|c| c.l()).ok_or_else(|| {
        FactorError::InvalidNoiseModel(format!("{kind} matrix is not positive definite")).log()
    })
}
