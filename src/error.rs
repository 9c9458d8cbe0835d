//! Top-level error type for the pose-factors library
//!
//! Module errors ([`ManifoldError`], [`FactorError`]) are wrapped transparently so callers
//! that mix parameterization and factor calls can use a single `?` chain:
//!
//! ```text
//! PoseFactorsError::Factor(
//!     FactorError::InvalidNoiseModel("covariance matrix is not positive definite")
//! )
//! ```

use crate::{factors::FactorError, manifold::ManifoldError};
use std::error::Error as StdError;
use thiserror::Error;

/// Main result type used throughout the library
pub type PoseFactorsResult<T> = Result<T, PoseFactorsError>;

/// Main error type for the library
#[derive(Debug, Error)]
pub enum PoseFactorsError {
    /// Parameterization and group operation errors
    #[error(transparent)]
    Manifold(#[from] ManifoldError),

    /// Factor construction and evaluation errors
    #[error(transparent)]
    Factor(#[from] FactorError),
}

impl PoseFactorsError {
    /// Full error chain, one cause per line.
    ///
    /// ```rust,ignore
    /// if let Err(e) = factor.evaluate(&blocks, true) {
    ///     warn!("Evaluation failed:\n{}", PoseFactorsError::from(e).chain());
    /// }
    /// ```
    pub fn chain(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(format!("  → {}", err));
            source = err.source();
        }

        chain.join("\n")
    }

    /// Single-line error chain for log messages
    pub fn chain_compact(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }

        chain.join(" → ")
    }
}
