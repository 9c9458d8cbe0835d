//! Local parameterizations of solver parameter blocks.
//!
//! A [`Parameterization`] describes how an optimizer should treat a flat parameter block:
//! its ambient size, the dimension of its tangent space, how to apply a tangent step
//! (`plus`), how to measure the tangent difference between two blocks (`minus`), and how
//! tangent-space Jacobians map to Jacobians with respect to the ambient coordinates.
//!
//! Steps follow the global [`PERTURBATION`](crate::manifold::PERTURBATION) convention.

use crate::manifold::{
    LieGroup, ManifoldError, ManifoldResult, Tangent, se2::SE2, se3::SE3, so2::SO2, so3::SO3,
};
use nalgebra::{DMatrix, DVector};
use std::fmt;

/// Manifold structure of a parameter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameterization {
    /// Plain vector space Rⁿ
    Euclidean(usize),
    /// `[cos θ, sin θ]`
    SO2,
    /// `[x, y, cos θ, sin θ]`
    SE2,
    /// `[qw, qx, qy, qz]`
    SO3,
    /// `[tx, ty, tz, qw, qx, qy, qz]`
    SE3,
}

impl fmt::Display for Parameterization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameterization::Euclidean(dim) => write!(f, "R{dim}"),
            Parameterization::SO2 => write!(f, "SO2"),
            Parameterization::SE2 => write!(f, "SE2"),
            Parameterization::SO3 => write!(f, "SO3"),
            Parameterization::SE3 => write!(f, "SE3"),
        }
    }
}

impl Parameterization {
    pub fn euclidean(dim: usize) -> Self {
        Parameterization::Euclidean(dim)
    }

    pub fn so2() -> Self {
        Parameterization::SO2
    }

    pub fn se2() -> Self {
        Parameterization::SE2
    }

    pub fn so3() -> Self {
        Parameterization::SO3
    }

    pub fn se3() -> Self {
        Parameterization::SE3
    }

    /// Length of the flat parameter block.
    pub fn ambient_size(&self) -> usize {
        match self {
            Parameterization::Euclidean(dim) => *dim,
            Parameterization::SO2 => SO2::REP_SIZE,
            Parameterization::SE2 => SE2::REP_SIZE,
            Parameterization::SO3 => SO3::REP_SIZE,
            Parameterization::SE3 => SE3::REP_SIZE,
        }
    }

    /// Degrees of freedom of the block.
    pub fn tangent_size(&self) -> usize {
        match self {
            Parameterization::Euclidean(dim) => *dim,
            Parameterization::SO2 => SO2::DOF,
            Parameterization::SE2 => SE2::DOF,
            Parameterization::SO3 => SO3::DOF,
            Parameterization::SE3 => SE3::DOF,
        }
    }

    /// Apply a tangent step: x ⊞ δ.
    ///
    /// `plus(x, 0)` returns `x` exactly when `x` is already normalized.
    pub fn plus(&self, x: &[f64], delta: &[f64]) -> ManifoldResult<DVector<f64>> {
        self.check_ambient(x)?;
        self.check_tangent(delta)?;
        Ok(match self {
            Parameterization::Euclidean(_) => {
                DVector::from_iterator(x.len(), x.iter().zip(delta).map(|(a, b)| a + b))
            }
            Parameterization::SO2 => plus_on::<SO2>(x, delta),
            Parameterization::SE2 => plus_on::<SE2>(x, delta),
            Parameterization::SO3 => plus_on::<SO3>(x, delta),
            Parameterization::SE3 => plus_on::<SE3>(x, delta),
        })
    }

    /// Tangent difference x ⊟ y, the inverse of [`Parameterization::plus`].
    pub fn minus(&self, x: &[f64], y: &[f64]) -> ManifoldResult<DVector<f64>> {
        self.check_ambient(x)?;
        self.check_ambient(y)?;
        Ok(match self {
            Parameterization::Euclidean(_) => {
                DVector::from_iterator(x.len(), x.iter().zip(y).map(|(a, b)| a - b))
            }
            Parameterization::SO2 => minus_on::<SO2>(x, y),
            Parameterization::SE2 => minus_on::<SE2>(x, y),
            Parameterization::SO3 => minus_on::<SO3>(x, y),
            Parameterization::SE3 => minus_on::<SE3>(x, y),
        })
    }

    /// ∂(x ⊞ δ)/∂δ at δ = 0 (ambient × tangent).
    pub fn plus_jacobian(&self, x: &[f64]) -> ManifoldResult<DMatrix<f64>> {
        self.check_ambient(x)?;
        Ok(match self {
            Parameterization::Euclidean(dim) => DMatrix::identity(*dim, *dim),
            Parameterization::SO2 => SO2::from_ambient(x).plus_jacobian(),
            Parameterization::SE2 => SE2::from_ambient(x).plus_jacobian(),
            Parameterization::SO3 => SO3::from_ambient(x).plus_jacobian(),
            Parameterization::SE3 => SE3::from_ambient(x).plus_jacobian(),
        })
    }

    /// Left pseudo-inverse of [`Parameterization::plus_jacobian`] (tangent × ambient).
    pub fn plus_jacobian_pinv(&self, x: &[f64]) -> ManifoldResult<DMatrix<f64>> {
        self.check_ambient(x)?;
        Ok(match self {
            Parameterization::Euclidean(dim) => DMatrix::identity(*dim, *dim),
            Parameterization::SO2 => SO2::from_ambient(x).plus_jacobian_pinv(),
            Parameterization::SE2 => SE2::from_ambient(x).plus_jacobian_pinv(),
            Parameterization::SO3 => SO3::from_ambient(x).plus_jacobian_pinv(),
            Parameterization::SE3 => SE3::from_ambient(x).plus_jacobian_pinv(),
        })
    }

    /// Convert a Jacobian with respect to the tangent space at `x` into one with respect to
    /// the ambient coordinates, such that `lifted * plus_jacobian(x) == tangent_jacobian`.
    pub fn lift_jacobian(
        &self,
        x: &[f64],
        tangent_jacobian: &DMatrix<f64>,
    ) -> ManifoldResult<DMatrix<f64>> {
        if tangent_jacobian.ncols() != self.tangent_size() {
            return Err(ManifoldError::JacobianShape {
                expected: self.tangent_size(),
                actual: tangent_jacobian.ncols(),
            });
        }
        if let Parameterization::Euclidean(_) = self {
            self.check_ambient(x)?;
            return Ok(tangent_jacobian.clone());
        }
        Ok(tangent_jacobian * self.plus_jacobian_pinv(x)?)
    }

    /// Project an ambient block back onto the manifold.
    pub fn normalize(&self, x: &[f64]) -> ManifoldResult<DVector<f64>> {
        self.check_ambient(x)?;
        Ok(match self {
            Parameterization::Euclidean(_) => DVector::from_column_slice(x),
            Parameterization::SO2 => normalized::<SO2>(x),
            Parameterization::SE2 => normalized::<SE2>(x),
            Parameterization::SO3 => normalized::<SO3>(x),
            Parameterization::SE3 => normalized::<SE3>(x),
        })
    }

    /// Ambient representation of the identity element (zero for Rⁿ).
    pub fn identity(&self) -> DVector<f64> {
        match self {
            Parameterization::Euclidean(dim) => DVector::zeros(*dim),
            Parameterization::SO2 => SO2::identity().to_ambient(),
            Parameterization::SE2 => SE2::identity().to_ambient(),
            Parameterization::SO3 => SO3::identity().to_ambient(),
            Parameterization::SE3 => SE3::identity().to_ambient(),
        }
    }

    fn check_ambient(&self, x: &[f64]) -> ManifoldResult<()> {
        if x.len() != self.ambient_size() {
            return Err(ManifoldError::DimensionMismatch {
                expected: self.ambient_size(),
                actual: x.len(),
            });
        }
        Ok(())
    }

    fn check_tangent(&self, delta: &[f64]) -> ManifoldResult<()> {
        if delta.len() != self.tangent_size() {
            return Err(ManifoldError::InvalidTangentDimension {
                expected: self.tangent_size(),
                actual: delta.len(),
            });
        }
        Ok(())
    }
}

fn plus_on<G: LieGroup>(x: &[f64], delta: &[f64]) -> DVector<f64> {
    let group = G::from_ambient(x);
    let tangent = G::TangentVector::from_slice(delta);
    group.plus(&tangent, None, None).to_ambient()
}

fn minus_on<G: LieGroup>(x: &[f64], y: &[f64]) -> DVector<f64> {
    G::from_ambient(x)
        .minus(&G::from_ambient(y), None, None)
        .to_vector()
}

fn normalized<G: LieGroup>(x: &[f64]) -> DVector<f64> {
    let mut group = G::from_ambient(x);
    group.normalize();
    group.to_ambient()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Parameterization; 5] = [
        Parameterization::Euclidean(3),
        Parameterization::SO2,
        Parameterization::SE2,
        Parameterization::SO3,
        Parameterization::SE3,
    ];

    fn sample(parameterization: &Parameterization) -> DVector<f64> {
        match parameterization {
            Parameterization::Euclidean(dim) => DVector::from_fn(*dim, |i, _| i as f64 - 0.5),
            Parameterization::SO2 => SO2::random().to_ambient(),
            Parameterization::SE2 => SE2::random().to_ambient(),
            Parameterization::SO3 => SO3::random().to_ambient(),
            Parameterization::SE3 => SE3::random().to_ambient(),
        }
    }

    #[test]
    fn test_sizes() {
        let sizes: Vec<(usize, usize)> = ALL
            .iter()
            .map(|p| (p.ambient_size(), p.tangent_size()))
            .collect();
        assert_eq!(sizes, vec![(3, 3), (2, 1), (4, 3), (4, 3), (7, 6)]);
    }

    #[test]
    fn test_plus_zero_is_exact() -> Result<(), Box<dyn std::error::Error>> {
        for parameterization in ALL {
            let x = sample(&parameterization);
            let zero = vec![0.0; parameterization.tangent_size()];
            let result = parameterization.plus(x.as_slice(), &zero)?;
            assert_eq!(result, x, "{parameterization}");
        }
        Ok(())
    }

    #[test]
    fn test_plus_minus_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        for parameterization in ALL {
            let x = sample(&parameterization);
            let delta: Vec<f64> = (0..parameterization.tangent_size())
                .map(|i| 0.1 * (i as f64 + 1.0))
                .collect();
            let moved = parameterization.plus(x.as_slice(), &delta)?;
            let recovered = parameterization.minus(moved.as_slice(), x.as_slice())?;
            let error = (recovered - DVector::from_vec(delta)).norm();
            assert!(error < 1e-10, "{parameterization}: {error}");
        }
        Ok(())
    }

    #[test]
    fn test_so3_plus_jacobian_at_identity() -> Result<(), Box<dyn std::error::Error>> {
        let jacobian = Parameterization::so3().plus_jacobian(&[1.0, 0.0, 0.0, 0.0])?;
        let expected = DMatrix::from_row_slice(
            4,
            3,
            &[0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.5],
        );
        assert_eq!(jacobian, expected);
        Ok(())
    }

    #[test]
    fn test_so3_plus_quarter_turn() -> Result<(), Box<dyn std::error::Error>> {
        let result = Parameterization::so3().plus(
            &[1.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, std::f64::consts::FRAC_PI_2],
        )?;
        let half = std::f64::consts::FRAC_1_SQRT_2;
        assert!((result[0] - half).abs() < 1e-12);
        assert!((result[3] - half).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_lift_jacobian_recovers_tangent_jacobian() -> Result<(), Box<dyn std::error::Error>> {
        for parameterization in ALL {
            let x = sample(&parameterization);
            let tangent_jacobian = DMatrix::from_fn(2, parameterization.tangent_size(), |i, j| {
                (i * 3 + j) as f64 - 1.5
            });
            let lifted = parameterization.lift_jacobian(x.as_slice(), &tangent_jacobian)?;
            let recovered = &lifted * parameterization.plus_jacobian(x.as_slice())?;
            assert!((recovered - &tangent_jacobian).norm() < 1e-12, "{parameterization}");
        }
        Ok(())
    }

    #[test]
    fn test_dimension_errors() {
        let result = Parameterization::se3().plus(&[0.0; 6], &[0.0; 6]);
        assert_eq!(
            result,
            Err(ManifoldError::DimensionMismatch {
                expected: 7,
                actual: 6
            })
        );

        let result = Parameterization::so2().plus(&[1.0, 0.0], &[0.0, 0.0]);
        assert_eq!(
            result,
            Err(ManifoldError::InvalidTangentDimension {
                expected: 1,
                actual: 2
            })
        );

        let result = Parameterization::so3().lift_jacobian(&[1.0, 0.0, 0.0, 0.0], &DMatrix::zeros(3, 4));
        assert!(matches!(result, Err(ManifoldError::JacobianShape { .. })));
    }

    #[test]
    fn test_normalize_projects_quaternion() -> Result<(), Box<dyn std::error::Error>> {
        let normalized = Parameterization::so3().normalize(&[2.0, 0.0, 0.0, 0.0])?;
        assert_eq!(normalized.as_slice(), &[1.0, 0.0, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_plus_keeps_quaternion_unit_norm() -> Result<(), Box<dyn std::error::Error>> {
        let mut x = Parameterization::so3().identity();
        for _ in 0..1000 {
            x = Parameterization::so3().plus(x.as_slice(), &[0.013, -0.021, 0.007])?;
        }
        assert!((x.norm() - 1.0).abs() < 1e-12);
        Ok(())
    }
}
