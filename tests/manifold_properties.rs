//! Properties every parameterization must satisfy for a solver to use it.

mod common;

use common::{TestResult, random_vector};
use nalgebra::{DMatrix, DVector, UnitQuaternion, Vector3};
use pose_factors::Parameterization;
use pose_factors::manifold::ManifoldError;
use rand::{SeedableRng, rngs::StdRng};

const STEP: f64 = 1e-6;

fn all_parameterizations() -> [Parameterization; 6] {
    [
        Parameterization::euclidean(1),
        Parameterization::euclidean(4),
        Parameterization::so2(),
        Parameterization::se2(),
        Parameterization::so3(),
        Parameterization::se3(),
    ]
}

fn random_point(parameterization: &Parameterization, rng: &mut StdRng) -> TestResult<DVector<f64>> {
    let delta = random_vector(rng, parameterization.tangent_size(), 1.5);
    Ok(parameterization.plus(parameterization.identity().as_slice(), delta.as_slice())?)
}

#[test]
fn test_plus_jacobian_matches_central_differences() -> TestResult {
    let mut rng = StdRng::seed_from_u64(21);
    for parameterization in all_parameterizations() {
        for _ in 0..5 {
            let x = random_point(&parameterization, &mut rng)?;
            let analytic = parameterization.plus_jacobian(x.as_slice())?;
            assert_eq!(
                analytic.shape(),
                (parameterization.ambient_size(), parameterization.tangent_size())
            );

            let mut numeric =
                DMatrix::zeros(parameterization.ambient_size(), parameterization.tangent_size());
            for k in 0..parameterization.tangent_size() {
                let mut delta = vec![0.0; parameterization.tangent_size()];
                delta[k] = STEP;
                let forward = parameterization.plus(x.as_slice(), &delta)?;
                delta[k] = -STEP;
                let backward = parameterization.plus(x.as_slice(), &delta)?;
                numeric.set_column(k, &((forward - backward) / (2.0 * STEP)));
            }

            assert!(
                (&analytic - &numeric).amax() < 1e-8,
                "{parameterization}: {analytic} vs {numeric}"
            );
        }
    }
    Ok(())
}

#[test]
fn test_pseudo_inverse_is_left_inverse() -> TestResult {
    let mut rng = StdRng::seed_from_u64(22);
    for parameterization in all_parameterizations() {
        let x = random_point(&parameterization, &mut rng)?;
        let product = parameterization.plus_jacobian_pinv(x.as_slice())?
            * parameterization.plus_jacobian(x.as_slice())?;
        let dof = parameterization.tangent_size();
        assert!((product - DMatrix::identity(dof, dof)).amax() < 1e-12, "{parameterization}");
    }
    Ok(())
}

#[test]
fn test_minus_inverts_plus() -> TestResult {
    let mut rng = StdRng::seed_from_u64(23);
    for parameterization in all_parameterizations() {
        for _ in 0..5 {
            let x = random_point(&parameterization, &mut rng)?;
            let delta = random_vector(&mut rng, parameterization.tangent_size(), 0.8);
            let y = parameterization.plus(x.as_slice(), delta.as_slice())?;
            let recovered = parameterization.minus(y.as_slice(), x.as_slice())?;
            assert!((recovered - &delta).amax() < 1e-9, "{parameterization}");

            let zero = parameterization.minus(x.as_slice(), x.as_slice())?;
            assert!(zero.amax() < 1e-12);
        }
    }
    Ok(())
}

#[test]
fn test_minus_inverts_plus_for_tiny_steps() -> TestResult {
    let mut rng = StdRng::seed_from_u64(26);
    for parameterization in [
        Parameterization::so2(),
        Parameterization::se2(),
        Parameterization::so3(),
        Parameterization::se3(),
    ] {
        for _ in 0..5 {
            // θ² stays below the small-angle threshold
            let delta = random_vector(&mut rng, parameterization.tangent_size(), 5e-5);
            let identity = parameterization.identity();
            let y = parameterization.plus(identity.as_slice(), delta.as_slice())?;
            let recovered = parameterization.minus(y.as_slice(), identity.as_slice())?;
            let error = (&recovered - &delta).amax();
            assert!(
                error < 1e-12 * delta.amax(),
                "{parameterization}: error {error:e} for step {delta}"
            );

            let x = random_point(&parameterization, &mut rng)?;
            let y = parameterization.plus(x.as_slice(), delta.as_slice())?;
            let recovered = parameterization.minus(y.as_slice(), x.as_slice())?;
            assert!((recovered - &delta).amax() < 1e-13, "{parameterization}");
        }
    }
    Ok(())
}

#[test]
fn test_so3_tiny_step_matches_scaled_axis() -> TestResult {
    let axis_angle = Vector3::new(4e-5, -2e-5, 1e-5);
    let stepped = Parameterization::so3().plus(&[1.0, 0.0, 0.0, 0.0], axis_angle.as_slice())?;
    let exact = UnitQuaternion::from_scaled_axis(axis_angle);
    let expected = [exact.w, exact.i, exact.j, exact.k];

    for (value, want) in stepped.iter().zip(expected) {
        assert!((value - want).abs() < 1e-14 * want.abs().max(1e-5), "{stepped}");
    }
    Ok(())
}

#[test]
fn test_plus_zero_is_exact() -> TestResult {
    let mut rng = StdRng::seed_from_u64(24);
    for parameterization in all_parameterizations() {
        let x = random_point(&parameterization, &mut rng)?;
        let zero = vec![0.0; parameterization.tangent_size()];
        assert_eq!(parameterization.plus(x.as_slice(), &zero)?, x, "{parameterization}");
    }
    Ok(())
}

#[test]
fn test_long_step_sequences_stay_on_manifold() -> TestResult {
    let mut rng = StdRng::seed_from_u64(25);
    for parameterization in [
        Parameterization::so2(),
        Parameterization::se2(),
        Parameterization::so3(),
        Parameterization::se3(),
    ] {
        let mut x = parameterization.identity();
        for _ in 0..2000 {
            let delta = random_vector(&mut rng, parameterization.tangent_size(), 0.3);
            x = parameterization.plus(x.as_slice(), delta.as_slice())?;
        }

        let rotation_start = parameterization.ambient_size()
            - match parameterization {
                Parameterization::SO2 | Parameterization::SE2 => 2,
                _ => 4,
            };
        let norm = x.rows(rotation_start, x.len() - rotation_start).norm();
        assert!((norm - 1.0).abs() < 1e-11, "{parameterization}: norm {norm}");
    }
    Ok(())
}

#[test]
fn test_normalize_projects_drifted_blocks() -> TestResult {
    let drifted = Parameterization::se3().normalize(&[1.0, 2.0, 3.0, 2.0, 0.0, 0.0, 0.0])?;
    assert_eq!(drifted.as_slice(), &[1.0, 2.0, 3.0, 1.0, 0.0, 0.0, 0.0]);

    let planar = Parameterization::so2().normalize(&[0.0, -3.0])?;
    assert_eq!(planar.as_slice(), &[0.0, -1.0]);
    Ok(())
}

#[test]
fn test_block_size_errors() {
    let so3 = Parameterization::so3();
    assert!(matches!(
        so3.plus(&[1.0, 0.0, 0.0, 0.0], &[0.1, 0.2]),
        Err(ManifoldError::InvalidTangentDimension {
            expected: 3,
            actual: 2
        })
    ));
    assert!(matches!(
        Parameterization::se2().minus(&[0.0; 4], &[0.0; 3]),
        Err(ManifoldError::DimensionMismatch {
            expected: 4,
            actual: 3
        })
    ));
    assert!(matches!(
        so3.lift_jacobian(&[1.0, 0.0, 0.0, 0.0], &DMatrix::zeros(2, 4)),
        Err(ManifoldError::JacobianShape {
            expected: 3,
            actual: 4
        })
    ));
}

#[test]
fn test_nan_propagates_through_plus() -> TestResult {
    let result = Parameterization::so3().plus(&[1.0, 0.0, 0.0, 0.0], &[f64::NAN, 0.0, 0.0])?;
    assert!(result.iter().any(|v| v.is_nan()));
    Ok(())
}
