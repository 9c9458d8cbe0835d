//! Dense Levenberg-Marquardt harness for end-to-end factor tests.
//!
//! Solvers own the flat parameter blocks and call [`Factor::evaluate`]; this harness does
//! the same, turning the ambient Jacobians back into tangent Jacobians with
//! `Parameterization::plus_jacobian` before each step.

#![allow(dead_code)]

use nalgebra::DVector;
use nalgebra::DMatrix;
use pose_factors::{Factor, Parameterization};
use rand::{Rng, rngs::StdRng};
use std::error::Error;

pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

/// Solver configuration
#[derive(Debug, Clone)]
pub struct LevenbergMarquardtConfig {
    pub max_iterations: usize,
    pub cost_tolerance: f64,
    pub damping: f64,
    pub damping_min: f64,
    pub damping_max: f64,
}

impl Default for LevenbergMarquardtConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            cost_tolerance: 1e-16,
            damping: 1e-3,
            damping_min: 1e-12,
            damping_max: 1e8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolverSummary {
    pub initial_cost: f64,
    pub final_cost: f64,
    pub iterations: usize,
}

struct Variable {
    value: DVector<f64>,
    parameterization: Parameterization,
    fixed: bool,
}

struct ResidualBlock {
    factor: Box<dyn Factor>,
    variables: Vec<usize>,
}

/// Least-squares problem over flat parameter blocks.
#[derive(Default)]
pub struct Problem {
    variables: Vec<Variable>,
    residual_blocks: Vec<ResidualBlock>,
}

impl Problem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, value: DVector<f64>, parameterization: Parameterization) -> usize {
        self.variables.push(Variable {
            value,
            parameterization,
            fixed: false,
        });
        self.variables.len() - 1
    }

    pub fn add_fixed_variable(
        &mut self,
        value: DVector<f64>,
        parameterization: Parameterization,
    ) -> usize {
        let index = self.add_variable(value, parameterization);
        self.variables[index].fixed = true;
        index
    }

    pub fn add_residual_block(&mut self, factor: impl Factor + 'static, variables: &[usize]) {
        self.residual_blocks.push(ResidualBlock {
            factor: Box::new(factor),
            variables: variables.to_vec(),
        });
    }

    pub fn value(&self, index: usize) -> &DVector<f64> {
        &self.variables[index].value
    }

    /// ½ Σ ‖r_i‖²
    pub fn cost(&self) -> Result<f64, Box<dyn Error>> {
        cost_of(&self.residual_blocks, &self.variables)
    }

    pub fn solve(
        &mut self,
        config: &LevenbergMarquardtConfig,
    ) -> Result<SolverSummary, Box<dyn Error>> {
        let mut offsets = vec![None; self.variables.len()];
        let mut total_dof = 0;
        for (index, variable) in self.variables.iter().enumerate() {
            if !variable.fixed {
                offsets[index] = Some(total_dof);
                total_dof += variable.parameterization.tangent_size();
            }
        }

        let initial_cost = self.cost()?;
        let mut cost = initial_cost;
        let mut damping = config.damping;
        let mut iterations = 0;

        while iterations < config.max_iterations && cost > config.cost_tolerance {
            iterations += 1;
            let (jacobian, residual) = self.linearize(&offsets, total_dof)?;
            let gradient = jacobian.transpose() * &residual;
            let hessian = jacobian.transpose() * &jacobian;

            loop {
                let damped = &hessian + DMatrix::identity(total_dof, total_dof) * damping;
                let step = damped
                    .cholesky()
                    .ok_or("damped normal equations are not positive definite")?
                    .solve(&(-&gradient));

                let candidate = self.stepped(&offsets, &step)?;
                let candidate_cost = cost_of(&self.residual_blocks, &candidate)?;

                if candidate_cost < cost {
                    self.variables = candidate;
                    cost = candidate_cost;
                    damping = (damping / 10.0).max(config.damping_min);
                    break;
                }

                damping *= 10.0;
                if damping > config.damping_max {
                    return Ok(SolverSummary {
                        initial_cost,
                        final_cost: cost,
                        iterations,
                    });
                }
            }
        }

        Ok(SolverSummary {
            initial_cost,
            final_cost: cost,
            iterations,
        })
    }

    fn linearize(
        &self,
        offsets: &[Option<usize>],
        total_dof: usize,
    ) -> Result<(DMatrix<f64>, DVector<f64>), Box<dyn Error>> {
        let total_residual: usize = self
            .residual_blocks
            .iter()
            .map(|block| block.factor.get_dimension())
            .sum();
        let mut jacobian = DMatrix::zeros(total_residual, total_dof);
        let mut residual = DVector::zeros(total_residual);

        let mut row = 0;
        for block in &self.residual_blocks {
            let params: Vec<&[f64]> = block
                .variables
                .iter()
                .map(|&index| self.variables[index].value.as_slice())
                .collect();
            let evaluation = block.factor.evaluate(&params, true)?;
            let block_jacobians = evaluation.jacobians.ok_or("jacobians requested")?;
            let dim = evaluation.residual.len();

            residual.rows_mut(row, dim).copy_from(&evaluation.residual);
            for (&index, ambient) in block.variables.iter().zip(&block_jacobians) {
                let Some(offset) = offsets[index] else {
                    continue;
                };
                let variable = &self.variables[index];
                let tangent =
                    ambient * variable.parameterization.plus_jacobian(variable.value.as_slice())?;
                let mut target = jacobian.view_mut((row, offset), (dim, tangent.ncols()));
                target += &tangent;
            }
            row += dim;
        }

        Ok((jacobian, residual))
    }

    fn stepped(
        &self,
        offsets: &[Option<usize>],
        step: &DVector<f64>,
    ) -> Result<Vec<Variable>, Box<dyn Error>> {
        let mut updated = Vec::with_capacity(self.variables.len());
        for (variable, offset) in self.variables.iter().zip(offsets) {
            let value = match offset {
                Some(offset) => {
                    let dof = variable.parameterization.tangent_size();
                    let delta = step.rows(*offset, dof).into_owned();
                    variable
                        .parameterization
                        .plus(variable.value.as_slice(), delta.as_slice())?
                }
                None => variable.value.clone(),
            };
            updated.push(Variable {
                value,
                parameterization: variable.parameterization,
                fixed: variable.fixed,
            });
        }
        Ok(updated)
    }
}

fn cost_of(blocks: &[ResidualBlock], variables: &[Variable]) -> Result<f64, Box<dyn Error>> {
    let mut cost = 0.0;
    for block in blocks {
        let params: Vec<&[f64]> = block
            .variables
            .iter()
            .map(|&index| variables[index].value.as_slice())
            .collect();
        cost += 0.5 * block.factor.evaluate(&params, false)?.residual.norm_squared();
    }
    Ok(cost)
}

/// Uniform vector in [-scale, scale)ⁿ.
pub fn random_vector(rng: &mut StdRng, dim: usize, scale: f64) -> DVector<f64> {
    DVector::from_fn(dim, |_, _| rng.random_range(-scale..scale))
}
