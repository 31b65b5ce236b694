//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimizes `‖r(p)‖²` for a residual vector `r` with an analytic Jacobian
//! `J = ∂r/∂p`. Each iteration solves the damped normal equations
//!
//! ```text
//! (JᵀJ + μ·D) δ = −Jᵀr
//! ```
//!
//! where `D` is Marquardt's diagonal scaling (running maximum of `diag(JᵀJ)`),
//! and adapts `μ` from the gain ratio `ρ = actual / predicted` reduction
//! (Nielsen's update rule). The step-size test only ends a fit once a trial
//! step has been evaluated and at least one step accepted.
//!
//! Termination mirrors the MINPACK tolerances: relative reduction of the sum of
//! squares (`ftol`), relative step size (`xtol`) and gradient size (`gtol`).
//! The evaluation budget counts residual evaluations; Jacobians are analytic
//! and not counted.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::math::ols::solve_least_squares;

/// Initial damping, relative to the Marquardt scaling `D`.
const INITIAL_DAMPING: f64 = 1e-3;

/// Floor for the Marquardt scaling so zero Jacobian columns stay damped.
const SCALE_FLOOR: f64 = 1e-12;

/// A least squares problem with an analytic Jacobian.
pub trait LeastSquaresProblem {
    fn n_params(&self) -> usize;

    fn n_residuals(&self) -> usize;

    /// Fill `out` (length `n_residuals`) with `r(params)`.
    fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>);

    /// Fill `out` (`n_residuals × n_params`) with `∂r/∂params`.
    fn jacobian(&self, params: &DVector<f64>, out: &mut DMatrix<f64>);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmOptions {
    /// Maximum number of residual evaluations.
    pub max_evaluations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_evaluations: 10_000,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 0.0,
        }
    }
}

/// Why the optimizer stopped successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// Residuals are exactly zero.
    ExactFit,
    /// Actual and predicted reductions fell below `ftol`.
    SmallReduction,
    /// The step fell below `xtol` relative to the parameters.
    SmallStep,
    /// The gradient fell below `gtol`.
    SmallGradient,
}

#[derive(Debug, Clone)]
pub struct LmSolution {
    pub params: DVector<f64>,
    /// Final sum of squared residuals.
    pub sse: f64,
    pub evaluations: usize,
    pub iterations: usize,
    pub convergence: Convergence,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LmError {
    #[error("evaluation budget exhausted after {evaluations} model evaluations")]
    MaxEvaluations { evaluations: usize },
    #[error("residuals are not finite at the initial guess")]
    NonFiniteStart,
    #[error("Jacobian is not finite at the current parameters")]
    NonFiniteJacobian,
    #[error("damped normal equations could not be solved")]
    Singular,
    #[error("damping diverged without finding a descent step")]
    DampingOverflow,
}

/// Run Levenberg–Marquardt from `x0`.
pub fn levenberg_marquardt<P: LeastSquaresProblem>(
    problem: &P,
    x0: DVector<f64>,
    opts: &LmOptions,
) -> Result<LmSolution, LmError> {
    let n = problem.n_params();
    let m = problem.n_residuals();

    let mut x = x0;
    let mut r = DVector::<f64>::zeros(m);
    let mut r_trial = DVector::<f64>::zeros(m);
    let mut jac = DMatrix::<f64>::zeros(m, n);

    problem.residuals(&x, &mut r);
    let mut evaluations = 1usize;
    let mut iterations = 0usize;
    let mut sse = r.norm_squared();

    if !sse.is_finite() {
        return Err(LmError::NonFiniteStart);
    }
    if sse == 0.0 {
        return Ok(LmSolution {
            params: x,
            sse,
            evaluations,
            iterations,
            convergence: Convergence::ExactFit,
        });
    }

    problem.jacobian(&x, &mut jac);
    let mut jtj = jac.tr_mul(&jac);
    let mut grad = jac.tr_mul(&r);
    let mut scale = DVector::<f64>::from_element(n, SCALE_FLOOR);
    update_scale(&mut scale, &jtj);

    // `D` already carries the scale of `JᵀJ`, so `μ` is dimensionless.
    let mut mu = INITIAL_DAMPING;
    let mut nu = 2.0;
    let mut accepted = 0usize;

    loop {
        if !grad.iter().all(|g| g.is_finite()) {
            return Err(LmError::NonFiniteJacobian);
        }
        if grad.amax() <= opts.gtol {
            return Ok(LmSolution {
                params: x,
                sse,
                evaluations,
                iterations,
                convergence: Convergence::SmallGradient,
            });
        }

        let step = solve_damped(&jtj, &grad, &scale, mu).ok_or(LmError::Singular)?;
        iterations += 1;

        if evaluations >= opts.max_evaluations {
            return Err(LmError::MaxEvaluations { evaluations });
        }
        let x_trial = &x + &step;
        problem.residuals(&x_trial, &mut r_trial);
        evaluations += 1;
        let sse_trial = r_trial.norm_squared();

        // Reduction of ‖r‖² predicted by the linearized model: δᵀ(μDδ − g).
        let predicted = step.dot(&(scale.component_mul(&step) * mu - &grad));
        let actual = sse - sse_trial;
        let rho = if sse_trial.is_finite() && predicted > 0.0 {
            actual / predicted
        } else {
            -1.0
        };
        let small_step = step.norm() <= opts.xtol * (x.norm() + opts.xtol);

        if rho > 0.0 {
            let small_reduction = actual <= opts.ftol * sse && predicted <= opts.ftol * sse;

            x = x_trial;
            std::mem::swap(&mut r, &mut r_trial);
            sse = sse_trial;
            accepted += 1;

            let convergence = if sse == 0.0 {
                Some(Convergence::ExactFit)
            } else if small_reduction {
                Some(Convergence::SmallReduction)
            } else if small_step {
                Some(Convergence::SmallStep)
            } else {
                None
            };
            if let Some(convergence) = convergence {
                return Ok(LmSolution {
                    params: x,
                    sse,
                    evaluations,
                    iterations,
                    convergence,
                });
            }

            problem.jacobian(&x, &mut jac);
            jtj = jac.tr_mul(&jac);
            grad = jac.tr_mul(&r);
            update_scale(&mut scale, &jtj);

            mu *= (1.0f64 / 3.0).max(1.0 - (2.0 * rho - 1.0).powi(3));
            nu = 2.0;
        } else {
            // A rejected step below `xtol` after progress means no further gain here.
            if small_step && accepted > 0 {
                return Ok(LmSolution {
                    params: x,
                    sse,
                    evaluations,
                    iterations,
                    convergence: Convergence::SmallStep,
                });
            }
            mu *= nu;
            nu *= 2.0;
            if !mu.is_finite() {
                return Err(LmError::DampingOverflow);
            }
        }
    }
}

fn solve_damped(
    jtj: &DMatrix<f64>,
    grad: &DVector<f64>,
    scale: &DVector<f64>,
    mu: f64,
) -> Option<DVector<f64>> {
    let mut a = jtj.clone();
    for i in 0..a.nrows() {
        a[(i, i)] += mu * scale[i];
    }
    let rhs = grad.map(|g| -g);

    if let Some(chol) = a.clone().cholesky() {
        let step = chol.solve(&rhs);
        if step.iter().all(|v| v.is_finite()) {
            return Some(step);
        }
    }
    solve_least_squares(&a, &rhs)
}

fn update_scale(scale: &mut DVector<f64>, jtj: &DMatrix<f64>) {
    for i in 0..scale.len() {
        let d = jtj[(i, i)];
        if d.is_finite() && d > scale[i] {
            scale[i] = d;
        }
    }
}
