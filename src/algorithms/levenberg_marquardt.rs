//! Damped least-squares refinement of the position estimate
//!
//! Minimises `Σ (‖p - bᵢ‖ - dᵢ)²` over `p` with Levenberg-Marquardt steps
//! `(JᵗJ + λI) δ = -Jᵗr`. Steps that lower the cost are accepted and relax
//! the damping; rejected steps raise it and are retried.

use crate::core::{
    Observation, Point2, PositionEstimate, DEFAULT_MAX_ITERATIONS, GRADIENT_TOLERANCE,
    INITIAL_DAMPING, MAX_DAMPING, MIN_BEACONS, RESIDUAL_TOLERANCE, SINGULARITY_TOLERANCE,
    STEP_TOLERANCE,
};
use crate::validation::{EngineError, EngineResult};
use nalgebra::{DMatrix, DVector, Matrix2, Vector2};

/// Factor applied to λ on every accepted or rejected step
const DAMPING_FACTOR: f64 = 10.0;

/// Floor for λ after a run of accepted steps
const MIN_DAMPING: f64 = 1e-15;

/// Ranges shorter than this give a zero Jacobian row
const MIN_RANGE: f64 = 1e-12;

/// Which criterion ended the refinement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ResidualTolerance,
    StepTolerance,
    GradientTolerance,
    /// No step reduced the cost before λ exceeded its ceiling
    DampingSaturated,
}

/// Outcome of a successful refinement
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    pub position: Point2,
    pub residual_norm: f64,
    pub iterations: u32,
    pub stop_reason: StopReason,
}

impl Refinement {
    pub fn estimate(&self) -> PositionEstimate {
        PositionEstimate {
            x: self.position.x,
            y: self.position.y,
            residual_norm: self.residual_norm,
            iterations: self.iterations,
        }
    }
}

/// Levenberg-Marquardt refiner
#[derive(Debug, Clone)]
pub struct Refiner {
    /// Maximum number of accepted steps
    pub max_iterations: u32,
    /// Residual norm under which the estimate is exact
    pub residual_tolerance: f64,
    /// Step norm, relative to the estimate, under which the search stops
    pub step_tolerance: f64,
    /// Gradient norm under which the search stops
    pub gradient_tolerance: f64,
    /// Starting λ
    pub initial_damping: f64,
    /// λ ceiling
    pub max_damping: f64,
    /// Smallest-to-largest eigenvalue ratio of JᵗJ treated as singular
    pub singularity_tolerance: f64,
}

impl Default for Refiner {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            residual_tolerance: RESIDUAL_TOLERANCE,
            step_tolerance: STEP_TOLERANCE,
            gradient_tolerance: GRADIENT_TOLERANCE,
            initial_damping: INITIAL_DAMPING,
            max_damping: MAX_DAMPING,
            singularity_tolerance: SINGULARITY_TOLERANCE,
        }
    }
}

/// Residuals and normal-equation terms at one candidate position
struct Evaluation {
    cost: f64,
    jtj: Matrix2<f64>,
    gradient: Vector2<f64>,
}

impl Evaluation {
    fn at(observations: &[Observation], position: &Point2) -> Self {
        let n = observations.len();
        let mut residuals = DVector::zeros(n);
        let mut jacobian = DMatrix::zeros(n, 2);

        for (i, observation) in observations.iter().enumerate() {
            let diff = position - observation.position;
            let range = diff.norm();
            residuals[i] = range - observation.distance;
            if range > MIN_RANGE {
                jacobian[(i, 0)] = diff.x / range;
                jacobian[(i, 1)] = diff.y / range;
            }
        }

        let jt = jacobian.transpose();
        let jtj = &jt * &jacobian;
        let jtr = &jt * &residuals;

        Self {
            cost: residuals.dot(&residuals),
            jtj: Matrix2::new(jtj[(0, 0)], jtj[(0, 1)], jtj[(1, 0)], jtj[(1, 1)]),
            gradient: Vector2::new(jtr[0], jtr[1]),
        }
    }
}

fn cost_at(observations: &[Observation], position: &Point2) -> f64 {
    observations
        .iter()
        .map(|o| o.residual(position).powi(2))
        .sum()
}

/// JᵗJ is symmetric positive semi-definite; compare its eigenvalues directly.
fn is_rank_deficient(jtj: &Matrix2<f64>, tolerance: f64) -> bool {
    let half_trace = 0.5 * (jtj[(0, 0)] + jtj[(1, 1)]);
    let half_gap = (0.25 * (jtj[(0, 0)] - jtj[(1, 1)]).powi(2) + jtj[(0, 1)] * jtj[(1, 0)]).sqrt();
    let largest = half_trace + half_gap;
    let smallest = half_trace - half_gap;
    largest <= 0.0 || smallest <= tolerance * largest
}

impl Refiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Refine `seed` against every observation (at least three).
    pub fn refine(&self, observations: &[Observation], seed: Point2) -> EngineResult<Refinement> {
        if observations.len() < MIN_BEACONS {
            return Err(EngineError::IncompleteData { missing: Vec::new() });
        }

        let mut position = seed;
        let mut lambda = self.initial_damping;
        let mut iterations = 0u32;

        loop {
            let eval = Evaluation::at(observations, &position);
            let residual_norm = eval.cost.sqrt();

            if residual_norm < self.residual_tolerance {
                return Ok(Refinement {
                    position,
                    residual_norm,
                    iterations,
                    stop_reason: StopReason::ResidualTolerance,
                });
            }

            let singular = is_rank_deficient(&eval.jtj, self.singularity_tolerance);

            if eval.gradient.norm() < self.gradient_tolerance {
                return self.conclude(position, residual_norm, iterations, singular, StopReason::GradientTolerance);
            }

            if iterations >= self.max_iterations {
                return Err(EngineError::ConvergenceFailure { iterations, residual_norm });
            }
            iterations += 1;

            loop {
                let damped = eval.jtj + Matrix2::identity() * lambda;
                let step = damped
                    .cholesky()
                    .map(|cholesky| cholesky.solve(&-eval.gradient))
                    .filter(|step| step.iter().all(|v| v.is_finite()));

                if let Some(step) = step {
                    if step.norm() <= self.step_tolerance * (position.norm() + self.step_tolerance) {
                        return self.conclude(position, residual_norm, iterations, singular, StopReason::StepTolerance);
                    }

                    let candidate = position + step;
                    if cost_at(observations, &candidate) < eval.cost {
                        position = candidate;
                        lambda = (lambda / DAMPING_FACTOR).max(MIN_DAMPING);
                        break;
                    }
                }

                lambda *= DAMPING_FACTOR;
                if lambda > self.max_damping {
                    return self.conclude(position, residual_norm, iterations, singular, StopReason::DampingSaturated);
                }
            }
        }
    }

    /// A stop away from zero residual is only a solution when the geometry
    /// pins the position down.
    fn conclude(
        &self,
        position: Point2,
        residual_norm: f64,
        iterations: u32,
        singular: bool,
        stop_reason: StopReason,
    ) -> EngineResult<Refinement> {
        if singular {
            return Err(EngineError::SingularJacobian {
                x: position.x,
                y: position.y,
                residual_norm,
            });
        }

        Ok(Refinement {
            position,
            residual_norm,
            iterations,
            stop_reason,
        })
    }
}
