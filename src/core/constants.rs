//! Engine defaults and numerical tolerances

use std::time::Duration;

/// Interval between position computations
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Address the companion line listener binds to
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8765";

/// Beacon table read at startup when no path is configured
pub const DEFAULT_BEACONS_PATH: &str = "beacon-config.csv";

/// Minimum beacon count for a solvable configuration
pub const MIN_BEACONS: usize = 3;

/// Relative tolerance below which the power-center system is degenerate
pub const DEGENERACY_TOLERANCE: f64 = 1e-9;

/// Refinement stops once the residual norm drops below this
pub const RESIDUAL_TOLERANCE: f64 = 1e-8;

/// Refinement stops once a step is this small relative to the estimate
pub const STEP_TOLERANCE: f64 = 1e-12;

/// Refinement stops once the gradient norm drops below this
pub const GRADIENT_TOLERANCE: f64 = 1e-10;

/// Iteration budget for a single refinement
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Damping applied to the first refinement step
pub const INITIAL_DAMPING: f64 = 1e-3;

/// Damping ceiling; exceeding it ends the step search
pub const MAX_DAMPING: f64 = 1e10;

/// Eigenvalue ratio of JᵗJ under which the Jacobian counts as singular
pub const SINGULARITY_TOLERANCE: f64 = 1e-10;
