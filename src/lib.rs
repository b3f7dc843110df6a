//! Beacon positioning engine
//!
//! Estimates a 2D position from distances to fixed beacons. Readings arrive
//! as `<beacon_id>@<distance>` updates and are kept in a shared store; on
//! every tick the engine seeds a position from the power center of the
//! first three beacons and refines it over all beacons with
//! Levenberg-Marquardt.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod validation;
pub mod utils;
pub mod transport;
pub mod api;

// Re-export commonly used types
pub use core::{Beacon, BeaconId, BeaconRegistry, Observation, Point2, PositionEstimate};
pub use algorithms::{InitialGuessSolver, Refinement, Refiner, StopReason};
pub use processing::{DistanceSnapshot, DistanceStore, SharedDistanceStore, UpdateMessage};
pub use validation::{Disposition, EngineError, EngineResult, StartupError};
pub use utils::{init_logging, ConfigError, EngineConfig, LogConfig, SolverConfig};
pub use transport::{DistanceUpdateSink, ScriptedSource, UpdateListener};
pub use api::{
    EngineEvent, EstimatorState, EventReporter, LogReporter, OutputFormat, PositionEstimator,
    Ticker,
};
