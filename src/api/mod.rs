//! Engine orchestration and output
//!
//! `PositionEstimator` ties the registry, the shared store and the solvers
//! together; events leave through an `EventReporter`.

pub mod estimator;
pub mod formatting;
pub mod reporting;
pub mod ticker;

pub use estimator::{EstimatorState, PositionEstimator};
pub use formatting::{format_event, OutputFormat};
pub use reporting::{EngineEvent, EventReporter, LogReporter};
pub use ticker::Ticker;
