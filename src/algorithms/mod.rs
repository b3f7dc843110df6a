//! Position solvers

pub mod power_center;
pub mod levenberg_marquardt;

pub use power_center::InitialGuessSolver;
pub use levenberg_marquardt::{Refinement, Refiner, StopReason};
