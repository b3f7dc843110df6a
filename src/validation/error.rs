//! Error classification for the positioning engine
//!
//! Startup failures abort the process before any tick is served. Every other
//! error is scoped to a single update or a single tick and leaves the engine
//! able to continue.

use crate::core::BeaconId;
use crate::utils::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for per-update and per-tick operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Fatal errors raised while bringing the server up
#[derive(Debug, Error)]
pub enum StartupError {
    /// Beacon table missing or unreadable
    #[error("cannot read beacon configuration {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Beacon table parsed but violates registry invariants
    #[error("malformed beacon configuration: {reason}")]
    Malformed { reason: String },
    /// Engine configuration rejected
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Update listener could not be bound
    #[error("cannot listen on {addr}: {source}")]
    Listen {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

impl StartupError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        StartupError::Malformed { reason: reason.into() }
    }
}

/// Why an update message could not be decoded
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MessageFault {
    /// No `@` separating id and distance
    #[error("expected <beacon_id>@<distance>")]
    MissingDelimiter,
    /// Nothing before the `@`
    #[error("beacon id is empty")]
    EmptyId,
    /// Distance token is not a number
    #[error("distance {token:?} is not a number")]
    NotANumber { token: String },
}

/// Which part of the power-center system collapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryFault {
    /// First two beacons share an x coordinate
    #[error("first two beacons share an x coordinate")]
    SharedAbscissa,
    /// The three beacons are collinear or coincident
    #[error("beacons are collinear or coincident")]
    Collinear,
}

/// Recoverable engine errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("beacon {id} is not registered")]
    UnknownBeacon { id: BeaconId },

    #[error("invalid distance {distance} for beacon {id}")]
    InvalidDistance { id: BeaconId, distance: f64 },

    #[error("invalid update message {message:?}: {fault}")]
    InvalidMessage { message: String, fault: MessageFault },

    #[error("{} beacon(s) have not reported a distance yet", .missing.len())]
    IncompleteData { missing: Vec<BeaconId> },

    #[error("cannot seed position from beacons {beacons:?}: {fault}")]
    DegenerateGeometry { beacons: Vec<BeaconId>, fault: GeometryFault },

    #[error("refinement did not converge after {iterations} iterations (residual norm {residual_norm:.3e})")]
    ConvergenceFailure { iterations: u32, residual_norm: f64 },

    #[error("singular Jacobian at ({x:.4}, {y:.4}), residual norm {residual_norm:.3e}")]
    SingularJacobian { x: f64, y: f64, residual_norm: f64 },
}

/// What the engine does after an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Drop the offending update and keep the store as it was
    IgnoreUpdate,
    /// Report the failure and compute again on the next tick
    RetryNextTick,
}

impl EngineError {
    pub fn disposition(&self) -> Disposition {
        match self {
            EngineError::UnknownBeacon { .. }
            | EngineError::InvalidDistance { .. }
            | EngineError::InvalidMessage { .. } => Disposition::IgnoreUpdate,
            EngineError::IncompleteData { .. }
            | EngineError::DegenerateGeometry { .. }
            | EngineError::ConvergenceFailure { .. }
            | EngineError::SingularJacobian { .. } => Disposition::RetryNextTick,
        }
    }

    /// Stable name used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::UnknownBeacon { .. } => "UnknownBeaconError",
            EngineError::InvalidDistance { .. } => "InvalidDistanceError",
            EngineError::InvalidMessage { .. } => "InvalidMessageError",
            EngineError::IncompleteData { .. } => "IncompleteDataError",
            EngineError::DegenerateGeometry { .. } => "DegenerateGeometryError",
            EngineError::ConvergenceFailure { .. } => "ConvergenceFailure",
            EngineError::SingularJacobian { .. } => "SingularJacobianError",
        }
    }
}
