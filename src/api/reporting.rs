//! Engine events and their consumers

use crate::api::formatting::{format_event, OutputFormat};
use crate::core::PositionEstimate;
use crate::validation::EngineError;
use tracing::{error, info, warn};

/// Something the engine has to tell the outside world
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A tick produced a position
    Estimate(PositionEstimate),
    /// A tick could not produce a position; retried on the next tick
    TickFailed(EngineError),
    /// A distance update was dropped; the store is unchanged
    UpdateRejected { message: String, error: EngineError },
}

/// Consumer of engine events
pub trait EventReporter: Send + Sync {
    fn report(&self, event: &EngineEvent);
}

impl<F> EventReporter for F
where
    F: Fn(&EngineEvent) + Send + Sync,
{
    fn report(&self, event: &EngineEvent) {
        self(event)
    }
}

/// Reporter that writes every event to the `tracing` log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter {
    format: OutputFormat,
}

impl LogReporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

impl EventReporter for LogReporter {
    fn report(&self, event: &EngineEvent) {
        if self.format == OutputFormat::Json {
            let line = format_event(event, self.format);
            match event {
                EngineEvent::Estimate(_) => info!("{line}"),
                EngineEvent::TickFailed(EngineError::IncompleteData { .. })
                | EngineEvent::UpdateRejected { .. } => warn!("{line}"),
                EngineEvent::TickFailed(_) => error!("{line}"),
            }
            return;
        }

        match event {
            EngineEvent::Estimate(estimate) => info!(
                x = estimate.x,
                y = estimate.y,
                residual_norm = estimate.residual_norm,
                iterations = estimate.iterations,
                "Position calculated: {:.4}, {:.4}",
                estimate.x,
                estimate.y
            ),
            EngineEvent::TickFailed(EngineError::IncompleteData { missing }) => warn!(
                missing = ?missing.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
                "There are beacons that haven't reported distance yet"
            ),
            EngineEvent::TickFailed(e) => error!(kind = e.kind(), "{e}"),
            EngineEvent::UpdateRejected { message, error } => {
                warn!(kind = error.kind(), update = %message, "Rejected update: {error}")
            }
        }
    }
}
