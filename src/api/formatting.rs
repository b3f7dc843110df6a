//! Event output formatting
//!
//! Text output keeps the server's historical wording; JSON output is one
//! object per event tagged by `event`.

use crate::api::reporting::EngineEvent;
use crate::core::PositionEstimate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum EventRecord<'a> {
    Estimate {
        #[serde(flatten)]
        estimate: &'a PositionEstimate,
    },
    TickFailed {
        error: &'static str,
        detail: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        missing: Vec<&'a str>,
    },
    UpdateRejected {
        message: &'a str,
        error: &'static str,
        detail: String,
    },
}

impl<'a> From<&'a EngineEvent> for EventRecord<'a> {
    fn from(event: &'a EngineEvent) -> Self {
        match event {
            EngineEvent::Estimate(estimate) => EventRecord::Estimate { estimate },
            EngineEvent::TickFailed(error) => EventRecord::TickFailed {
                error: error.kind(),
                detail: error.to_string(),
                missing: match error {
                    crate::validation::EngineError::IncompleteData { missing } => {
                        missing.iter().map(|id| id.as_str()).collect()
                    }
                    _ => Vec::new(),
                },
            },
            EngineEvent::UpdateRejected { message, error } => EventRecord::UpdateRejected {
                message,
                error: error.kind(),
                detail: error.to_string(),
            },
        }
    }
}

pub fn format_text(event: &EngineEvent) -> String {
    match event {
        EngineEvent::Estimate(estimate) => format!(
            "Position calculated: {:.4}, {:.4} (residual {:.3e}, {} iterations)",
            estimate.x, estimate.y, estimate.residual_norm, estimate.iterations
        ),
        EngineEvent::TickFailed(error) => format!("{}: {}", error.kind(), error),
        EngineEvent::UpdateRejected { message, error } => {
            format!("Rejected update {:?}: {}: {}", message, error.kind(), error)
        }
    }
}

pub fn format_json(event: &EngineEvent) -> serde_json::Result<String> {
    serde_json::to_string(&EventRecord::from(event))
}

/// Render `event`; JSON that cannot be produced falls back to text.
pub fn format_event(event: &EngineEvent, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_text(event),
        OutputFormat::Json => format_json(event).unwrap_or_else(|_| format_text(event)),
    }
}
