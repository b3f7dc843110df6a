//! Decoding of textual distance updates
//!
//! The companion transports carry one update per message in the form
//! `<beacon_id>@<distance>`, e.g. `B2@7.25`.

use crate::core::BeaconId;
use crate::validation::{EngineError, EngineResult, MessageFault};
use std::fmt;
use std::str::FromStr;

/// Separator between beacon id and distance
pub const DELIMITER: char = '@';

/// A decoded distance report
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateMessage {
    pub beacon_id: BeaconId,
    pub distance: f64,
}

impl UpdateMessage {
    pub fn new(beacon_id: impl Into<BeaconId>, distance: f64) -> Self {
        Self {
            beacon_id: beacon_id.into(),
            distance,
        }
    }

    /// Split on the first `@`; both tokens are trimmed.
    ///
    /// A missing delimiter, empty id or non-numeric distance is an
    /// `InvalidMessage`. A numeric distance that is negative, NaN or
    /// infinite is an `InvalidDistance`.
    pub fn parse(message: &str) -> EngineResult<Self> {
        let invalid = |fault| EngineError::InvalidMessage {
            message: message.to_string(),
            fault,
        };

        let (id, distance) = message
            .split_once(DELIMITER)
            .ok_or_else(|| invalid(MessageFault::MissingDelimiter))?;

        let beacon_id = BeaconId::new(id);
        if beacon_id.is_empty() {
            return Err(invalid(MessageFault::EmptyId));
        }

        let token = distance.trim();
        let distance = token.parse::<f64>().map_err(|_| {
            invalid(MessageFault::NotANumber {
                token: token.to_string(),
            })
        })?;

        validate_distance(&beacon_id, distance)?;

        Ok(Self { beacon_id, distance })
    }
}

impl FromStr for UpdateMessage {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for UpdateMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.beacon_id, DELIMITER, self.distance)
    }
}

/// Distances must be finite and non-negative
pub fn validate_distance(id: &BeaconId, distance: f64) -> EngineResult<()> {
    if distance.is_finite() && distance >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidDistance {
            id: id.clone(),
            distance,
        })
    }
}
