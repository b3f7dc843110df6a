//! Sources of distance updates
//!
//! Transports never touch the store directly. They hand decoded or raw
//! messages to a [`DistanceUpdateSink`] injected at construction.

pub mod mock;
pub mod tcp;

pub use mock::ScriptedSource;
pub use tcp::UpdateListener;

use crate::processing::{SharedDistanceStore, UpdateMessage};
use crate::validation::EngineResult;

/// Capability to accept distance updates
pub trait DistanceUpdateSink: Send + Sync {
    /// Apply one decoded update
    fn submit(&self, update: UpdateMessage) -> EngineResult<()>;

    /// Decode a raw `<beacon_id>@<distance>` message and apply it
    fn submit_message(&self, message: &str) -> EngineResult<()> {
        self.submit(UpdateMessage::parse(message)?)
    }
}

impl DistanceUpdateSink for SharedDistanceStore {
    fn submit(&self, update: UpdateMessage) -> EngineResult<()> {
        self.update(&update.beacon_id, update.distance)
    }
}

impl<S: DistanceUpdateSink + ?Sized> DistanceUpdateSink for std::sync::Arc<S> {
    fn submit(&self, update: UpdateMessage) -> EngineResult<()> {
        (**self).submit(update)
    }

    fn submit_message(&self, message: &str) -> EngineResult<()> {
        (**self).submit_message(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BeaconId;
    use crate::processing::DistanceStore;
    use crate::validation::EngineError;

    fn store() -> SharedDistanceStore {
        SharedDistanceStore::new(DistanceStore::new(["A", "B", "C"].map(BeaconId::from)))
    }

    #[test]
    fn test_store_sink_applies_messages() {
        let store = store();
        store.submit_message("A@5").unwrap();
        store.submit(UpdateMessage::new("B", 2.5)).unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.get(&"A".into()), Some(5.0));
        assert_eq!(snapshot.get(&"B".into()), Some(2.5));
    }

    #[test]
    fn test_store_sink_rejects_without_mutation() {
        let store = store();
        store.submit_message("A@1").unwrap();

        assert!(matches!(store.submit_message("A1"), Err(EngineError::InvalidMessage { .. })));
        assert!(matches!(store.submit_message("Z@1"), Err(EngineError::UnknownBeacon { .. })));
        assert!(matches!(store.submit_message("A@-1"), Err(EngineError::InvalidDistance { .. })));
        assert_eq!(store.snapshot().get(&"A".into()), Some(1.0));
    }
}
