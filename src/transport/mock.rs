//! Scripted update source for tests and demos

use crate::processing::UpdateMessage;
use crate::transport::DistanceUpdateSink;
use crate::validation::EngineResult;
use std::collections::VecDeque;

/// Queue of raw messages delivered to a sink on demand
#[derive(Debug, Default)]
pub struct ScriptedSource {
    queue: VecDeque<String>,
    delivered: usize,
    rejected: usize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a source from raw messages, delivered in order
    pub fn from_messages<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut source = Self::new();
        for message in messages {
            source.push(message);
        }
        source
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.queue.push_back(message.into());
    }

    /// Queue a well-formed update
    pub fn push_update(&mut self, update: &UpdateMessage) {
        self.queue.push_back(update.to_string());
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Messages handed to a sink so far
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Delivered messages the sink refused
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Deliver the next queued message, if any
    pub fn deliver_next<S: DistanceUpdateSink + ?Sized>(&mut self, sink: &S) -> Option<EngineResult<()>> {
        let message = self.queue.pop_front()?;
        let result = sink.submit_message(&message);
        self.delivered += 1;
        if result.is_err() {
            self.rejected += 1;
        }
        Some(result)
    }

    /// Deliver everything queued, returning each outcome in order
    pub fn deliver_all<S: DistanceUpdateSink + ?Sized>(&mut self, sink: &S) -> Vec<EngineResult<()>> {
        let mut results = Vec::with_capacity(self.queue.len());
        while let Some(result) = self.deliver_next(sink) {
            results.push(result);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BeaconId;
    use crate::processing::{DistanceStore, SharedDistanceStore};

    #[test]
    fn test_delivers_in_order() {
        let store = SharedDistanceStore::new(DistanceStore::new(["A", "B", "C"].map(BeaconId::from)));
        let mut source = ScriptedSource::from_messages(["A@1", "A@2", "bogus", "B@3"]);
        source.push_update(&UpdateMessage::new("C", 4.0));
        assert_eq!(source.pending(), 5);

        let results = source.deliver_all(&store);
        assert_eq!(results.len(), 5);
        assert!(results[2].is_err());
        assert_eq!(source.delivered(), 5);
        assert_eq!(source.rejected(), 1);
        assert_eq!(source.pending(), 0);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.get(&"A".into()), Some(2.0));
        assert!(snapshot.is_complete());
        assert!(source.deliver_next(&store).is_none());
    }
}
