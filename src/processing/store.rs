//! Last-reported distance per beacon
//!
//! `DistanceStore` is the only mutable state shared between the update path
//! and the tick path. `SharedDistanceStore` guards it with a mutex that is
//! held only while a single reading is written or while a snapshot is
//! copied; refinement always works on a `DistanceSnapshot`.

use crate::core::{BeaconId, BeaconRegistry};
use crate::processing::parser::validate_distance;
use crate::validation::{EngineError, EngineResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Beacon id to last reported distance, unset until the first report
#[derive(Debug, Clone)]
pub struct DistanceStore {
    ids: Vec<BeaconId>,
    index: HashMap<BeaconId, usize>,
    readings: Vec<Option<f64>>,
}

impl DistanceStore {
    /// Every id starts unset. Repeated ids are kept once.
    pub fn new<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = BeaconId>,
    {
        let mut store = Self {
            ids: Vec::new(),
            index: HashMap::new(),
            readings: Vec::new(),
        };
        for id in ids {
            if store.index.contains_key(&id) {
                continue;
            }
            store.index.insert(id.clone(), store.ids.len());
            store.ids.push(id);
            store.readings.push(None);
        }
        store
    }

    pub fn from_registry(registry: &BeaconRegistry) -> Self {
        Self::new(registry.ids().cloned())
    }

    /// Overwrite the reading for `id`. On error nothing is written.
    pub fn update(&mut self, id: &BeaconId, distance: f64) -> EngineResult<()> {
        let slot = *self
            .index
            .get(id)
            .ok_or_else(|| EngineError::UnknownBeacon { id: id.clone() })?;
        validate_distance(id, distance)?;
        self.readings[slot] = Some(distance);
        Ok(())
    }

    pub fn get(&self, id: &BeaconId) -> Option<f64> {
        self.index.get(id).and_then(|&i| self.readings[i])
    }

    pub fn is_complete(&self) -> bool {
        self.readings.iter().all(Option::is_some)
    }

    /// Ids still waiting for their first report, in registration order
    pub fn missing(&self) -> Vec<BeaconId> {
        self.ids
            .iter()
            .zip(&self.readings)
            .filter(|(_, reading)| reading.is_none())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn reported_count(&self) -> usize {
        self.readings.iter().filter(|r| r.is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn snapshot(&self) -> DistanceSnapshot {
        DistanceSnapshot {
            entries: self.ids.iter().cloned().zip(self.readings.iter().copied()).collect(),
        }
    }
}

/// Immutable copy of the store taken at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceSnapshot {
    entries: Vec<(BeaconId, Option<f64>)>,
}

impl DistanceSnapshot {
    pub fn get(&self, id: &BeaconId) -> Option<f64> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == id)
            .and_then(|(_, reading)| *reading)
    }

    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|(_, reading)| reading.is_some())
    }

    pub fn missing(&self) -> Vec<BeaconId> {
        self.entries
            .iter()
            .filter(|(_, reading)| reading.is_none())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Set readings in registration order
    pub fn reported(&self) -> impl Iterator<Item = (&BeaconId, f64)> {
        self.entries
            .iter()
            .filter_map(|(id, reading)| reading.map(|d| (id, d)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cloneable handle to a mutex-guarded store
#[derive(Debug, Clone)]
pub struct SharedDistanceStore {
    inner: Arc<Mutex<DistanceStore>>,
}

impl SharedDistanceStore {
    pub fn new(store: DistanceStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn update(&self, id: &BeaconId, distance: f64) -> EngineResult<()> {
        self.inner.lock().update(id, distance)
    }

    pub fn snapshot(&self) -> DistanceSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn is_complete(&self) -> bool {
        self.inner.lock().is_complete()
    }

    pub fn missing(&self) -> Vec<BeaconId> {
        self.inner.lock().missing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;

    fn ids() -> Vec<BeaconId> {
        vec!["A".into(), "B".into(), "C".into()]
    }

    #[test]
    fn test_new_store_is_unset() {
        let store = DistanceStore::new(ids());
        assert_eq!(store.len(), 3);
        assert_eq!(store.reported_count(), 0);
        assert!(!store.is_complete());
        assert_eq!(store.missing(), ids());
    }

    #[test]
    fn test_update_overwrites() {
        let mut store = DistanceStore::new(ids());
        store.update(&"A".into(), 4.0).unwrap();
        store.update(&"A".into(), 2.5).unwrap();
        assert_eq!(store.get(&"A".into()), Some(2.5));
        assert_eq!(store.get(&"B".into()), None);
    }

    #[test]
    fn test_complete_once_every_beacon_reports() {
        let mut store = DistanceStore::new(ids());
        store.update(&"A".into(), 1.0).unwrap();
        store.update(&"B".into(), 1.0).unwrap();
        assert!(!store.is_complete());
        assert_eq!(store.missing(), vec![BeaconId::new("C")]);
        store.update(&"C".into(), 0.0).unwrap();
        assert!(store.is_complete());
        assert!(store.missing().is_empty());
    }

    #[test]
    fn test_unknown_beacon_leaves_store_untouched() {
        let mut store = DistanceStore::new(ids());
        store.update(&"A".into(), 3.0).unwrap();
        let before = store.snapshot();

        let err = store.update(&"Z".into(), 3.0).unwrap_err();
        assert_eq!(err, EngineError::UnknownBeacon { id: "Z".into() });
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_invalid_distance_leaves_store_untouched() {
        let mut store = DistanceStore::new(ids());
        store.update(&"A".into(), 3.0).unwrap();
        let before = store.snapshot();

        for bad in [-0.5, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = store.update(&"A".into(), bad).unwrap_err();
            assert!(matches!(err, EngineError::InvalidDistance { .. }));
        }
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let shared = SharedDistanceStore::new(DistanceStore::new(ids()));
        shared.update(&"A".into(), 1.0).unwrap();
        let snapshot = shared.snapshot();
        shared.update(&"A".into(), 9.0).unwrap();
        assert_eq!(snapshot.get(&"A".into()), Some(1.0));
        assert_eq!(shared.snapshot().get(&"A".into()), Some(9.0));
    }

    #[test]
    fn test_snapshot_reports_in_order() {
        let mut store = DistanceStore::new(ids());
        store.update(&"C".into(), 3.0).unwrap();
        store.update(&"A".into(), 1.0).unwrap();
        let snapshot = store.snapshot();
        let reported: Vec<(&str, f64)> = snapshot.reported().map(|(id, d)| (id.as_str(), d)).collect();
        assert_eq!(reported, [("A", 1.0), ("C", 3.0)]);
    }

    quickcheck! {
        fn prop_update_is_idempotent(which: u8, distance: u16) -> bool {
            let id = ids()[which as usize % 3].clone();
            let distance = distance as f64 / 8.0;

            let mut once = DistanceStore::new(ids());
            once.update(&id, distance).unwrap();

            let mut twice = once.clone();
            twice.update(&id, distance).unwrap();

            once.snapshot() == twice.snapshot()
        }

        fn prop_complete_iff_nothing_unset(mask: u8) -> bool {
            let mut store = DistanceStore::new(ids());
            for (bit, id) in ids().iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    store.update(id, 1.0).unwrap();
                }
            }
            store.is_complete() == store.missing().is_empty()
                && store.is_complete() == (mask & 0b111 == 0b111)
        }
    }
}
