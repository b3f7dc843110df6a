//! Immutable registry of beacon ids and positions

use crate::core::{Beacon, BeaconId, Point2, MIN_BEACONS};
use crate::validation::{EngineError, EngineResult, StartupError};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// One row of the beacon table
#[derive(Debug, Deserialize)]
struct BeaconRow {
    beacon_id: String,
    pos_x: f64,
    pos_y: f64,
}

/// Known beacons in load order, keyed by unique id
#[derive(Debug, Clone)]
pub struct BeaconRegistry {
    beacons: Vec<Beacon>,
    index: HashMap<BeaconId, usize>,
}

impl BeaconRegistry {
    /// Build the registry from `(id, x, y)` entries.
    ///
    /// Ids must be unique and non-empty, coordinates finite, and at least
    /// three beacons present.
    pub fn load<I, S>(entries: I) -> Result<Self, StartupError>
    where
        I: IntoIterator<Item = (S, f64, f64)>,
        S: Into<BeaconId>,
    {
        let mut beacons = Vec::new();
        let mut index = HashMap::new();

        for (id, x, y) in entries {
            let id = id.into();
            if id.is_empty() {
                return Err(StartupError::malformed(format!(
                    "beacon #{} has an empty id",
                    beacons.len() + 1
                )));
            }
            if !x.is_finite() || !y.is_finite() {
                return Err(StartupError::malformed(format!(
                    "beacon {} has non-finite position ({}, {})",
                    id, x, y
                )));
            }
            if index.insert(id.clone(), beacons.len()).is_some() {
                return Err(StartupError::malformed(format!("duplicate beacon id {}", id)));
            }
            beacons.push(Beacon { id, position: Point2::new(x, y) });
        }

        if beacons.len() < MIN_BEACONS {
            return Err(StartupError::malformed(format!(
                "{} beacon(s) configured, at least {} required",
                beacons.len(),
                MIN_BEACONS
            )));
        }

        Ok(Self { beacons, index })
    }

    /// Read a `beacon_id,pos_x,pos_y` table with a header row
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self, StartupError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| StartupError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_csv_reader(file)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, StartupError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for row in reader.deserialize::<BeaconRow>() {
            let row = row.map_err(|e| StartupError::malformed(e.to_string()))?;
            entries.push((row.beacon_id, row.pos_x, row.pos_y));
        }

        Self::load(entries)
    }

    pub fn contains(&self, id: &BeaconId) -> bool {
        self.index.contains_key(id)
    }

    pub fn position_of(&self, id: &BeaconId) -> EngineResult<Point2> {
        self.index
            .get(id)
            .map(|&i| self.beacons[i].position)
            .ok_or_else(|| EngineError::UnknownBeacon { id: id.clone() })
    }

    /// Load-order index of `id`
    pub fn index_of(&self, id: &BeaconId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn count(&self) -> usize {
        self.beacons.len()
    }

    /// Beacons in load order
    pub fn beacons(&self) -> &[Beacon] {
        &self.beacons
    }

    pub fn ids(&self) -> impl Iterator<Item = &BeaconId> {
        self.beacons.iter().map(|b| &b.id)
    }
}
