//! Core data types for the positioning engine

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Planar coordinates in the beacon frame
pub type Point2 = Vector2<f64>;

/// Identifier of a beacon as it appears in the beacon table and in update messages
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeaconId(String);

impl BeaconId {
    /// Surrounding whitespace is not part of the id.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BeaconId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BeaconId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for BeaconId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl Borrow<str> for BeaconId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Fixed reference node with a known position
#[derive(Debug, Clone, PartialEq)]
pub struct Beacon {
    pub id: BeaconId,
    pub position: Point2,
}

impl Beacon {
    pub fn new(id: impl Into<BeaconId>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            position: Point2::new(x, y),
        }
    }

    /// Euclidean distance from `point` to this beacon
    pub fn distance_to(&self, point: &Point2) -> f64 {
        (point - self.position).norm()
    }
}

/// A beacon paired with the distance it reported
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: BeaconId,
    pub position: Point2,
    pub distance: f64,
}

impl Observation {
    pub fn new(beacon: &Beacon, distance: f64) -> Self {
        Self {
            id: beacon.id.clone(),
            position: beacon.position,
            distance,
        }
    }

    /// Predicted minus measured range at `point`
    pub fn residual(&self, point: &Point2) -> f64 {
        (point - self.position).norm() - self.distance
    }
}

/// Result of one successful tick computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionEstimate {
    pub x: f64,
    pub y: f64,
    /// Euclidean norm of the range residuals at the estimate
    pub residual_norm: f64,
    /// Refinement iterations spent after the closed-form seed
    pub iterations: u32,
}

impl PositionEstimate {
    pub fn position(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}
