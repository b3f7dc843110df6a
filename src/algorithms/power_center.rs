//! Closed-form seed from three beacons
//!
//! Subtracting the circle equations `(x-xi)² + (y-yi)² = ri²` of beacon 1
//! from those of beacons 2 and 3 leaves a 2x2 linear system whose solution
//! is the power (radical) center of the three circles. With exact ranges it
//! is the receiver position; with noisy ranges it is a seed for refinement.

use crate::core::{Observation, Point2, DEGENERACY_TOLERANCE};
use crate::validation::{EngineError, EngineResult, GeometryFault};

/// Power-center solver used to seed the refiner
#[derive(Debug, Clone)]
pub struct InitialGuessSolver {
    /// Relative threshold for the pivots of the linear system
    pub tolerance: f64,
    /// Try later beacon triples when the first one is degenerate
    pub fallback: bool,
}

impl Default for InitialGuessSolver {
    fn default() -> Self {
        Self {
            tolerance: DEGENERACY_TOLERANCE,
            fallback: false,
        }
    }
}

impl InitialGuessSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    /// Power center of exactly three observations
    pub fn solve(&self, triple: [&Observation; 3]) -> EngineResult<Point2> {
        self.power_center(triple)
            .map_err(|fault| EngineError::DegenerateGeometry {
                beacons: triple.iter().map(|o| o.id.clone()).collect(),
                fault,
            })
    }

    /// Seed from the first three observations.
    ///
    /// With `fallback` enabled and a degenerate first triple, the remaining
    /// triples are tried in lexicographic index order; the error of the
    /// first triple is returned when none of them works.
    pub fn seed(&self, observations: &[Observation]) -> EngineResult<Point2> {
        if observations.len() < 3 {
            return Err(EngineError::IncompleteData { missing: Vec::new() });
        }

        let first = self.solve([&observations[0], &observations[1], &observations[2]]);
        if first.is_ok() || !self.fallback {
            return first;
        }

        let n = observations.len();
        for i in 0..n {
            for j in i + 1..n {
                for k in j + 1..n {
                    if (i, j, k) == (0, 1, 2) {
                        continue;
                    }
                    let triple = [&observations[i], &observations[j], &observations[k]];
                    if let Ok(seed) = self.power_center(triple) {
                        tracing::debug!(
                            first = %observations[i].id,
                            second = %observations[j].id,
                            third = %observations[k].id,
                            "seeded from fallback triple"
                        );
                        return Ok(seed);
                    }
                }
            }
        }

        first
    }

    fn power_center(&self, [o1, o2, o3]: [&Observation; 3]) -> Result<Point2, GeometryFault> {
        let (x1, y1, r1) = (o1.position.x, o1.position.y, o1.distance);
        let (x2, y2, r2) = (o2.position.x, o2.position.y, o2.distance);
        let (x3, y3, r3) = (o3.position.x, o3.position.y, o3.distance);

        let c = (r1 * r1 - r2 * r2 + x2 * x2 + y2 * y2 - x1 * x1 - y1 * y1) / 2.0;
        let a = x2 - x1;
        let b = y2 - y1;

        let t = (r1 * r1 - r3 * r3 + x3 * x3 + y3 * y3 - x1 * x1 - y1 * y1) / 2.0;
        let r = x3 - x1;
        let s = y3 - y1;

        let scale = a.abs().max(b.abs()).max(r.abs()).max(s.abs());
        let denominator = b * r - s * a;

        if scale == 0.0 || denominator.abs() < self.tolerance * scale * scale {
            return Err(GeometryFault::Collinear);
        }
        if a.abs() < self.tolerance * scale {
            return Err(GeometryFault::SharedAbscissa);
        }

        let y = (c * r - t * a) / denominator;
        let x = (c - b * y) / a;

        Ok(Point2::new(x, y))
    }
}
