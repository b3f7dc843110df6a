//! Position estimator
//!
//! Owns the beacon registry and the shared distance store. Updates only
//! mutate the store; positions are computed on ticks from an atomic
//! snapshot, so refinement never holds the store lock.

use crate::algorithms::{InitialGuessSolver, Refiner};
use crate::api::reporting::{EngineEvent, EventReporter};
use crate::api::ticker::Ticker;
use crate::core::{BeaconRegistry, Observation, PositionEstimate};
use crate::processing::{DistanceSnapshot, DistanceStore, SharedDistanceStore, UpdateMessage};
use crate::transport::DistanceUpdateSink;
use crate::utils::config::SolverConfig;
use crate::validation::{EngineError, EngineResult};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error};

/// Whether a tick can attempt a computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorState {
    /// At least one beacon has never reported
    Idle,
    /// Every beacon has reported at least once
    Ready,
}

pub struct PositionEstimator {
    registry: Arc<BeaconRegistry>,
    store: SharedDistanceStore,
    seed_solver: InitialGuessSolver,
    refiner: Refiner,
    reporter: Arc<dyn EventReporter>,
}

impl PositionEstimator {
    pub fn new<R>(registry: BeaconRegistry, reporter: R) -> Self
    where
        R: EventReporter + 'static,
    {
        let store = SharedDistanceStore::new(DistanceStore::from_registry(&registry));
        Self {
            registry: Arc::new(registry),
            store,
            seed_solver: InitialGuessSolver::default(),
            refiner: Refiner::default(),
            reporter: Arc::new(reporter),
        }
    }

    pub fn with_solver_config(mut self, config: &SolverConfig) -> Self {
        self.seed_solver = config.initial_guess();
        self.refiner = config.refiner();
        self
    }

    pub fn with_refiner(mut self, refiner: Refiner) -> Self {
        self.refiner = refiner;
        self
    }

    pub fn with_seed_solver(mut self, seed_solver: InitialGuessSolver) -> Self {
        self.seed_solver = seed_solver;
        self
    }

    pub fn registry(&self) -> &BeaconRegistry {
        &self.registry
    }

    /// Handle to the shared store
    pub fn store(&self) -> &SharedDistanceStore {
        &self.store
    }

    pub fn state(&self) -> EstimatorState {
        if self.store.is_complete() {
            EstimatorState::Ready
        } else {
            EstimatorState::Idle
        }
    }

    /// Compute a position from the current readings without reporting it
    pub fn compute(&self) -> EngineResult<PositionEstimate> {
        estimate_from(&self.registry, &self.store.snapshot(), &self.seed_solver, &self.refiner)
    }

    /// Run one tick synchronously and report its outcome
    pub fn tick(&self) -> EngineResult<PositionEstimate> {
        let result = self.compute();
        self.publish(&result);
        result
    }

    /// Tick on every `ticker` period until `shutdown` resolves.
    ///
    /// Refinement runs on the blocking pool; a refinement still in flight
    /// when `shutdown` resolves is abandoned. Returns the number of ticks
    /// whose outcome was reported.
    pub async fn run_until<F>(&self, ticker: &mut Ticker, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticks = 0;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            let snapshot = self.store.snapshot();
            if !snapshot.is_complete() {
                self.publish(&Err(EngineError::IncompleteData {
                    missing: snapshot.missing(),
                }));
                ticks += 1;
                continue;
            }

            let registry = Arc::clone(&self.registry);
            let seed_solver = self.seed_solver.clone();
            let refiner = self.refiner.clone();
            let job = tokio::task::spawn_blocking(move || {
                estimate_from(&registry, &snapshot, &seed_solver, &refiner)
            });

            let result = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    debug!("shutdown during refinement; result discarded");
                    break;
                }
                joined = job => joined,
            };

            match result {
                Ok(result) => self.publish(&result),
                Err(e) => error!(error = %e, "refinement task failed"),
            }
            ticks += 1;
        }

        ticks
    }

    fn publish(&self, result: &EngineResult<PositionEstimate>) {
        let event = match result {
            Ok(estimate) => EngineEvent::Estimate(*estimate),
            Err(e) => EngineEvent::TickFailed(e.clone()),
        };
        self.reporter.report(&event);
    }

    fn reject(&self, message: String, error: &EngineError) {
        self.reporter.report(&EngineEvent::UpdateRejected {
            message,
            error: error.clone(),
        });
    }
}

impl DistanceUpdateSink for PositionEstimator {
    fn submit(&self, update: UpdateMessage) -> EngineResult<()> {
        match self.store.update(&update.beacon_id, update.distance) {
            Ok(()) => {
                debug!(beacon = %update.beacon_id, distance = update.distance, "distance updated");
                Ok(())
            }
            Err(e) => {
                self.reject(update.to_string(), &e);
                Err(e)
            }
        }
    }

    fn submit_message(&self, message: &str) -> EngineResult<()> {
        match UpdateMessage::parse(message) {
            Ok(update) => self.submit(update),
            Err(e) => {
                self.reject(message.to_string(), &e);
                Err(e)
            }
        }
    }
}

/// Seed from the first three beacons, then refine over all of them
fn estimate_from(
    registry: &BeaconRegistry,
    snapshot: &DistanceSnapshot,
    seed_solver: &InitialGuessSolver,
    refiner: &Refiner,
) -> EngineResult<PositionEstimate> {
    if !snapshot.is_complete() {
        return Err(EngineError::IncompleteData {
            missing: snapshot.missing(),
        });
    }

    let observations = snapshot
        .reported()
        .map(|(id, distance)| {
            registry
                .index_of(id)
                .map(|index| Observation::new(&registry.beacons()[index], distance))
                .ok_or_else(|| EngineError::UnknownBeacon { id: id.clone() })
        })
        .collect::<EngineResult<Vec<_>>>()?;

    let seed = seed_solver.seed(&observations)?;
    let refinement = refiner.refine(&observations, seed)?;
    debug!(
        seed_x = seed.x,
        seed_y = seed.y,
        iterations = refinement.iterations,
        stop_reason = ?refinement.stop_reason,
        "refinement finished"
    );
    Ok(refinement.estimate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Disposition;
    use approx::assert_abs_diff_eq;
    use parking_lot::Mutex;
    use std::time::Duration;

    type Events = Arc<Mutex<Vec<EngineEvent>>>;

    fn registry(beacons: &[(&str, f64, f64)]) -> BeaconRegistry {
        BeaconRegistry::load(beacons.iter().copied()).unwrap()
    }

    fn recording(registry: BeaconRegistry) -> (PositionEstimator, Events) {
        let events: Events = Arc::default();
        let sink = Arc::clone(&events);
        let estimator = PositionEstimator::new(registry, move |event: &EngineEvent| {
            sink.lock().push(event.clone())
        });
        (estimator, events)
    }

    fn square() -> BeaconRegistry {
        registry(&[("A", 0.0, 0.0), ("B", 10.0, 0.0), ("C", 0.0, 10.0)])
    }

    #[test]
    fn test_idle_until_every_beacon_reports() {
        let (estimator, events) = recording(square());
        assert_eq!(estimator.state(), EstimatorState::Idle);

        estimator.submit_message("A@5").unwrap();
        let err = estimator.tick().unwrap_err();
        assert_eq!(
            err,
            EngineError::IncompleteData {
                missing: vec!["B".into(), "C".into()]
            }
        );
        assert_eq!(err.disposition(), Disposition::RetryNextTick);
        assert_eq!(events.lock().len(), 1);

        estimator.submit_message("B@8.0622577").unwrap();
        estimator.submit_message("C@6.7082039").unwrap();
        assert_eq!(estimator.state(), EstimatorState::Ready);
    }

    #[test]
    fn test_tick_estimates_position() {
        let (estimator, events) = recording(square());
        estimator.submit(UpdateMessage::new("A", 5.0)).unwrap();
        estimator.submit(UpdateMessage::new("B", 65f64.sqrt())).unwrap();
        estimator.submit(UpdateMessage::new("C", 45f64.sqrt())).unwrap();

        let estimate = estimator.tick().unwrap();
        assert_abs_diff_eq!(estimate.x, 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.y, 4.0, epsilon = 1e-6);
        assert!(estimate.residual_norm < 1e-6);
        assert_eq!(events.lock().as_slice(), &[EngineEvent::Estimate(estimate)]);
        assert_eq!(estimator.state(), EstimatorState::Ready);
    }

    #[test]
    fn test_rejected_updates_are_reported() {
        let (estimator, events) = recording(square());
        estimator.submit_message("A@5").unwrap();

        assert!(estimator.submit_message("5").is_err());
        assert!(estimator.submit_message("Z@1").is_err());
        assert!(estimator.submit(UpdateMessage::new("A", f64::NAN)).is_err());

        assert_eq!(estimator.store().snapshot().get(&"A".into()), Some(5.0));
        let events = events.lock();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            EngineEvent::UpdateRejected { message, error: EngineError::InvalidMessage { .. } } if message == "5"
        ));
        assert!(matches!(
            &events[1],
            EngineEvent::UpdateRejected { error: EngineError::UnknownBeacon { .. }, .. }
        ));
        assert!(matches!(
            &events[2],
            EngineEvent::UpdateRejected { error: EngineError::InvalidDistance { .. }, .. }
        ));
    }

    #[test]
    fn test_degenerate_registry_retries() {
        let (estimator, events) = recording(registry(&[("A", 0.0, 0.0), ("B", 5.0, 0.0), ("C", 10.0, 0.0)]));
        for message in ["A@1", "B@4", "C@9"] {
            estimator.submit_message(message).unwrap();
        }

        for _ in 0..2 {
            let err = estimator.tick().unwrap_err();
            assert!(matches!(err, EngineError::DegenerateGeometry { .. }));
            assert_eq!(estimator.state(), EstimatorState::Ready);
        }
        assert_eq!(events.lock().len(), 2);
    }

    #[test]
    fn test_solver_config_enables_seed_fallback() {
        let beacons = [("A", 0.0, 0.0), ("B", 5.0, 0.0), ("C", 10.0, 0.0), ("D", 0.0, 10.0)];
        let messages = [
            "A@5".to_string(),
            format!("B@{}", 20f64.sqrt()),
            format!("C@{}", 65f64.sqrt()),
            format!("D@{}", 45f64.sqrt()),
        ];

        let (strict, _) = recording(registry(&beacons));
        let (lenient, _) = recording(registry(&beacons));
        let lenient = lenient.with_solver_config(&SolverConfig {
            seed_fallback: true,
            ..SolverConfig::default()
        });
        for message in &messages {
            strict.submit_message(message).unwrap();
            lenient.submit_message(message).unwrap();
        }

        assert!(matches!(strict.compute(), Err(EngineError::DegenerateGeometry { .. })));
        let estimate = lenient.compute().unwrap();
        assert_abs_diff_eq!(estimate.x, 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.y, 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_custom_solvers_are_used() {
        let beacons = [("A", 0.0, 0.0), ("B", 5.0, 0.0), ("C", 10.0, 0.0), ("D", 0.0, 10.0)];
        let messages = [
            "A@5".to_string(),
            format!("B@{}", 20f64.sqrt()),
            format!("C@{}", 65f64.sqrt()),
            format!("D@{}", 45f64.sqrt()),
        ];
        let (estimator, _) = recording(registry(&beacons));
        let estimator = estimator.with_seed_solver(InitialGuessSolver::new().with_fallback(true));
        for message in &messages {
            estimator.submit_message(message).unwrap();
        }

        let estimate = estimator.compute().unwrap();
        assert_abs_diff_eq!(estimate.position(), crate::core::Point2::new(3.0, 4.0), epsilon = 1e-6);

        // D now reads one unit long; the seed from A, B, D is no longer a minimum.
        estimator.submit_message(&format!("D@{}", 45f64.sqrt() + 1.0)).unwrap();
        let estimator = estimator.with_refiner(Refiner::new().with_max_iterations(0));
        assert_eq!(
            estimator.compute().unwrap_err().disposition(),
            Disposition::RetryNextTick
        );
        assert!(matches!(
            estimator.compute(),
            Err(EngineError::ConvergenceFailure { iterations: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_run_until_reports_each_tick() {
        let (estimator, events) = recording(square());
        let mut ticker = Ticker::new(Duration::from_millis(10));

        let ticks = estimator
            .run_until(&mut ticker, tokio::time::sleep(Duration::from_millis(55)))
            .await;
        assert!(ticks >= 2);
        assert_eq!(events.lock().len() as u64, ticks);
        assert!(events
            .lock()
            .iter()
            .all(|e| matches!(e, EngineEvent::TickFailed(EngineError::IncompleteData { .. }))));

        for message in ["A@5", "B@8.0622577483", "C@6.7082039325"] {
            estimator.submit_message(message).unwrap();
        }
        events.lock().clear();

        let ticks = estimator
            .run_until(&mut ticker, tokio::time::sleep(Duration::from_millis(55)))
            .await;
        assert!(ticks >= 1);
        let events = events.lock();
        assert!(events.iter().all(|e| match e {
            EngineEvent::Estimate(estimate) => {
                (estimate.x - 3.0).abs() < 0.01 && (estimate.y - 4.0).abs() < 0.01
            }
            _ => false,
        }));
    }

    #[tokio::test]
    async fn test_run_until_stops_immediately_on_shutdown() {
        let (estimator, events) = recording(square());
        let mut ticker = Ticker::new(Duration::from_secs(60));

        let ticks = estimator.run_until(&mut ticker, async {}).await;
        assert_eq!(ticks, 0);
        assert!(events.lock().is_empty());
    }
}
