//! Fixed-interval tick source

use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Periodic ticker; the first tick fires one period after creation.
///
/// Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct Ticker {
    interval: Interval,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let mut interval = time::interval_at(Instant::now() + period, period);
        // A slow refinement pushes later ticks back instead of bursting.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_tick_waits_one_period() {
        let start = Instant::now();
        let mut ticker = Ticker::new(Duration::from_millis(30));
        assert_eq!(ticker.period(), Duration::from_millis(30));

        ticker.tick().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
        ticker.tick().await;
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_zero_period_is_clamped() {
        let ticker = Ticker::new(Duration::ZERO);
        assert_eq!(ticker.period(), Duration::from_millis(1));
    }
}
