//! Clock port - monotonic time for the scheduler
//!
//! - **SystemClock**: tokio's clock, so paused-time tests drive it too
//! - **FixedClock**: advanced by hand (tests, simulations)

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Clock supplies monotonic time (ordering, timeouts) and wall-clock time
/// (id timestamps, status snapshots).
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn wall_clock(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        (**self).wall_clock()
    }
}

/// Production clock.
///
/// Reads `tokio::time::Instant`, which follows `tokio::time::pause()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when `advance` is called.
///
/// Clones share the same offset.
#[derive(Debug, Clone)]
pub struct FixedClock {
    origin: Instant,
    wall_origin: DateTime<Utc>,
    offset_nanos: Arc<AtomicU64>,
}

impl FixedClock {
    pub fn new(wall_origin: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
            offset_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        let offset = chrono::Duration::from_std(self.elapsed()).unwrap_or(chrono::Duration::zero());
        self.wall_origin + offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_moves_only_when_advanced() {
        let wall = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::new(wall);
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);
        assert_eq!(clock.wall_clock(), wall);

        clock.advance(Duration::from_secs(30));

        assert_eq!(clock.now() - t0, Duration::from_secs(30));
        assert_eq!(clock.wall_clock(), wall + chrono::Duration::seconds(30));
    }

    #[test]
    fn clones_share_time() {
        let clock = FixedClock::default();
        let other = clock.clone();
        clock.advance(Duration::from_millis(500));
        assert_eq!(other.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn system_clock_follows_paused_tokio_time() {
        let clock = SystemClock;
        let t0 = clock.now();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(clock.now() - t0 >= Duration::from_secs(5));
    }
}
