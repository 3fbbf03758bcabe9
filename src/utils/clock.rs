use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Source of wall-clock time and of every pause the bot takes.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);

    fn now_seconds(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Real time, backed by tokio's timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Simulated time. Sleeping returns immediately, advances the clock and is recorded.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn at_timestamp(seconds: i64) -> Self {
        Self::new(DateTime::from_timestamp(seconds, 0).unwrap_or_default())
    }

    pub fn advance(&self, duration: Duration) {
        let delta = chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }

    /// Every pause requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        self.advance(duration);
    }
}

/// Randomized pause between consecutive remote actions.
#[derive(Clone)]
pub struct Pacer {
    clock: Arc<dyn Clock>,
    min_ms: u64,
    max_ms: u64,
}

impl Pacer {
    pub fn new(clock: Arc<dyn Clock>, min_ms: u64, max_ms: u64) -> Self {
        Self {
            clock,
            min_ms: min_ms.min(max_ms),
            max_ms: max_ms.max(min_ms),
        }
    }

    /// Uniform in `[min_ms, max_ms]`.
    pub fn next_delay(&self) -> Duration {
        let ms = rand::thread_rng().gen_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        self.clock.sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_advances_on_sleep() {
        let clock = ManualClock::at_timestamp(1_000);
        clock.sleep(Duration::from_secs(90)).await;
        clock.sleep(Duration::from_millis(1_500)).await;

        assert_eq!(clock.now_seconds(), 1_091);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(90), Duration::from_millis(1_500)]);
    }

    #[test]
    fn test_pacer_delay_within_bounds() {
        let pacer = Pacer::new(Arc::new(ManualClock::at_timestamp(0)), 1_000, 3_000);
        for _ in 0..200 {
            let delay = pacer.next_delay();
            assert!(delay >= Duration::from_millis(1_000));
            assert!(delay <= Duration::from_millis(3_000));
        }
    }

    #[test]
    fn test_pacer_degenerate_range() {
        let pacer = Pacer::new(Arc::new(ManualClock::at_timestamp(0)), 500, 500);
        assert_eq!(pacer.next_delay(), Duration::from_millis(500));
    }
}
