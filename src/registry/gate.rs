//! Shared spacing gate for outbound registry calls

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

/// Enforces a minimum delay between the start of any two outbound calls.
///
/// The lock is held while sleeping, so concurrent callers queue up behind each
/// other instead of all waking at the same deadline.
#[derive(Debug)]
pub struct RateLimitGate {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimitGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next call is allowed to start, then claim the slot
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;

        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                debug!("Rate limit gate: waiting {:?}", remaining);
                sleep(remaining).await;
            }
        }

        *last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::Arc;

    #[tokio::test]
    async fn first_call_passes_immediately() {
        let gate = RateLimitGate::new(Duration::from_millis(200));
        let start = Instant::now();

        gate.wait().await;

        assert!(start.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn concurrent_callers_are_spaced_by_min_interval() {
        let gate = Arc::new(RateLimitGate::new(Duration::from_millis(50)));
        let start = Instant::now();

        let futures = (0..4).map(|_| {
            let gate = Arc::clone(&gate);
            async move { gate.wait().await }
        });
        join_all(futures).await;

        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn zero_interval_never_waits() {
        let gate = RateLimitGate::new(Duration::ZERO);
        let start = Instant::now();

        for _ in 0..10 {
            gate.wait().await;
        }

        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
