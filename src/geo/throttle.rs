use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Process-wide spacing gate for an external provider's request-rate ceiling.
///
/// Every outbound lookup must pass through `acquire`, which serializes
/// callers on a mutex over the last-request timestamp and sleeps out the
/// remainder of the minimum interval. The gate is owned and injected rather
/// than a module-level global, so tests can run with a zero interval.
pub struct RateGate {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Blocks until at least `min_interval` has passed since the previous
    /// caller was released, then stamps the current time.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
