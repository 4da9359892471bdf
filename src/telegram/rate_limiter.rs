//! Rate limiter for outgoing Bot API calls.
//!
//! Spaces out message sends and edits so bursts of panel updates do not
//! trigger Telegram's "Too Many Requests" responses.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Rate limiter that enforces minimum intervals between operations.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum duration between allowed operations.
    min_interval: Duration,

    /// Last time an operation was performed.
    last_operation: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a new rate limiter with the specified minimum interval.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_operation: Mutex::new(None),
        }
    }

    /// Waits until an operation is allowed, then marks the operation as performed.
    ///
    /// Returns the duration waited (0 if no wait was needed).
    pub async fn wait_and_acquire(&self) -> Duration {
        let mut last = self.last_operation.lock().await;

        let wait_duration = match *last {
            Some(last_time) => self.min_interval.saturating_sub(last_time.elapsed()),
            None => Duration::ZERO,
        };

        if !wait_duration.is_zero() {
            debug!("Rate limiter: waiting {:?} before next call", wait_duration);
            tokio::time::sleep(wait_duration).await;
        }

        *last = Some(Instant::now());
        wait_duration
    }

    /// Handles a flood wait from Telegram by holding the limiter for its duration.
    pub async fn handle_flood_wait(&self, wait_seconds: u32) {
        warn!("Received flood wait from Telegram: {} seconds", wait_seconds);

        let mut last = self.last_operation.lock().await;
        tokio::time::sleep(Duration::from_secs(u64::from(wait_seconds))).await;
        *last = Some(Instant::now());
    }
}
