//! # Request Pacing
//!
//! [`RequestGate`] enforces a minimum interval between outbound request
//! initiations, process-wide (one gate per controller, shared across all
//! sends regardless of session).
//!
//! This is advisory client-side shaping: it reduces 429 responses from the
//! remote service but does not replace the service's own limits.

use std::time::Duration;

use log::debug;
use tokio::time::{Instant, sleep};

/// Minimum time between request initiations.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug)]
pub struct RequestGate {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new(MIN_REQUEST_INTERVAL)
    }
}

impl RequestGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Suspends until the minimum interval since the previous acquisition
    /// has elapsed, then stamps the clock.
    ///
    /// Call immediately before the network request: the stamp is taken on
    /// return, so the floor bounds request initiation rate, not completion
    /// rate.
    pub async fn acquire(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!("Request gate: waiting {}ms before next request", wait.as_millis());
                sleep(wait).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}
