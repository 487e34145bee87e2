//! # Retry Policy
//!
//! Backoff and classification rules for rate-limited sends.
//!
//! The remote client surfaces errors as unstructured text, so rate-limit
//! detection is substring matching on the error message. That fragile
//! contract is confined to [`is_rate_limit`] and [`extract_retry_delay`];
//! the retry loop itself never inspects error text, so a future structured
//! error code only has to touch this module.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use super::provider::BackendError;

/// Maximum automatic retries for a single send.
pub const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff, doubled per attempt.
const BASE_DELAY: Duration = Duration::from_secs(5);

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `attempt` (1-indexed): 2^attempt x base delay.
    /// With the default base this yields 10s, 20s, 40s for attempts 1-3.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }

    /// True while another automatic retry is allowed after `attempt`
    /// failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Returns true if the error indicates throttling or quota exhaustion by the
/// remote service.
///
/// A structured 429 status is authoritative; otherwise this falls back to
/// substring checks on the message text, which is all the remote client
/// guarantees.
pub fn is_rate_limit(err: &BackendError) -> bool {
    if let BackendError::Api { status: 429, .. } = err {
        return true;
    }
    let text = err.to_string();
    text.contains("429") || text.contains("quota") || text.contains("rate limit")
}

/// Extracts a server-suggested retry delay from error text.
///
/// Quota errors embed a hint like `"retryDelay":"7s"` in the response body;
/// returns the parsed duration, or None when no hint is present.
pub fn extract_retry_delay(message: &str) -> Option<Duration> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN
        .get_or_init(|| Regex::new(r#"retryDelay[":]+(\d+)s"#).expect("retry delay pattern"));
    let captures = re.captures(message)?;
    let seconds: u64 = captures[1].parse().ok()?;
    Some(Duration::from_secs(seconds))
}
