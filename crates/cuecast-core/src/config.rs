// ── Runtime configuration ──
//
// These types describe *how* the control plane behaves: where to connect,
// how hard to retry, how long cached answers live, how batches are paced.
// They never touch disk. `cuecast-config` (or a test) builds them and hands
// them in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// Reconnect backoff for the production-tool session.
///
/// `delay(attempt) = min(initial_delay * multiplier^attempt, max_delay)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Reconnect attempts before giving up into a terminal error.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 1.5,
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Backoff before reconnect `attempt` (0-based). Never exceeds
    /// `max_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exp);
        let capped = base.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }
}

/// Time-to-live per cached query category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTtl {
    pub scene_list: Duration,
    pub sources: Duration,
    pub status: Duration,
    pub default: Duration,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            scene_list: Duration::from_secs(5),
            sources: Duration::from_secs(2),
            status: Duration::from_secs(1),
            default: Duration::from_secs(2),
        }
    }
}

/// Configuration for the production-tool connection client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// obs-websocket URL, e.g. `ws://127.0.0.1:4455`.
    pub url: Url,
    /// Server password if authentication is enabled.
    pub password: Option<SecretString>,
    /// Per-call response timeout; also the maximum time a call may sit in
    /// the offline queue.
    pub call_timeout: Duration,
    /// Upper bound on socket open + Hello/Identify.
    pub handshake_timeout: Duration,
    /// Reconnect after unexpected closes and failed attempts.
    pub auto_reconnect: bool,
    pub reconnect: ReconnectPolicy,
    pub cache_ttl: CacheTtl,
}

impl ClientConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            password: None,
            call_timeout: Duration::from_secs(15),
            handshake_timeout: Duration::from_secs(10),
            auto_reconnect: true,
            reconnect: ReconnectPolicy::default(),
            cache_ttl: CacheTtl::default(),
        }
    }
}

/// Pacing and behaviour of transactional batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Pause between consecutive steps.
    pub step_delay: Duration,
    /// Drop actions the validator flags as no-ops instead of failing the
    /// whole batch.
    pub skip_redundant: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(100),
            skip_redundant: false,
        }
    }
}

/// Fixed-count, fixed-delay retry for automation actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Event throttling for the rule engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// At most one evaluation pass per event name per window.
    pub window: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_by_multiplier() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_millis(1500));
        assert_eq!(policy.delay(2), Duration::from_millis(2250));
    }

    #[test]
    fn backoff_never_exceeds_max_delay() {
        let policy = ReconnectPolicy::default();
        for attempt in 0..200 {
            assert!(policy.delay(attempt) <= policy.max_delay, "attempt {attempt}");
        }
        assert_eq!(policy.delay(u32::MAX), policy.max_delay);
    }
}
