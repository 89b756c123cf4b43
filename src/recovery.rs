use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Recovery action to take after a connection-level failure
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Retry after a delay
    RetryAfterDelay(Duration),
    /// Stop retrying; the monitor terminates
    GiveUp,
}

/// Reconnect strategy for a stream monitor
///
/// The defaults reproduce a fixed delay with no retry cap. A multiplier above
/// 1.0 turns it into exponential backoff bounded by `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt
    pub base_delay: Duration,
    /// Growth factor applied per consecutive failure
    pub multiplier: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Maximum consecutive failed reconnects, `None` for unlimited
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            multiplier: 1.0,
            max_delay: Duration::from_secs(300),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Fixed-delay policy without a retry cap
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
            max_attempts: None,
        }
    }

    /// Calculate delay for the given number of consecutive failures so far
    pub fn delay_for(&self, failures: u32) -> Duration {
        if self.multiplier <= 1.0 {
            return self.base_delay;
        }

        let factor = self.multiplier.powi(failures.min(64) as i32);
        let delay_secs = self.base_delay.as_secs_f64() * factor;

        if !delay_secs.is_finite() || delay_secs > self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

/// Per-monitor reconnect bookkeeping
#[derive(Debug)]
pub struct ReconnectTracker {
    policy: ReconnectPolicy,
    consecutive_failures: u32,
    total_reconnects: u64,
}

impl ReconnectTracker {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            consecutive_failures: 0,
            total_reconnects: 0,
        }
    }

    /// Determine what to do before the next reconnect attempt
    pub fn next_action(&mut self, location: &str) -> RecoveryAction {
        if let Some(max) = self.policy.max_attempts {
            if self.consecutive_failures >= max {
                warn!(
                    "Maximum reconnect attempts ({}) exceeded for {}",
                    max, location
                );
                return RecoveryAction::GiveUp;
            }
        }

        let delay = self.policy.delay_for(self.consecutive_failures);
        self.consecutive_failures += 1;

        debug!(
            "Scheduling reconnect for {} (attempt {}) in {:?}",
            location, self.consecutive_failures, delay
        );

        RecoveryAction::RetryAfterDelay(delay)
    }

    /// Reset after a successful reconnect
    pub fn record_success(&mut self, location: &str) {
        if self.consecutive_failures > 0 {
            info!(
                "{} reconnected after {} attempt(s)",
                location, self.consecutive_failures
            );
            self.total_reconnects += 1;
        }
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn total_reconnects(&self) -> u64 {
        self.total_reconnects
    }
}

/// Sleep for `delay` unless cancelled first. Returns `false` when cancelled.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
