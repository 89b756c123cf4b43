//! Rate-limited secondary (ambient noise) observable

mod ffmpeg;
#[cfg(test)]
mod tests;

pub use ffmpeg::{dbfs, FfmpegNoiseSampler, SILENCE_FLOOR_DBFS};

use crate::config::SecondaryConfig;
use crate::error::SampleError;
use crate::location::Location;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Takes one loudness measurement of a location's audio
#[async_trait]
pub trait NoiseSampler: Send + Sync {
    /// Loudness in dBFS
    async fn sample(&self, location: &Location) -> Result<f64, SampleError>;
}

/// Per-location cache in front of a [`NoiseSampler`].
///
/// A fetch is attempted at most once per `interval`; failures keep the last
/// good value. A value older than `max_age` is reported as absent. Owned by a
/// single monitor, so at most one fetch is ever in flight.
pub struct SecondarySampler {
    sampler: Arc<dyn NoiseSampler>,
    interval: Duration,
    max_age: Duration,
    timeout: Duration,
    last_attempt: Option<Instant>,
    cached: Option<(f64, Instant)>,
}

impl SecondarySampler {
    pub fn new(sampler: Arc<dyn NoiseSampler>, interval: Duration, max_age: Duration, timeout: Duration) -> Self {
        Self {
            sampler,
            interval,
            max_age,
            timeout,
            last_attempt: None,
            cached: None,
        }
    }

    pub fn from_config(sampler: Arc<dyn NoiseSampler>, config: &SecondaryConfig) -> Self {
        Self::new(
            sampler,
            config.interval(),
            config.max_age(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn refresh_due(&self, now: Instant) -> bool {
        match self.last_attempt {
            None => true,
            Some(at) => now.duration_since(at) >= self.interval,
        }
    }

    /// Refresh when due, then return the cached value if still fresh
    pub async fn current(&mut self, location: &Location) -> Option<f64> {
        let now = Instant::now();

        if self.refresh_due(now) {
            self.last_attempt = Some(now);

            match tokio::time::timeout(self.timeout, self.sampler.sample(location)).await {
                Ok(Ok(level)) => {
                    debug!("Noise level {:.1} dBFS", level);
                    self.cached = Some((level, Instant::now()));
                }
                Ok(Err(e)) => warn!("Noise sample failed, keeping previous value: {}", e),
                Err(_) => warn!(
                    "Noise sample timed out after {:?}, keeping previous value",
                    self.timeout
                ),
            }
        }

        self.cached_value()
    }

    /// Cached value, if refreshed within `max_age`
    pub fn cached_value(&self) -> Option<f64> {
        let (level, refreshed_at) = self.cached?;
        if refreshed_at.elapsed() <= self.max_age {
            Some(level)
        } else {
            None
        }
    }
}
