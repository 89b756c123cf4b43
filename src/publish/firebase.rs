use super::record::{coarse_key, TelemetryRecord};
use super::TelemetryStore;
use crate::aggregator::Observation;
use crate::config::TelemetryConfig;
use crate::error::{CitysenseError, PublishError, Result};
use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use reqwest::Url;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

const VERIFY_KEY: &str = "_test";

/// Realtime Database over its REST interface
pub struct RealtimeDbStore {
    client: reqwest::Client,
    base: Url,
    auth_token: Option<String>,
    timezone: Tz,
}

impl RealtimeDbStore {
    pub fn new(config: &TelemetryConfig, timezone: Tz) -> Result<Self> {
        let base = Url::parse(&config.database_url).map_err(|e| {
            CitysenseError::component(
                "telemetry".to_string(),
                format!("Invalid database URL '{}': {}", config.database_url, e),
            )
        })?;

        if base.cannot_be_a_base() {
            return Err(CitysenseError::component(
                "telemetry".to_string(),
                format!("Database URL '{}' cannot hold paths", config.database_url),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CitysenseError::component("telemetry".to_string(), e.to_string()))?;

        Ok(Self {
            client,
            base,
            auth_token: config.auth_token.clone(),
            timezone,
        })
    }

    /// REST URL for a node path; the last segment gets the `.json` suffix
    pub fn node_url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            if let Some((last, parents)) = segments.split_last() {
                path.extend(parents);
                path.push(&format!("{}.json", last));
            }
        }

        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }

        url
    }

    async fn put<T: Serialize + ?Sized>(&self, segments: &[&str], body: &T) -> std::result::Result<(), PublishError> {
        let path = segments.join("/");
        let url = self.node_url(segments);

        let response = self
            .client
            .put(url)
            .json(body)
            .send()
            .await
            .map_err(|e| PublishError::Telemetry {
                path: path.clone(),
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Telemetry {
                path,
                details: format!("{}: {}", status, body.trim()),
            });
        }

        debug!("Wrote {}", path);
        Ok(())
    }

    async fn delete(&self, segments: &[&str]) -> std::result::Result<(), PublishError> {
        let path = segments.join("/");

        let response = self
            .client
            .delete(self.node_url(segments))
            .send()
            .await
            .map_err(|e| PublishError::Telemetry {
                path: path.clone(),
                details: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(PublishError::Telemetry {
                path,
                details: response.status().to_string(),
            });
        }
        Ok(())
    }

    /// Write and remove a scratch node to prove the store accepts writes
    pub async fn verify(&self) -> std::result::Result<(), PublishError> {
        #[derive(Serialize)]
        struct Probe {
            status: &'static str,
            timestamp: String,
        }

        let probe = Probe {
            status: "ok",
            timestamp: Utc::now().to_rfc3339(),
        };

        self.put(&[VERIFY_KEY], &probe).await?;
        self.delete(&[VERIFY_KEY]).await?;

        info!("Telemetry store at {} accepted a test write", self.base);
        Ok(())
    }
}

#[async_trait]
impl TelemetryStore for RealtimeDbStore {
    async fn publish(&self, location_key: &str, observation: &Observation) -> std::result::Result<(), PublishError> {
        let record = TelemetryRecord::from_observation(observation, self.timezone);
        let key = coarse_key(observation, self.timezone);

        self.put(&["locations", location_key, "detections", key.as_str()], &record)
            .await?;
        self.put(&["locations", location_key, "latest"], &record).await
    }
}

/// Store used when telemetry is disabled or failed verification
#[derive(Debug, Default, Clone)]
pub struct NullTelemetryStore;

#[async_trait]
impl TelemetryStore for NullTelemetryStore {
    async fn publish(&self, _location_key: &str, _observation: &Observation) -> std::result::Result<(), PublishError> {
        Ok(())
    }
}
