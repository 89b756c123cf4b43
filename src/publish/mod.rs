//! Observation fan-out to the durable log and the telemetry store

mod csv_log;
mod firebase;
mod record;

pub use csv_log::CsvDurableLog;
pub use firebase::{NullTelemetryStore, RealtimeDbStore};
pub use record::{coarse_key, TelemetryBreakdown, TelemetryRecord, COARSE_KEY_FORMAT};

use crate::aggregator::Observation;
use crate::error::PublishError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, warn};

/// Append-only row store
#[async_trait]
pub trait DurableLog: Send + Sync {
    async fn append(&self, observation: &Observation) -> Result<(), PublishError>;
}

/// Key-value telemetry store keyed by location
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    async fn publish(&self, location_key: &str, observation: &Observation) -> Result<(), PublishError>;
}

/// Per-sink result of one publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOutcome {
    pub durable: bool,
    pub telemetry: bool,
}

/// Writes every observation to both sinks independently.
///
/// A failure in one sink never prevents the write to the other, and no
/// failure is returned to the caller.
#[derive(Clone)]
pub struct Publisher {
    durable: Arc<dyn DurableLog>,
    telemetry: Arc<dyn TelemetryStore>,
}

impl Publisher {
    pub fn new(durable: Arc<dyn DurableLog>, telemetry: Arc<dyn TelemetryStore>) -> Self {
        Self { durable, telemetry }
    }

    pub async fn publish(&self, observation: &Observation) -> PublishOutcome {
        let (durable, telemetry) = tokio::join!(
            self.durable.append(observation),
            self.telemetry
                .publish(observation.location_name(), observation)
        );

        if let Err(e) = &durable {
            error!(
                "Lost durable log row for {}: {}",
                observation.location_name(),
                e
            );
        }
        if let Err(e) = &telemetry {
            warn!(
                "Telemetry write for {} failed: {}",
                observation.location_name(),
                e
            );
        }

        PublishOutcome {
            durable: durable.is_ok(),
            telemetry: telemetry.is_ok(),
        }
    }
}
