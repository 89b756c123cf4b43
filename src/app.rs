//! Wires configuration into a ready-to-run supervisor

use crate::aggregator::{Aggregator, LabelTaxonomy};
use crate::capture;
use crate::config::{CitysenseConfig, TelemetryConfig};
use crate::detection::{Detection, DetectionEngine, HttpDetector};
use crate::error::Result;
use crate::frame::NormalizedFrame;
use crate::location::{Location, LocationTable};
use crate::monitor::{FrameTap, MonitorCapabilities, MonitorSettings, StreamMonitor};
use crate::publish::{
    CsvDurableLog, NullTelemetryStore, Publisher, RealtimeDbStore, TelemetryStore,
};
use crate::resolver::{CommandResolver, StreamResolver};
use crate::secondary::{FfmpegNoiseSampler, NoiseSampler, SecondarySampler};
use crate::supervisor::{wait_for_shutdown_signal, StreamSupervisor, SupervisorReport};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Frame tap that traces every detection of an evaluated frame
pub struct DetectionLogTap;

impl FrameTap for DetectionLogTap {
    fn on_tick(&self, location: &Location, frame: &NormalizedFrame, detections: &[Detection]) {
        for detection in detections {
            debug!(
                "[{}] frame {}: {} {:.2} at {:?}",
                location.name, frame.source_id, detection.label, detection.confidence, detection.bbox
            );
        }
    }
}

/// Fully built application: one supervisor plus the shared engine
pub struct CitysenseApp {
    supervisor: StreamSupervisor,
    engine: DetectionEngine,
    locations: LocationTable,
}

impl CitysenseApp {
    /// Build every component for the selected locations (all when `location_ids` is empty)
    pub async fn build(config: &CitysenseConfig, location_ids: &[String]) -> Result<Self> {
        let timezone = config.timezone();
        let locations = LocationTable::from_config(&config.locations).select(location_ids)?;
        info!("Monitoring {} locations", locations.len());

        let aggregator = Aggregator::new(LabelTaxonomy::from_config(&config.taxonomy)?);
        let engine = DetectionEngine::new(HttpDetector::new(&config.detector)?);
        info!(
            "Detector {} at {}",
            engine.detector_name(),
            config.detector.endpoint
        );

        let resolver: Arc<dyn StreamResolver> = Arc::new(CommandResolver::video(&config.resolver));
        let opener = capture::default_opener(config.monitor.read_timeout())?;

        let durable =
            CsvDurableLog::from_config(&config.durable_log, timezone, config.secondary.enabled)
                .await?;
        info!("Durable log: {}", durable.path().display());
        let telemetry = telemetry_store(&config.telemetry, timezone).await;
        let publisher = Publisher::new(Arc::new(durable), telemetry);

        let capabilities = MonitorCapabilities::from_config(config);
        let settings = MonitorSettings::from_config(config);

        let noise: Option<Arc<dyn NoiseSampler>> = if capabilities.secondary_sampling {
            let audio = Arc::new(CommandResolver::audio(&config.resolver));
            Some(Arc::new(FfmpegNoiseSampler::new(audio, &config.secondary)))
        } else {
            None
        };
        let frame_tap: Option<Arc<dyn FrameTap>> = capabilities
            .interactive_display
            .then(|| Arc::new(DetectionLogTap) as Arc<dyn FrameTap>);

        let mut supervisor = StreamSupervisor::from_config(&config.supervisor);
        for location in locations.iter() {
            let mut builder = StreamMonitor::builder()
                .location(Arc::clone(location))
                .settings(settings.clone())
                .capabilities(capabilities)
                .resolver(Arc::clone(&resolver))
                .opener(Arc::clone(&opener))
                .engine(engine.clone())
                .aggregator(aggregator.clone())
                .publisher(publisher.clone());

            if let Some(noise) = &noise {
                builder = builder.secondary(SecondarySampler::from_config(
                    Arc::clone(noise),
                    &config.secondary,
                ));
            }
            if let Some(tap) = &frame_tap {
                builder = builder.frame_tap(Arc::clone(tap));
            }

            supervisor.add(builder)?;
        }

        Ok(Self {
            supervisor,
            engine,
            locations,
        })
    }

    pub fn locations(&self) -> &LocationTable {
        &self.locations
    }

    /// Run until SIGTERM or Ctrl+C, then drain every monitor
    pub async fn run(self) -> SupervisorReport {
        let report = self.supervisor.run_until(wait_for_shutdown_signal()).await;

        let stats = self.engine.stats();
        info!(
            "Detector handled {} calls ({} failed), busy {:?}, lock wait {:?}",
            stats.calls, stats.failures, stats.busy, stats.lock_wait
        );
        for monitor in &report.reports {
            info!(
                "{}: {} after {} frames, {} ticks ({} failed), {} reconnects",
                monitor.location_id,
                monitor.final_state,
                monitor.frames_read,
                monitor.ticks,
                monitor.failed_ticks,
                monitor.reconnects
            );
        }

        report
    }
}

/// Realtime store when enabled and writable, otherwise a no-op store
async fn telemetry_store(config: &TelemetryConfig, timezone: Tz) -> Arc<dyn TelemetryStore> {
    if !config.enabled {
        info!("Telemetry store disabled");
        return Arc::new(NullTelemetryStore);
    }

    let store = match RealtimeDbStore::new(config, timezone) {
        Ok(store) => store,
        Err(e) => {
            warn!("Telemetry store unavailable, continuing with the durable log only: {}", e);
            return Arc::new(NullTelemetryStore);
        }
    };

    match store.verify().await {
        Ok(()) => {
            info!("Telemetry store write test passed");
            Arc::new(store)
        }
        Err(e) => {
            warn!("Telemetry store write test failed, continuing with the durable log only: {}", e);
            Arc::new(NullTelemetryStore)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocationConfig;

    fn config_in(dir: &std::path::Path) -> CitysenseConfig {
        let mut config = CitysenseConfig::default();
        config.durable_log.path = dir.join("observations.csv").to_string_lossy().into_owned();
        config.telemetry.enabled = false;
        config.locations = vec![
            LocationConfig {
                id: "1".to_string(),
                name: "Canmore".to_string(),
                source: "https://www.youtube.com/watch?v=canmore".to_string(),
                description: String::new(),
            },
            LocationConfig {
                id: "2".to_string(),
                name: "Koh Samui".to_string(),
                source: "https://www.youtube.com/watch?v=samui".to_string(),
                description: String::new(),
            },
        ];
        config
    }

    #[tokio::test]
    async fn test_build_selects_locations() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let app = match CitysenseApp::build(&config, &["2".to_string()]).await {
            Ok(app) => app,
            // No capture backend in this build
            Err(crate::error::CitysenseError::Capture(_)) => return,
            Err(e) => panic!("unexpected build failure: {}", e),
        };

        assert_eq!(app.locations().len(), 1);
        assert!(app.locations().get("2").is_some());
        assert!(dir.path().join("observations.csv").exists());
    }

    #[tokio::test]
    async fn test_build_rejects_unknown_location() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        assert!(CitysenseApp::build(&config, &["9".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn test_disabled_telemetry_is_null_store() {
        let config = TelemetryConfig {
            enabled: false,
            ..TelemetryConfig::default()
        };
        let store = telemetry_store(&config, chrono_tz::UTC).await;
        let canmore = crate::testing::location("1", "Canmore");
        let observation = crate::testing::observation(&canmore, &["car"], None);

        assert!(store.publish("Canmore", &observation).await.is_ok());
    }
}
