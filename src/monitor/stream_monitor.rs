use super::{FrameTap, MonitorCapabilities, MonitorSettings, MonitorState, StreamSession};
use crate::aggregator::{Aggregator, Observation};
use crate::capture::CaptureOpener;
use crate::detection::DetectionEngine;
use crate::error::{CaptureError, CitysenseError, Result};
use crate::frame::{FrameData, NormalizedFrame};
use crate::location::Location;
use crate::publish::Publisher;
use crate::recovery::{sleep_or_cancel, RecoveryAction, ReconnectTracker};
use crate::resolver::StreamResolver;
use crate::secondary::SecondarySampler;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Summary returned when a monitor terminates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorReport {
    pub location_id: String,
    pub final_state: MonitorState,
    pub frames_read: u64,
    pub ticks: u64,
    pub failed_ticks: u64,
    pub reconnects: u64,
}

/// How a sampling run on one capture handle ended
enum SamplingEnd {
    Cancelled,
    ReadFailed(CaptureError),
}

/// Drives one location through resolve → connect → sample → reconnect
pub struct StreamMonitor {
    location: Arc<Location>,
    settings: MonitorSettings,
    capabilities: MonitorCapabilities,
    resolver: Arc<dyn StreamResolver>,
    opener: Arc<dyn CaptureOpener>,
    engine: DetectionEngine,
    aggregator: Aggregator,
    publisher: Publisher,
    frame_tap: Option<Arc<dyn FrameTap>>,
    state_tx: watch::Sender<MonitorState>,
    cancel: CancellationToken,
    session: StreamSession,
    ticks: u64,
    failed_ticks: u64,
}

impl StreamMonitor {
    pub fn builder() -> StreamMonitorBuilder {
        StreamMonitorBuilder::new()
    }

    pub fn location(&self) -> &Arc<Location> {
        &self.location
    }

    /// Watch the monitor's lifecycle state
    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.state_tx.subscribe()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn set_state(&self, state: MonitorState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!("{} -> {}", previous, state);
        }
    }

    /// Run until stopped or failed
    pub async fn run(self) -> MonitorReport {
        let span = info_span!("monitor", location = %self.location.name, id = %self.location.id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(mut self) -> MonitorReport {
        info!("Starting monitor for {}", self.location.description);

        let mut tracker = ReconnectTracker::new(self.settings.reconnect_policy.clone());
        let mut initial = true;

        let final_state = loop {
            if self.cancel.is_cancelled() {
                break MonitorState::Stopped;
            }

            self.set_state(MonitorState::Resolving);
            let resolved = tokio::select! {
                _ = self.cancel.cancelled() => break MonitorState::Stopped,
                resolved = self.resolver.resolve(&self.location.source) => resolved,
            };

            let connected = match resolved {
                Ok(url) => {
                    self.set_state(MonitorState::Connected);
                    tokio::select! {
                        _ = self.cancel.cancelled() => break MonitorState::Stopped,
                        opened = self.opener.open(&url) => opened.map_err(CitysenseError::from),
                    }
                }
                Err(e) => Err(CitysenseError::from(e)),
            };

            match connected {
                Ok(source) => {
                    info!("Stream opened");
                    self.session.attach(source);
                }
                Err(e) if initial => {
                    error!("Unable to start stream, skipping location: {}", e);
                    break MonitorState::Failed;
                }
                Err(e) => warn!("Reconnect attempt failed: {}", e),
            }
            initial = false;

            if self.session.is_attached() {
                self.set_state(MonitorState::Sampling);
                let end = self.sample(&mut tracker).await;
                self.session.release();

                match end {
                    SamplingEnd::Cancelled => break MonitorState::Stopped,
                    SamplingEnd::ReadFailed(e) => {
                        warn!(
                            "Lost stream after {} frames: {}",
                            self.session.frame_count(),
                            e
                        );
                    }
                }
            }

            match tracker.next_action(&self.location.name) {
                RecoveryAction::RetryAfterDelay(delay) => {
                    self.set_state(MonitorState::ReconnectBackoff);
                    info!("Reconnecting in {:?}", delay);
                    if !sleep_or_cancel(delay, &self.cancel).await {
                        break MonitorState::Stopped;
                    }
                }
                RecoveryAction::GiveUp => {
                    error!("Giving up after repeated reconnect failures");
                    break MonitorState::Failed;
                }
            }
        };

        self.session.release();
        self.set_state(final_state);
        info!(
            "Monitor finished in {} after {} frames ({} ticks)",
            final_state,
            self.session.frame_count(),
            self.ticks
        );

        MonitorReport {
            location_id: self.location.id.clone(),
            final_state,
            frames_read: self.session.frame_count(),
            ticks: self.ticks,
            failed_ticks: self.failed_ticks,
            reconnects: tracker.total_reconnects(),
        }
    }

    /// Read frames from the attached handle until a read fails or a stop is requested
    async fn sample(&mut self, tracker: &mut ReconnectTracker) -> SamplingEnd {
        let cancel = self.cancel.clone();
        let read_timeout = self.settings.read_timeout;
        let mut first_frame = true;

        loop {
            let Some(source) = self.session.source_mut() else {
                return SamplingEnd::ReadFailed(CaptureError::Read {
                    details: "no capture handle".to_string(),
                });
            };

            let read = tokio::select! {
                _ = cancel.cancelled() => return SamplingEnd::Cancelled,
                read = tokio::time::timeout(read_timeout, source.read_frame()) => read,
            };

            let mut frame = match read {
                Ok(Ok(frame)) => frame,
                Ok(Err(e)) => return SamplingEnd::ReadFailed(e),
                Err(_) => {
                    return SamplingEnd::ReadFailed(CaptureError::ReadTimeout {
                        timeout: read_timeout,
                    })
                }
            };

            if first_frame {
                tracker.record_success(&self.location.name);
                first_frame = false;
            }

            let count = self.session.record_frame();
            frame.id = count;

            if count % self.settings.sample_every_frames != 0 {
                continue;
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return SamplingEnd::Cancelled,
                outcome = self.tick(&frame) => outcome,
            };

            match outcome {
                Ok(()) => self.ticks += 1,
                Err(e) => {
                    self.failed_ticks += 1;
                    warn!("Skipping tick at frame {}: {}", count, e);
                }
            }
        }
    }

    /// One evaluation: normalize, detect, aggregate, publish
    async fn tick(&mut self, frame: &FrameData) -> Result<()> {
        let normalized = NormalizedFrame::from_frame(
            frame,
            self.settings.working_width,
            self.settings.working_height,
        )?;

        let detections = self.engine.detect(&normalized).await?;

        if self.capabilities.interactive_display {
            if let Some(tap) = &self.frame_tap {
                tap.on_tick(&self.location, &normalized, &detections);
            }
        }

        let secondary = match self.session.secondary.as_mut() {
            Some(sampler) if self.capabilities.secondary_sampling => {
                sampler.current(&self.location).await
            }
            _ => None,
        };

        let observation = self
            .aggregator
            .observe(&self.location, Utc::now(), &detections, secondary);

        self.publisher.publish(&observation).await;
        self.log_observation(&observation);

        Ok(())
    }

    fn log_observation(&mut self, observation: &Observation) {
        let rate = self.session.record_tick();

        info!(
            vehicles = observation.vehicle_count(),
            persons = observation.person_count(),
            traffic = %observation.traffic_level(),
            pedestrians = %observation.pedestrian_level(),
            secondary = ?observation.secondary_level(),
            "Frame {}: {} vehicles, {} persons, traffic {} ({})",
            self.session.frame_count(),
            observation.vehicle_count(),
            observation.person_count(),
            observation.traffic_level(),
            rate.map(|fps| format!("{:.1} fps", fps))
                .unwrap_or_else(|| "first tick".to_string())
        );
    }
}

/// Builder for StreamMonitor
pub struct StreamMonitorBuilder {
    location: Option<Arc<Location>>,
    settings: MonitorSettings,
    capabilities: MonitorCapabilities,
    resolver: Option<Arc<dyn StreamResolver>>,
    opener: Option<Arc<dyn CaptureOpener>>,
    engine: Option<DetectionEngine>,
    aggregator: Option<Aggregator>,
    publisher: Option<Publisher>,
    secondary: Option<SecondarySampler>,
    frame_tap: Option<Arc<dyn FrameTap>>,
    cancel: Option<CancellationToken>,
}

impl StreamMonitorBuilder {
    pub fn new() -> Self {
        Self {
            location: None,
            settings: MonitorSettings::default(),
            capabilities: MonitorCapabilities::default(),
            resolver: None,
            opener: None,
            engine: None,
            aggregator: None,
            publisher: None,
            secondary: None,
            frame_tap: None,
            cancel: None,
        }
    }

    pub fn location(mut self, location: Arc<Location>) -> Self {
        self.location = Some(location);
        self
    }

    pub fn settings(mut self, settings: MonitorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn capabilities(mut self, capabilities: MonitorCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn StreamResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn opener(mut self, opener: Arc<dyn CaptureOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    pub fn engine(mut self, engine: DetectionEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn publisher(mut self, publisher: Publisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Sampler used when the secondary sampling capability is on
    pub fn secondary(mut self, secondary: SecondarySampler) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Tap used when the interactive display capability is on
    pub fn frame_tap(mut self, frame_tap: Arc<dyn FrameTap>) -> Self {
        self.frame_tap = Some(frame_tap);
        self
    }

    pub fn cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> Result<StreamMonitor> {
        let location = self
            .location
            .ok_or_else(|| CitysenseError::component("stream_monitor_builder", "Location is required"))?;
        let resolver = self
            .resolver
            .ok_or_else(|| CitysenseError::component("stream_monitor_builder", "Resolver is required"))?;
        let opener = self
            .opener
            .ok_or_else(|| CitysenseError::component("stream_monitor_builder", "Capture opener is required"))?;
        let engine = self
            .engine
            .ok_or_else(|| CitysenseError::component("stream_monitor_builder", "Detection engine is required"))?;
        let publisher = self
            .publisher
            .ok_or_else(|| CitysenseError::component("stream_monitor_builder", "Publisher is required"))?;

        if self.capabilities.secondary_sampling && self.secondary.is_none() {
            return Err(CitysenseError::component(
                "stream_monitor_builder",
                "Secondary sampling enabled without a sampler",
            ));
        }

        let (state_tx, _) = watch::channel(MonitorState::Idle);

        Ok(StreamMonitor {
            location,
            settings: self.settings,
            capabilities: self.capabilities,
            resolver,
            opener,
            engine,
            aggregator: self.aggregator.unwrap_or_default(),
            publisher,
            frame_tap: self.frame_tap,
            state_tx,
            cancel: self.cancel.unwrap_or_default(),
            session: StreamSession::new(self.secondary),
            ticks: 0,
            failed_ticks: 0,
        })
    }
}

impl Default for StreamMonitorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
