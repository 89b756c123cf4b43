//! In-crate fakes for unit tests

use crate::aggregator::{Aggregator, Observation};
use crate::capture::{CaptureOpener, FrameSource};
use crate::detection::{BoundingBox, Detection, ObjectDetector};
use crate::error::{CaptureError, DetectionError, PublishError, ResolveError, SampleError};
use crate::frame::{FrameData, NormalizedFrame, RGB_BYTES_PER_PIXEL};
use crate::location::Location;
use crate::monitor::FrameTap;
use crate::publish::{DurableLog, TelemetryStore};
use crate::resolver::StreamResolver;
use crate::secondary::NoiseSampler;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

pub fn location(id: &str, name: &str) -> Location {
    Location {
        id: id.to_string(),
        name: name.to_string(),
        source: format!("https://live.example/{}", id),
        description: String::new(),
    }
}

pub fn detection(label: &str) -> Detection {
    Detection::new(label, 0.9, BoundingBox::from_corners(0.0, 0.0, 10.0, 10.0))
}

pub fn detections(labels: &[&str]) -> Vec<Detection> {
    labels.iter().map(|label| detection(label)).collect()
}

pub fn rgb_frame(id: u64, width: u32, height: u32) -> FrameData {
    FrameData::new(
        id,
        SystemTime::now(),
        vec![64u8; width as usize * height as usize * RGB_BYTES_PER_PIXEL],
        width,
        height,
    )
}

pub fn observation(location: &Location, labels: &[&str], secondary: Option<f64>) -> Observation {
    Aggregator::default().observe(location, Utc::now(), &detections(labels), secondary)
}

/// Shared record of resolver and capture calls, in the order they happened
pub type CallJournal = Arc<Mutex<Vec<&'static str>>>;

/// Resolver answering from a script, then with a fixed URL
pub struct ScriptedResolver {
    script: Mutex<VecDeque<Result<String, ResolveError>>>,
    fallback: Option<String>,
    calls: AtomicUsize,
    journal: Option<CallJournal>,
}

impl ScriptedResolver {
    pub fn ok(url: &str) -> Self {
        Self::with_script(Vec::new(), Some(url))
    }

    pub fn failing() -> Self {
        Self::with_script(Vec::new(), None)
    }

    pub fn with_script(script: Vec<Result<String, ResolveError>>, fallback: Option<&str>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: fallback.map(str::to_string),
            calls: AtomicUsize::new(0),
            journal: None,
        }
    }

    /// Record every call as `resolve` in `journal`
    pub fn journaled(mut self, journal: CallJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamResolver for ScriptedResolver {
    async fn resolve(&self, source: &str) -> Result<String, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(journal) = &self.journal {
            journal.lock().push("resolve");
        }
        if let Some(result) = self.script.lock().pop_front() {
            return result;
        }
        self.fallback.clone().ok_or_else(|| ResolveError::NoUrl {
            source_descriptor: source.to_string(),
        })
    }
}

/// One scripted frame read
#[derive(Debug, Clone)]
pub enum ReadStep {
    Frame,
    Fail(CaptureError),
}

impl ReadStep {
    pub fn frames(count: usize) -> Vec<ReadStep> {
        vec![ReadStep::Frame; count]
    }
}

/// Opener handing out scripted sources, one script per open
pub struct ScriptedOpener {
    sessions: Mutex<VecDeque<Result<Vec<ReadStep>, CaptureError>>>,
    opened_urls: Mutex<Vec<String>>,
    live_handles: Arc<AtomicUsize>,
    max_live_handles: Arc<AtomicUsize>,
    journal: Option<CallJournal>,
    width: u32,
    height: u32,
}

impl ScriptedOpener {
    pub fn new(sessions: Vec<Result<Vec<ReadStep>, CaptureError>>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into()),
            opened_urls: Mutex::new(Vec::new()),
            live_handles: Arc::new(AtomicUsize::new(0)),
            max_live_handles: Arc::new(AtomicUsize::new(0)),
            journal: None,
            width: 32,
            height: 24,
        }
    }

    /// Record every open as `open` and every handle drop as `release` in `journal`
    pub fn journaled(mut self, journal: CallJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn opens(&self) -> usize {
        self.opened_urls.lock().len()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.opened_urls.lock().clone()
    }

    pub fn live_handles(&self) -> usize {
        self.live_handles.load(Ordering::SeqCst)
    }

    pub fn max_live_handles(&self) -> usize {
        self.max_live_handles.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureOpener for ScriptedOpener {
    async fn open(&self, url: &str) -> Result<Box<dyn FrameSource>, CaptureError> {
        self.opened_urls.lock().push(url.to_string());
        if let Some(journal) = &self.journal {
            journal.lock().push("open");
        }
        let steps = self.sessions.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))?;

        let live = self.live_handles.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live_handles.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(ScriptedSource {
            steps: steps.into(),
            width: self.width,
            height: self.height,
            next_id: 0,
            live_handles: Arc::clone(&self.live_handles),
            journal: self.journal.clone(),
        }))
    }
}

/// Source that waits forever once its script runs out
struct ScriptedSource {
    steps: VecDeque<ReadStep>,
    width: u32,
    height: u32,
    next_id: u64,
    live_handles: Arc<AtomicUsize>,
    journal: Option<CallJournal>,
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn read_frame(&mut self) -> Result<FrameData, CaptureError> {
        match self.steps.pop_front() {
            Some(ReadStep::Frame) => {
                let frame = rgb_frame(self.next_id, self.width, self.height);
                self.next_id += 1;
                Ok(frame)
            }
            Some(ReadStep::Fail(e)) => Err(e),
            None => std::future::pending().await,
        }
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.live_handles.fetch_sub(1, Ordering::SeqCst);
        if let Some(journal) = &self.journal {
            journal.lock().push("release");
        }
    }
}

/// Detector answering from a script, recording concurrency
#[derive(Clone, Default)]
pub struct ScriptedDetector {
    script: Arc<Mutex<VecDeque<Result<Vec<Detection>, DetectionError>>>>,
    fallback: Vec<Detection>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedDetector {
    pub fn returning(labels: &[&str]) -> Self {
        Self {
            fallback: detections(labels),
            ..Self::default()
        }
    }

    pub fn with_script(mut self, script: Vec<Result<Vec<Detection>, DetectionError>>) -> Self {
        self.script = Arc::new(Mutex::new(script.into()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectDetector for ScriptedDetector {
    async fn detect(&mut self, _frame: &NormalizedFrame) -> Result<Vec<Detection>, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Noise sampler answering from a script, then with a fixed level
pub struct ScriptedSampler {
    script: Mutex<VecDeque<Result<f64, SampleError>>>,
    fallback: f64,
    calls: AtomicUsize,
}

impl ScriptedSampler {
    pub fn new(script: Vec<Result<f64, SampleError>>, fallback: f64) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NoiseSampler for ScriptedSampler {
    async fn sample(&self, _location: &Location) -> Result<f64, SampleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().pop_front().unwrap_or(Ok(self.fallback))
    }
}

/// In-memory durable log
#[derive(Default)]
pub struct MemoryLog {
    rows: Mutex<Vec<Observation>>,
    failing: AtomicBool,
}

impl MemoryLog {
    pub fn failing() -> Self {
        let log = Self::default();
        log.failing.store(true, Ordering::SeqCst);
        log
    }

    pub fn rows(&self) -> Vec<Observation> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl DurableLog for MemoryLog {
    async fn append(&self, observation: &Observation) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::DurableLog {
                details: "disk full".to_string(),
            });
        }
        self.rows.lock().push(observation.clone());
        Ok(())
    }
}

/// In-memory telemetry store
#[derive(Default)]
pub struct MemoryStore {
    writes: Mutex<Vec<(String, Observation)>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        let store = Self::default();
        store.failing.store(true, Ordering::SeqCst);
        store
    }

    pub fn writes(&self) -> Vec<(String, Observation)> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn publish(&self, location_key: &str, observation: &Observation) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Telemetry {
                path: format!("locations/{}", location_key),
                details: "unreachable".to_string(),
            });
        }
        self.writes
            .lock()
            .push((location_key.to_string(), observation.clone()));
        Ok(())
    }
}

/// Frame tap counting forwarded ticks
#[derive(Default)]
pub struct CountingTap {
    ticks: AtomicUsize,
}

impl CountingTap {
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl FrameTap for CountingTap {
    fn on_tick(&self, _location: &Location, _frame: &NormalizedFrame, _detections: &[Detection]) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }
}
