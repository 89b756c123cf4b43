use crate::error::DetectionError;
use crate::frame::NormalizedFrame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Axis-aligned box in working-resolution pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }
}

/// One recognised object, as reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub label: String,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            bbox,
            confidence,
            label: label.into(),
        }
    }
}

/// An object recognition backend.
///
/// Results are expected to be confidence-thresholded and overlap-deduplicated
/// already. Implementations are not required to be reentrant: `&mut self`
/// guarantees a single caller at a time.
#[async_trait]
pub trait ObjectDetector: Send {
    async fn detect(&mut self, frame: &NormalizedFrame) -> Result<Vec<Detection>, DetectionError>;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Shared handle to one detector instance.
///
/// Every clone refers to the same instance and the same lock, so calls from
/// all monitors holding a clone are serialized.
#[derive(Clone)]
pub struct DetectionEngine {
    detector: Arc<Mutex<Box<dyn ObjectDetector>>>,
    name: Arc<str>,
    stats: Arc<EngineStats>,
}

/// Counters for the shared engine
#[derive(Debug, Default)]
pub struct EngineStats {
    pub calls: AtomicU64,
    pub failures: AtomicU64,
    pub busy_micros: AtomicU64,
    pub wait_micros: AtomicU64,
}

/// Snapshot of engine counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatsSnapshot {
    pub calls: u64,
    pub failures: u64,
    pub busy: Duration,
    pub lock_wait: Duration,
}

impl DetectionEngine {
    pub fn new<D: ObjectDetector + 'static>(detector: D) -> Self {
        Self::from_boxed(Box::new(detector))
    }

    pub fn from_boxed(detector: Box<dyn ObjectDetector>) -> Self {
        let name: Arc<str> = Arc::from(detector.name());
        debug!("Detection engine backed by {}", name);

        Self {
            detector: Arc::new(Mutex::new(detector)),
            name,
            stats: Arc::new(EngineStats::default()),
        }
    }

    /// Name of the wrapped detector
    pub fn detector_name(&self) -> &str {
        &self.name
    }

    /// Run detection on `frame` while holding the engine lock
    pub async fn detect(&self, frame: &NormalizedFrame) -> Result<Vec<Detection>, DetectionError> {
        let wait_started = Instant::now();
        let mut detector = self.detector.lock().await;
        let waited = wait_started.elapsed();

        let call_started = Instant::now();
        let result = detector.detect(frame).await;
        let busy = call_started.elapsed();
        drop(detector);

        self.stats.calls.fetch_add(1, Ordering::Relaxed);
        self.stats
            .wait_micros
            .fetch_add(waited.as_micros() as u64, Ordering::Relaxed);
        self.stats
            .busy_micros
            .fetch_add(busy.as_micros() as u64, Ordering::Relaxed);

        match &result {
            Ok(detections) => {
                trace!(
                    "Frame {}: {} detections in {:?} (waited {:?}, frame age {:?})",
                    frame.source_id,
                    detections.len(),
                    busy,
                    waited,
                    frame.captured_at.elapsed().unwrap_or_default()
                );
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                debug!("Detection failed for frame {}: {}", frame.source_id, e);
            }
        }

        result
    }

    pub fn stats(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            calls: self.stats.calls.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
            busy: Duration::from_micros(self.stats.busy_micros.load(Ordering::Relaxed)),
            lock_wait: Duration::from_micros(self.stats.wait_micros.load(Ordering::Relaxed)),
        }
    }
}

impl std::fmt::Debug for DetectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionEngine")
            .field("detector", &self.name)
            .field("stats", &self.stats())
            .finish()
    }
}
