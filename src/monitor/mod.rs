//! Per-location stream lifecycle

mod session;
mod state;
mod stream_monitor;

pub use session::StreamSession;
pub use state::MonitorState;
pub use stream_monitor::{MonitorReport, StreamMonitor, StreamMonitorBuilder};

use crate::config::CitysenseConfig;
use crate::detection::Detection;
use crate::frame::NormalizedFrame;
use crate::location::Location;
use crate::recovery::ReconnectPolicy;
use std::time::Duration;

/// Optional behaviours of a monitor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorCapabilities {
    /// Refresh the secondary (noise) observable on evaluation ticks
    pub secondary_sampling: bool,
    /// Forward every evaluated frame and its detections to a [`FrameTap`]
    pub interactive_display: bool,
}

impl MonitorCapabilities {
    pub fn from_config(config: &CitysenseConfig) -> Self {
        Self {
            secondary_sampling: config.secondary.enabled,
            interactive_display: config.monitor.interactive_display,
        }
    }
}

/// Receives each evaluated frame when the interactive display capability is on
pub trait FrameTap: Send + Sync {
    fn on_tick(&self, location: &Location, frame: &NormalizedFrame, detections: &[Detection]);
}

/// Tunables shared by all monitors
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    /// Evaluate every Kth successfully read frame
    pub sample_every_frames: u64,
    pub reconnect_policy: ReconnectPolicy,
    pub read_timeout: Duration,
    /// Detector working resolution
    pub working_width: u32,
    pub working_height: u32,
}

impl MonitorSettings {
    pub fn from_config(config: &CitysenseConfig) -> Self {
        Self {
            sample_every_frames: config.monitor.sample_every_frames.max(1),
            reconnect_policy: config.monitor.reconnect_policy(),
            read_timeout: config.monitor.read_timeout(),
            working_width: config.detector.input_width,
            working_height: config.detector.input_height,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from_config(&CitysenseConfig::default())
    }
}
