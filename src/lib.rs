pub mod aggregator;
pub mod app;
pub mod capture;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod location;
pub mod monitor;
pub mod publish;
pub mod recovery;
pub mod resolver;
pub mod secondary;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use aggregator::{Aggregator, LabelTaxonomy, Observation, PedestrianLevel, TrafficLevel};
pub use app::CitysenseApp;
pub use config::CitysenseConfig;
pub use detection::{Detection, DetectionEngine, ObjectDetector};
pub use error::{CitysenseError, Result};
pub use frame::{FrameData, NormalizedFrame};
pub use location::{Location, LocationTable};
pub use monitor::{MonitorReport, MonitorState, StreamMonitor, StreamMonitorBuilder};
pub use publish::Publisher;
pub use recovery::{ReconnectPolicy, ReconnectTracker};
pub use supervisor::{ShutdownReason, StreamSupervisor, SupervisorReport};
