mod engine;
mod http;

pub use engine::{
    BoundingBox, Detection, DetectionEngine, EngineStats, EngineStatsSnapshot, ObjectDetector,
};
pub use http::HttpDetector;
