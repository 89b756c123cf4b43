use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CitysenseError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Detection error: {0}")]
    Detection(#[from] DetectionError),

    #[error("Secondary sample error: {0}")]
    Sample(#[from] SampleError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl CitysenseError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Failures turning a source descriptor into a playable URL
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error("Failed to launch resolver '{program}': {details}")]
    Launch { program: String, details: String },

    #[error("Resolver timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Resolver exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Resolver returned no playable URL for {source_descriptor}")]
    NoUrl { source_descriptor: String },
}

/// Failures opening or reading a capture handle
#[derive(Error, Debug, Clone)]
pub enum CaptureError {
    #[error("Failed to open stream: {details}")]
    Open { details: String },

    #[error("Frame read failed: {details}")]
    Read { details: String },

    #[error("Frame read timed out after {timeout:?}")]
    ReadTimeout { timeout: Duration },

    #[error("End of stream")]
    EndOfStream,

    #[error("No capture backend available: {details}")]
    Unavailable { details: String },
}

/// Failures inside one detection tick
#[derive(Error, Debug, Clone)]
pub enum DetectionError {
    #[error("Frame preparation failed: {details}")]
    Frame { details: String },

    #[error("Detector request failed: {details}")]
    Request { details: String },

    #[error("Detector returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid detector response: {details}")]
    InvalidResponse { details: String },
}

/// Failures sampling the secondary (audio) observable
#[derive(Error, Debug, Clone)]
pub enum SampleError {
    #[error("Audio source unavailable: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Failed to launch '{program}': {details}")]
    Launch { program: String, details: String },

    #[error("Audio sample timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Audio decode failed: {details}")]
    Decode { details: String },
}

/// Sink write failures
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    #[error("Durable log write failed: {details}")]
    DurableLog { details: String },

    #[error("Telemetry write to {path} failed: {details}")]
    Telemetry { path: String, details: String },
}

impl From<reqwest::Error> for DetectionError {
    fn from(err: reqwest::Error) -> Self {
        DetectionError::Request {
            details: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CitysenseError>;
