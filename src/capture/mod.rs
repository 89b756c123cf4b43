//! Video capture handles
//!
//! A [`CaptureOpener`] turns a resolved URL into a [`FrameSource`] that yields
//! decoded RGB frames in arrival order. Dropping the source releases the
//! underlying stream.

#[cfg(all(feature = "capture", target_os = "linux"))]
mod gst;

#[cfg(all(feature = "capture", target_os = "linux"))]
pub use gst::GstCaptureOpener;

use crate::error::CaptureError;
use crate::frame::FrameData;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// An open stream yielding decoded frames
#[async_trait]
pub trait FrameSource: Send {
    /// Block until the next frame arrives. The returned frame's `id` is local
    /// to this handle.
    async fn read_frame(&mut self) -> Result<FrameData, CaptureError>;
}

/// Opens capture handles for resolved URLs
#[async_trait]
pub trait CaptureOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn FrameSource>, CaptureError>;
}

/// Opener used when the binary was built without a capture backend
#[derive(Debug, Default, Clone)]
pub struct UnavailableCaptureOpener;

#[async_trait]
impl CaptureOpener for UnavailableCaptureOpener {
    async fn open(&self, _url: &str) -> Result<Box<dyn FrameSource>, CaptureError> {
        Err(CaptureError::Unavailable {
            details: "built without the 'capture' feature or not on Linux".to_string(),
        })
    }
}

/// Best capture backend for this build
pub fn default_opener(read_timeout: Duration) -> Result<Arc<dyn CaptureOpener>, CaptureError> {
    #[cfg(all(feature = "capture", target_os = "linux"))]
    {
        Ok(Arc::new(GstCaptureOpener::new(read_timeout)?))
    }

    #[cfg(not(all(feature = "capture", target_os = "linux")))]
    {
        let _ = read_timeout;
        tracing::warn!("No capture backend compiled in; every stream open will fail");
        Ok(Arc::new(UnavailableCaptureOpener))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_opener_refuses_to_open() {
        let opener = UnavailableCaptureOpener;

        let result = opener.open("https://cdn.example/live.m3u8").await;

        assert!(matches!(result, Err(CaptureError::Unavailable { .. })));
    }
}
