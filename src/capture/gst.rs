use super::{CaptureOpener, FrameSource};
use crate::error::CaptureError;
use crate::frame::{FrameData, RGB_BYTES_PER_PIXEL};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, trace, warn};

/// GStreamer-backed opener decoding any `uridecodebin`-supported URL to RGB
#[derive(Debug, Clone)]
pub struct GstCaptureOpener {
    read_timeout: Duration,
}

impl GstCaptureOpener {
    pub fn new(read_timeout: Duration) -> Result<Self, CaptureError> {
        gstreamer::init().map_err(|e| CaptureError::Unavailable {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        Ok(Self { read_timeout })
    }

    fn pipeline_description(url: &str) -> String {
        format!(
            "uridecodebin uri=\"{}\" ! videoconvert ! video/x-raw,format=RGB ! \
             appsink name=sink sync=false max-buffers=4 drop=false",
            url.replace('"', "%22")
        )
    }
}

#[async_trait]
impl CaptureOpener for GstCaptureOpener {
    async fn open(&self, url: &str) -> Result<Box<dyn FrameSource>, CaptureError> {
        let description = Self::pipeline_description(url);
        debug!("Creating GStreamer pipeline: {}", description);

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| CaptureError::Open {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CaptureError::Open {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or_else(|| CaptureError::Open {
                details: "Pipeline has no appsink".to_string(),
            })?;

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(CaptureError::Open {
                details: format!("Failed to start pipeline: {}", e),
            });
        }

        info!("Capture pipeline playing");

        Ok(Box::new(GstFrameSource {
            pipeline,
            appsink,
            read_timeout: self.read_timeout,
            next_id: 0,
        }))
    }
}

struct GstFrameSource {
    pipeline: Pipeline,
    appsink: AppSink,
    read_timeout: Duration,
    next_id: u64,
}

impl GstFrameSource {
    /// Drain the pipeline bus for a fatal error, if one was posted
    fn pending_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        let message =
            bus.pop_filtered(&[gstreamer::MessageType::Error, gstreamer::MessageType::Eos])?;

        match message.view() {
            gstreamer::MessageView::Error(err) => Some(err.error().to_string()),
            gstreamer::MessageView::Eos(_) => Some("end of stream".to_string()),
            _ => None,
        }
    }

    fn sample_to_frame(&mut self, sample: gstreamer::Sample) -> Result<FrameData, CaptureError> {
        let buffer = sample.buffer().ok_or_else(|| CaptureError::Read {
            details: "No buffer in sample".to_string(),
        })?;

        let caps = sample.caps().ok_or_else(|| CaptureError::Read {
            details: "No caps in sample".to_string(),
        })?;

        let video_info = VideoInfo::from_caps(caps).map_err(|e| CaptureError::Read {
            details: format!("Failed to get video info: {}", e),
        })?;

        let map = buffer.map_readable().map_err(|e| CaptureError::Read {
            details: format!("Failed to map buffer: {}", e),
        })?;

        let width = video_info.width();
        let height = video_info.height();
        let stride = video_info.stride().first().copied().unwrap_or(0).max(0) as usize;

        let data = pack_rows(map.as_slice(), width, height, stride).ok_or_else(|| {
            CaptureError::Read {
                details: format!(
                    "Buffer of {} bytes too small for {}x{} (stride {})",
                    map.len(),
                    width,
                    height,
                    stride
                ),
            }
        })?;

        let id = self.next_id;
        self.next_id += 1;
        trace!("Captured frame {} ({}x{})", id, width, height);

        Ok(FrameData::new(id, SystemTime::now(), data, width, height))
    }
}

#[async_trait]
impl FrameSource for GstFrameSource {
    async fn read_frame(&mut self) -> Result<FrameData, CaptureError> {
        let appsink = self.appsink.clone();
        let wait = gstreamer::ClockTime::from_mseconds(self.read_timeout.as_millis() as u64);

        let sample = tokio::task::spawn_blocking(move || {
            let sample = appsink.try_pull_sample(wait);
            let eos = sample.is_none() && appsink.is_eos();
            (sample, eos)
        })
        .await
        .map_err(|e| CaptureError::Read {
            details: format!("Capture task failed: {}", e),
        })?;

        match sample {
            (Some(sample), _) => self.sample_to_frame(sample),
            (None, true) => Err(CaptureError::EndOfStream),
            (None, false) => match self.pending_error() {
                Some(details) => Err(CaptureError::Read { details }),
                None => Err(CaptureError::ReadTimeout {
                    timeout: self.read_timeout,
                }),
            },
        }
    }
}

impl Drop for GstFrameSource {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop capture pipeline: {}", e);
        }
    }
}

/// Copy `height` rows of `width` RGB pixels out of a buffer with row padding
fn pack_rows(buffer: &[u8], width: u32, height: u32, stride: usize) -> Option<Vec<u8>> {
    let row_bytes = width as usize * RGB_BYTES_PER_PIXEL;
    let stride = if stride == 0 { row_bytes } else { stride };
    if stride < row_bytes {
        return None;
    }

    if stride == row_bytes {
        let total = row_bytes * height as usize;
        return buffer.get(..total).map(<[u8]>::to_vec);
    }

    let mut data = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        data.extend_from_slice(buffer.get(start..start + row_bytes)?);
    }
    Some(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_decodes_to_rgb_appsink() {
        let description = GstCaptureOpener::pipeline_description("https://cdn.example/a.m3u8");

        assert!(description.contains("uri=\"https://cdn.example/a.m3u8\""));
        assert!(description.contains("video/x-raw,format=RGB"));
        assert!(description.contains("appsink name=sink"));
    }

    #[test]
    fn test_pack_rows_strips_padding() {
        // 2x2 RGB with 2 bytes of padding per row
        let buffer = [
            1, 1, 1, 2, 2, 2, 0, 0, //
            3, 3, 3, 4, 4, 4, 0, 0,
        ];

        let data = pack_rows(&buffer, 2, 2, 8).unwrap();

        assert_eq!(data, vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);
    }

    #[test]
    fn test_pack_rows_tight_buffer_is_copied() {
        let buffer = [9u8; 12];

        assert_eq!(pack_rows(&buffer, 2, 2, 6).unwrap().len(), 12);
    }

    #[test]
    fn test_pack_rows_short_buffer() {
        assert!(pack_rows(&[0u8; 10], 2, 2, 8).is_none());
        assert!(pack_rows(&[0u8; 32], 4, 2, 6).is_none());
    }
}
