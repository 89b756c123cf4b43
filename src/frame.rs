use crate::error::DetectionError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, RgbImage};
use std::sync::Arc;
use std::time::SystemTime;

/// Bytes per pixel of the packed RGB24 layout every capture backend delivers
pub const RGB_BYTES_PER_PIXEL: usize = 3;

/// Decoded frame as read from a capture handle
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Position in the location's frame counter
    pub id: u64,
    /// Timestamp when frame was read
    pub timestamp: SystemTime,
    /// Packed RGB24 pixels, row-major without padding
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

impl FrameData {
    pub fn new(id: u64, timestamp: SystemTime, data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
        }
    }

    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * RGB_BYTES_PER_PIXEL
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_size()
    }

    fn to_rgb_image(&self) -> Result<RgbImage, DetectionError> {
        if !self.validate_size() {
            return Err(DetectionError::Frame {
                details: format!(
                    "frame {} has {} bytes, expected {} for {}x{}",
                    self.id,
                    self.data.len(),
                    self.expected_size(),
                    self.width,
                    self.height
                ),
            });
        }

        RgbImage::from_raw(self.width, self.height, self.data.as_ref().clone()).ok_or_else(|| {
            DetectionError::Frame {
                details: format!("frame {} could not be wrapped as RGB image", self.id),
            }
        })
    }
}

/// Frame resized to the detector's working resolution
#[derive(Debug, Clone)]
pub struct NormalizedFrame {
    pub source_id: u64,
    pub captured_at: SystemTime,
    pub image: RgbImage,
}

impl NormalizedFrame {
    /// Resize `frame` to `width`x`height`
    pub fn from_frame(frame: &FrameData, width: u32, height: u32) -> Result<Self, DetectionError> {
        let image = frame.to_rgb_image()?;

        let image = if image.width() == width && image.height() == height {
            image
        } else {
            image::imageops::resize(&image, width, height, FilterType::Triangle)
        };

        Ok(Self {
            source_id: frame.id,
            captured_at: frame.timestamp,
            image,
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Encode as JPEG for transport to an out-of-process detector
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, DetectionError> {
        let mut buffer = Vec::with_capacity(self.image.len() / 8);
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);

        encoder
            .encode(
                self.image.as_raw(),
                self.image.width(),
                self.image.height(),
                ColorType::Rgb8,
            )
            .map_err(|e| DetectionError::Frame {
                details: format!("JPEG encoding failed: {}", e),
            })?;

        Ok(buffer)
    }
}
