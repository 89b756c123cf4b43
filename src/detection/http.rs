//! HTTP adapter for an out-of-process inference server
//!
//! The frame is uploaded as a multipart JPEG and the server answers with its
//! final, already filtered box list.

use super::engine::{BoundingBox, Detection, ObjectDetector};
use crate::config::DetectorConfig;
use crate::error::DetectionError;
use crate::frame::NormalizedFrame;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// Box as returned by the inference server
#[derive(Debug, Clone, Deserialize)]
struct ResponseBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    label: String,
    #[serde(alias = "confidence")]
    conf: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct DetectResponse {
    #[serde(default, alias = "bboxes")]
    detections: Vec<ResponseBox>,
}

pub struct HttpDetector {
    client: reqwest::Client,
    endpoint: String,
    jpeg_quality: u8,
}

impl HttpDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self, DetectionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        info!(
            "HTTP detector targeting {} ({}x{} input)",
            config.endpoint, config.input_width, config.input_height
        );

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            jpeg_quality: config.jpeg_quality,
        })
    }

    fn parse_response(body: &str) -> Result<Vec<Detection>, DetectionError> {
        let response: DetectResponse =
            serde_json::from_str(body).map_err(|e| DetectionError::InvalidResponse {
                details: e.to_string(),
            })?;

        Ok(response
            .detections
            .into_iter()
            .map(|b| Detection::new(b.label, b.conf, BoundingBox::from_corners(b.x1, b.y1, b.x2, b.y2)))
            .collect())
    }
}

#[async_trait]
impl ObjectDetector for HttpDetector {
    async fn detect(&mut self, frame: &NormalizedFrame) -> Result<Vec<Detection>, DetectionError> {
        let jpeg = frame.to_jpeg(self.jpeg_quality)?;

        let part = Part::bytes(jpeg)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .part("image", part)
            .text("width", frame.width().to_string())
            .text("height", frame.height().to_string());

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(DetectionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Self::parse_response(&body)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_keeps_engine_results_unfiltered() {
        let body = r#"{
            "detections": [
                {"x1": 10, "y1": 20, "x2": 50, "y2": 80, "label": "car", "conf": 0.91},
                {"x1": 0, "y1": 0, "x2": 5, "y2": 5, "label": "person", "conf": 0.05}
            ]
        }"#;

        let detections = HttpDetector::parse_response(body).unwrap();

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].label, "car");
        assert_eq!(detections[0].bbox.width, 40.0);
        assert_eq!(detections[0].bbox.height, 60.0);
        assert_eq!(detections[1].confidence, 0.05);
    }

    #[test]
    fn test_parse_response_accepts_bboxes_alias() {
        let body = r#"{"bboxes": [{"x1": 1, "y1": 1, "x2": 2, "y2": 2, "label": "bus", "confidence": 0.7}]}"#;

        let detections = HttpDetector::parse_response(body).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "bus");
    }

    #[test]
    fn test_parse_response_rejects_garbage() {
        assert!(matches!(
            HttpDetector::parse_response("not json"),
            Err(DetectionError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_empty_response_means_no_detections() {
        assert!(HttpDetector::parse_response("{}").unwrap().is_empty());
    }
}
