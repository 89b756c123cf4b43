use super::NoiseSampler;
use crate::config::SecondaryConfig;
use crate::error::SampleError;
use crate::location::Location;
use crate::resolver::StreamResolver;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Reported for digital silence
pub const SILENCE_FLOOR_DBFS: f64 = -96.0;

const SAMPLE_RATE: u32 = 16_000;

/// Loudness of the audio behind a location, measured through `ffmpeg`
pub struct FfmpegNoiseSampler {
    resolver: Arc<dyn StreamResolver>,
    program: String,
    sample_seconds: u32,
    timeout: Duration,
    /// Resolved audio URL per source descriptor
    audio_urls: Mutex<HashMap<String, String>>,
}

impl FfmpegNoiseSampler {
    pub fn new(resolver: Arc<dyn StreamResolver>, config: &SecondaryConfig) -> Self {
        Self {
            resolver,
            program: config.ffmpeg_program.clone(),
            sample_seconds: config.sample_seconds,
            timeout: Duration::from_secs(config.timeout_secs),
            audio_urls: Mutex::new(HashMap::new()),
        }
    }

    async fn audio_url(&self, source: &str) -> Result<String, SampleError> {
        if let Some(url) = self.audio_urls.lock().get(source) {
            return Ok(url.clone());
        }

        let url = self.resolver.resolve(source).await?;
        self.audio_urls
            .lock()
            .insert(source.to_string(), url.clone());
        Ok(url)
    }

    async fn decode_pcm(&self, url: &str) -> Result<Vec<u8>, SampleError> {
        let duration = self.sample_seconds.to_string();
        let rate = SAMPLE_RATE.to_string();

        let child = Command::new(&self.program)
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-i",
                url,
                "-t",
                duration.as_str(),
                "-vn",
                "-ac",
                "1",
                "-ar",
                rate.as_str(),
                "-f",
                "s16le",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SampleError::Launch {
                program: self.program.clone(),
                details: e.to_string(),
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(SampleError::Launch {
                    program: self.program.clone(),
                    details: e.to_string(),
                })
            }
            Err(_) => {
                return Err(SampleError::Timeout {
                    timeout: self.timeout,
                })
            }
        };

        if !output.status.success() {
            return Err(SampleError::Decode {
                details: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl NoiseSampler for FfmpegNoiseSampler {
    async fn sample(&self, location: &Location) -> Result<f64, SampleError> {
        let url = self.audio_url(&location.source).await?;

        let result = self
            .decode_pcm(&url)
            .await
            .and_then(|pcm| {
                dbfs(&pcm).ok_or_else(|| SampleError::Decode {
                    details: "no audio samples decoded".to_string(),
                })
            });

        if let Err(e) = &result {
            // Resolved audio URLs expire; force a fresh resolve next time
            warn!("Dropping cached audio URL for {}: {}", location.name, e);
            self.audio_urls.lock().remove(&location.source);
        } else {
            debug!("Sampled {}s of audio for {}", self.sample_seconds, location.name);
        }

        result
    }
}

/// RMS loudness of signed 16-bit little-endian PCM, in dBFS.
///
/// Returns `None` for an empty buffer.
pub fn dbfs(pcm: &[u8]) -> Option<f64> {
    let samples = pcm.len() / 2;
    if samples == 0 {
        return None;
    }

    let sum_squares: f64 = pcm
        .chunks_exact(2)
        .map(|pair| {
            let sample = i16::from_le_bytes([pair[0], pair[1]]) as f64;
            sample * sample
        })
        .sum();

    let rms = (sum_squares / samples as f64).sqrt();
    if rms <= 0.0 {
        return Some(SILENCE_FLOOR_DBFS);
    }

    Some((20.0 * (rms / 32768.0).log10()).max(SILENCE_FLOOR_DBFS))
}
