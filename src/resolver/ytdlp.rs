use super::StreamResolver;
use crate::config::ResolverConfig;
use crate::error::ResolveError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Resolver backed by an external extractor (`yt-dlp -g`)
#[derive(Debug, Clone)]
pub struct CommandResolver {
    program: String,
    format: String,
    timeout: Duration,
}

impl CommandResolver {
    pub fn new(program: impl Into<String>, format: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            format: format.into(),
            timeout,
        }
    }

    /// Resolver selecting the video rendition
    pub fn video(config: &ResolverConfig) -> Self {
        Self::new(
            &config.program,
            &config.video_format,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Resolver selecting the audio rendition
    pub fn audio(config: &ResolverConfig) -> Self {
        Self::new(
            &config.program,
            &config.audio_format,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn parse_output(stdout: &[u8]) -> Option<String> {
        String::from_utf8_lossy(stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }
}

#[async_trait]
impl StreamResolver for CommandResolver {
    async fn resolve(&self, source: &str) -> Result<String, ResolveError> {
        debug!("Resolving {} with {} (format {})", source, self.program, self.format);

        let child = Command::new(&self.program)
            .args(["-g", "-f", self.format.as_str(), "--no-warnings", source])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ResolveError::Launch {
                program: self.program.clone(),
                details: e.to_string(),
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ResolveError::Launch {
                    program: self.program.clone(),
                    details: e.to_string(),
                })
            }
            Err(_) => {
                warn!("{} timed out resolving {}", self.program, source);
                return Err(ResolveError::Timeout {
                    timeout: self.timeout,
                });
            }
        };

        if !output.status.success() {
            return Err(ResolveError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Self::parse_output(&output.stdout).ok_or_else(|| ResolveError::NoUrl {
            source_descriptor: source.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_takes_first_url() {
        let stdout = b"\n  https://cdn.example/live/index.m3u8\nhttps://cdn.example/audio.m3u8\n";

        assert_eq!(
            CommandResolver::parse_output(stdout).as_deref(),
            Some("https://cdn.example/live/index.m3u8")
        );
    }

    #[test]
    fn test_parse_output_empty() {
        assert_eq!(CommandResolver::parse_output(b"  \n\n"), None);
    }

    #[test]
    fn test_video_and_audio_use_their_own_format() {
        let config = ResolverConfig::default();

        assert_eq!(CommandResolver::video(&config).format, config.video_format);
        assert_eq!(CommandResolver::audio(&config).format, config.audio_format);
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let resolver = CommandResolver::new(
            "citysense-no-such-resolver",
            "best",
            Duration::from_secs(5),
        );

        let result = resolver.resolve("https://example.invalid/live").await;

        assert!(matches!(result, Err(ResolveError::Launch { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let resolver = CommandResolver::new("false", "best", Duration::from_secs(5));

        let result = resolver.resolve("https://example.invalid/live").await;

        assert!(matches!(result, Err(ResolveError::Failed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_is_trimmed() {
        // echo prints its arguments, which stand in for the resolved URL
        let resolver = CommandResolver::new("echo", "best", Duration::from_secs(5));

        let url = resolver.resolve("src").await.unwrap();

        assert_eq!(url, "-g -f best --no-warnings src");
    }
}
