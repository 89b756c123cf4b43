use super::*;
use crate::testing::{location, ScriptedSampler};

fn sampler_with(script: Vec<Result<f64, SampleError>>, fallback: f64) -> Arc<ScriptedSampler> {
    Arc::new(ScriptedSampler::new(script, fallback))
}

fn decode_error() -> SampleError {
    SampleError::Decode {
        details: "truncated".to_string(),
    }
}

#[tokio::test]
async fn test_first_call_samples_and_caches() {
    let sampler = sampler_with(vec![Ok(-30.0)], -1.0);
    let mut secondary = SecondarySampler::new(
        sampler.clone(),
        Duration::from_secs(20),
        Duration::from_secs(120),
        Duration::from_secs(5),
    );
    let canmore = location("1", "Canmore");

    assert_eq!(secondary.current(&canmore).await, Some(-30.0));
    assert_eq!(secondary.current(&canmore).await, Some(-30.0));
    assert_eq!(sampler.calls(), 1);
}

#[tokio::test]
async fn test_refreshes_after_interval() {
    let sampler = sampler_with(vec![Ok(-30.0), Ok(-25.0)], -1.0);
    let mut secondary = SecondarySampler::new(
        sampler.clone(),
        Duration::from_millis(30),
        Duration::from_secs(120),
        Duration::from_secs(5),
    );
    let canmore = location("1", "Canmore");

    assert_eq!(secondary.current(&canmore).await, Some(-30.0));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(secondary.current(&canmore).await, Some(-25.0));
    assert_eq!(sampler.calls(), 2);
}

#[tokio::test]
async fn test_failure_keeps_previous_value() {
    let sampler = sampler_with(vec![Ok(-30.0), Err(decode_error())], -1.0);
    let mut secondary = SecondarySampler::new(
        sampler.clone(),
        Duration::from_millis(20),
        Duration::from_secs(120),
        Duration::from_secs(5),
    );
    let canmore = location("1", "Canmore");

    assert_eq!(secondary.current(&canmore).await, Some(-30.0));
    tokio::time::sleep(Duration::from_millis(40)).await;

    assert_eq!(secondary.current(&canmore).await, Some(-30.0));
    assert_eq!(sampler.calls(), 2);
}

#[tokio::test]
async fn test_never_sampled_is_none() {
    let sampler = sampler_with(vec![Err(decode_error())], -1.0);
    let mut secondary = SecondarySampler::new(
        sampler,
        Duration::from_secs(20),
        Duration::from_secs(120),
        Duration::from_secs(5),
    );

    assert_eq!(secondary.current(&location("2", "Koh Samui")).await, None);
}

#[tokio::test]
async fn test_stale_value_expires() {
    let sampler = sampler_with(vec![Ok(-30.0)], -1.0);
    let mut secondary = SecondarySampler::new(
        sampler,
        Duration::from_secs(3600),
        Duration::from_millis(20),
        Duration::from_secs(5),
    );
    let canmore = location("1", "Canmore");

    assert_eq!(secondary.current(&canmore).await, Some(-30.0));
    tokio::time::sleep(Duration::from_millis(40)).await;

    assert_eq!(secondary.current(&canmore).await, None);
    assert_eq!(secondary.cached_value(), None);
}

/// Sampler that never answers
struct HangingSampler;

#[async_trait]
impl NoiseSampler for HangingSampler {
    async fn sample(&self, _location: &Location) -> Result<f64, SampleError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_hung_sample_times_out() {
    let mut secondary = SecondarySampler::new(
        Arc::new(HangingSampler),
        Duration::from_secs(20),
        Duration::from_secs(120),
        Duration::from_millis(20),
    );

    let value = tokio::time::timeout(
        Duration::from_secs(5),
        secondary.current(&location("3", "Bangkok")),
    )
    .await
    .unwrap();

    assert_eq!(value, None);
}

#[tokio::test]
async fn test_ffmpeg_sampler_reports_missing_program() {
    let config = SecondaryConfig {
        ffmpeg_program: "citysense-no-such-ffmpeg".to_string(),
        ..SecondaryConfig::default()
    };
    let resolver = Arc::new(crate::testing::ScriptedResolver::ok("https://cdn.example/audio.m3u8"));
    let sampler = FfmpegNoiseSampler::new(resolver.clone(), &config);
    let canmore = location("1", "Canmore");

    assert!(matches!(
        sampler.sample(&canmore).await,
        Err(SampleError::Launch { .. })
    ));
    // The cached audio URL was dropped, so the next attempt resolves again
    let _ = sampler.sample(&canmore).await;
    assert_eq!(resolver.calls(), 2);
}
