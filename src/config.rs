use crate::recovery::ReconnectPolicy;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CitysenseConfig {
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub secondary: SecondaryConfig,
    #[serde(default)]
    pub durable_log: DurableLogConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,
    #[serde(default = "default_locations")]
    pub locations: Vec<LocationConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SupervisorConfig {
    /// Delay between starting consecutive monitors
    #[serde(default = "default_start_stagger_ms")]
    pub start_stagger_ms: u64,

    /// How long shutdown waits for monitors to drain
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MonitorConfig {
    /// Run one detection tick every N successfully read frames
    #[serde(default = "default_sample_every_frames")]
    pub sample_every_frames: u64,

    /// Delay before the first reconnect attempt
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Growth factor per failed reconnect attempt (1.0 keeps the delay fixed)
    #[serde(default = "default_reconnect_backoff_multiplier")]
    pub reconnect_backoff_multiplier: f64,

    /// Upper bound for the reconnect delay
    #[serde(default = "default_reconnect_max_delay_secs")]
    pub reconnect_max_delay_secs: u64,

    /// Give up after this many consecutive failed reconnects (unset = never)
    #[serde(default)]
    pub reconnect_max_attempts: Option<u32>,

    /// A frame read blocking longer than this counts as a failed read
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Forward each tick's frame and detections to a frame tap
    #[serde(default)]
    pub interactive_display: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectorConfig {
    /// Inference endpoint accepting a multipart JPEG upload
    #[serde(default = "default_detector_endpoint")]
    pub endpoint: String,

    /// Working resolution frames are normalized to before detection
    #[serde(default = "default_detector_input_width")]
    pub input_width: u32,

    #[serde(default = "default_detector_input_height")]
    pub input_height: u32,

    /// JPEG quality used for the upload
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    #[serde(default = "default_detector_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResolverConfig {
    /// Extractor executable invoked to resolve playable URLs
    #[serde(default = "default_resolver_program")]
    pub program: String,

    /// Format selector for the video stream
    #[serde(default = "default_video_format")]
    pub video_format: String,

    /// Format selector for the audio stream
    #[serde(default = "default_audio_format")]
    pub audio_format: String,

    #[serde(default = "default_resolver_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecondaryConfig {
    /// Sample ambient noise alongside the video ticks
    #[serde(default)]
    pub enabled: bool,

    /// Minimum time between two noise samples of one location
    #[serde(default = "default_secondary_interval_secs")]
    pub interval_secs: u64,

    /// Cached values older than this are no longer attached to observations
    #[serde(default = "default_secondary_max_age_secs")]
    pub max_age_secs: u64,

    /// Seconds of audio decoded per sample
    #[serde(default = "default_secondary_sample_seconds")]
    pub sample_seconds: u32,

    #[serde(default = "default_ffmpeg_program")]
    pub ffmpeg_program: String,

    #[serde(default = "default_secondary_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// Replace prior content and write a fresh header on every start
    Truncate,
    /// Keep prior rows; write the header only into a new or empty file
    Append,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DurableLogConfig {
    #[serde(default = "default_durable_log_path")]
    pub path: String,

    #[serde(default = "default_log_mode")]
    pub mode: LogMode,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    /// Realtime database root URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Optional database secret or ID token appended as `auth`
    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default = "default_telemetry_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    /// IANA timezone used to render timestamps and telemetry keys
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

/// Detector labels counted under each category
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TaxonomyConfig {
    #[serde(default = "default_car_labels")]
    pub car: Vec<String>,
    #[serde(default = "default_motorcycle_labels")]
    pub motorcycle: Vec<String>,
    #[serde(default = "default_bus_labels")]
    pub bus: Vec<String>,
    #[serde(default = "default_truck_labels")]
    pub truck: Vec<String>,
    #[serde(default = "default_bicycle_labels")]
    pub bicycle: Vec<String>,
    #[serde(default = "default_person_labels")]
    pub person: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LocationConfig {
    pub id: String,
    pub name: String,
    /// Opaque source descriptor handed to the resolver
    pub source: String,
    #[serde(default)]
    pub description: String,
}

impl CitysenseConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("supervisor.start_stagger_ms", default_start_stagger_ms() as i64)?
            .set_default(
                "supervisor.shutdown_timeout_secs",
                default_shutdown_timeout_secs() as i64,
            )?
            .set_default(
                "monitor.sample_every_frames",
                default_sample_every_frames() as i64,
            )?
            .set_default(
                "monitor.reconnect_delay_secs",
                default_reconnect_delay_secs() as i64,
            )?
            .set_default(
                "monitor.reconnect_backoff_multiplier",
                default_reconnect_backoff_multiplier(),
            )?
            .set_default(
                "monitor.reconnect_max_delay_secs",
                default_reconnect_max_delay_secs() as i64,
            )?
            .set_default("monitor.read_timeout_secs", default_read_timeout_secs() as i64)?
            .set_default("monitor.interactive_display", false)?
            .set_default("detector.endpoint", default_detector_endpoint())?
            .set_default("detector.input_width", default_detector_input_width() as i64)?
            .set_default(
                "detector.input_height",
                default_detector_input_height() as i64,
            )?
            .set_default("detector.jpeg_quality", default_jpeg_quality() as i64)?
            .set_default("detector.timeout_secs", default_detector_timeout_secs() as i64)?
            .set_default("resolver.program", default_resolver_program())?
            .set_default("resolver.video_format", default_video_format())?
            .set_default("resolver.audio_format", default_audio_format())?
            .set_default("resolver.timeout_secs", default_resolver_timeout_secs() as i64)?
            .set_default("secondary.enabled", false)?
            .set_default(
                "secondary.interval_secs",
                default_secondary_interval_secs() as i64,
            )?
            .set_default(
                "secondary.max_age_secs",
                default_secondary_max_age_secs() as i64,
            )?
            .set_default(
                "secondary.sample_seconds",
                default_secondary_sample_seconds() as i64,
            )?
            .set_default("secondary.ffmpeg_program", default_ffmpeg_program())?
            .set_default(
                "secondary.timeout_secs",
                default_secondary_timeout_secs() as i64,
            )?
            .set_default("durable_log.path", default_durable_log_path())?
            .set_default("durable_log.mode", "truncate")?
            .set_default("telemetry.enabled", default_telemetry_enabled())?
            .set_default("telemetry.database_url", default_database_url())?
            .set_default(
                "telemetry.timeout_secs",
                default_telemetry_timeout_secs() as i64,
            )?
            .set_default("output.timezone", default_timezone())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Environment overrides, e.g. CITYSENSE_MONITOR__SAMPLE_EVERY_FRAMES=15
            .add_source(
                Environment::with_prefix("CITYSENSE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: CitysenseConfig = settings.try_deserialize()?;

        info!(
            "Configuration loaded successfully ({} locations)",
            config.locations.len()
        );
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.sample_every_frames == 0 {
            return Err(ConfigError::Message(
                "monitor.sample_every_frames must be greater than 0".to_string(),
            ));
        }

        if self.monitor.reconnect_backoff_multiplier < 1.0 {
            return Err(ConfigError::Message(
                "monitor.reconnect_backoff_multiplier must be at least 1.0".to_string(),
            ));
        }

        if self.monitor.read_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "monitor.read_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.detector.input_width == 0 || self.detector.input_height == 0 {
            return Err(ConfigError::Message(
                "Detector input resolution must be greater than 0".to_string(),
            ));
        }

        if self.detector.endpoint.trim().is_empty() {
            return Err(ConfigError::Message(
                "detector.endpoint must not be empty".to_string(),
            ));
        }

        if self.detector.jpeg_quality == 0 || self.detector.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "detector.jpeg_quality must be within 1..=100".to_string(),
            ));
        }

        if self.secondary.enabled {
            if self.secondary.interval_secs == 0 {
                return Err(ConfigError::Message(
                    "secondary.interval_secs must be greater than 0".to_string(),
                ));
            }
            if self.secondary.sample_seconds == 0 {
                return Err(ConfigError::Message(
                    "secondary.sample_seconds must be greater than 0".to_string(),
                ));
            }
        }

        if self.telemetry.enabled && self.telemetry.database_url.trim().is_empty() {
            return Err(ConfigError::Message(
                "telemetry.database_url is required when telemetry is enabled".to_string(),
            ));
        }

        if self.output.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Message(format!(
                "Unknown output.timezone '{}'",
                self.output.timezone
            )));
        }

        if self.locations.is_empty() {
            return Err(ConfigError::Message(
                "At least one location must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for location in &self.locations {
            if location.id.trim().is_empty() || location.name.trim().is_empty() {
                return Err(ConfigError::Message(
                    "Location id and name must not be empty".to_string(),
                ));
            }
            if !seen.insert(location.id.as_str()) {
                return Err(ConfigError::Message(format!(
                    "Duplicate location id '{}'",
                    location.id
                )));
            }
        }

        Ok(())
    }

    /// Parsed output timezone, falling back to UTC for unknown names
    pub fn timezone(&self) -> chrono_tz::Tz {
        self.output.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

impl SupervisorConfig {
    pub fn start_stagger(&self) -> Duration {
        Duration::from_millis(self.start_stagger_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl MonitorConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_secs(self.reconnect_delay_secs),
            multiplier: self.reconnect_backoff_multiplier,
            max_delay: Duration::from_secs(self.reconnect_max_delay_secs),
            max_attempts: self.reconnect_max_attempts,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl SecondaryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

impl Default for CitysenseConfig {
    fn default() -> Self {
        Self {
            supervisor: SupervisorConfig::default(),
            monitor: MonitorConfig::default(),
            detector: DetectorConfig::default(),
            resolver: ResolverConfig::default(),
            secondary: SecondaryConfig::default(),
            durable_log: DurableLogConfig::default(),
            telemetry: TelemetryConfig::default(),
            output: OutputConfig::default(),
            taxonomy: TaxonomyConfig::default(),
            locations: default_locations(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            start_stagger_ms: default_start_stagger_ms(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_every_frames: default_sample_every_frames(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            reconnect_backoff_multiplier: default_reconnect_backoff_multiplier(),
            reconnect_max_delay_secs: default_reconnect_max_delay_secs(),
            reconnect_max_attempts: None,
            read_timeout_secs: default_read_timeout_secs(),
            interactive_display: false,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_detector_endpoint(),
            input_width: default_detector_input_width(),
            input_height: default_detector_input_height(),
            jpeg_quality: default_jpeg_quality(),
            timeout_secs: default_detector_timeout_secs(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            program: default_resolver_program(),
            video_format: default_video_format(),
            audio_format: default_audio_format(),
            timeout_secs: default_resolver_timeout_secs(),
        }
    }
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_secondary_interval_secs(),
            max_age_secs: default_secondary_max_age_secs(),
            sample_seconds: default_secondary_sample_seconds(),
            ffmpeg_program: default_ffmpeg_program(),
            timeout_secs: default_secondary_timeout_secs(),
        }
    }
}

impl Default for DurableLogConfig {
    fn default() -> Self {
        Self {
            path: default_durable_log_path(),
            mode: default_log_mode(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            database_url: default_database_url(),
            auth_token: None,
            timeout_secs: default_telemetry_timeout_secs(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            car: default_car_labels(),
            motorcycle: default_motorcycle_labels(),
            bus: default_bus_labels(),
            truck: default_truck_labels(),
            bicycle: default_bicycle_labels(),
            person: default_person_labels(),
        }
    }
}

// Default value functions
fn default_start_stagger_ms() -> u64 {
    2000
}
fn default_shutdown_timeout_secs() -> u64 {
    10
}

fn default_sample_every_frames() -> u64 {
    30
} // ~1 evaluation per second at 30fps sources
fn default_reconnect_delay_secs() -> u64 {
    5
}
fn default_reconnect_backoff_multiplier() -> f64 {
    1.0
}
fn default_reconnect_max_delay_secs() -> u64 {
    300
}
fn default_read_timeout_secs() -> u64 {
    15
}

fn default_detector_endpoint() -> String {
    "http://127.0.0.1:8000/v1/detect".to_string()
}
fn default_detector_input_width() -> u32 {
    640
}
fn default_detector_input_height() -> u32 {
    480
}
fn default_jpeg_quality() -> u8 {
    85
}
fn default_detector_timeout_secs() -> u64 {
    30
}

fn default_resolver_program() -> String {
    "yt-dlp".to_string()
}
fn default_video_format() -> String {
    "best[height<=480]/best".to_string()
}
fn default_audio_format() -> String {
    "bestaudio/best".to_string()
}
fn default_resolver_timeout_secs() -> u64 {
    60
}

fn default_secondary_interval_secs() -> u64 {
    20
}
fn default_secondary_max_age_secs() -> u64 {
    120
}
fn default_secondary_sample_seconds() -> u32 {
    3
}
fn default_ffmpeg_program() -> String {
    "ffmpeg".to_string()
}
fn default_secondary_timeout_secs() -> u64 {
    10
}

fn default_durable_log_path() -> String {
    "detections.csv".to_string()
}
fn default_log_mode() -> LogMode {
    LogMode::Truncate
}

fn default_telemetry_enabled() -> bool {
    true
}
fn default_database_url() -> String {
    "https://citysense-crono-default-rtdb.firebaseio.com".to_string()
}
fn default_telemetry_timeout_secs() -> u64 {
    10
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_car_labels() -> Vec<String> {
    vec!["car".to_string()]
}
fn default_motorcycle_labels() -> Vec<String> {
    vec!["motorcycle".to_string(), "motorbike".to_string()]
}
fn default_bus_labels() -> Vec<String> {
    vec!["bus".to_string()]
}
fn default_truck_labels() -> Vec<String> {
    vec!["truck".to_string()]
}
fn default_bicycle_labels() -> Vec<String> {
    vec!["bicycle".to_string()]
}
fn default_person_labels() -> Vec<String> {
    vec!["person".to_string()]
}

fn default_locations() -> Vec<LocationConfig> {
    vec![
        LocationConfig {
            id: "1".to_string(),
            name: "Canmore Alberta".to_string(),
            source: "https://www.youtube.com/watch?v=_0wPODlF9wU".to_string(),
            description: "Main Street Livecam, Canmore, Alberta".to_string(),
        },
        LocationConfig {
            id: "2".to_string(),
            name: "Koh Samui Thailand".to_string(),
            source: "https://www.youtube.com/watch?v=VR-x3HdhKLQ".to_string(),
            description: "Bondi Aussie Bar & Grill | Chaweng".to_string(),
        },
        LocationConfig {
            id: "3".to_string(),
            name: "Bangkok Thailand".to_string(),
            source: "https://www.youtube.com/live/UemFRPrl1hk".to_string(),
            description: "El Gaucho | Soi 11 | Sukhumvit Road".to_string(),
        },
        LocationConfig {
            id: "4".to_string(),
            name: "4 Corners Downtown".to_string(),
            source: "https://www.youtube.com/watch?v=ByED80IKdIU".to_string(),
            description: "4 Corners Camera Downtown".to_string(),
        },
    ]
}
