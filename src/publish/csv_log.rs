use super::record::local_time;
use super::DurableLog;
use crate::aggregator::Observation;
use crate::config::{DurableLogConfig, LogMode};
use crate::error::{CitysenseError, PublishError, Result};
use async_trait::async_trait;
use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::info;

const BASE_COLUMNS: [&str; 12] = [
    "timestamp",
    "location",
    "vehicle_count",
    "person_count",
    "total_objects",
    "car_count",
    "motorcycle_count",
    "bus_count",
    "truck_count",
    "bicycle_count",
    "traffic_level",
    "pedestrian_level",
];

const SECONDARY_COLUMN: &str = "secondary_level";

/// Append-only CSV file, one row per observation
pub struct CsvDurableLog {
    path: PathBuf,
    file: Mutex<BufWriter<File>>,
    timezone: Tz,
    with_secondary: bool,
}

impl CsvDurableLog {
    /// Open the log, writing the header when the file is (or is made) empty
    pub async fn open(path: &Path, mode: LogMode, timezone: Tz, with_secondary: bool) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            LogMode::Truncate => options.write(true).truncate(true),
            LogMode::Append => options.append(true),
        };

        let file = options.open(path).await.map_err(|e| {
            CitysenseError::component(
                "durable_log".to_string(),
                format!("Failed to open {}: {}", path.display(), e),
            )
        })?;

        let needs_header = file.metadata().await?.len() == 0;
        let mut writer = BufWriter::new(file);

        if needs_header {
            writer
                .write_all(Self::header(with_secondary).as_bytes())
                .await?;
            writer.flush().await?;
        }

        info!(
            "Durable log at {} ({:?}, header {})",
            path.display(),
            mode,
            if needs_header { "written" } else { "kept" }
        );

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(writer),
            timezone,
            with_secondary,
        })
    }

    pub async fn from_config(config: &DurableLogConfig, timezone: Tz, with_secondary: bool) -> Result<Self> {
        Self::open(Path::new(&config.path), config.mode, timezone, with_secondary).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn header(with_secondary: bool) -> String {
        let mut columns = BASE_COLUMNS.to_vec();
        if with_secondary {
            columns.push(SECONDARY_COLUMN);
        }
        format!("{}\n", columns.join(","))
    }

    fn row(&self, observation: &Observation) -> String {
        let vehicles = observation.vehicles();
        let mut fields = vec![
            local_time(observation, self.timezone)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            escape_field(observation.location_name()),
            observation.vehicle_count().to_string(),
            observation.person_count().to_string(),
            observation.total_objects().to_string(),
            vehicles.car.to_string(),
            vehicles.motorcycle.to_string(),
            vehicles.bus.to_string(),
            vehicles.truck.to_string(),
            vehicles.bicycle.to_string(),
            observation.traffic_level().to_string(),
            observation.pedestrian_level().to_string(),
        ];

        if self.with_secondary {
            fields.push(
                observation
                    .secondary_level()
                    .map(|level| format!("{:.2}", level))
                    .unwrap_or_default(),
            );
        }

        format!("{}\n", fields.join(","))
    }
}

#[async_trait]
impl DurableLog for CsvDurableLog {
    async fn append(&self, observation: &Observation) -> std::result::Result<(), PublishError> {
        let row = self.row(observation);

        let mut file = self.file.lock().await;
        let result = match file.write_all(row.as_bytes()).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };

        result.map_err(|e| PublishError::DurableLog {
            details: format!("{}: {}", self.path.display(), e),
        })
    }
}

/// Quote a CSV field when it contains a delimiter, quote or line break
fn escape_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
