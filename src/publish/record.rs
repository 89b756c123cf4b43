use crate::aggregator::{Observation, PedestrianLevel, TrafficLevel, VehicleBreakdown};
use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use serde::Serialize;

/// Format of the per-second key under `detections/`
pub const COARSE_KEY_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Per-kind vehicle counts as dashboards read them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TelemetryBreakdown {
    pub cars: u32,
    pub motorcycles: u32,
    pub buses: u32,
    pub trucks: u32,
    pub bicycles: u32,
}

impl From<&VehicleBreakdown> for TelemetryBreakdown {
    fn from(vehicles: &VehicleBreakdown) -> Self {
        Self {
            cars: vehicles.car,
            motorcycles: vehicles.motorcycle,
            buses: vehicles.bus,
            trucks: vehicles.truck,
            bicycles: vehicles.bicycle,
        }
    }
}

/// Document written to the telemetry store for one observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub cars: u32,
    pub people: u32,
    pub timestamp: String,
    pub traffic_level: TrafficLevel,
    pub pedestrian_level: PedestrianLevel,
    pub vehicle_breakdown: TelemetryBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_level_dbfs: Option<f64>,
}

impl TelemetryRecord {
    pub fn from_observation(observation: &Observation, timezone: Tz) -> Self {
        Self {
            cars: observation.vehicle_count(),
            people: observation.person_count(),
            timestamp: local_time(observation, timezone).to_rfc3339(),
            traffic_level: observation.traffic_level(),
            pedestrian_level: observation.pedestrian_level(),
            vehicle_breakdown: TelemetryBreakdown::from(observation.vehicles()),
            noise_level_dbfs: observation.secondary_level(),
        }
    }
}

/// Second-resolution key; two observations in the same second share it
pub fn coarse_key(observation: &Observation, timezone: Tz) -> String {
    local_time(observation, timezone)
        .format(COARSE_KEY_FORMAT)
        .to_string()
}

pub(crate) fn local_time(observation: &Observation, timezone: Tz) -> DateTime<Tz> {
    timezone.from_utc_datetime(&observation.timestamp().naive_utc())
}
