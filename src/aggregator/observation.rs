use super::levels::{PedestrianLevel, TrafficLevel};
use super::taxonomy::VehicleKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-kind vehicle counts for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleBreakdown {
    pub car: u32,
    pub motorcycle: u32,
    pub bus: u32,
    pub truck: u32,
    pub bicycle: u32,
}

impl VehicleBreakdown {
    pub fn get(&self, kind: VehicleKind) -> u32 {
        match kind {
            VehicleKind::Car => self.car,
            VehicleKind::Motorcycle => self.motorcycle,
            VehicleKind::Bus => self.bus,
            VehicleKind::Truck => self.truck,
            VehicleKind::Bicycle => self.bicycle,
        }
    }

    pub(crate) fn increment(&mut self, kind: VehicleKind) {
        let slot = match kind {
            VehicleKind::Car => &mut self.car,
            VehicleKind::Motorcycle => &mut self.motorcycle,
            VehicleKind::Bus => &mut self.bus,
            VehicleKind::Truck => &mut self.truck,
            VehicleKind::Bicycle => &mut self.bicycle,
        };
        *slot += 1;
    }

    pub fn total(&self) -> u32 {
        self.car + self.motorcycle + self.bus + self.truck + self.bicycle
    }
}

/// Summary of one sampled frame at one location.
///
/// Built only by the aggregator, so the counts and levels always agree with
/// each other. Read-only after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    timestamp: DateTime<Utc>,
    location_id: String,
    location_name: String,
    vehicle_count: u32,
    person_count: u32,
    vehicles: VehicleBreakdown,
    traffic_level: TrafficLevel,
    pedestrian_level: PedestrianLevel,
    secondary_level: Option<f64>,
}

impl Observation {
    pub(crate) fn new(
        timestamp: DateTime<Utc>,
        location_id: String,
        location_name: String,
        vehicles: VehicleBreakdown,
        person_count: u32,
        secondary_level: Option<f64>,
    ) -> Self {
        let vehicle_count = vehicles.total();
        Self {
            timestamp,
            location_id,
            location_name,
            vehicle_count,
            person_count,
            vehicles,
            traffic_level: TrafficLevel::from_count(vehicle_count),
            pedestrian_level: PedestrianLevel::from_count(person_count),
            secondary_level,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn location_id(&self) -> &str {
        &self.location_id
    }

    pub fn location_name(&self) -> &str {
        &self.location_name
    }

    pub fn vehicle_count(&self) -> u32 {
        self.vehicle_count
    }

    pub fn person_count(&self) -> u32 {
        self.person_count
    }

    pub fn vehicles(&self) -> &VehicleBreakdown {
        &self.vehicles
    }

    pub fn traffic_level(&self) -> TrafficLevel {
        self.traffic_level
    }

    pub fn pedestrian_level(&self) -> PedestrianLevel {
        self.pedestrian_level
    }

    /// Secondary (audio) level in dBFS, if a fresh sample exists
    pub fn secondary_level(&self) -> Option<f64> {
        self.secondary_level
    }

    pub fn total_objects(&self) -> u32 {
        self.vehicle_count + self.person_count
    }
}
