use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal traffic severity derived from the vehicle count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrafficLevel {
    Empty,
    Low,
    Medium,
    High,
    Congested,
}

impl TrafficLevel {
    /// Inclusive upper bounds: 0 EMPTY, 1–3 LOW, 4–8 MEDIUM, 9–15 HIGH, above CONGESTED
    pub fn from_count(vehicle_count: u32) -> Self {
        match vehicle_count {
            0 => TrafficLevel::Empty,
            1..=3 => TrafficLevel::Low,
            4..=8 => TrafficLevel::Medium,
            9..=15 => TrafficLevel::High,
            _ => TrafficLevel::Congested,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficLevel::Empty => "EMPTY",
            TrafficLevel::Low => "LOW",
            TrafficLevel::Medium => "MEDIUM",
            TrafficLevel::High => "HIGH",
            TrafficLevel::Congested => "CONGESTED",
        }
    }
}

/// Ordinal pedestrian severity derived from the person count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PedestrianLevel {
    Empty,
    Low,
    Moderate,
    Busy,
    Crowded,
}

impl PedestrianLevel {
    /// Inclusive upper bounds: 0 EMPTY, 1–5 LOW, 6–15 MODERATE, 16–25 BUSY, above CROWDED
    pub fn from_count(person_count: u32) -> Self {
        match person_count {
            0 => PedestrianLevel::Empty,
            1..=5 => PedestrianLevel::Low,
            6..=15 => PedestrianLevel::Moderate,
            16..=25 => PedestrianLevel::Busy,
            _ => PedestrianLevel::Crowded,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PedestrianLevel::Empty => "EMPTY",
            PedestrianLevel::Low => "LOW",
            PedestrianLevel::Moderate => "MODERATE",
            PedestrianLevel::Busy => "BUSY",
            PedestrianLevel::Crowded => "CROWDED",
        }
    }
}

impl fmt::Display for TrafficLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PedestrianLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
