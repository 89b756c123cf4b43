mod levels;
mod observation;
mod taxonomy;
#[cfg(test)]
mod tests;

pub use levels::{PedestrianLevel, TrafficLevel};
pub use observation::{Observation, VehicleBreakdown};
pub use taxonomy::{Category, LabelTaxonomy, VehicleKind};

use crate::detection::Detection;
use crate::location::Location;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Turns raw detections into observations using a fixed label taxonomy
#[derive(Debug, Clone)]
pub struct Aggregator {
    taxonomy: Arc<LabelTaxonomy>,
}

impl Aggregator {
    pub fn new(taxonomy: LabelTaxonomy) -> Self {
        Self {
            taxonomy: Arc::new(taxonomy),
        }
    }

    /// Count vehicles by kind and persons. Unknown labels are dropped.
    pub fn classify(&self, detections: &[Detection]) -> (VehicleBreakdown, u32) {
        let mut vehicles = VehicleBreakdown::default();
        let mut persons = 0u32;

        for detection in detections {
            match self.taxonomy.categorize(&detection.label) {
                Some(Category::Vehicle(kind)) => vehicles.increment(kind),
                Some(Category::Person) => persons += 1,
                None => {}
            }
        }

        (vehicles, persons)
    }

    /// Build the observation for one tick
    pub fn observe(
        &self,
        location: &Location,
        timestamp: DateTime<Utc>,
        detections: &[Detection],
        secondary_level: Option<f64>,
    ) -> Observation {
        let (vehicles, persons) = self.classify(detections);
        Observation::new(
            timestamp,
            location.id.clone(),
            location.name.clone(),
            vehicles,
            persons,
            secondary_level,
        )
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(LabelTaxonomy::default())
    }
}
