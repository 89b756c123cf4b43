use super::*;
use crate::config::TaxonomyConfig;
use crate::testing::{detection, location};
use chrono::TimeZone;
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;

fn at_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

#[test]
fn test_traffic_level_boundaries() {
    let cases = [
        (0, TrafficLevel::Empty),
        (1, TrafficLevel::Low),
        (3, TrafficLevel::Low),
        (4, TrafficLevel::Medium),
        (8, TrafficLevel::Medium),
        (9, TrafficLevel::High),
        (15, TrafficLevel::High),
        (16, TrafficLevel::Congested),
        (500, TrafficLevel::Congested),
    ];

    for (count, expected) in cases {
        assert_eq!(TrafficLevel::from_count(count), expected, "count {}", count);
    }
}

#[test]
fn test_pedestrian_level_boundaries() {
    let cases = [
        (0, PedestrianLevel::Empty),
        (1, PedestrianLevel::Low),
        (5, PedestrianLevel::Low),
        (6, PedestrianLevel::Moderate),
        (15, PedestrianLevel::Moderate),
        (16, PedestrianLevel::Busy),
        (25, PedestrianLevel::Busy),
        (26, PedestrianLevel::Crowded),
    ];

    for (count, expected) in cases {
        assert_eq!(PedestrianLevel::from_count(count), expected, "count {}", count);
    }
}

#[test]
fn test_levels_serialize_in_upper_case() {
    assert_eq!(
        serde_json::to_string(&TrafficLevel::Congested).unwrap(),
        "\"CONGESTED\""
    );
    assert_eq!(
        serde_json::to_string(&PedestrianLevel::Moderate).unwrap(),
        "\"MODERATE\""
    );
    assert_eq!(TrafficLevel::Medium.to_string(), "MEDIUM");
    assert!(TrafficLevel::Low < TrafficLevel::High);
}

#[test]
fn test_observe_two_cars_one_truck_two_people() {
    let aggregator = Aggregator::default();
    let detections = vec![
        detection("car"),
        detection("car"),
        detection("truck"),
        detection("person"),
        detection("person"),
    ];

    let observation = aggregator.observe(&location("1", "Canmore"), at_noon(), &detections, None);

    assert_eq!(observation.vehicle_count(), 3);
    assert_eq!(observation.person_count(), 2);
    assert_eq!(observation.vehicles().car, 2);
    assert_eq!(observation.vehicles().truck, 1);
    assert_eq!(observation.traffic_level(), TrafficLevel::Low);
    assert_eq!(observation.pedestrian_level(), PedestrianLevel::Low);
    assert_eq!(observation.total_objects(), 5);
    assert_eq!(observation.location_id(), "1");
    assert_eq!(observation.location_name(), "Canmore");
    assert_eq!(observation.timestamp(), at_noon());
    assert_eq!(observation.secondary_level(), None);
}

#[test]
fn test_unknown_labels_are_ignored() {
    let aggregator = Aggregator::default();
    let detections = vec![
        detection("dog"),
        detection("traffic light"),
        detection("umbrella"),
    ];

    let observation = aggregator.observe(&location("2", "Koh Samui"), at_noon(), &detections, Some(-41.5));

    assert_eq!(observation.total_objects(), 0);
    assert_eq!(observation.traffic_level(), TrafficLevel::Empty);
    assert_eq!(observation.pedestrian_level(), PedestrianLevel::Empty);
    assert_eq!(observation.secondary_level(), Some(-41.5));
}

#[test]
fn test_labels_match_case_insensitively() {
    let aggregator = Aggregator::default();

    let (vehicles, persons) = aggregator.classify(&[detection(" Car "), detection("PERSON"), detection("Motorbike")]);

    assert_eq!(vehicles.car, 1);
    assert_eq!(vehicles.motorcycle, 1);
    assert_eq!(persons, 1);
}

#[test]
fn test_taxonomy_rejects_label_in_two_categories() {
    let mut config = TaxonomyConfig::default();
    config.truck.push("car".to_string());

    assert!(LabelTaxonomy::from_config(&config).is_err());
}

#[test]
fn test_default_taxonomy_matches_default_config() {
    let configured = LabelTaxonomy::from_config(&TaxonomyConfig::default()).unwrap();
    let default = LabelTaxonomy::default();

    assert_eq!(default.len(), configured.len());
    for kind in VehicleKind::ALL {
        assert_eq!(
            default.categorize(kind.as_str()),
            configured.categorize(kind.as_str())
        );
    }
    assert_eq!(default.categorize("person"), Some(Category::Person));
}

#[test]
fn test_taxonomy_from_config_uses_custom_labels() {
    let mut config = TaxonomyConfig::default();
    config.bicycle.push("scooter".to_string());

    let taxonomy = LabelTaxonomy::from_config(&config).unwrap();

    assert_eq!(
        taxonomy.categorize("scooter"),
        Some(Category::Vehicle(VehicleKind::Bicycle))
    );
    assert_eq!(taxonomy.categorize("person"), Some(Category::Person));
    assert_eq!(taxonomy.categorize("kite"), None);
}

/// Random mix of known and unknown labels
#[derive(Debug, Clone)]
struct LabelBatch(Vec<String>);

impl Arbitrary for LabelBatch {
    fn arbitrary(g: &mut Gen) -> Self {
        let labels = [
            "car", "motorcycle", "motorbike", "bus", "truck", "bicycle", "person", "dog", "bench",
            "kite",
        ];
        let len = usize::arbitrary(g) % 40;
        Self(
            (0..len)
                .map(|_| g.choose(&labels).unwrap().to_string())
                .collect(),
        )
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        Box::new(self.0.shrink().map(LabelBatch))
    }
}

impl LabelBatch {
    fn detections(&self) -> Vec<Detection> {
        self.0.iter().map(|label| detection(label)).collect()
    }
}

#[quickcheck]
fn prop_counts_never_exceed_detections(batch: LabelBatch) -> bool {
    let aggregator = Aggregator::default();
    let observation = aggregator.observe(&location("1", "Canmore"), at_noon(), &batch.detections(), None);

    observation.total_objects() as usize <= batch.0.len()
        && observation.vehicle_count() == observation.vehicles().total()
}

#[quickcheck]
fn prop_detection_order_does_not_matter(batch: LabelBatch) -> bool {
    let aggregator = Aggregator::default();
    let forward = batch.detections();
    let mut reversed = forward.clone();
    reversed.reverse();

    aggregator.classify(&forward) == aggregator.classify(&reversed)
}

#[quickcheck]
fn prop_levels_are_monotonic(a: u16, b: u16) -> bool {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };

    TrafficLevel::from_count(low as u32) <= TrafficLevel::from_count(high as u32)
        && PedestrianLevel::from_count(low as u32) <= PedestrianLevel::from_count(high as u32)
}

#[quickcheck]
fn prop_levels_agree_with_counts(batch: LabelBatch) -> bool {
    let aggregator = Aggregator::default();
    let observation = aggregator.observe(&location("3", "Bangkok"), at_noon(), &batch.detections(), None);

    observation.traffic_level() == TrafficLevel::from_count(observation.vehicle_count())
        && observation.pedestrian_level() == PedestrianLevel::from_count(observation.person_count())
}
