use crate::config::TaxonomyConfig;
use crate::error::{CitysenseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Vehicle categories tracked individually
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleKind {
    Car,
    Motorcycle,
    Bus,
    Truck,
    Bicycle,
}

impl VehicleKind {
    pub const ALL: [VehicleKind; 5] = [
        VehicleKind::Car,
        VehicleKind::Motorcycle,
        VehicleKind::Bus,
        VehicleKind::Truck,
        VehicleKind::Bicycle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleKind::Car => "car",
            VehicleKind::Motorcycle => "motorcycle",
            VehicleKind::Bus => "bus",
            VehicleKind::Truck => "truck",
            VehicleKind::Bicycle => "bicycle",
        }
    }
}

/// Semantic group a detector label counts towards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Vehicle(VehicleKind),
    Person,
}

/// Static label → category table, built once at startup.
///
/// Labels are matched case-insensitively; labels absent from the table are
/// not counted.
#[derive(Debug, Clone)]
pub struct LabelTaxonomy {
    table: HashMap<String, Category>,
}

/// Label mapped to two different categories
type Conflict = (String, Category, Category);

impl LabelTaxonomy {
    pub fn from_config(config: &TaxonomyConfig) -> Result<Self> {
        let (table, conflicts) = build_table(config);

        if let Some((label, existing, category)) = conflicts.into_iter().next() {
            return Err(CitysenseError::component(
                "taxonomy".to_string(),
                format!(
                    "label '{}' is mapped to both {:?} and {:?}",
                    label, existing, category
                ),
            ));
        }

        Ok(Self { table })
    }

    pub fn categorize(&self, label: &str) -> Option<Category> {
        self.table.get(&normalize_label(label)).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for LabelTaxonomy {
    fn default() -> Self {
        let (table, conflicts) = build_table(&TaxonomyConfig::default());
        debug_assert!(conflicts.is_empty());
        Self { table }
    }
}

/// Build the lookup table, collecting every conflicting label. The first
/// category seen for a label wins.
fn build_table(config: &TaxonomyConfig) -> (HashMap<String, Category>, Vec<Conflict>) {
    let groups: [(&[String], Category); 6] = [
        (&config.car, Category::Vehicle(VehicleKind::Car)),
        (&config.motorcycle, Category::Vehicle(VehicleKind::Motorcycle)),
        (&config.bus, Category::Vehicle(VehicleKind::Bus)),
        (&config.truck, Category::Vehicle(VehicleKind::Truck)),
        (&config.bicycle, Category::Vehicle(VehicleKind::Bicycle)),
        (&config.person, Category::Person),
    ];

    let mut table = HashMap::new();
    let mut conflicts = Vec::new();
    for (labels, category) in groups {
        for label in labels {
            let key = normalize_label(label);
            if key.is_empty() {
                continue;
            }
            match table.get(&key) {
                Some(&existing) if existing != category => {
                    conflicts.push((key, existing, category));
                }
                Some(_) => {}
                None => {
                    table.insert(key, category);
                }
            }
        }
    }

    (table, conflicts)
}

fn normalize_label(label: &str) -> String {
    label.trim().to_ascii_lowercase()
}
