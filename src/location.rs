use crate::config::LocationConfig;
use crate::error::{CitysenseError, Result};
use std::sync::Arc;

/// One monitored feed's static identity and source descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub id: String,
    pub name: String,
    /// Opaque descriptor handed to the resolver (e.g. a live page URL)
    pub source: String,
    pub description: String,
}

impl From<&LocationConfig> for Location {
    fn from(config: &LocationConfig) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            source: config.source.clone(),
            description: config.description.clone(),
        }
    }
}

/// Immutable set of locations, built once at startup
#[derive(Debug, Clone)]
pub struct LocationTable {
    locations: Arc<[Arc<Location>]>,
}

impl LocationTable {
    pub fn from_config(locations: &[LocationConfig]) -> Self {
        Self {
            locations: locations
                .iter()
                .map(|config| Arc::new(Location::from(config)))
                .collect(),
        }
    }

    /// Restrict the table to the given ids, keeping configuration order
    pub fn select(&self, ids: &[String]) -> Result<Self> {
        if ids.is_empty() {
            return Ok(self.clone());
        }

        if let Some(unknown) = ids.iter().find(|id| self.get(id).is_none()) {
            return Err(CitysenseError::system(format!(
                "Unknown location id '{}'",
                unknown
            )));
        }

        Ok(Self {
            locations: self
                .locations
                .iter()
                .filter(|location| ids.contains(&location.id))
                .cloned()
                .collect(),
        })
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Location>> {
        self.locations.iter().find(|location| location.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Location>> {
        self.locations.iter()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CitysenseConfig;

    #[test]
    fn test_table_from_default_config() {
        let table = LocationTable::from_config(&CitysenseConfig::default().locations);

        assert_eq!(table.len(), 4);
        assert_eq!(table.get("3").unwrap().name, "Bangkok Thailand");
        assert!(table.get("9").is_none());
    }

    #[test]
    fn test_select_subset_keeps_order() {
        let table = LocationTable::from_config(&CitysenseConfig::default().locations);

        let subset = table
            .select(&["4".to_string(), "2".to_string()])
            .unwrap();
        let ids: Vec<&str> = subset.iter().map(|l| l.id.as_str()).collect();

        assert_eq!(ids, vec!["2", "4"]);
        assert!(table.select(&["nope".to_string()]).is_err());
        assert_eq!(table.select(&[]).unwrap().len(), 4);
    }
}
