use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Category, InspectionRecord, InspectionTable};

/// Per-location rollup for map display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSummary {
    pub latitude: f64,
    pub longitude: f64,
    pub establishment_name: Option<String>,
    pub establishment_address: Option<String>,
    pub inspection_count: usize,
    /// Severity label -> number of inspections with that label
    pub severity_counts: BTreeMap<String, usize>,
    /// Status of the first inspection in the group that has one. Not
    /// necessarily the latest status if it changed over time.
    pub status: Option<Category>,
}

/// Coordinates are keyed by bit pattern so they can be hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LocationKey {
    latitude: u64,
    longitude: u64,
    name: Option<String>,
    address: Option<String>,
}

impl LocationKey {
    fn new(latitude: f64, longitude: f64, record: &InspectionRecord) -> Self {
        Self {
            latitude: latitude.to_bits(),
            longitude: longitude.to_bits(),
            name: record.establishment_name.clone(),
            address: record.establishment_address.clone(),
        }
    }
}

impl LocationSummary {
    fn start(record: &InspectionRecord, latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            establishment_name: record.establishment_name.clone(),
            establishment_address: record.establishment_address.clone(),
            inspection_count: 0,
            severity_counts: BTreeMap::new(),
            status: None,
        }
    }

    fn add(&mut self, record: &InspectionRecord) {
        self.inspection_count += 1;
        if let Some(severity) = &record.severity {
            *self.severity_counts.entry(severity.as_str().to_string()).or_insert(0) += 1;
        }
        if self.status.is_none() {
            self.status = record.establishment_status.clone();
        }
    }
}

/// Collapses inspections into one row per (latitude, longitude, name, address),
/// most-inspected first. Rows without both coordinates, or with a non-finite
/// one, are skipped.
pub fn aggregate_by_location(table: &InspectionTable) -> Vec<LocationSummary> {
    let mut index: HashMap<LocationKey, usize> = HashMap::new();
    let mut summaries: Vec<LocationSummary> = Vec::new();

    for record in table {
        let Some((lat, lon)) = record.coordinates() else {
            continue;
        };

        let slot = *index.entry(LocationKey::new(lat, lon, record)).or_insert_with(|| {
            summaries.push(LocationSummary::start(record, lat, lon));
            summaries.len() - 1
        });
        summaries[slot].add(record);
    }

    // Stable: equal counts keep first-appearance order
    summaries.sort_by(|a, b| b.inspection_count.cmp(&a.inspection_count));
    debug!("Aggregated {} rows into {} locations", table.len(), summaries.len());
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: i64, coords: Option<(f64, f64)>, name: &str, severity: Option<&str>, status: Option<&str>) -> InspectionRecord {
        InspectionRecord {
            record_id: id,
            establishment_id: name.to_string(),
            inspection_id: format!("I{id}"),
            establishment_name: Some(name.to_string()),
            establishment_type: Some("Restaurant".to_string()),
            establishment_address: Some(format!("{name} address")),
            establishment_status: status.map(Category::new),
            min_inspections_per_year: None,
            infraction_details: None,
            inspection_date: NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
            severity: severity.map(Category::new),
            action: None,
            outcome: None,
            amount_fined: None,
            latitude: coords.map(|c| c.0),
            longitude: coords.map(|c| c.1),
            unique_id: None,
        }
    }

    #[test]
    fn test_same_location_different_severities_collapse() {
        let table = InspectionTable::new(vec![
            record(1, Some((43.65, -79.38)), "Cafe", Some("M - Minor"), Some("Pass")),
            record(2, Some((43.65, -79.38)), "Cafe", Some("S - Significant"), Some("Conditional Pass")),
        ]);

        let result = aggregate_by_location(&table);
        assert_eq!(result.len(), 1);
        let cafe = &result[0];
        assert_eq!(cafe.inspection_count, 2);
        assert_eq!(cafe.severity_counts.len(), 2);
        assert_eq!(cafe.severity_counts["M - Minor"], 1);
        assert_eq!(cafe.severity_counts["S - Significant"], 1);
        assert_eq!(cafe.status.as_ref().unwrap().as_str(), "Pass");
    }

    #[test]
    fn test_counts_sum_to_rows_with_coordinates() {
        let table = InspectionTable::new(vec![
            record(1, Some((43.0, -79.0)), "A", Some("M - Minor"), Some("Pass")),
            record(2, None, "A", Some("M - Minor"), Some("Pass")),
            record(3, Some((43.1, -79.1)), "B", None, None),
            record(4, Some((43.1, -79.1)), "B", Some("C - Crucial"), Some("Closed")),
            record(5, Some((43.1, -79.1)), "C", Some("C - Crucial"), Some("Closed")),
            record(6, Some((43.0, -79.0)), "A", None, Some("Pass")),
        ]);

        let result = aggregate_by_location(&table);
        let total: usize = result.iter().map(|s| s.inspection_count).sum();
        let with_coords = table.iter().filter(|r| r.has_coordinates()).count();
        assert_eq!(total, with_coords);
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_sorted_by_inspection_count_descending() {
        let table = InspectionTable::new(vec![
            record(1, Some((1.0, 1.0)), "One", None, None),
            record(2, Some((2.0, 2.0)), "Two", None, None),
            record(3, Some((2.0, 2.0)), "Two", None, None),
            record(4, Some((3.0, 3.0)), "Three", None, None),
            record(5, Some((3.0, 3.0)), "Three", None, None),
            record(6, Some((3.0, 3.0)), "Three", None, None),
        ]);

        let names: Vec<_> = aggregate_by_location(&table)
            .into_iter()
            .map(|s| s.establishment_name.unwrap())
            .collect();
        assert_eq!(names, vec!["Three", "Two", "One"]);
    }

    #[test]
    fn test_status_is_first_present_in_group() {
        let table = InspectionTable::new(vec![
            record(1, Some((1.0, 1.0)), "X", None, None),
            record(2, Some((1.0, 1.0)), "X", None, Some("Closed")),
            record(3, Some((1.0, 1.0)), "X", None, Some("Pass")),
        ]);
        let result = aggregate_by_location(&table);
        assert_eq!(result[0].status.as_ref().unwrap().as_str(), "Closed");
        assert!(result[0].severity_counts.is_empty());
    }

    #[test]
    fn test_non_finite_coordinates_are_skipped() {
        let table = InspectionTable::new(vec![
            record(1, Some((f64::NAN, -79.38)), "A", None, None),
            record(2, Some((43.65, f64::INFINITY)), "B", None, None),
            record(3, Some((43.65, -79.38)), "C", None, None),
        ]);

        let result = aggregate_by_location(&table);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].establishment_name.as_deref(), Some("C"));
        assert_eq!(table.iter().filter(|r| r.has_coordinates()).count(), 1);
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert!(aggregate_by_location(&InspectionTable::default()).is_empty());

        let no_coords = InspectionTable::new(vec![record(1, None, "A", None, None)]);
        assert!(aggregate_by_location(&no_coords).is_empty());
    }
}
