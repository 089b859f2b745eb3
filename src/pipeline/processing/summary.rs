use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::InspectionTable;

/// Earliest and latest inspection dates; both absent for an empty table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    pub min: Option<NaiveDate>,
    pub max: Option<NaiveDate>,
}

impl DateSpan {
    pub fn of(table: &InspectionTable) -> Self {
        let dates = table.iter().map(|r| r.inspection_date);
        Self {
            min: dates.clone().min(),
            max: dates.max(),
        }
    }

    pub fn days(&self) -> i64 {
        match (self.min, self.max) {
            (Some(min), Some(max)) => (max - min).num_days(),
            _ => 0,
        }
    }
}

/// Label and how many rows carry it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSummary {
    pub total_inspections: usize,
    pub unique_establishments: usize,
    pub date_range: DateSpan,
    pub severity_counts: Vec<LabelCount>,
    pub status_counts: Vec<LabelCount>,
    pub establishment_types: Vec<LabelCount>,
}

/// Headline numbers for dashboard cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub total_inspections: usize,
    pub unique_establishments: usize,
    pub avg_inspections_per_establishment: f64,
    pub most_common_severity: Option<String>,
    pub date_range_days: i64,
}

pub fn unique_establishments(table: &InspectionTable) -> usize {
    table
        .iter()
        .map(|r| r.establishment_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Counts present labels, most frequent first; ties sorted by label.
fn value_counts<'a>(labels: impl Iterator<Item = Option<&'a str>>) -> Vec<LabelCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for label in labels.flatten() {
        *counts.entry(label).or_insert(0) += 1;
    }
    let mut out: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, count)| LabelCount {
            label: label.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    out
}

pub fn summarize(table: &InspectionTable) -> DataSummary {
    DataSummary {
        total_inspections: table.len(),
        unique_establishments: unique_establishments(table),
        date_range: DateSpan::of(table),
        severity_counts: value_counts(table.iter().map(|r| r.severity.as_ref().map(|c| c.as_str()))),
        status_counts: value_counts(
            table
                .iter()
                .map(|r| r.establishment_status.as_ref().map(|c| c.as_str())),
        ),
        establishment_types: value_counts(table.iter().map(|r| r.establishment_type.as_deref())),
    }
}

/// `None` for an empty table.
pub fn summary_metrics(table: &InspectionTable) -> Option<SummaryMetrics> {
    if table.is_empty() {
        return None;
    }
    let summary = summarize(table);
    Some(SummaryMetrics {
        total_inspections: summary.total_inspections,
        unique_establishments: summary.unique_establishments,
        avg_inspections_per_establishment: summary.total_inspections as f64
            / summary.unique_establishments as f64,
        most_common_severity: summary.severity_counts.first().map(|c| c.label.clone()),
        date_range_days: summary.date_range.days(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, InspectionRecord};

    fn record(id: i64, establishment: &str, severity: Option<&str>, day: u32) -> InspectionRecord {
        InspectionRecord {
            record_id: id,
            establishment_id: establishment.to_string(),
            inspection_id: format!("I{id}"),
            establishment_name: None,
            establishment_type: Some(if id % 2 == 0 { "Bakery" } else { "Restaurant" }.to_string()),
            establishment_address: None,
            establishment_status: Some(Category::new("Pass")),
            min_inspections_per_year: None,
            infraction_details: None,
            inspection_date: NaiveDate::from_ymd_opt(2023, 5, day).unwrap(),
            severity: severity.map(Category::new),
            action: None,
            outcome: None,
            amount_fined: None,
            latitude: None,
            longitude: None,
            unique_id: None,
        }
    }

    fn sample() -> InspectionTable {
        InspectionTable::new(vec![
            record(1, "A", Some("M - Minor"), 1),
            record(2, "A", Some("S - Significant"), 10),
            record(3, "B", Some("M - Minor"), 4),
            record(4, "C", None, 21),
        ])
    }

    #[test]
    fn test_summary_counts() {
        let summary = summarize(&sample());
        assert_eq!(summary.total_inspections, 4);
        assert_eq!(summary.unique_establishments, 3);
        assert_eq!(summary.date_range.min, NaiveDate::from_ymd_opt(2023, 5, 1));
        assert_eq!(summary.date_range.max, NaiveDate::from_ymd_opt(2023, 5, 21));
        assert_eq!(
            summary.severity_counts,
            vec![
                LabelCount { label: "M - Minor".into(), count: 2 },
                LabelCount { label: "S - Significant".into(), count: 1 },
            ]
        );
        assert_eq!(summary.status_counts[0].count, 4);
        assert_eq!(summary.establishment_types.len(), 2);
    }

    #[test]
    fn test_summary_metrics() {
        let metrics = summary_metrics(&sample()).unwrap();
        assert_eq!(metrics.date_range_days, 20);
        assert_eq!(metrics.most_common_severity.as_deref(), Some("M - Minor"));
        assert!((metrics.avg_inspections_per_establishment - 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_table_has_no_metrics() {
        let empty = InspectionTable::default();
        assert!(summary_metrics(&empty).is_none());
        let summary = summarize(&empty);
        assert_eq!(summary.date_range, DateSpan::default());
        assert_eq!(summary.date_range.days(), 0);
    }
}
