use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Category, InspectionRecord, InspectionTable};

/// Inclusive date bounds; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// A single row-local condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    SeverityIn(BTreeSet<String>),
    StatusIn(BTreeSet<String>),
    TypeIn(BTreeSet<String>),
    DateWithin(DateRange),
    /// Lowercased needle
    NameContains(String),
}

fn category_in(value: &Option<Category>, labels: &BTreeSet<String>) -> bool {
    value.as_ref().is_some_and(|c| labels.contains(c.as_str()))
}

impl Predicate {
    pub fn matches(&self, record: &InspectionRecord) -> bool {
        match self {
            Predicate::SeverityIn(labels) => category_in(&record.severity, labels),
            Predicate::StatusIn(labels) => category_in(&record.establishment_status, labels),
            Predicate::TypeIn(types) => record
                .establishment_type
                .as_ref()
                .is_some_and(|t| types.contains(t)),
            Predicate::DateWithin(range) => range.contains(record.inspection_date),
            Predicate::NameContains(needle) => record
                .establishment_name
                .as_ref()
                .is_some_and(|name| name.to_lowercase().contains(needle.as_str())),
        }
    }
}

/// Optional predicates over an inspection table. Unset or empty criteria do
/// not restrict; set criteria combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionFilter {
    pub severities: BTreeSet<String>,
    pub statuses: BTreeSet<String>,
    pub establishment_types: BTreeSet<String>,
    pub date_range: Option<DateRange>,
    pub name: Option<String>,
}

impl InspectionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn severities<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.severities = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn statuses<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statuses = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn establishment_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.establishment_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn name(mut self, needle: impl Into<String>) -> Self {
        self.name = Some(needle.into());
        self
    }

    /// The active predicates, in no significant order.
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();
        if !self.severities.is_empty() {
            predicates.push(Predicate::SeverityIn(self.severities.clone()));
        }
        if !self.statuses.is_empty() {
            predicates.push(Predicate::StatusIn(self.statuses.clone()));
        }
        if !self.establishment_types.is_empty() {
            predicates.push(Predicate::TypeIn(self.establishment_types.clone()));
        }
        if let Some(range) = self.date_range.filter(|r| !r.is_open()) {
            predicates.push(Predicate::DateWithin(range));
        }
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            predicates.push(Predicate::NameContains(name.to_lowercase()));
        }
        predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates().is_empty()
    }
}

/// Rows of `table` satisfying every predicate.
pub fn apply_predicates(table: &InspectionTable, predicates: &[Predicate]) -> InspectionTable {
    let records = table
        .iter()
        .filter(|r| predicates.iter().all(|p| p.matches(r)))
        .cloned()
        .collect();
    InspectionTable::new(records)
}

/// Rows of `table` matching `filter`; the input is left untouched.
pub fn filter(table: &InspectionTable, filter: &InspectionFilter) -> InspectionTable {
    let predicates = filter.predicates();
    let filtered = apply_predicates(table, &predicates);
    debug!(
        "Filter with {} predicates kept {}/{} rows",
        predicates.len(),
        filtered.len(),
        table.len()
    );
    filtered
}
