use crate::constants::COLUMNS;
use crate::error::{DineSafeError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::sync::Arc;

/// Untyped table as downloaded: every cell is text, empty cells are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Reads delimited text with a header row, without inferring any column types.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

        let mut table = RawTable::new(columns);
        for record in rdr.records() {
            let record = record?;
            let row = record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect();
            table.rows.push(row);
        }
        Ok(table)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Stacks tables row-wise. Every table must carry the same column set as the
    /// first; a table whose columns are a permutation is reordered to match.
    pub fn concat(tables: Vec<RawTable>) -> Result<RawTable> {
        let mut iter = tables.into_iter();
        let mut combined = iter
            .next()
            .ok_or_else(|| DineSafeError::Fetch("no tables to concatenate".into()))?;

        for (i, table) in iter.enumerate() {
            if table.columns == combined.columns {
                combined.rows.extend(table.rows);
                continue;
            }

            if table.columns.len() != combined.columns.len() {
                return Err(DineSafeError::Fetch(format!(
                    "table {} has {} columns, expected {}",
                    i + 1,
                    table.columns.len(),
                    combined.columns.len()
                )));
            }

            let mut order = Vec::with_capacity(combined.columns.len());
            for name in &combined.columns {
                let idx = table.column_index(name).ok_or_else(|| {
                    DineSafeError::Fetch(format!("table {} is missing column '{}'", i + 1, name))
                })?;
                order.push(idx);
            }
            for row in table.rows {
                combined
                    .rows
                    .push(order.iter().map(|&idx| row.get(idx).cloned().flatten()).collect());
            }
        }

        Ok(combined)
    }
}

/// Interned label of a source-defined enumeration (status, severity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(Arc<str>);

impl Category {
    pub fn new(label: &str) -> Self {
        Self(Arc::from(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(label: &str) -> Self {
        Category::new(label)
    }
}

/// One inspection event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionRecord {
    pub record_id: i64,
    pub establishment_id: String,
    pub inspection_id: String,
    pub establishment_name: Option<String>,
    pub establishment_type: Option<String>,
    pub establishment_address: Option<String>,
    pub establishment_status: Option<Category>,
    pub min_inspections_per_year: Option<i64>,
    pub infraction_details: Option<String>,
    pub inspection_date: NaiveDate,
    pub severity: Option<Category>,
    pub action: Option<String>,
    pub outcome: Option<String>,
    pub amount_fined: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub unique_id: Option<String>,
}

impl InspectionRecord {
    /// Cells in `COLUMNS` order, rendered the way the source publishes them.
    pub fn to_raw_row(&self) -> Vec<Option<String>> {
        fn cat(c: &Option<Category>) -> Option<String> {
            c.as_ref().map(|c| c.as_str().to_string())
        }
        fn num<T: ToString>(v: &Option<T>) -> Option<String> {
            v.as_ref().map(ToString::to_string)
        }

        vec![
            Some(self.record_id.to_string()),
            Some(self.establishment_id.clone()),
            Some(self.inspection_id.clone()),
            self.establishment_name.clone(),
            self.establishment_type.clone(),
            self.establishment_address.clone(),
            cat(&self.establishment_status),
            num(&self.min_inspections_per_year),
            self.infraction_details.clone(),
            Some(self.inspection_date.format("%Y-%m-%d").to_string()),
            cat(&self.severity),
            self.action.clone(),
            self.outcome.clone(),
            num(&self.amount_fined),
            num(&self.latitude),
            num(&self.longitude),
            self.unique_id.clone(),
        ]
    }

    /// Latitude and longitude when both are present and finite. NaN or
    /// infinite values count as missing.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn has_coordinates(&self) -> bool {
        self.coordinates().is_some()
    }
}

/// Normalized, fully typed inspection table. Immutable once built; views are
/// derived by copying rows out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InspectionTable {
    records: Vec<InspectionRecord>,
}

impl InspectionTable {
    pub fn new(records: Vec<InspectionRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[InspectionRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InspectionRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<InspectionRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn columns(&self) -> &'static [&'static str] {
        &COLUMNS
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.records.len(), COLUMNS.len())
    }

    /// Renders every value back to text, producing a table the normalizer accepts.
    pub fn to_raw(&self) -> RawTable {
        RawTable {
            columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: self.records.iter().map(InspectionRecord::to_raw_row).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a InspectionTable {
    type Item = &'a InspectionRecord;
    type IntoIter = std::slice::Iter<'a, InspectionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(columns: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|v| Some(v.to_string())).collect())
                .collect(),
        }
    }

    #[test]
    fn test_csv_reader_keeps_text_and_marks_empty_cells_absent() {
        let csv = "_id,Amount Fined,Latitude\n1,\"$1,250.00\",\n2,,43.65\n";
        let table = RawTable::from_csv_reader(csv.as_bytes()).unwrap();

        assert_eq!(table.columns, vec!["_id", "Amount Fined", "Latitude"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][1].as_deref(), Some("$1,250.00"));
        assert_eq!(table.rows[0][2], None);
        assert_eq!(table.rows[1][1], None);
        assert_eq!(table.rows[1][2].as_deref(), Some("43.65"));
    }

    #[test]
    fn test_concat_appends_rows_with_identical_columns() {
        let a = raw(&["a", "b"], &[&["1", "2"]]);
        let b = raw(&["a", "b"], &[&["3", "4"], &["5", "6"]]);

        let combined = RawTable::concat(vec![a, b]).unwrap();
        assert_eq!(combined.len(), 3);
        assert_eq!(combined.rows[2][0].as_deref(), Some("5"));
    }

    #[test]
    fn test_concat_reorders_permuted_columns() {
        let a = raw(&["a", "b"], &[&["1", "2"]]);
        let b = raw(&["b", "a"], &[&["4", "3"]]);

        let combined = RawTable::concat(vec![a, b]).unwrap();
        assert_eq!(combined.rows[1][0].as_deref(), Some("3"));
        assert_eq!(combined.rows[1][1].as_deref(), Some("4"));
    }

    #[test]
    fn test_concat_rejects_different_column_sets() {
        let a = raw(&["a", "b"], &[&["1", "2"]]);
        let b = raw(&["a", "c"], &[&["3", "4"]]);

        let err = RawTable::concat(vec![a, b]).unwrap_err();
        assert!(matches!(err, DineSafeError::Fetch(_)));
    }

    #[test]
    fn test_concat_of_nothing_is_an_error() {
        assert!(RawTable::concat(Vec::new()).is_err());
    }
}
