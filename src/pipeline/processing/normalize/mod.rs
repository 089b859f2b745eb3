//! Column type coercion for the raw DineSafe dump.
//!
//! Every column named in [`CAST_PLAN`] is cast in plan order, then rows are
//! assembled into [`InspectionRecord`]s. The batch either normalizes as a
//! whole or fails with the first offending cell.

pub mod cast_plan;

use std::collections::HashMap;

use metrics::counter;
use tracing::{debug, info, instrument};

use crate::constants::*;
use crate::error::{DineSafeError, Result};
use crate::metrics::ROWS_NORMALIZED;
use crate::types::{Category, InspectionRecord, InspectionTable, RawTable};

pub use cast_plan::{CategoryInterner, ColumnCast, ColumnType, Value, CAST_PLAN};

/// Typed columns keyed by source column name
type CastColumns = HashMap<&'static str, Vec<Value>>;

/// Casts the untyped table into an [`InspectionTable`].
#[instrument(skip(raw), fields(rows = raw.len()))]
pub fn normalize(raw: &RawTable) -> Result<InspectionTable> {
    let mut columns: CastColumns = HashMap::with_capacity(CAST_PLAN.len());

    for cast in CAST_PLAN {
        let idx = raw
            .column_index(cast.column)
            .ok_or_else(|| DineSafeError::parse(cast.column, 0, None, "column missing from input"))?;

        let mut interner = CategoryInterner::default();
        let mut values = Vec::with_capacity(raw.len());
        for (i, row) in raw.rows.iter().enumerate() {
            let cell = row.get(idx).and_then(|c| c.as_deref());
            values.push(cast.apply(cell, i + 1, &mut interner)?);
        }
        debug!(column = cast.column, target = ?cast.target, "cast column");
        columns.insert(cast.column, values);
    }

    let dropped = raw.columns.len().saturating_sub(CAST_PLAN.len());
    if dropped > 0 {
        debug!("Dropping {} columns not in the cast plan", dropped);
    }

    let records = (0..raw.len())
        .map(|row| CastRow { columns: &columns, row }.into_record())
        .collect::<Result<Vec<_>>>()?;
    check_unique_record_ids(&records)?;

    counter!(ROWS_NORMALIZED).increment(records.len() as u64);
    info!("Normalized {} rows", records.len());
    Ok(InspectionTable::new(records))
}

/// `_id` must identify a row across the whole table, including rows stacked
/// from several resources.
fn check_unique_record_ids(records: &[InspectionRecord]) -> Result<()> {
    let mut seen: HashMap<i64, usize> = HashMap::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        if let Some(first) = seen.insert(record.record_id, i + 1) {
            let id = record.record_id.to_string();
            return Err(DineSafeError::parse(
                COL_RECORD_ID,
                i + 1,
                Some(id.as_str()),
                format!("duplicate record id, first seen at row {first}"),
            ));
        }
    }
    Ok(())
}

/// Reads one row out of the typed columns.
struct CastRow<'a> {
    columns: &'a CastColumns,
    row: usize,
}

impl CastRow<'_> {
    fn value(&self, column: &'static str) -> &Value {
        self.columns
            .get(column)
            .and_then(|values| values.get(self.row))
            .unwrap_or(&Value::Null)
    }

    fn mismatch(&self, column: &str, expected: ColumnType) -> DineSafeError {
        DineSafeError::parse(
            column,
            self.row + 1,
            None,
            format!("cast plan does not produce {expected:?} for this column"),
        )
    }

    fn required<T>(&self, column: &str, value: Option<T>) -> Result<T> {
        value.ok_or_else(|| DineSafeError::parse(column, self.row + 1, None, "required value is absent"))
    }

    fn text(&self, column: &'static str) -> Result<Option<String>> {
        match self.value(column) {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            _ => Err(self.mismatch(column, ColumnType::Text)),
        }
    }

    fn category(&self, column: &'static str) -> Result<Option<Category>> {
        match self.value(column) {
            Value::Null => Ok(None),
            Value::Category(c) => Ok(Some(c.clone())),
            _ => Err(self.mismatch(column, ColumnType::Category)),
        }
    }

    fn integer(&self, column: &'static str) -> Result<Option<i64>> {
        match self.value(column) {
            Value::Null => Ok(None),
            Value::Integer(n) => Ok(Some(*n)),
            _ => Err(self.mismatch(column, ColumnType::Integer)),
        }
    }

    fn float(&self, column: &'static str) -> Result<Option<f64>> {
        match self.value(column) {
            Value::Null => Ok(None),
            Value::Float(f) => Ok(Some(*f)),
            _ => Err(self.mismatch(column, ColumnType::Float)),
        }
    }

    fn date(&self, column: &'static str) -> Result<Option<chrono::NaiveDate>> {
        match self.value(column) {
            Value::Null => Ok(None),
            Value::Date(d) => Ok(Some(*d)),
            _ => Err(self.mismatch(column, ColumnType::Date)),
        }
    }

    fn into_record(self) -> Result<InspectionRecord> {
        Ok(InspectionRecord {
            record_id: self.required(COL_RECORD_ID, self.integer(COL_RECORD_ID)?)?,
            establishment_id: self.required(COL_ESTABLISHMENT_ID, self.text(COL_ESTABLISHMENT_ID)?)?,
            inspection_id: self.required(COL_INSPECTION_ID, self.text(COL_INSPECTION_ID)?)?,
            establishment_name: self.text(COL_ESTABLISHMENT_NAME)?,
            establishment_type: self.text(COL_ESTABLISHMENT_TYPE)?,
            establishment_address: self.text(COL_ESTABLISHMENT_ADDRESS)?,
            establishment_status: self.category(COL_ESTABLISHMENT_STATUS)?,
            min_inspections_per_year: self.integer(COL_MIN_INSPECTIONS)?,
            infraction_details: self.text(COL_INFRACTION_DETAILS)?,
            inspection_date: self.required(COL_INSPECTION_DATE, self.date(COL_INSPECTION_DATE)?)?,
            severity: self.category(COL_SEVERITY)?,
            action: self.text(COL_ACTION)?,
            outcome: self.text(COL_OUTCOME)?,
            amount_fined: self.float(COL_AMOUNT_FINED)?,
            latitude: self.float(COL_LATITUDE)?,
            longitude: self.float(COL_LONGITUDE)?,
            unique_id: self.text(COL_UNIQUE_ID)?,
        })
    }
}
