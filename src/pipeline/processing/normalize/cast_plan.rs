use std::borrow::Cow;
use std::collections::HashMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::*;
use crate::error::{DineSafeError, Result};
use crate::types::Category;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

static CURRENCY_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\$,]").unwrap());

/// Semantic type a source column is cast to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Category,
    Date,
}

/// Fix-up applied to a raw cell before it is cast
pub type Repair = fn(&str) -> Cow<'_, str>;

/// One entry of the cast plan
#[derive(Debug, Clone, Copy)]
pub struct ColumnCast {
    pub column: &'static str,
    pub target: ColumnType,
    pub repair: Option<Repair>,
}

const fn cast(column: &'static str, target: ColumnType) -> ColumnCast {
    ColumnCast {
        column,
        target,
        repair: None,
    }
}

const fn repaired(column: &'static str, target: ColumnType, repair: Repair) -> ColumnCast {
    ColumnCast {
        column,
        target,
        repair: Some(repair),
    }
}

/// The source occasionally types the letter O where a zero belongs.
pub fn letter_o_to_zero(value: &str) -> Cow<'_, str> {
    if value.contains('O') {
        Cow::Owned(value.replace('O', "0"))
    } else {
        Cow::Borrowed(value)
    }
}

/// "$1,250.00" -> "1250.00"
pub fn strip_currency(value: &str) -> Cow<'_, str> {
    CURRENCY_CHARS.replace_all(value, "")
}

/// Ordered cast plan for the DineSafe dump. Adding or dropping a column is an
/// edit to this table only.
pub const CAST_PLAN: &[ColumnCast] = &[
    cast(COL_RECORD_ID, ColumnType::Integer),
    cast(COL_ESTABLISHMENT_ID, ColumnType::Text),
    cast(COL_INSPECTION_ID, ColumnType::Text),
    cast(COL_ESTABLISHMENT_NAME, ColumnType::Text),
    cast(COL_ESTABLISHMENT_TYPE, ColumnType::Text),
    cast(COL_ESTABLISHMENT_ADDRESS, ColumnType::Text),
    cast(COL_ESTABLISHMENT_STATUS, ColumnType::Category),
    repaired(COL_MIN_INSPECTIONS, ColumnType::Integer, letter_o_to_zero),
    cast(COL_INFRACTION_DETAILS, ColumnType::Text),
    cast(COL_INSPECTION_DATE, ColumnType::Date),
    cast(COL_SEVERITY, ColumnType::Category),
    cast(COL_ACTION, ColumnType::Text),
    cast(COL_OUTCOME, ColumnType::Text),
    repaired(COL_AMOUNT_FINED, ColumnType::Float, strip_currency),
    cast(COL_LATITUDE, ColumnType::Float),
    cast(COL_LONGITUDE, ColumnType::Float),
    cast(COL_UNIQUE_ID, ColumnType::Text),
];

/// A single typed cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Category(Category),
    Date(NaiveDate),
}

/// Interns category labels so every row sharing a label shares one allocation.
#[derive(Debug, Default)]
pub struct CategoryInterner {
    labels: HashMap<String, Category>,
}

impl CategoryInterner {
    pub fn intern(&mut self, label: &str) -> Category {
        if let Some(existing) = self.labels.get(label) {
            return existing.clone();
        }
        let category = Category::new(label);
        self.labels.insert(label.to_string(), category.clone());
        category
    }
}

impl ColumnCast {
    /// Casts one raw cell. `row` is the 1-based data row, used for error reporting.
    pub fn apply(&self, raw: Option<&str>, row: usize, interner: &mut CategoryInterner) -> Result<Value> {
        let Some(raw) = raw else {
            return Ok(Value::Null);
        };

        let repaired = match self.repair {
            Some(repair) => repair(raw),
            None => Cow::Borrowed(raw),
        };
        let value: &str = &repaired;
        let fail = |reason: String| DineSafeError::parse(self.column, row, Some(raw), reason);

        match self.target {
            ColumnType::Text => Ok(Value::Text(value.to_string())),
            ColumnType::Category => Ok(Value::Category(interner.intern(value))),
            ColumnType::Integer => value
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| fail(format!("not an integer: {e}"))),
            ColumnType::Float => value
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| fail(format!("not a number: {e}"))),
            ColumnType::Date => NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
                .map(Value::Date)
                .map_err(|e| fail(format!("not a {DATE_FORMAT} date: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_entry(column: &str) -> ColumnCast {
        *CAST_PLAN.iter().find(|c| c.column == column).unwrap()
    }

    #[test]
    fn test_plan_covers_every_column_once() {
        assert_eq!(CAST_PLAN.len(), COLUMNS.len());
        for (cast, column) in CAST_PLAN.iter().zip(COLUMNS.iter()) {
            assert_eq!(cast.column, *column);
        }
    }

    #[test]
    fn test_letter_o_repair() {
        assert_eq!(letter_o_to_zero("O1"), "01");
        assert_eq!(letter_o_to_zero("3"), "3");
        assert!(matches!(letter_o_to_zero("3"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_currency() {
        assert_eq!(strip_currency("$1,250.00"), "1250.00");
        assert_eq!(strip_currency("55.00"), "55.00");
    }

    #[test]
    fn test_min_inspections_cast_repairs_letter_o() {
        let mut interner = CategoryInterner::default();
        let value = plan_entry(COL_MIN_INSPECTIONS).apply(Some("O1"), 1, &mut interner).unwrap();
        assert_eq!(value, Value::Integer(1));
    }

    #[test]
    fn test_amount_fined_cast() {
        let mut interner = CategoryInterner::default();
        let cast = plan_entry(COL_AMOUNT_FINED);
        assert_eq!(cast.apply(Some("$1,250.00"), 1, &mut interner).unwrap(), Value::Float(1250.0));
        assert_eq!(cast.apply(None, 1, &mut interner).unwrap(), Value::Null);
    }

    #[test]
    fn test_non_numeric_fine_is_a_parse_error() {
        let mut interner = CategoryInterner::default();
        let err = plan_entry(COL_AMOUNT_FINED)
            .apply(Some("$twelve"), 7, &mut interner)
            .unwrap_err();
        match err {
            DineSafeError::Parse { column, row, value, .. } => {
                assert_eq!(column, COL_AMOUNT_FINED);
                assert_eq!(row, 7);
                assert_eq!(value.as_deref(), Some("$twelve"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_date_is_a_parse_error() {
        let mut interner = CategoryInterner::default();
        let cast = plan_entry(COL_INSPECTION_DATE);
        assert!(cast.apply(Some("2023/01/05"), 1, &mut interner).is_err());
        assert_eq!(
            cast.apply(Some("2023-01-05"), 1, &mut interner).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2023, 1, 5).unwrap())
        );
    }

    #[test]
    fn test_categories_are_interned() {
        let mut interner = CategoryInterner::default();
        let cast = plan_entry(COL_SEVERITY);
        let a = cast.apply(Some("M - Minor"), 1, &mut interner).unwrap();
        let b = cast.apply(Some("M - Minor"), 2, &mut interner).unwrap();
        match (a, b) {
            (Value::Category(a), Value::Category(b)) => {
                assert_eq!(a, b);
                assert_eq!(a.as_str(), "M - Minor");
            }
            other => panic!("unexpected values: {other:?}"),
        }
    }
}
