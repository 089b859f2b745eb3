use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use parquet::basic::{Compression, LogicalType, Repetition, Type as PhysicalType, ZstdLevel};
use parquet::data_type::{ByteArray, ByteArrayType, DoubleType, Int32Type, Int64Type};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::{SerializedColumnWriter, SerializedFileWriter};
use parquet::record::{Field, Row};
use parquet::schema::types::{Type, TypePtr};

use crate::constants::*;
use crate::error::{DineSafeError, Result};
use crate::pipeline::processing::normalize::CategoryInterner;
use crate::types::{Category, InspectionRecord, InspectionTable};

/// Days from 0001-01-01 to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Debug, Clone, Copy)]
enum Storage {
    Int64,
    Double,
    Utf8,
    Date,
}

/// (column, physical storage, required) in `COLUMNS` order
const SNAPSHOT_SCHEMA: [(&str, Storage, bool); 17] = [
    (COL_RECORD_ID, Storage::Int64, true),
    (COL_ESTABLISHMENT_ID, Storage::Utf8, true),
    (COL_INSPECTION_ID, Storage::Utf8, true),
    (COL_ESTABLISHMENT_NAME, Storage::Utf8, false),
    (COL_ESTABLISHMENT_TYPE, Storage::Utf8, false),
    (COL_ESTABLISHMENT_ADDRESS, Storage::Utf8, false),
    (COL_ESTABLISHMENT_STATUS, Storage::Utf8, false),
    (COL_MIN_INSPECTIONS, Storage::Int64, false),
    (COL_INFRACTION_DETAILS, Storage::Utf8, false),
    (COL_INSPECTION_DATE, Storage::Date, true),
    (COL_SEVERITY, Storage::Utf8, false),
    (COL_ACTION, Storage::Utf8, false),
    (COL_OUTCOME, Storage::Utf8, false),
    (COL_AMOUNT_FINED, Storage::Double, false),
    (COL_LATITUDE, Storage::Double, false),
    (COL_LONGITUDE, Storage::Double, false),
    (COL_UNIQUE_ID, Storage::Utf8, false),
];

fn build_schema() -> Result<TypePtr> {
    let mut fields = Vec::with_capacity(SNAPSHOT_SCHEMA.len());
    for (name, storage, required) in SNAPSHOT_SCHEMA {
        let (physical, logical) = match storage {
            Storage::Int64 => (PhysicalType::INT64, None),
            Storage::Double => (PhysicalType::DOUBLE, None),
            Storage::Utf8 => (PhysicalType::BYTE_ARRAY, Some(LogicalType::String)),
            Storage::Date => (PhysicalType::INT32, Some(LogicalType::Date)),
        };
        let repetition = if required {
            Repetition::REQUIRED
        } else {
            Repetition::OPTIONAL
        };
        let field = Type::primitive_type_builder(name, physical)
            .with_repetition(repetition)
            .with_logical_type(logical)
            .build()?;
        fields.push(Arc::new(field));
    }
    let schema = Type::group_type_builder("inspection").with_fields(fields).build()?;
    Ok(Arc::new(schema))
}

fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

/// Dense values of one column plus definition levels (1 = present, 0 = null).
enum ColumnData {
    Int64(Vec<i64>, Vec<i16>),
    Double(Vec<f64>, Vec<i16>),
    Utf8(Vec<ByteArray>, Vec<i16>),
    Date(Vec<i32>, Vec<i16>),
}

fn split<T, U>(cells: impl Iterator<Item = Option<T>>, convert: impl Fn(T) -> U) -> (Vec<U>, Vec<i16>) {
    let mut values = Vec::new();
    let mut defs = Vec::new();
    for cell in cells {
        match cell {
            Some(v) => {
                values.push(convert(v));
                defs.push(1);
            }
            None => defs.push(0),
        }
    }
    (values, defs)
}

impl ColumnData {
    fn int64(cells: impl Iterator<Item = Option<i64>>) -> Self {
        let (v, d) = split(cells, |x| x);
        ColumnData::Int64(v, d)
    }

    fn double(cells: impl Iterator<Item = Option<f64>>) -> Self {
        let (v, d) = split(cells, |x| x);
        ColumnData::Double(v, d)
    }

    fn utf8<'a>(cells: impl Iterator<Item = Option<&'a str>>) -> Self {
        let (v, d) = split(cells, ByteArray::from);
        ColumnData::Utf8(v, d)
    }

    fn date(cells: impl Iterator<Item = Option<NaiveDate>>) -> Self {
        let (v, d) = split(cells, date_to_days);
        ColumnData::Date(v, d)
    }

    fn write_to(&self, col: &mut SerializedColumnWriter<'_>, required: bool) -> Result<()> {
        fn levels(defs: &[i16], required: bool) -> Option<&[i16]> {
            if required {
                None
            } else {
                Some(defs)
            }
        }

        match self {
            ColumnData::Int64(v, d) => {
                col.typed::<Int64Type>().write_batch(v, levels(d, required), None)?;
            }
            ColumnData::Double(v, d) => {
                col.typed::<DoubleType>().write_batch(v, levels(d, required), None)?;
            }
            ColumnData::Utf8(v, d) => {
                col.typed::<ByteArrayType>().write_batch(v, levels(d, required), None)?;
            }
            ColumnData::Date(v, d) => {
                col.typed::<Int32Type>().write_batch(v, levels(d, required), None)?;
            }
        }
        Ok(())
    }
}

fn collect_columns(records: &[InspectionRecord]) -> Vec<ColumnData> {
    fn text(v: &Option<String>) -> Option<&str> {
        v.as_deref()
    }
    fn cat(v: &Option<Category>) -> Option<&str> {
        v.as_ref().map(Category::as_str)
    }

    let rows = || records.iter();
    vec![
        ColumnData::int64(rows().map(|r| Some(r.record_id))),
        ColumnData::utf8(rows().map(|r| Some(r.establishment_id.as_str()))),
        ColumnData::utf8(rows().map(|r| Some(r.inspection_id.as_str()))),
        ColumnData::utf8(rows().map(|r| text(&r.establishment_name))),
        ColumnData::utf8(rows().map(|r| text(&r.establishment_type))),
        ColumnData::utf8(rows().map(|r| text(&r.establishment_address))),
        ColumnData::utf8(rows().map(|r| cat(&r.establishment_status))),
        ColumnData::int64(rows().map(|r| r.min_inspections_per_year)),
        ColumnData::utf8(rows().map(|r| text(&r.infraction_details))),
        ColumnData::date(rows().map(|r| Some(r.inspection_date))),
        ColumnData::utf8(rows().map(|r| cat(&r.severity))),
        ColumnData::utf8(rows().map(|r| text(&r.action))),
        ColumnData::utf8(rows().map(|r| text(&r.outcome))),
        ColumnData::double(rows().map(|r| r.amount_fined)),
        ColumnData::double(rows().map(|r| r.latitude)),
        ColumnData::double(rows().map(|r| r.longitude)),
        ColumnData::utf8(rows().map(|r| text(&r.unique_id))),
    ]
}

/// Writes the table as a single-row-group, ZSTD-compressed Parquet file.
pub fn write_snapshot(table: &InspectionTable, path: &Path) -> Result<()> {
    let schema = build_schema()?;
    let props = Arc::new(
        WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::default()))
            .build(),
    );

    let file = File::create(path)?;
    let mut writer = SerializedFileWriter::new(file, schema, props)?;
    let columns = collect_columns(table.records());

    let mut rg = writer.next_row_group()?;
    let mut col_index = 0;
    while let Some(mut col_writer) = rg.next_column()? {
        let data = columns
            .get(col_index)
            .ok_or_else(|| ParquetError::General("schema has more columns than data".into()))?;
        let (_, _, required) = SNAPSHOT_SCHEMA[col_index];
        data.write_to(&mut col_writer, required)?;
        col_writer.close()?;
        col_index += 1;
    }
    rg.close()?;
    writer.close()?;
    Ok(())
}

/// Reads a snapshot written by [`write_snapshot`].
pub fn read_snapshot(path: &Path) -> Result<InspectionTable> {
    let file = File::open(path)?;
    let reader = SerializedFileReader::new(file)?;
    let expected_rows = reader.metadata().file_metadata().num_rows().max(0) as usize;

    let mut interner = CategoryInterner::default();
    let mut records = Vec::with_capacity(expected_rows);
    for (i, row) in reader.get_row_iter(None)?.enumerate() {
        let row = row?;
        records.push(SnapshotRow::new(&row, i + 1).into_record(&mut interner)?);
    }
    Ok(InspectionTable::new(records))
}

struct SnapshotRow<'a> {
    fields: HashMap<&'a str, &'a Field>,
    row: usize,
}

impl<'a> SnapshotRow<'a> {
    fn new(row: &'a Row, index: usize) -> Self {
        Self {
            fields: row.get_column_iter().map(|(name, field)| (name.as_str(), field)).collect(),
            row: index,
        }
    }

    fn unexpected(&self, column: &str, field: &Field) -> DineSafeError {
        DineSafeError::parse(column, self.row, Some(field.to_string().as_str()), "unexpected value type in snapshot")
    }

    fn required<T>(&self, column: &str, value: Option<T>) -> Result<T> {
        value.ok_or_else(|| DineSafeError::parse(column, self.row, None, "required value is absent in snapshot"))
    }

    fn long(&self, column: &str) -> Result<Option<i64>> {
        match self.fields.get(column) {
            None | Some(Field::Null) => Ok(None),
            Some(Field::Long(v)) => Ok(Some(*v)),
            Some(Field::Int(v)) => Ok(Some(i64::from(*v))),
            Some(other) => Err(self.unexpected(column, other)),
        }
    }

    fn double(&self, column: &str) -> Result<Option<f64>> {
        match self.fields.get(column) {
            None | Some(Field::Null) => Ok(None),
            Some(Field::Double(v)) => Ok(Some(*v)),
            Some(Field::Float(v)) => Ok(Some(f64::from(*v))),
            Some(other) => Err(self.unexpected(column, other)),
        }
    }

    fn text(&self, column: &str) -> Result<Option<String>> {
        match self.fields.get(column) {
            None | Some(Field::Null) => Ok(None),
            Some(Field::Str(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.unexpected(column, other)),
        }
    }

    fn category(&self, column: &str, interner: &mut CategoryInterner) -> Result<Option<Category>> {
        Ok(self.text(column)?.map(|label| interner.intern(&label)))
    }

    fn date(&self, column: &str) -> Result<Option<NaiveDate>> {
        match self.fields.get(column) {
            None | Some(Field::Null) => Ok(None),
            Some(Field::Date(days)) => days_to_date(*days)
                .map(Some)
                .ok_or_else(|| DineSafeError::parse(column, self.row, Some(days.to_string().as_str()), "date out of range")),
            Some(other) => Err(self.unexpected(column, other)),
        }
    }

    fn into_record(self, interner: &mut CategoryInterner) -> Result<InspectionRecord> {
        Ok(InspectionRecord {
            record_id: self.required(COL_RECORD_ID, self.long(COL_RECORD_ID)?)?,
            establishment_id: self.required(COL_ESTABLISHMENT_ID, self.text(COL_ESTABLISHMENT_ID)?)?,
            inspection_id: self.required(COL_INSPECTION_ID, self.text(COL_INSPECTION_ID)?)?,
            establishment_name: self.text(COL_ESTABLISHMENT_NAME)?,
            establishment_type: self.text(COL_ESTABLISHMENT_TYPE)?,
            establishment_address: self.text(COL_ESTABLISHMENT_ADDRESS)?,
            establishment_status: self.category(COL_ESTABLISHMENT_STATUS, interner)?,
            min_inspections_per_year: self.long(COL_MIN_INSPECTIONS)?,
            infraction_details: self.text(COL_INFRACTION_DETAILS)?,
            inspection_date: self.required(COL_INSPECTION_DATE, self.date(COL_INSPECTION_DATE)?)?,
            severity: self.category(COL_SEVERITY, interner)?,
            action: self.text(COL_ACTION)?,
            outcome: self.text(COL_OUTCOME)?,
            amount_fined: self.double(COL_AMOUNT_FINED)?,
            latitude: self.double(COL_LATITUDE)?,
            longitude: self.double(COL_LONGITUDE)?,
            unique_id: self.text(COL_UNIQUE_ID)?,
        })
    }
}
