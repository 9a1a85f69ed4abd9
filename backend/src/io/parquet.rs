//! Parquet codec over Arrow record batches.
//!
//! The Arrow schema is embedded by the writer, so Category columns come back
//! as dictionaries and every kind survives a round trip.

use arrow::array::{
    Array, ArrayRef, BooleanArray, DictionaryArray, Float64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Int32Type, Schema, TimeUnit};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::sync::Arc;

use crate::error::{ExportError, ExportResult, LoadError, LoadResult};
use crate::table::{Column, ColumnData, ColumnKind, Table};

fn parse_err(e: impl std::fmt::Display) -> LoadError {
    LoadError::Parse(e.to_string())
}

/// Map an Arrow type onto a column kind.
fn kind_for(data_type: &DataType) -> LoadResult<ColumnKind> {
    use DataType::*;
    match data_type {
        Null | Int8 | Int16 | Int32 | Int64 | UInt8 | UInt16 | UInt32 | UInt64 | Float16
        | Float32 | Float64 | Decimal128(..) | Decimal256(..) => Ok(ColumnKind::Number),
        Utf8 | LargeUtf8 => Ok(ColumnKind::Text),
        Dictionary(_, values) if matches!(values.as_ref(), Utf8 | LargeUtf8) => {
            Ok(ColumnKind::Category)
        }
        Boolean => Ok(ColumnKind::Boolean),
        Timestamp(..) | Date32 | Date64 => Ok(ColumnKind::DateTime),
        other => Err(LoadError::Parse(format!(
            "Unsupported Parquet column type {}",
            other
        ))),
    }
}

fn from_micros(micros: i64) -> Option<NaiveDateTime> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos).map(|d| d.naive_utc())
}

fn empty_data(kind: ColumnKind) -> ColumnData {
    match kind {
        ColumnKind::Number => ColumnData::Number(Vec::new()),
        ColumnKind::Text => ColumnData::Text(Vec::new()),
        ColumnKind::Category => ColumnData::Category(Vec::new()),
        ColumnKind::DateTime => ColumnData::DateTime(Vec::new()),
        ColumnKind::Boolean => ColumnData::Boolean(Vec::new()),
    }
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, what: &str) -> LoadResult<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| LoadError::Parse(format!("Expected {} array", what)))
}

/// Append one Arrow array to the matching column buffer.
fn append(data: &mut ColumnData, array: &ArrayRef) -> LoadResult<()> {
    match data {
        ColumnData::Number(out) => {
            let converted = cast(array, &DataType::Float64).map_err(parse_err)?;
            let values = downcast::<Float64Array>(&converted, "float64")?;
            out.extend(values.iter().map(|v| v.filter(|n| !n.is_nan())));
        }
        ColumnData::Text(out) | ColumnData::Category(out) => {
            let converted = cast(array, &DataType::Utf8).map_err(parse_err)?;
            let values = downcast::<StringArray>(&converted, "utf8")?;
            out.extend(values.iter().map(|v| v.map(str::to_string)));
        }
        ColumnData::Boolean(out) => {
            let values = downcast::<BooleanArray>(array, "boolean")?;
            out.extend(values.iter());
        }
        ColumnData::DateTime(out) => {
            let converted = cast(array, &DataType::Timestamp(TimeUnit::Microsecond, None))
                .map_err(parse_err)?;
            let values = downcast::<TimestampMicrosecondArray>(&converted, "timestamp")?;
            out.extend(values.iter().map(|v| v.and_then(from_micros)));
        }
    }
    Ok(())
}

/// Read Parquet bytes into a table.
pub fn read_parquet(bytes: &[u8]) -> LoadResult<Table> {
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(bytes)).map_err(parse_err)?;
    let schema = builder.schema().clone();

    let mut columns: Vec<Column> = schema
        .fields()
        .iter()
        .map(|f| -> LoadResult<Column> {
            let kind = kind_for(f.data_type())?;
            Ok(Column::new(f.name().clone(), empty_data(kind)))
        })
        .collect::<LoadResult<_>>()?;

    let reader = builder.build().map_err(parse_err)?;
    let mut n_rows = 0;
    for batch in reader {
        let batch = batch.map_err(parse_err)?;
        n_rows += batch.num_rows();
        for (column, array) in columns.iter_mut().zip(batch.columns()) {
            append(&mut column.data, array)?;
        }
    }

    tracing::debug!(rows = n_rows, columns = columns.len(), "Parquet decoded");
    Table::with_row_count(n_rows, columns).map_err(parse_err)
}

fn arrow_type(kind: ColumnKind) -> DataType {
    match kind {
        ColumnKind::Number => DataType::Float64,
        ColumnKind::Text => DataType::Utf8,
        ColumnKind::Category => {
            DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8))
        }
        ColumnKind::DateTime => DataType::Timestamp(TimeUnit::Microsecond, None),
        ColumnKind::Boolean => DataType::Boolean,
    }
}

fn to_array(data: &ColumnData) -> ArrayRef {
    match data {
        ColumnData::Number(v) => Arc::new(Float64Array::from(v.clone())),
        ColumnData::Text(v) => Arc::new(StringArray::from(
            v.iter().map(|s| s.as_deref()).collect::<Vec<_>>(),
        )),
        ColumnData::Category(v) => Arc::new(
            v.iter()
                .map(|s| s.as_deref())
                .collect::<DictionaryArray<Int32Type>>(),
        ),
        ColumnData::DateTime(v) => Arc::new(TimestampMicrosecondArray::from(
            v.iter()
                .map(|d| d.map(|d| d.and_utc().timestamp_micros()))
                .collect::<Vec<_>>(),
        )),
        ColumnData::Boolean(v) => Arc::new(BooleanArray::from(v.clone())),
    }
}

/// Serialize a table to Parquet in memory.
pub fn write_parquet(table: &Table) -> ExportResult<Vec<u8>> {
    let fields: Vec<Field> = table
        .columns()
        .iter()
        .map(|c| Field::new(c.name.clone(), arrow_type(c.kind()), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));
    let arrays: Vec<ArrayRef> = table.columns().iter().map(|c| to_array(&c.data)).collect();

    let options = RecordBatchOptions::new().with_row_count(Some(table.n_rows()));
    let batch = RecordBatch::try_new_with_options(schema.clone(), arrays, &options)
        .map_err(|e| ExportError::Parquet(e.to_string()))?;

    let mut buffer = Vec::new();
    {
        let mut writer = ArrowWriter::try_new(&mut buffer, schema, None)
            .map_err(|e| ExportError::Parquet(e.to_string()))?;
        writer
            .write(&batch)
            .map_err(|e| ExportError::Parquet(e.to_string()))?;
        writer
            .close()
            .map_err(|e| ExportError::Parquet(e.to_string()))?;
    }

    tracing::debug!(size_bytes = buffer.len(), "Parquet serialization completed");
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::parse_datetime;

    fn mixed_table() -> Table {
        Table::new(vec![
            Column::new("n", ColumnData::Number(vec![Some(1.5), None, Some(f64::INFINITY)])),
            Column::new("t", ColumnData::Text(vec![Some("a".into()), Some("".into()), None])),
            Column::new(
                "c",
                ColumnData::Category(vec![Some("x".into()), Some("y".into()), Some("x".into())]),
            ),
            Column::new(
                "d",
                ColumnData::DateTime(vec![
                    parse_datetime("2024-01-06"),
                    None,
                    parse_datetime("2024-02-29 12:30:15.25"),
                ]),
            ),
            Column::new("b", ColumnData::Boolean(vec![Some(true), Some(false), None])),
        ])
        .unwrap()
    }

    #[test]
    fn test_parquet_round_trip_preserves_kinds() {
        let t = mixed_table();
        let bytes = write_parquet(&t).unwrap();
        let back = read_parquet(&bytes).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_parquet_empty_rows() {
        let t = Table::new(vec![Column::new("n", ColumnData::Number(vec![]))]).unwrap();
        let back = read_parquet(&write_parquet(&t).unwrap()).unwrap();
        assert_eq!(back.shape(), (0, 1));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(
            read_parquet(b"definitely not parquet"),
            Err(LoadError::Parse(_))
        ));
    }
}
