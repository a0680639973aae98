//! Groups rows by schema and builds Arrow record batches.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray,
    TimestampMicrosecondArray,
};
use arrow::error::ArrowError;

use crate::extract::{Cell, FlatRow, SchemaName};
use crate::schema::{ColumnDef, ColumnType, TableSchema};

/// Group rows by their schema tag, keeping input order within each group.
pub fn route(rows: impl IntoIterator<Item = FlatRow>) -> BTreeMap<SchemaName, Vec<FlatRow>> {
    let mut routed: BTreeMap<SchemaName, Vec<FlatRow>> = BTreeMap::new();
    for row in rows {
        routed.entry(row.schema).or_default().push(row);
    }
    routed
}

/// A record batch plus the cells that did not fit their column type.
#[derive(Debug)]
pub struct Projected {
    pub batch: RecordBatch,
    /// (row index, column) of every value replaced by null.
    pub unfit: Vec<(usize, &'static str)>,
}

/// Project `rows` onto `table` and build a record batch.
///
/// Output columns follow the table order regardless of row insertion order.
/// Columns a row does not carry are null; columns the table does not declare
/// are dropped.
pub fn to_record_batch(table: &TableSchema, rows: &[FlatRow]) -> Result<Projected, ArrowError> {
    let mut unfit = Vec::new();
    let arrays: Vec<ArrayRef> = table
        .columns
        .iter()
        .map(|column| build_column(column, rows, &mut unfit))
        .collect();

    let batch = RecordBatch::try_new(table.to_arrow(), arrays)?;
    Ok(Projected { batch, unfit })
}

fn build_column(
    column: &ColumnDef,
    rows: &[FlatRow],
    unfit: &mut Vec<(usize, &'static str)>,
) -> ArrayRef {
    let cells = rows.iter().enumerate().map(|(index, row)| {
        match row.cell_or_null(column.name).fit(column.ty) {
            Some(cell) => cell,
            None => {
                unfit.push((index, column.name));
                Cell::Null
            }
        }
    });

    match column.ty {
        ColumnType::Utf8 => Arc::new(
            cells
                .map(|cell| match cell {
                    Cell::Text(s) => Some(s),
                    _ => None,
                })
                .collect::<StringArray>(),
        ),
        ColumnType::Json => Arc::new(
            cells
                .map(|cell| match cell {
                    Cell::Json(value) => Some(value.to_string()),
                    _ => None,
                })
                .collect::<StringArray>(),
        ),
        ColumnType::Int64 => Arc::new(
            cells
                .map(|cell| match cell {
                    Cell::Int(i) => Some(i),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        ColumnType::Float64 => Arc::new(
            cells
                .map(|cell| match cell {
                    Cell::Float(f) => Some(f),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        ColumnType::Boolean => Arc::new(
            cells
                .map(|cell| match cell {
                    Cell::Bool(b) => Some(b),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        ColumnType::Timestamp => Arc::new(
            cells
                .map(|cell| match cell {
                    Cell::Timestamp(ts) => Some(ts.timestamp_micros()),
                    _ => None,
                })
                .collect::<TimestampMicrosecondArray>()
                .with_timezone("UTC"),
        ),
    }
}
