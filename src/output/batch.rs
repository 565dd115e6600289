//! Entity results as Arrow record batches
//!
//! Every field becomes a nullable Utf8 column; absent values are nulls.

use crate::error::{Error, Result};
use crate::results::EntityResult;
use crate::types::Row;
use arrow::array::{Array, ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Arrow schema of an entity result
pub fn result_schema(result: &EntityResult) -> Schema {
    Schema::new(
        result
            .headers()
            .iter()
            .map(|h| Field::new(h, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    )
}

/// Convert the rows of an entity result into a record batch
pub fn to_record_batch(result: &EntityResult) -> Result<RecordBatch> {
    let schema = Arc::new(result_schema(result));

    let columns: Vec<ArrayRef> = (0..result.headers().len())
        .map(|i| {
            let array: StringArray = result
                .rows()
                .iter()
                .map(|row| row.get(i).and_then(Option::as_deref))
                .collect();
            Arc::new(array) as ArrayRef
        })
        .collect();

    if columns.is_empty() {
        return Ok(RecordBatch::new_empty(schema));
    }
    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Read the rows back out of a batch of Utf8 columns
pub fn batch_to_rows(batch: &RecordBatch) -> Result<Vec<Row>> {
    let columns = batch
        .columns()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            column
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| {
                    Error::output(format!(
                        "Column '{}' is {}, expected Utf8",
                        batch.schema().field(i).name(),
                        column.data_type()
                    ))
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((0..batch.num_rows())
        .map(|row| {
            columns
                .iter()
                .map(|c| (!c.is_null(row)).then(|| c.value(row).to_string()))
                .collect()
        })
        .collect())
}
