//! JSON-to-Arrow conversion and table reshaping

use crate::error::{Error, Result};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, NullArray, StringArray};
use arrow::compute;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// The canonical empty table: zero columns, zero rows
///
/// Used wherever an ambiguous empty or partial result must be normalized to
/// a single well-known value.
pub fn empty_table() -> RecordBatch {
    RecordBatch::new_empty(Arc::new(Schema::empty()))
}

/// Convert JSON row objects to a `RecordBatch`
///
/// `columns` fixes the output column order (SQL results are ordered; type
/// inference alone would lose that). Each column's type is inferred across
/// all rows with merge rules: null merges with anything, mixed integers and
/// floats widen to Float64, any other mismatch falls back to Utf8.
pub fn records_to_table(records: &[Value], columns: &[String]) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());

    for name in columns {
        let values: Vec<Option<&Value>> = records
            .iter()
            .map(|record| {
                if let Value::Object(obj) = record {
                    obj.get(name)
                } else {
                    None
                }
            })
            .collect();

        let data_type = infer_column_type(&values);
        let array = build_array(&values, &data_type)?;
        fields.push(Field::new(name, data_type, true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    if records.is_empty() {
        return Ok(RecordBatch::new_empty(schema));
    }
    RecordBatch::try_new(schema, arrays)
        .map_err(|e| Error::table(format!("Failed to create RecordBatch: {e}")))
}

/// Concatenate row-compatible batches into one table
///
/// All batches must share the schema of the first.
pub fn concat_tables(batches: &[RecordBatch]) -> Result<RecordBatch> {
    let Some(first) = batches.first() else {
        return Ok(empty_table());
    };
    compute::concat_batches(&first.schema(), batches).map_err(Error::Arrow)
}

/// Apply a per-column type-cast mapping
///
/// Columns named in the mapping but absent from the batch are silently
/// skipped. Unmapped columns pass through unchanged.
pub fn cast_columns(
    batch: &RecordBatch,
    mapping: &HashMap<String, DataType>,
) -> Result<RecordBatch> {
    if mapping.is_empty() || batch.num_columns() == 0 {
        return Ok(batch.clone());
    }

    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut arrays = Vec::with_capacity(batch.num_columns());

    for (field, column) in batch.schema().fields().iter().zip(batch.columns()) {
        match mapping.get(field.name()) {
            Some(target) if target != field.data_type() => {
                let cast = compute::cast(column, target)?;
                fields.push(Field::new(field.name(), target.clone(), true));
                arrays.push(cast);
            }
            _ => {
                fields.push(field.as_ref().clone());
                arrays.push(Arc::clone(column));
            }
        }
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .map_err(|e| Error::table(format!("Failed to apply column casts: {e}")))
}

/// Infer a column's Arrow type across all of its values
fn infer_column_type(values: &[Option<&Value>]) -> DataType {
    let mut merged = DataType::Null;
    for value in values.iter().flatten() {
        merged = merge_types(&merged, &infer_type(value));
    }
    merged
}

/// Infer an Arrow type from a single JSON value
fn infer_type(value: &Value) -> DataType {
    match value {
        Value::Null => DataType::Null,
        Value::Bool(_) => DataType::Boolean,
        Value::Number(n) => {
            if n.is_i64() {
                DataType::Int64
            } else {
                DataType::Float64
            }
        }
        // Arrays and objects are stringified; SQL rows are flat
        Value::String(_) | Value::Array(_) | Value::Object(_) => DataType::Utf8,
    }
}

/// Merge two inferred types into a compatible type
fn merge_types(type1: &DataType, type2: &DataType) -> DataType {
    match (type1, type2) {
        (a, b) if a == b => a.clone(),

        // Null can merge with anything
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),

        // Numbers can merge (prefer Float64 for mixed)
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }

        // Different types -> fall back to String (most flexible)
        _ => DataType::Utf8,
    }
}

/// Build an Arrow array from JSON values
fn build_array(values: &[Option<&Value>], data_type: &DataType) -> Result<ArrayRef> {
    match data_type {
        DataType::Null => Ok(Arc::new(NullArray::new(values.len()))),

        DataType::Boolean => {
            let arr: BooleanArray = values.iter().map(|v| v.and_then(Value::as_bool)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Int64 => {
            let arr: Int64Array = values.iter().map(|v| v.and_then(Value::as_i64)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Float64 => {
            #[allow(clippy::cast_precision_loss)]
            let arr: Float64Array = values
                .iter()
                .map(|v| v.and_then(|v| v.as_f64().or_else(|| v.as_i64().map(|i| i as f64))))
                .collect();
            Ok(Arc::new(arr))
        }

        _ => {
            let arr: StringArray = values
                .iter()
                .map(|v| {
                    v.map(|v| match v {
                        Value::String(s) => s.clone(),
                        _ => v.to_string(),
                    })
                })
                .collect();
            Ok(Arc::new(arr))
        }
    }
}
