//! Postgres row decoding
//!
//! Query results come back as dynamically typed rows; each value is decoded
//! by its Postgres type name into a JSON intermediate, and the whole result
//! set is assembled into a `RecordBatch` preserving the result's column
//! order.

use crate::error::Result;
use crate::table::{empty_table, records_to_table, RecordBatch};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};

/// Convert a fetched result set into a table
pub fn rows_to_table(rows: &[PgRow]) -> Result<RecordBatch> {
    let Some(first) = rows.first() else {
        return Ok(empty_table());
    };

    let columns: Vec<String> = first
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();

    let records: Vec<Value> = rows
        .iter()
        .map(row_to_record)
        .collect::<Result<Vec<_>>>()?;

    records_to_table(&records, &columns)
}

/// Decode one row into a JSON object
fn row_to_record(row: &PgRow) -> Result<Value> {
    let mut record = Map::new();
    for column in row.columns() {
        let value = decode_value(row, column.ordinal(), column.type_info().name())?;
        record.insert(column.name().to_string(), value);
    }
    Ok(Value::Object(record))
}

/// Decode a single column value by its Postgres type name
fn decode_value(row: &PgRow, idx: usize, type_name: &str) -> Result<Value> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(Value::Bool),

        "INT2" => row
            .try_get::<Option<i16>, _>(idx)?
            .map(|v| Value::Number(v.into())),
        "INT4" => row
            .try_get::<Option<i32>, _>(idx)?
            .map(|v| Value::Number(v.into())),
        "INT8" => row
            .try_get::<Option<i64>, _>(idx)?
            .map(|v| Value::Number(v.into())),

        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)?
            .and_then(|v| serde_json::Number::from_f64(f64::from(v)))
            .map(Value::Number),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(idx)?
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),

        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(idx)?.map(Value::String)
        }

        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)?
            .map(|v| Value::String(v.format("%Y-%m-%dT%H:%M:%S%.6f").to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)?
            .map(|v| Value::String(v.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string())),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)?
            .map(|v| Value::String(v.format("%Y-%m-%d").to_string())),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(idx)?
            .map(|v| Value::String(v.format("%H:%M:%S%.6f").to_string())),

        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(idx)?
            .map(|v| Value::String(v.to_string())),

        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx)?,

        other => {
            // Unknown type: try a text decode, otherwise surface null
            match row.try_get::<Option<String>, _>(idx) {
                Ok(v) => v.map(Value::String),
                Err(_) => {
                    tracing::debug!(type_name = other, "undecodable column type, using null");
                    None
                }
            }
        }
    };

    Ok(value.unwrap_or(Value::Null))
}
