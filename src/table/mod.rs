//! Tabular results
//!
//! Every facade operation returns an immutable Arrow [`RecordBatch`]
//! (re-exported here as the crate's table type). This module provides:
//! - the canonical empty table used to normalize ambiguous empty results
//! - conversion of JSON row objects into a `RecordBatch` with an explicit
//!   column order and per-column type inference
//! - concatenation and per-column type casting

mod convert;

pub use convert::{cast_columns, concat_tables, empty_table, records_to_table};

pub use arrow::datatypes::DataType;
pub use arrow::record_batch::RecordBatch;
