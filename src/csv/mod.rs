//! CSV facade
//!
//! A cache-backed facade over a directory of CSV files: every `*.csv` file
//! is loaded with an all-string schema and concatenated into one table, with
//! an optional per-column type-cast mapping applied afterwards.

mod engine;

pub use engine::{CsvEngine, CsvOptions};
