//! Database facade
//!
//! A cache-backed facade over a pooled Postgres connection: SQL text is
//! loaded from a configured query directory and executed with a bounded
//! timeout, and whole results are memoized per call arguments.

mod engine;
mod rows;

pub use engine::{DatabaseEngine, DatabaseOptions, QueryOptions};
pub use rows::rows_to_table;
