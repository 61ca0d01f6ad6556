//! # Granary
//!
//! Cache-backed tabular data-access facades for SQL databases and CSV
//! directories. Both facades are process-wide singletons with memoized read
//! operations returning Arrow `RecordBatch` tables.
//!
//! ## Features
//!
//! - **Database facade**: lazily built, pooled Postgres connection; SQL text
//!   loaded from a configured query directory; async execution with a
//!   bounded timeout; whole-result memoization keyed by call arguments
//! - **CSV facade**: a directory of `*.csv` files loaded as one all-string
//!   table with an optional per-column type-cast mapping
//! - **Explicit caching**: memoized results have reference identity
//!   (repeated identical calls return the same `Arc`); invalidation is a
//!   single sweep over an enumerated set of memo stores
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use granary::{database, DatabaseOptions, QueryOptions, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // First call builds the singleton from db.env; later calls ignore
//!     // their options and return the same instance.
//!     let db = database(DatabaseOptions::default())?;
//!
//!     let table = db
//!         .execute_query_from_file("daily_prices.sql", QueryOptions::default())
//!         .await?;
//!     println!("{} rows", table.num_rows());
//!
//!     // Same arguments, same Arc — no second round trip.
//!     let again = db
//!         .execute_query_from_file("daily_prices.sql", QueryOptions::default())
//!         .await?;
//!     assert!(std::sync::Arc::ptr_eq(&table, &again));
//!
//!     db.clear_all_caches();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    Singleton Registry                    │
//! │        database(opts) / csv(opts) → shared Arc           │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │
//! ┌──────────────────┬─────────┴────────┬────────────────────┐
//! │  DatabaseEngine  │    CsvEngine     │     CacheSet       │
//! ├──────────────────┼──────────────────┼────────────────────┤
//! │ lazy pool        │ directory load   │ MemoCell / MemoMap │
//! │ query files      │ all-string read  │ Arc identity       │
//! │ timeout + cancel │ column casts     │ enumerated sweep   │
//! └──────────────────┴──────────────────┴────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(missing_docs)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the crate
pub mod error;

/// Memoization stores and cache invalidation
pub mod cache;

/// Environment-file configuration
pub mod config;

/// Tabular results and Arrow helpers
pub mod table;

/// Database facade (pooled Postgres, query files, timeouts)
pub mod database;

/// CSV directory facade
pub mod csv;

/// Process-wide singleton registry
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};

pub use csv::{CsvEngine, CsvOptions};
pub use database::{DatabaseEngine, DatabaseOptions, QueryOptions};
pub use registry::{csv, database, reset_all};
pub use table::{DataType, RecordBatch};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
