//! Error types for Granary
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for Granary
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Environment file '{file}' not found")]
    EnvFileNotFound { file: String },

    #[error("Missing required environment variables from {file}: {keys}")]
    MissingEnvKeys { file: String, keys: String },

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    // ============================================================================
    // File System Errors
    // ============================================================================
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Not a directory: {path}")]
    NotADirectory { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Query Execution Errors
    // ============================================================================
    #[error("Query execution exceeded {timeout_secs} seconds")]
    QueryTimeout { timeout_secs: u64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // ============================================================================
    // Table Construction Errors
    // ============================================================================
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("CSV loading error: {message}")]
    CsvLoad { message: String },

    #[error("Table construction failed: {message}")]
    Table { message: String },

    // ============================================================================
    // Internal Invariant Errors
    // ============================================================================
    #[error("Internal error: {message}")]
    Internal { message: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing-environment-keys error
    pub fn missing_env_keys(file: impl Into<String>, keys: impl Into<String>) -> Self {
        Self::MissingEnvKeys {
            file: file.into(),
            keys: keys.into(),
        }
    }

    /// Create an invalid-value error for a typed setter or accessor
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a file-not-found error
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a not-a-directory error
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory { path: path.into() }
    }

    /// Create a CSV loading error
    pub fn csv_load(message: impl Into<String>) -> Self {
        Self::CsvLoad {
            message: message.into(),
        }
    }

    /// Create a table construction error
    pub fn table(message: impl Into<String>) -> Self {
        Self::Table {
            message: message.into(),
        }
    }

    /// Create an internal invariant error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error signals a missing file or directory
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::FileNotFound { .. } | Error::NotADirectory { .. } | Error::EnvFileNotFound { .. }
        )
    }
}

/// Result type alias for Granary
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
