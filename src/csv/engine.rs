//! CSV directory facade

use crate::cache::{CacheSet, Invalidate, MemoCell, MemoMap};
use crate::error::{Error, Result};
use crate::table::{cast_columns, concat_tables, empty_table, DataType, RecordBatch};
use arrow::datatypes::{Field, Schema};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Construction arguments for the CSV facade
///
/// Only the first construction call's options take effect; see
/// [`crate::registry::csv`].
#[derive(Debug, Clone, Default)]
pub struct CsvOptions {
    /// Directory whose `*.csv` files are loaded as one table
    pub path: PathBuf,
    /// Optional per-column type-cast mapping applied after loading
    pub column_types: Option<HashMap<String, DataType>>,
}

/// Cache-backed facade over a directory of CSV files
///
/// Every file is read with an all-string schema derived from its header,
/// the files are concatenated into one table, and the optional column
/// mapping is applied. Results are memoized; configuration changes require
/// an explicit [`CsvEngine::clear_all_caches`].
pub struct CsvEngine {
    path: RwLock<PathBuf>,
    column_types: Option<HashMap<String, DataType>>,
    table_cache: Arc<MemoCell<RecordBatch>>,
    file_cache: Arc<MemoMap<String, RecordBatch>>,
    caches: CacheSet,
}

impl CsvEngine {
    /// Build the facade; no file is touched until the first read
    pub fn new(options: CsvOptions) -> Result<Self> {
        let table_cache = Arc::new(MemoCell::new());
        let file_cache = Arc::new(MemoMap::new());
        let caches = CacheSet::new(vec![
            Arc::clone(&table_cache) as Arc<dyn Invalidate + Send + Sync>,
            Arc::clone(&file_cache) as Arc<dyn Invalidate + Send + Sync>,
        ]);

        Ok(Self {
            path: RwLock::new(options.path),
            column_types: options.column_types,
            table_cache,
            file_cache,
            caches,
        })
    }

    /// The configured CSV directory
    pub fn path(&self) -> PathBuf {
        self.path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Point the facade at a different directory
    ///
    /// Rejects an existing non-directory target before mutating. Cached
    /// tables are NOT invalidated here; call
    /// [`CsvEngine::clear_all_caches`] to pick up the new path.
    pub fn set_path(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        if path.exists() && !path.is_dir() {
            return Err(Error::invalid_value(
                "path",
                format!("{} is not a directory", path.display()),
            ));
        }
        *self.path.write().unwrap_or_else(PoisonError::into_inner) = path;
        Ok(())
    }

    /// The configured column-type mapping
    pub fn column_types(&self) -> Option<&HashMap<String, DataType>> {
        self.column_types.as_ref()
    }

    /// The combined table for the whole directory
    ///
    /// Memoized as a single entry: repeated calls return the same `Arc`
    /// until the caches are cleared. An empty path yields the canonical
    /// empty table; a nonexistent path is a not-found error.
    pub fn table(&self) -> Result<Arc<RecordBatch>> {
        self.table_cache.get_or_try_init(|| self.load_directory())
    }

    /// The table for one named file in the directory, memoized per name
    pub fn file_table(&self, file_name: &str) -> Result<Arc<RecordBatch>> {
        let key = file_name.to_string();
        if let Some(hit) = self.file_cache.get(&key) {
            return Ok(hit);
        }

        let path = self.path().join(file_name);
        if !path.is_file() {
            return Err(Error::file_not_found(path.display().to_string()));
        }

        let table = Arc::new(self.finalize(read_csv_file(&path)?.unwrap_or_else(empty_table))?);
        self.file_cache.insert(key, Arc::clone(&table));
        Ok(table)
    }

    /// Reset every memoized operation
    ///
    /// Sweeps the enumerated cache set; path and column mapping are
    /// preserved. The next read performs real work again and produces a new
    /// result object.
    pub fn clear_all_caches(&self) {
        self.caches.clear_all();
    }

    fn load_directory(&self) -> Result<RecordBatch> {
        let path = self.path();
        if path.as_os_str().is_empty() {
            return Ok(empty_table());
        }
        if !path.exists() {
            tracing::warn!(path = %path.display(), "csv directory does not exist");
            return Err(Error::file_not_found(path.display().to_string()));
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&path)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        files.sort();

        let mut batches = Vec::new();
        let mut header: Option<Vec<String>> = None;
        for file in &files {
            let Some(batch) = read_csv_file(file)? else {
                continue;
            };
            let names: Vec<String> = batch
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().clone())
                .collect();
            match &header {
                None => header = Some(names),
                Some(expected) if *expected != names => {
                    return Err(Error::csv_load(format!(
                        "header of {} does not match the other files in {}",
                        file.display(),
                        path.display()
                    )));
                }
                _ => {}
            }
            batches.push(batch);
        }

        tracing::debug!(files = files.len(), path = %path.display(), "loaded csv directory");
        self.finalize(concat_tables(&batches)?)
    }

    /// Apply the column mapping and normalize empty results
    fn finalize(&self, table: RecordBatch) -> Result<RecordBatch> {
        let table = match &self.column_types {
            Some(mapping) => cast_columns(&table, mapping)?,
            None => table,
        };
        if table.num_rows() == 0 {
            return Ok(empty_table());
        }
        Ok(table)
    }
}

impl std::fmt::Debug for CsvEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvEngine")
            .field("path", &self.path())
            .field("column_types", &self.column_types)
            .finish_non_exhaustive()
    }
}

/// Read one CSV file with an all-string schema derived from its header
///
/// Returns `None` for a file with no parseable header (e.g. zero bytes).
fn read_csv_file(path: &Path) -> Result<Option<RecordBatch>> {
    let format = arrow::csv::reader::Format::default().with_header(true);

    let probe = File::open(path)?;
    let inferred = match format.infer_schema(probe, Some(1)) {
        Ok((schema, _)) => schema,
        Err(_) => return Ok(None),
    };
    if inferred.fields().is_empty() {
        return Ok(None);
    }

    // Schema inference is disabled: every column reads as a string, and any
    // typing comes from the explicit column mapping afterwards.
    let schema = Arc::new(Schema::new(
        inferred
            .fields()
            .iter()
            .map(|f| Field::new(f.name(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));

    let file = File::open(path)?;
    let reader = arrow::csv::ReaderBuilder::new(Arc::clone(&schema))
        .with_header(true)
        .build(file)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

    if batches.is_empty() {
        return Ok(Some(RecordBatch::new_empty(schema)));
    }
    Ok(Some(concat_tables(&batches)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, StringArray};
    use std::fs;

    fn csv_dir(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        dir
    }

    #[test]
    fn test_empty_path_returns_empty_table() {
        let engine = CsvEngine::new(CsvOptions::default()).unwrap();
        let table = engine.table().unwrap();
        assert_eq!(table.num_rows(), 0);
        assert_eq!(table.num_columns(), 0);
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let engine = CsvEngine::new(CsvOptions {
            path: PathBuf::from("/nonexistent/csv/dir"),
            column_types: None,
        })
        .unwrap();
        let err = engine.table().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_loads_and_concatenates_directory() {
        let dir = csv_dir(&[
            ("a.csv", "Price,Name\n1.5,apple\n"),
            ("b.csv", "Price,Name\n2.5,pear\n3.5,plum\n"),
            ("notes.txt", "ignored\n"),
        ]);
        let engine = CsvEngine::new(CsvOptions {
            path: dir.path().to_path_buf(),
            column_types: None,
        })
        .unwrap();

        let table = engine.table().unwrap();
        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.num_columns(), 2);
        // Schema inference disabled: everything is a string
        assert_eq!(table.schema().field(0).data_type(), &DataType::Utf8);
    }

    #[test]
    fn test_column_mapping_casts_present_and_skips_absent() {
        let dir = csv_dir(&[("a.csv", "Price,Name\n1.5,apple\n")]);
        let engine = CsvEngine::new(CsvOptions {
            path: dir.path().to_path_buf(),
            column_types: Some(HashMap::from([
                ("Price".to_string(), DataType::Float64),
                ("Volume".to_string(), DataType::Int64),
            ])),
        })
        .unwrap();

        let table = engine.table().unwrap();
        assert_eq!(table.schema().field(0).data_type(), &DataType::Float64);
        let prices = table
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(prices.value(0), 1.5);

        let names = table
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(names.value(0), "apple");
    }

    #[test]
    fn test_header_only_file_normalizes_to_empty_table() {
        let dir = csv_dir(&[("a.csv", "Price,Name\n")]);
        let engine = CsvEngine::new(CsvOptions {
            path: dir.path().to_path_buf(),
            column_types: None,
        })
        .unwrap();

        let table = engine.table().unwrap();
        assert_eq!(table.num_columns(), 0);
        assert_eq!(table.num_rows(), 0);
    }

    #[test]
    fn test_header_mismatch_is_an_error() {
        let dir = csv_dir(&[
            ("a.csv", "Price,Name\n1.5,apple\n"),
            ("b.csv", "Other\nx\n"),
        ]);
        let engine = CsvEngine::new(CsvOptions {
            path: dir.path().to_path_buf(),
            column_types: None,
        })
        .unwrap();

        let err = engine.table().unwrap_err();
        assert!(matches!(err, Error::CsvLoad { .. }));
    }

    #[test]
    fn test_table_is_memoized_and_cleared() {
        let dir = csv_dir(&[("a.csv", "v\n1\n")]);
        let engine = CsvEngine::new(CsvOptions {
            path: dir.path().to_path_buf(),
            column_types: None,
        })
        .unwrap();

        let first = engine.table().unwrap();
        let second = engine.table().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        engine.clear_all_caches();
        let third = engine.table().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        // Configuration survives the sweep
        assert_eq!(engine.path(), dir.path());
    }

    #[test]
    fn test_file_table_memoized_per_name() {
        let dir = csv_dir(&[("prices.csv", "v\n1\n"), ("expiry.csv", "v\n2\n3\n")]);
        let engine = CsvEngine::new(CsvOptions {
            path: dir.path().to_path_buf(),
            column_types: None,
        })
        .unwrap();

        let prices_a = engine.file_table("prices.csv").unwrap();
        let prices_b = engine.file_table("prices.csv").unwrap();
        let expiry = engine.file_table("expiry.csv").unwrap();

        assert!(Arc::ptr_eq(&prices_a, &prices_b));
        assert!(!Arc::ptr_eq(&prices_a, &expiry));
        assert_eq!(prices_a.num_rows(), 1);
        assert_eq!(expiry.num_rows(), 2);

        let err = engine.file_table("missing.csv").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_set_path_rejects_file_target_before_mutating() {
        let dir = csv_dir(&[("a.csv", "v\n1\n")]);
        let engine = CsvEngine::new(CsvOptions {
            path: dir.path().to_path_buf(),
            column_types: None,
        })
        .unwrap();

        let err = engine.set_path(dir.path().join("a.csv")).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
        assert_eq!(engine.path(), dir.path());

        // A nonexistent directory is accepted; existence is checked at load
        engine.set_path(dir.path().join("later")).unwrap();
        assert_eq!(engine.path(), dir.path().join("later"));
    }

    #[test]
    fn test_set_path_does_not_invalidate_caches() {
        let dir = csv_dir(&[("a.csv", "v\n1\n")]);
        let other = csv_dir(&[("b.csv", "v\n2\n2\n")]);
        let engine = CsvEngine::new(CsvOptions {
            path: dir.path().to_path_buf(),
            column_types: None,
        })
        .unwrap();

        let stale = engine.table().unwrap();
        engine.set_path(other.path()).unwrap();

        // Still the memoized table from the old path
        let cached = engine.table().unwrap();
        assert!(Arc::ptr_eq(&stale, &cached));

        // Explicit invalidation picks up the new path
        engine.clear_all_caches();
        let fresh = engine.table().unwrap();
        assert_eq!(fresh.num_rows(), 2);
    }
}
