//! Pooled SQL query facade
//!
//! Wraps a lazily built Postgres connection pool and memoizes whole query
//! results. The pool is never built at construction time; it materializes on
//! the first query and is dropped (not closed) whenever a timeout setter or
//! a cache sweep invalidates it, to be rebuilt lazily on next access.

use super::rows::rows_to_table;
use crate::cache::{CacheSet, Invalidate, MemoCell, MemoMap};
use crate::config::DatabaseSettings;
use crate::error::{Error, Result};
use crate::table::RecordBatch;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// Base pool size, mirroring the wrapped driver's default
const POOL_SIZE: u32 = 5;
/// Bounded overflow beyond the base pool size
const MAX_OVERFLOW: u32 = 20;
/// Idle connections are recycled after this many seconds
const POOL_RECYCLE_SECS: u64 = 3600;

/// Construction arguments for the database facade
///
/// Only the first construction call's options take effect; see
/// [`crate::registry::database`].
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    /// Query execution timeout in seconds
    pub timeout_secs: u64,
    /// Login (connection acquire) timeout in seconds
    pub login_timeout_secs: u64,
    /// Env file name or path holding connection settings
    pub env_file: String,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            login_timeout_secs: 30,
            env_file: "db.env".to_string(),
        }
    }
}

/// Per-call query options; part of the memoization key
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryOptions {
    /// Truncate the result to at most this many rows
    pub max_rows: Option<usize>,
}

type QueryKey = (String, QueryOptions);

/// Cache-backed facade over a pooled Postgres connection
pub struct DatabaseEngine {
    settings: DatabaseSettings,
    timeout: RwLock<Duration>,
    login_timeout: RwLock<Duration>,
    pool: Mutex<Option<PgPool>>,
    connection_string: Arc<MemoCell<String>>,
    query_cache: Arc<MemoMap<QueryKey, RecordBatch>>,
    file_cache: Arc<MemoMap<QueryKey, RecordBatch>>,
    caches: CacheSet,
}

impl DatabaseEngine {
    /// Build the facade: discovers the env file and validates the query
    /// directory, but opens no connection
    pub fn new(options: DatabaseOptions) -> Result<Self> {
        if options.timeout_secs == 0 {
            return Err(Error::invalid_value("timeout", "must be greater than zero"));
        }
        if options.login_timeout_secs == 0 {
            return Err(Error::invalid_value(
                "login_timeout",
                "must be greater than zero",
            ));
        }

        let settings = DatabaseSettings::load(&options.env_file)?;

        let connection_string = Arc::new(MemoCell::new());
        let query_cache = Arc::new(MemoMap::new());
        let file_cache = Arc::new(MemoMap::new());
        let caches = CacheSet::new(vec![
            Arc::clone(&connection_string) as Arc<dyn Invalidate + Send + Sync>,
            Arc::clone(&query_cache) as Arc<dyn Invalidate + Send + Sync>,
            Arc::clone(&file_cache) as Arc<dyn Invalidate + Send + Sync>,
        ]);

        Ok(Self {
            settings,
            timeout: RwLock::new(Duration::from_secs(options.timeout_secs)),
            login_timeout: RwLock::new(Duration::from_secs(options.login_timeout_secs)),
            pool: Mutex::new(None),
            connection_string,
            query_cache,
            file_cache,
            caches,
        })
    }

    /// Query execution timeout in seconds
    pub fn timeout(&self) -> u64 {
        self.timeout
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_secs()
    }

    /// Set the query execution timeout and drop the held pool
    ///
    /// The value is validated before any state changes. In-flight queries
    /// keep their pool; the next access builds a fresh one.
    pub fn set_timeout(&self, secs: u64) -> Result<()> {
        if secs == 0 {
            return Err(Error::invalid_value("timeout", "must be greater than zero"));
        }
        *self.timeout.write().unwrap_or_else(PoisonError::into_inner) =
            Duration::from_secs(secs);
        self.drop_pool();
        Ok(())
    }

    /// Login (connection acquire) timeout in seconds
    pub fn login_timeout(&self) -> u64 {
        self.login_timeout
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_secs()
    }

    /// Set the login timeout and drop the held pool
    pub fn set_login_timeout(&self, secs: u64) -> Result<()> {
        if secs == 0 {
            return Err(Error::invalid_value(
                "login_timeout",
                "must be greater than zero",
            ));
        }
        *self
            .login_timeout
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Duration::from_secs(secs);
        self.drop_pool();
        Ok(())
    }

    /// The resolved query directory
    pub fn query_folder(&self) -> &Path {
        self.settings.query_folder()
    }

    /// Connection URL with the password masked, for logging
    pub fn connection_info(&self) -> String {
        self.settings.connection_info()
    }

    /// The assembled connection URL, computed once and cached independently
    /// of the pool
    pub fn connection_string(&self) -> Result<Arc<String>> {
        self.connection_string
            .get_or_try_init(|| self.settings.connection_string())
    }

    /// The shared connection pool, built lazily on first access
    pub fn pool(&self) -> Result<PgPool> {
        let mut slot = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pool) = slot.as_ref() {
            return Ok(pool.clone());
        }
        let pool = self.build_pool()?;
        *slot = Some(pool.clone());
        Ok(pool)
    }

    fn drop_pool(&self) {
        self.pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Build the pool with the fixed pooling policy: pre-ping validation,
    /// hourly recycle, bounded overflow, lazy connect. Each new physical
    /// connection gets the login timeout applied as its statement timeout.
    fn build_pool(&self) -> Result<PgPool> {
        let url = self.connection_string()?;
        let login_timeout = *self
            .login_timeout
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let statement_timeout_ms = login_timeout.as_millis() as u64;

        tracing::debug!(url = %self.settings.connection_info(), "building pool");

        let pool = PgPoolOptions::new()
            .min_connections(POOL_SIZE)
            .max_connections(POOL_SIZE + MAX_OVERFLOW)
            .test_before_acquire(true)
            .max_lifetime(Duration::from_secs(POOL_RECYCLE_SECS))
            .acquire_timeout(login_timeout)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    sqlx::query(&format!("SET statement_timeout = {statement_timeout_ms}"))
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect_lazy(url.as_str())?;

        Ok(pool)
    }

    /// Read SQL text from a named file in the query directory
    pub fn load_query(&self, query_filename: &str) -> Result<String> {
        let path = self.settings.query_folder().join(query_filename);
        if !path.is_file() {
            tracing::error!(
                file = query_filename,
                folder = %self.settings.query_folder().display(),
                "query file not found"
            );
            return Err(Error::file_not_found(path.display().to_string()));
        }
        Ok(std::fs::read_to_string(&path)?)
    }

    /// Execute SQL text and return the result table
    ///
    /// Memoized on `(query, options)`: a repeated identical call returns the
    /// same `Arc` until the caches are cleared. Execution is bounded by the
    /// configured timeout; on expiry the in-flight work is dropped and
    /// [`Error::QueryTimeout`] is returned.
    pub async fn execute_query(
        &self,
        query: &str,
        options: QueryOptions,
    ) -> Result<Arc<RecordBatch>> {
        let key = (query.to_string(), options.clone());
        if let Some(hit) = self.query_cache.get(&key) {
            tracing::debug!("query cache hit");
            return Ok(hit);
        }

        let table = Arc::new(self.run_query(query, &options).await?);
        self.query_cache.insert(key, Arc::clone(&table));
        Ok(table)
    }

    /// Load a named query file and execute it
    ///
    /// Memoized on `(filename, options)` independently of the text-keyed
    /// cache, so a file-based call and a text-based call hold two distinct
    /// cache entries for the same logical query.
    pub async fn execute_query_from_file(
        &self,
        query_filename: &str,
        options: QueryOptions,
    ) -> Result<Arc<RecordBatch>> {
        let key = (query_filename.to_string(), options.clone());
        if let Some(hit) = self.file_cache.get(&key) {
            tracing::debug!("query file cache hit");
            return Ok(hit);
        }

        let query = self.load_query(query_filename)?;
        let table = self.execute_query(&query, options).await?;
        self.file_cache.insert(key, Arc::clone(&table));
        Ok(table)
    }

    /// Blocking wrapper around [`DatabaseEngine::execute_query`]
    ///
    /// Builds a private runtime and blocks the calling thread until the
    /// query completes or times out. Must not be called from async context.
    pub fn execute_query_blocking(
        &self,
        query: &str,
        options: QueryOptions,
    ) -> Result<Arc<RecordBatch>> {
        block_on(self.execute_query(query, options))
    }

    /// Blocking wrapper around [`DatabaseEngine::execute_query_from_file`]
    pub fn execute_query_from_file_blocking(
        &self,
        query_filename: &str,
        options: QueryOptions,
    ) -> Result<Arc<RecordBatch>> {
        block_on(self.execute_query_from_file(query_filename, options))
    }

    async fn run_query(&self, query: &str, options: &QueryOptions) -> Result<RecordBatch> {
        let pool = self.pool()?;
        let timeout = *self.timeout.read().unwrap_or_else(PoisonError::into_inner);

        tracing::debug!(query, "executing query");

        let rows = tokio::time::timeout(timeout, sqlx::query(query).fetch_all(&pool))
            .await
            .map_err(|_| Error::QueryTimeout {
                timeout_secs: timeout.as_secs(),
            })??;

        let table = rows_to_table(&rows)?;
        let table = match options.max_rows {
            Some(limit) if table.num_rows() > limit => table.slice(0, limit),
            _ => table,
        };
        Ok(table)
    }

    /// Reset every memoized operation and drop derived state
    ///
    /// Sweeps the enumerated cache set (query cache, file cache, computed
    /// connection string) and drops the pool. Settings and timeouts are
    /// preserved; the next call to any memoized operation performs real work
    /// again and produces a new result object.
    pub fn clear_all_caches(&self) {
        self.caches.clear_all();
        self.drop_pool();
    }
}

impl std::fmt::Debug for DatabaseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseEngine")
            .field("connection", &self.settings.connection_info())
            .field("query_folder", &self.settings.query_folder())
            .field("timeout_secs", &self.timeout())
            .field("login_timeout_secs", &self.login_timeout())
            .finish_non_exhaustive()
    }
}

/// Run an async flow to completion on a private current-thread runtime
fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build blocking runtime")
        .block_on(future)
}
