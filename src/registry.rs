//! Process-wide singleton registry
//!
//! Each facade type has exactly one live instance per process, built lazily
//! and thread-safely on first access. Construction arguments supplied by any
//! caller after the first are silently ignored — this is documented, exact
//! behavior, preserved from the facades this crate models.

use crate::csv::{CsvEngine, CsvOptions};
use crate::database::{DatabaseEngine, DatabaseOptions};
use crate::error::Result;
use std::sync::{Arc, Mutex, PoisonError};

/// A lazily built, process-wide slot for one facade instance
///
/// The slot mutex is held across construction, so under concurrent first
/// access exactly one initializer runs; every other caller blocks until it
/// completes, then receives the same `Arc`.
pub struct Singleton<T> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> Singleton<T> {
    /// Create an empty slot
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Return the shared instance, building it with `init` on first access
    ///
    /// If the slot is already occupied, `init` is never run and its
    /// arguments are discarded. If `init` fails, the slot stays empty and a
    /// later call may retry with fresh arguments.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(instance) = slot.as_ref() {
            return Ok(Arc::clone(instance));
        }
        let instance = Arc::new(init()?);
        *slot = Some(Arc::clone(&instance));
        Ok(instance)
    }

    /// Return the shared instance if it has been built
    pub fn get(&self) -> Option<Arc<T>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop the held instance so the next access rebuilds it
    ///
    /// Intended for test isolation. Callers holding an `Arc` from an earlier
    /// access keep their (now detached) instance.
    pub fn reset(&self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl<T> Default for Singleton<T> {
    fn default() -> Self {
        Self::new()
    }
}

static DATABASE: Singleton<DatabaseEngine> = Singleton::new();
static CSV: Singleton<CsvEngine> = Singleton::new();

/// The process-wide database facade
///
/// The first call builds the instance from `options`; later calls return the
/// existing instance and ignore their `options` entirely.
pub fn database(options: DatabaseOptions) -> Result<Arc<DatabaseEngine>> {
    DATABASE.get_or_try_init(|| DatabaseEngine::new(options))
}

/// The process-wide CSV facade
///
/// The first call builds the instance from `options`; later calls return the
/// existing instance and ignore their `options` entirely.
pub fn csv(options: CsvOptions) -> Result<Arc<CsvEngine>> {
    CSV.get_or_try_init(|| CsvEngine::new(options))
}

/// Drop both process-wide facade instances
///
/// Test support: the next `database`/`csv` call rebuilds from its own
/// options.
pub fn reset_all() {
    DATABASE.reset();
    CSV.reset();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_singleton_builds_once() {
        let singleton: Singleton<u32> = Singleton::new();
        let calls = AtomicUsize::new(0);

        let first = singleton
            .get_or_try_init(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .unwrap();
        let second = singleton
            .get_or_try_init(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(2)
            })
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, 1); // second call's arguments were ignored
    }

    #[test]
    fn test_singleton_failed_init_retries() {
        let singleton: Singleton<u32> = Singleton::new();

        let failed = singleton.get_or_try_init(|| Err(crate::Error::config("nope")));
        assert!(failed.is_err());
        assert!(singleton.get().is_none());

        let ok = singleton.get_or_try_init(|| Ok(9)).unwrap();
        assert_eq!(*ok, 9);
    }

    #[test]
    fn test_singleton_identity_across_threads() {
        static SHARED: Singleton<String> = Singleton::new();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                std::thread::spawn(move || {
                    SHARED
                        .get_or_try_init(|| Ok(format!("built-by-{i}")))
                        .unwrap()
                })
            })
            .collect();

        let instances: Vec<Arc<String>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        for instance in &instances[1..] {
            assert!(Arc::ptr_eq(&instances[0], instance));
        }
    }

    #[test]
    fn test_singleton_reset() {
        let singleton: Singleton<u32> = Singleton::new();

        let first = singleton.get_or_try_init(|| Ok(1)).unwrap();
        singleton.reset();
        let second = singleton.get_or_try_init(|| Ok(2)).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(*second, 2);
    }
}
