//! Content-addressed memoization of comparison results.
//!
//! [`CacheStore`] is the raw key/value backend; [`MemoizedResultStore`] sits on
//! top of it, encodes values with `bincode`, and serializes computation per
//! key so each distinct key is computed at most once even when pairs are
//! evaluated on several threads.

mod db;
mod memory;

pub use db::RocksDbStore;
pub use memory::MemoryStore;

use bincode::{Decode, Encode};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Error, Result};
use crate::logging::log_cache_error;

/// Abstract byte-oriented key/value store
///
/// `put` must be first-writer-wins: a value written for a key is never
/// replaced by a later `put` for the same key.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Drop every entry
    fn clear(&self) -> Result<()>;
}

/// Outcome of [`MemoizedResultStore::get_or_compute`]
#[derive(Debug)]
pub struct Memoized<T> {
    pub value: T,

    /// Whether the value came from the store
    pub hit: bool,

    /// Set when the value was computed but could not be persisted
    pub persist_error: Option<Error>,
}

/// Typed, at-most-once memoization over a [`CacheStore`]
pub struct MemoizedResultStore {
    backend: Arc<dyn CacheStore>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MemoizedResultStore {
    pub fn new(backend: Arc<dyn CacheStore>) -> Self {
        Self {
            backend,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// In-process store, useful for tests and one-shot runs
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()))
    }

    /// Look up a value; `None` on miss
    ///
    /// An entry that no longer decodes as `T` is reported as a miss.
    pub fn get<T: Decode<()>>(&self, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.backend.get(key)? else {
            return Ok(None);
        };

        match bincode::decode_from_slice::<T, _>(&bytes, bincode::config::standard()) {
            Ok((value, _)) => Ok(Some(value)),
            Err(e) => {
                log_cache_error(key, &e);
                Ok(None)
            }
        }
    }

    /// Store a value, failing with [`Error::CachePersistFailed`]
    pub fn put<T: Encode>(&self, key: &str, value: &T) -> Result<()> {
        let persist_failed = |reason: String| Error::CachePersistFailed {
            key: key.to_string(),
            reason,
        };

        let bytes = bincode::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| persist_failed(e.to_string()))?;
        self.backend
            .put(key, &bytes)
            .map_err(|e| persist_failed(e.to_string()))
    }

    /// Return the stored value for `key`, computing and storing it on a miss
    ///
    /// Concurrent callers with the same key wait for the first one and then
    /// read its result. Errors from `compute` are returned and nothing is
    /// stored. A failed write does not discard the computed value; it is
    /// returned with `persist_error` set.
    pub fn get_or_compute<T, F>(&self, key: &str, compute: F) -> Result<Memoized<T>>
    where
        T: Encode + Decode<()>,
        F: FnOnce() -> Result<T>,
    {
        let lock = self.key_lock(key);
        let outcome = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.lookup_or_compute(key, compute)
        };
        self.release_key_lock(key, lock);
        outcome
    }

    fn lookup_or_compute<T, F>(&self, key: &str, compute: F) -> Result<Memoized<T>>
    where
        T: Encode + Decode<()>,
        F: FnOnce() -> Result<T>,
    {
        // An unreadable backend degrades to live computation
        match self.get(key) {
            Ok(Some(value)) => {
                debug!("Cache hit: {}", key);
                return Ok(Memoized {
                    value,
                    hit: true,
                    persist_error: None,
                });
            }
            Ok(None) => {}
            Err(e) => log_cache_error(key, &e),
        }

        let value = compute()?;
        let persist_error = self.put(key, &value).err();
        if let Some(e) = &persist_error {
            log_cache_error(key, e);
        }

        Ok(Memoized {
            value,
            hit: false,
            persist_error,
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.backend.clear()
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }

    fn release_key_lock(&self, key: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        // Only the map's own handle left: nobody is waiting on this key
        if locks.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(key);
        }
    }
}
