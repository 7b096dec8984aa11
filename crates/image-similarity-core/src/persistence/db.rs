use log::info;
use rocksdb::{Direction, IteratorMode, Options as rdbOptions, WriteBatch, DB};
use std::path::{Path, PathBuf};

use super::CacheStore;
use crate::error::{Error, Result};

/// Prefix of every comparison-result key
const KEY_PREFIX: &[u8] = b"cmp:";

/// Durable store backed by RocksDB
pub struct RocksDbStore {
    db: DB,
    path: PathBuf,
}

impl RocksDbStore {
    /// Open (creating if missing) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut options = rdbOptions::default();
        options.create_if_missing(true);
        options.increase_parallelism(num_cpus::get() as i32);
        options.set_max_background_jobs(4);

        let db = DB::open(&options, &path)?;

        info!(
            "RocksDB result cache initialized successfully at {}",
            path.display()
        );

        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn prefixed(key: &str) -> Vec<u8> {
        [KEY_PREFIX, key.as_bytes()].concat()
    }
}

impl CacheStore for RocksDbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(Self::prefixed(key))?)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let key = Self::prefixed(key);
        // First writer wins; entries are immutable once written
        if self.db.get(&key)?.is_some() {
            return Ok(());
        }
        self.db.put(key, value)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut batch = WriteBatch::default();
        for item in self
            .db
            .iterator(IteratorMode::From(KEY_PREFIX, Direction::Forward))
        {
            let (key, _) = item?;
            if !key.starts_with(KEY_PREFIX) {
                break;
            }
            batch.delete(key);
        }
        self.db
            .write(batch)
            .map_err(|e| Error::Cache(format!("Failed to clear result cache: {}", e)))
    }
}
