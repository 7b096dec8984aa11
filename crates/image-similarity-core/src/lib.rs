//! Core functionality for finding near-duplicate images and resolving them.
//!
//! This library provides the building blocks of the comparison engine:
//! - Normalization of images into comparison-ready artifacts
//! - Pluggable comparison strategies producing difference scores
//! - Memoization of comparison results in an optional cache
//! - Pairwise comparison of a batch, chunked for large inputs
//! - Resolution of duplicate clusters to one survivor each

// -- External Dependencies --

use log::info;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use comparison::{ComparisonStrategy, FileHashStrategy, Metric, PixelMetricStrategy};
pub use config::*;
pub use deduplication::{
    DriverStats, DuplicateMap, DuplicateResolver, HeaderSizeReader, ImageSizeReader,
    PairwiseComparisonDriver,
};
pub use error::{Error, Result};
pub use persistence::{CacheStore, MemoizedResultStore, MemoryStore, RocksDbStore};
pub use types::*;
pub use workspace::Workspace;

// -- Public Modules --
pub mod comparison;
pub mod config;
pub mod deduplication;
pub mod discovery;
pub mod fingerprint;
pub mod logging;
pub mod normalization;
pub mod persistence;
pub mod types;
pub mod workspace;

/// Main entry point of the comparison engine
pub struct ImageComparer {
    config: Config,
    driver: PairwiseComparisonDriver,
    resolver: DuplicateResolver,
}

impl ImageComparer {
    /// Create a new ImageComparer with the provided configuration
    ///
    /// Fails when the configuration is invalid, the normalization workspace
    /// cannot be written, or the result cache cannot be opened.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let workspace = Workspace::open(
            config.temporary_directory.as_deref(),
            config.temporary_directory_mode,
        )?;
        let store = open_store(&config.cache)?;

        let driver = PairwiseComparisonDriver::new(Arc::new(workspace))
            .with_strategies(config.build_strategies())
            .with_store(store)
            .with_chunk_size(config.chunk_size)
            .with_progress(config.show_progress)
            .with_threads(config.threads)?;

        info!(
            "Image comparer ready: {} strategies, workspace {}",
            driver.strategies().len(),
            driver.workspace().root().display()
        );

        Ok(Self {
            config,
            driver,
            resolver: DuplicateResolver::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn driver(&self) -> &PairwiseComparisonDriver {
        &self.driver
    }

    /// Replace the configured strategies
    pub fn with_strategies(mut self, strategies: Vec<Arc<dyn ComparisonStrategy>>) -> Self {
        self.driver = self.driver.with_strategies(strategies);
        self
    }

    /// Replace the configured result store
    pub fn with_store(mut self, store: Option<Arc<MemoizedResultStore>>) -> Self {
        self.driver = self.driver.with_store(store);
        self
    }

    /// Replace the reader used by the size-based preference policies
    pub fn with_size_reader(mut self, size_reader: Arc<dyn ImageSizeReader>) -> Self {
        self.resolver = DuplicateResolver::new(size_reader);
        self
    }

    /// Every image with at least one within-threshold partner, sorted
    ///
    /// Every pair of the batch is compared; the chunked pass is only used by
    /// [`find_uniques`](Self::find_uniques).
    pub fn find_duplicates(&self, images: &[ImageRef], threshold: f64) -> Result<Vec<ImageRef>> {
        Ok(self.driver.exhaustive_duplicate_map(images, threshold)?.duplicates())
    }

    /// The batch with each duplicate cluster reduced to one survivor, sorted
    ///
    /// Images that do not exist are left out.
    pub fn find_uniques(
        &self,
        images: &[ImageRef],
        threshold: f64,
        policy: PreferencePolicy,
    ) -> Result<Vec<ImageRef>> {
        let admitted = self.driver.admit(images);
        let map = self.driver.duplicate_map(&admitted, threshold)?;
        let uniques = self.resolver.resolve(&admitted, &map, policy);

        info!(
            "Kept {} of {} images ({} had duplicates)",
            uniques.len(),
            admitted.len(),
            map.len()
        );
        Ok(uniques)
    }

    /// Whether two images are within `threshold` of each other
    ///
    /// An image is always similar to itself.
    pub fn are_similar(&self, left: &ImageRef, right: &ImageRef, threshold: f64) -> Result<bool> {
        if ImageRef::resolve(left) == ImageRef::resolve(right) {
            return Ok(true);
        }
        let duplicates = self.find_duplicates(&[left.clone(), right.clone()], threshold)?;
        Ok(duplicates.len() == 2)
    }

    pub fn are_different(&self, left: &ImageRef, right: &ImageRef, threshold: f64) -> Result<bool> {
        Ok(!self.are_similar(left, right, threshold)?)
    }

    /// Remove normalized artifacts older than `older_than` (all when `None`)
    /// and drop every cached comparison result
    ///
    /// Returns the number of artifacts removed.
    pub fn clear_cache(&self, older_than: Option<Duration>) -> Result<usize> {
        let removed = self.driver.workspace().prune(older_than)?;
        if let Some(store) = self.driver.store() {
            store.clear()?;
        }
        info!("Cleared cache: {} artifacts removed", removed);
        Ok(removed)
    }

    /// Pixel dimensions as seen by the size-based preference policies
    pub fn image_size(&self, path: &Path) -> Option<(u32, u32)> {
        self.resolver.size_reader().dimensions(path)
    }

    pub fn stats(&self) -> DriverStats {
        self.driver.stats()
    }
}

fn open_store(backend: &CacheBackend) -> Result<Option<Arc<MemoizedResultStore>>> {
    let store = match backend {
        CacheBackend::None => None,
        CacheBackend::Memory => Some(MemoizedResultStore::in_memory()),
        CacheBackend::RocksDb { path } => {
            Some(MemoizedResultStore::new(Arc::new(RocksDbStore::open(path)?)))
        }
    };
    Ok(store.map(Arc::new))
}
