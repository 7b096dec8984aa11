use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::comparison::{ComparisonStrategy, FileHashStrategy, Metric, PixelMetricStrategy};
use crate::error::{Error, Result};
use crate::normalization::{GrayScaleNormalizer, HistogramNormalizer, Normalizer, SquaredSizeNormalizer};
use crate::types::{ComparisonMode, PreferencePolicy};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// One normalizer stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizerConfig {
    /// Resize to `sample_size`×`sample_size`
    SquaredSize { sample_size: u32 },
    GrayScale,
    Histogram,
}

impl NormalizerConfig {
    pub fn build(&self) -> Arc<dyn Normalizer> {
        match self {
            NormalizerConfig::SquaredSize { sample_size } => Arc::new(SquaredSizeNormalizer::new(*sample_size)),
            NormalizerConfig::GrayScale => Arc::new(GrayScaleNormalizer),
            NormalizerConfig::Histogram => Arc::new(HistogramNormalizer),
        }
    }
}

/// One comparison strategy slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyConfig {
    PixelMetric {
        metric: Metric,
        mode: ComparisonMode,
        normalizers: Vec<NormalizerConfig>,
    },
    FileHash { mode: ComparisonMode },
}

impl StrategyConfig {
    /// Instantiate the configured strategy
    pub fn build(&self) -> Arc<dyn ComparisonStrategy> {
        match self {
            StrategyConfig::PixelMetric {
                metric,
                mode,
                normalizers,
            } => Arc::new(
                PixelMetricStrategy::new(*metric)
                    .with_mode(*mode)
                    .with_normalizers(normalizers.iter().map(NormalizerConfig::build).collect()),
            ),
            StrategyConfig::FileHash { mode } => Arc::new(FileHashStrategy::new(*mode)),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::PixelMetric {
            metric: Metric::MeanAbsoluteError,
            mode: ComparisonMode::Passthrough,
            normalizers: vec![NormalizerConfig::SquaredSize { sample_size: 8 }],
        }
    }
}

/// Backend of the comparison result cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheBackend {
    /// Always compute live
    #[default]
    None,
    /// Memoize for the lifetime of the process
    Memory,
    /// Durable cache in a RocksDB database
    RocksDb { path: PathBuf },
}

/// Configuration for the image comparison engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base directory of the normalization workspace (`None` = user cache dir)
    pub temporary_directory: Option<PathBuf>,

    /// Permission bits used when creating the workspace
    pub temporary_directory_mode: u32,

    /// Images per chunk in the first comparison pass (`None` = compare every pair)
    pub chunk_size: Option<usize>,

    /// Default similarity threshold in [0, 1]
    pub threshold: f64,

    /// Default policy for picking cluster survivors
    pub preference: PreferencePolicy,

    /// Strategies, in evaluation order
    pub strategies: Vec<StrategyConfig>,

    pub cache: CacheBackend,

    /// Number of threads to use for comparisons (0 = auto)
    pub threads: usize,

    /// Whether to draw a progress bar while comparing
    pub show_progress: bool,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            temporary_directory: None,
            temporary_directory_mode: 0o777,
            chunk_size: Some(8),
            threshold: 0.05,
            preference: PreferencePolicy::PreferLargerImage,
            strategies: vec![StrategyConfig::default()],
            cache: CacheBackend::None,
            threads: 0, // Auto
            show_progress: false,
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Configuration(format!("Failed to open config file: {}", e)))?;

        let config: Config = serde_json::from_reader(file)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| Error::Configuration(format!("Failed to create config file: {}", e)))?;

        serde_json::to_writer_pretty(file, self)
            .map_err(|e| Error::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Check threshold is in valid range
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::Configuration(
                "Threshold must be between 0 and 1".to_string(),
            ));
        }

        if matches!(self.chunk_size, Some(size) if size < 2) {
            return Err(Error::Configuration(
                "Chunk size must be at least 2".to_string(),
            ));
        }

        if self.strategies.is_empty() {
            return Err(Error::Configuration(
                "At least one comparison strategy must be configured".to_string(),
            ));
        }

        let undersized = self.strategies.iter().any(|strategy| match strategy {
            StrategyConfig::PixelMetric { normalizers, .. } => normalizers
                .iter()
                .any(|n| matches!(n, NormalizerConfig::SquaredSize { sample_size } if *sample_size < 2)),
            StrategyConfig::FileHash { .. } => false,
        });
        if undersized {
            return Err(Error::Configuration(
                "Sample size must be at least 2".to_string(),
            ));
        }

        // Make sure we have a database path if the database cache is enabled
        if matches!(&self.cache, CacheBackend::RocksDb { path } if path.as_os_str().is_empty()) {
            return Err(Error::Configuration(
                "Database path must be specified if the RocksDB cache is enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// Instantiate every configured strategy, in order
    pub fn build_strategies(&self) -> Vec<Arc<dyn ComparisonStrategy>> {
        self.strategies.iter().map(StrategyConfig::build).collect()
    }
}
