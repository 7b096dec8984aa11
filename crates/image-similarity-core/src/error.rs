use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the image-similarity library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding error
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Input image does not exist
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    /// A normalizer stage could not produce its artifact
    #[error("Normalization stage '{stage}' failed for {path}: {reason}")]
    NormalizationFailed {
        stage: String,
        path: PathBuf,
        reason: String,
    },

    /// A strategy could not evaluate a pair
    #[error("Comparison '{strategy}' failed for {left} vs {right}: {reason}")]
    ComparisonFailed {
        strategy: String,
        left: PathBuf,
        right: PathBuf,
        reason: String,
    },

    /// A freshly computed result could not be written to the result store
    #[error("Failed to persist cache entry '{key}': {reason}")]
    CachePersistFailed { key: String, reason: String },

    /// Result store read or maintenance error
    #[error("Cache error: {0}")]
    Cache(String),

    /// The normalization workspace cannot be created or written
    #[error("Temporary directory {path} is not writable: {reason}")]
    TemporaryDirectoryUnwritable { path: PathBuf, reason: String },

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Cache(err.into_string())
    }
}
