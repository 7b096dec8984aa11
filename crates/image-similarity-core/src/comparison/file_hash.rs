use std::path::Path;

use super::ComparisonStrategy;
use crate::error::{Error, Result};
use crate::fingerprint::fingerprint;
use crate::normalization::NormalizationPipeline;
use crate::types::ComparisonMode;

/// Byte equality of the original files: 0.0 when equal, 1.0 otherwise.
///
/// Runs `Strict` by default, acting as an exact-copy fast path in front of
/// the pixel metrics.
#[derive(Debug, Clone)]
pub struct FileHashStrategy {
    mode: ComparisonMode,
    normalizers: NormalizationPipeline,
}

impl FileHashStrategy {
    pub fn new(mode: ComparisonMode) -> Self {
        Self {
            mode,
            normalizers: NormalizationPipeline::default(),
        }
    }
}

impl Default for FileHashStrategy {
    fn default() -> Self {
        Self::new(ComparisonMode::Strict)
    }
}

impl ComparisonStrategy for FileHashStrategy {
    fn identity(&self) -> &'static str {
        "file-hash"
    }

    fn config_fingerprint(&self) -> String {
        "blake3".to_string()
    }

    fn mode(&self) -> ComparisonMode {
        self.mode
    }

    fn normalizers(&self) -> &NormalizationPipeline {
        &self.normalizers
    }

    fn calculate_difference(
        &self,
        _normalized_left: &Path,
        _normalized_right: &Path,
        original_left: &Path,
        original_right: &Path,
        _threshold: f64,
    ) -> Result<f64> {
        let hashes = fingerprint(original_left).and_then(|left| Ok((left, fingerprint(original_right)?)));
        match hashes {
            Ok((left, right)) => Ok(if left == right { 0.0 } else { 1.0 }),
            Err(e) => Err(Error::ComparisonFailed {
                strategy: self.identity().to_string(),
                left: original_left.to_path_buf(),
                right: original_right.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }
}
