//! # Comparison Strategies
//!
//! A [`ComparisonStrategy`] turns two normalized images into a difference
//! score in `[0, 1]`, where 0 means identical. The driver knows nothing about
//! the metric behind it; it only reads the strategy's [`ComparisonMode`], its
//! normalizer chain, and the identity used to build result-cache keys.
//!
//! Two families ship with the crate:
//!
//! - [`PixelMetricStrategy`]: per-pixel error metrics over normalized samples
//! - [`FileHashStrategy`]: byte equality of the original files

mod file_hash;
mod pixel_metric;

pub use file_hash::FileHashStrategy;
pub use pixel_metric::{Metric, PixelMetricStrategy};

use std::fmt;
use std::path::Path;

use crate::error::Result;
use crate::normalization::NormalizationPipeline;
use crate::types::ComparisonMode;

/// Pluggable difference algorithm
pub trait ComparisonStrategy: Send + Sync + fmt::Debug {
    /// Type identity, e.g. `pixel-metric`
    fn identity(&self) -> &'static str;

    /// Fingerprint of the strategy's own configuration, e.g. the metric name
    fn config_fingerprint(&self) -> String;

    fn mode(&self) -> ComparisonMode;

    /// Stages the driver must apply, in order, before calling the strategy
    fn normalizers(&self) -> &NormalizationPipeline;

    /// Whether the score depends on the threshold passed in
    ///
    /// Threshold-sensitive strategies get the threshold folded into their
    /// cache keys.
    fn is_threshold_sensitive(&self) -> bool {
        false
    }

    /// Compute the difference of one pair
    ///
    /// Failures are reported as [`Error::ComparisonFailed`](crate::Error::ComparisonFailed)
    /// for this pair only.
    fn calculate_difference(
        &self,
        normalized_left: &Path,
        normalized_right: &Path,
        original_left: &Path,
        original_right: &Path,
        threshold: f64,
    ) -> Result<f64>;
}

/// Deterministic result-cache key for one strategy evaluation
///
/// Composed of the strategy identity and configuration, the normalizer chain
/// identity and the fingerprints of both normalized inputs, in call order.
pub fn cache_key(
    strategy: &dyn ComparisonStrategy,
    left_fingerprint: &str,
    right_fingerprint: &str,
    threshold: f64,
) -> String {
    let mut key = format!(
        "{}-{}-{}-{}-vs-{}",
        strategy.identity(),
        strategy.config_fingerprint(),
        strategy.normalizers().identity(),
        left_fingerprint,
        right_fingerprint
    );
    if strategy.is_threshold_sensitive() {
        key.push_str(&format!("-t{}", threshold));
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_stable_and_ordered() {
        let strategy = PixelMetricStrategy::default();
        let a = cache_key(&strategy, "aaa", "bbb", 0.05);
        let b = cache_key(&strategy, "aaa", "bbb", 0.05);
        let swapped = cache_key(&strategy, "bbb", "aaa", 0.05);

        assert_eq!(a, b);
        assert_ne!(a, swapped);
        assert_eq!(
            a,
            "pixel-metric-MeanAbsoluteError-squared-size-8-aaa-vs-bbb"
        );
    }

    #[test]
    fn test_cache_key_includes_threshold_only_when_sensitive() {
        let mae = PixelMetricStrategy::default();
        assert_eq!(
            cache_key(&mae, "a", "b", 0.05),
            cache_key(&mae, "a", "b", 0.10)
        );

        let ae = PixelMetricStrategy::new(Metric::AbsoluteError);
        assert_ne!(
            cache_key(&ae, "a", "b", 0.05),
            cache_key(&ae, "a", "b", 0.10)
        );
    }

    #[test]
    fn test_cache_key_separates_configurations() {
        let mae = PixelMetricStrategy::new(Metric::MeanAbsoluteError);
        let rmse = PixelMetricStrategy::new(Metric::RootMeanSquaredError);
        let hash = FileHashStrategy::default();

        assert_ne!(cache_key(&mae, "a", "b", 0.0), cache_key(&rmse, "a", "b", 0.0));
        assert_ne!(cache_key(&mae, "a", "b", 0.0), cache_key(&hash, "a", "b", 0.0));
    }
}
