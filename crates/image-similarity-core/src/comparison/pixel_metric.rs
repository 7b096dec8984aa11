//! Pixel error metrics over normalized RGB samples.
//!
//! All metrics work on 8-bit channels scaled to `[0, 1]`:
//!
//! - `AbsoluteError`: fraction of pixels whose colour distance exceeds a fuzz
//!   equal to the threshold
//! - `MeanAbsoluteError`: average channel distance
//! - `MeanSquaredError`: average squared channel distance
//! - `RootMeanSquaredError`: square root of the above
//! - `NormalizedCrossCorrelation`: `1 - ncc`, so 0 still means identical
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::ComparisonStrategy;
use crate::error::{Error, Result};
use crate::normalization::{load_image, NormalizationPipeline, Normalizer, SquaredSizeNormalizer};
use crate::types::ComparisonMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    AbsoluteError,
    MeanAbsoluteError,
    MeanSquaredError,
    RootMeanSquaredError,
    NormalizedCrossCorrelation,
}

impl Metric {
    fn name(&self) -> &'static str {
        match self {
            Metric::AbsoluteError => "AbsoluteError",
            Metric::MeanAbsoluteError => "MeanAbsoluteError",
            Metric::MeanSquaredError => "MeanSquaredError",
            Metric::RootMeanSquaredError => "RootMeanSquaredError",
            Metric::NormalizedCrossCorrelation => "NormalizedCrossCorrelation",
        }
    }

    /// Score two equally sized images
    pub fn score(&self, left: &RgbImage, right: &RgbImage, threshold: f64) -> f64 {
        let score = match self {
            Metric::AbsoluteError => absolute_error(left, right, threshold),
            Metric::MeanAbsoluteError => mean_absolute_error(left, right),
            Metric::MeanSquaredError => mean_squared_error(left, right),
            Metric::RootMeanSquaredError => mean_squared_error(left, right).sqrt(),
            Metric::NormalizedCrossCorrelation => 1.0 - cross_correlation(left, right),
        };
        score.clamp(0.0, 1.0)
    }
}

/// Compares normalized images with a [`Metric`]
#[derive(Debug, Clone)]
pub struct PixelMetricStrategy {
    metric: Metric,
    mode: ComparisonMode,
    normalizers: NormalizationPipeline,
}

impl PixelMetricStrategy {
    /// Passthrough strategy with an 8×8 sample square
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            mode: ComparisonMode::Passthrough,
            normalizers: NormalizationPipeline::new(vec![Arc::new(SquaredSizeNormalizer::default())]),
        }
    }

    pub fn with_mode(mut self, mode: ComparisonMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replace the normalizer chain
    pub fn with_normalizers(mut self, normalizers: Vec<Arc<dyn Normalizer>>) -> Self {
        self.normalizers = NormalizationPipeline::new(normalizers);
        self
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Score two normalized artifacts; the error is the failure reason
    fn measure(&self, left: &Path, right: &Path, threshold: f64) -> std::result::Result<f64, String> {
        let left = load_image(left).map_err(|e| e.to_string())?.to_rgb8();
        let right = load_image(right).map_err(|e| e.to_string())?.to_rgb8();

        if left.dimensions() != right.dimensions() {
            return Err(format!(
                "image dimensions differ: {:?} vs {:?}",
                left.dimensions(),
                right.dimensions()
            ));
        }
        if left.width() == 0 || left.height() == 0 {
            return Err("empty image".to_string());
        }

        Ok(self.metric.score(&left, &right, threshold))
    }
}

impl Default for PixelMetricStrategy {
    fn default() -> Self {
        Self::new(Metric::MeanAbsoluteError)
    }
}

impl ComparisonStrategy for PixelMetricStrategy {
    fn identity(&self) -> &'static str {
        "pixel-metric"
    }

    fn config_fingerprint(&self) -> String {
        self.metric.name().to_string()
    }

    fn mode(&self) -> ComparisonMode {
        self.mode
    }

    fn normalizers(&self) -> &NormalizationPipeline {
        &self.normalizers
    }

    fn is_threshold_sensitive(&self) -> bool {
        self.metric == Metric::AbsoluteError
    }

    fn calculate_difference(
        &self,
        normalized_left: &Path,
        normalized_right: &Path,
        original_left: &Path,
        original_right: &Path,
        threshold: f64,
    ) -> Result<f64> {
        self.measure(normalized_left, normalized_right, threshold)
            .map_err(|reason| Error::ComparisonFailed {
                strategy: format!("{}-{}", self.identity(), self.metric.name()),
                left: original_left.to_path_buf(),
                right: original_right.to_path_buf(),
                reason,
            })
    }
}

fn channel_pairs<'a>(left: &'a RgbImage, right: &'a RgbImage) -> impl Iterator<Item = (f64, f64)> + 'a {
    left.as_raw()
        .iter()
        .zip(right.as_raw().iter())
        .map(|(&a, &b)| (f64::from(a) / 255.0, f64::from(b) / 255.0))
}

fn sample_count(image: &RgbImage) -> f64 {
    image.as_raw().len() as f64
}

fn mean_absolute_error(left: &RgbImage, right: &RgbImage) -> f64 {
    let sum: f64 = channel_pairs(left, right).map(|(a, b)| (a - b).abs()).sum();
    sum / sample_count(left)
}

fn mean_squared_error(left: &RgbImage, right: &RgbImage) -> f64 {
    let sum: f64 = channel_pairs(left, right).map(|(a, b)| (a - b).powi(2)).sum();
    sum / sample_count(left)
}

fn absolute_error(left: &RgbImage, right: &RgbImage, fuzz: f64) -> f64 {
    let differing = left
        .pixels()
        .zip(right.pixels())
        .filter(|(a, b)| {
            let squared: f64 = a
                .0
                .iter()
                .zip(b.0.iter())
                .map(|(&x, &y)| ((f64::from(x) - f64::from(y)) / 255.0).powi(2))
                .sum();
            (squared / 3.0).sqrt() > fuzz
        })
        .count();
    differing as f64 / (f64::from(left.width()) * f64::from(left.height()))
}

/// Pearson correlation of all channel samples, in `[-1, 1]`
fn cross_correlation(left: &RgbImage, right: &RgbImage) -> f64 {
    let n = sample_count(left);
    let (sum_a, sum_b) = channel_pairs(left, right).fold((0.0, 0.0), |(sa, sb), (a, b)| (sa + a, sb + b));
    let (mean_a, mean_b) = (sum_a / n, sum_b / n);

    let (mut covariance, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (a, b) in channel_pairs(left, right) {
        covariance += (a - mean_a) * (b - mean_b);
        var_a += (a - mean_a).powi(2);
        var_b += (b - mean_b).powi(2);
    }

    // Flat images have no variance to correlate
    if var_a == 0.0 || var_b == 0.0 {
        return if left.as_raw() == right.as_raw() { 1.0 } else { 0.0 };
    }
    covariance / (var_a * var_b).sqrt()
}
