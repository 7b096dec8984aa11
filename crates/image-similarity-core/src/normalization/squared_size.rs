use image::imageops::FilterType;
use std::path::Path;

use super::{load_image, save_png, FailurePolicy, Normalizer};
use crate::error::Result;

/// Resizes to a `sample_size`×`sample_size` square, ignoring aspect ratio.
///
/// Failures propagate: without the resize, pixel metrics would be asked to
/// compare images of different dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquaredSizeNormalizer {
    sample_size: u32,
}

impl SquaredSizeNormalizer {
    /// Sample sizes below 2 are raised to 2
    pub fn new(sample_size: u32) -> Self {
        Self {
            sample_size: sample_size.max(2),
        }
    }

    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }
}

impl Default for SquaredSizeNormalizer {
    fn default() -> Self {
        Self::new(8)
    }
}

impl Normalizer for SquaredSizeNormalizer {
    fn identity(&self) -> String {
        format!("squared-size-{}", self.sample_size)
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Propagate
    }

    fn transform(&self, input: &Path, output: &Path) -> Result<()> {
        let image = load_image(input)?;
        let resized = image.resize_exact(self.sample_size, self.sample_size, FilterType::Triangle);
        save_png(&resized, output)
    }
}
