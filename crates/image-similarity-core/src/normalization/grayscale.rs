use std::path::Path;

use super::{load_image, save_png, FailurePolicy, Normalizer};
use crate::error::Result;

/// Converts to 8-bit luma.
///
/// Falls back to passing the input through when the image cannot be decoded;
/// the comparison then runs on colour data instead of failing outright.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrayScaleNormalizer;

impl Normalizer for GrayScaleNormalizer {
    fn identity(&self) -> String {
        "grayscale".to_string()
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Passthrough
    }

    fn transform(&self, input: &Path, output: &Path) -> Result<()> {
        let image = load_image(input)?;
        save_png(&image.grayscale(), output)
    }
}
