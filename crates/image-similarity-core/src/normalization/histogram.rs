use image::{DynamicImage, RgbImage};
use std::path::Path;

use super::{load_image, save_png, FailurePolicy, Normalizer};
use crate::error::Result;

/// Equalizes the histogram of each RGB channel independently.
///
/// Falls back to passing the input through on failure, like
/// [`GrayScaleNormalizer`](super::GrayScaleNormalizer).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistogramNormalizer;

impl Normalizer for HistogramNormalizer {
    fn identity(&self) -> String {
        "histogram".to_string()
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Passthrough
    }

    fn transform(&self, input: &Path, output: &Path) -> Result<()> {
        let image = load_image(input)?;
        let equalized = equalize(image.to_rgb8());
        save_png(&DynamicImage::ImageRgb8(equalized), output)
    }
}

fn equalize(mut image: RgbImage) -> RgbImage {
    let total = u64::from(image.width()) * u64::from(image.height());
    if total == 0 {
        return image;
    }

    let mut luts = [[0u8; 256]; 3];
    for (channel, lut) in luts.iter_mut().enumerate() {
        let mut histogram = [0u64; 256];
        for pixel in image.pixels() {
            histogram[pixel[channel] as usize] += 1;
        }
        *lut = channel_lut(&histogram, total);
    }

    for pixel in image.pixels_mut() {
        for (channel, lut) in luts.iter().enumerate() {
            pixel[channel] = lut[pixel[channel] as usize];
        }
    }
    image
}

/// Map each level through the normalized cumulative histogram
fn channel_lut(histogram: &[u64; 256], total: u64) -> [u8; 256] {
    let mut lut = [0u8; 256];
    let cdf_min = histogram.iter().copied().find(|&count| count > 0).unwrap_or(0);

    // Single-level channel: nothing to spread
    if total == cdf_min {
        for (level, slot) in lut.iter_mut().enumerate() {
            *slot = level as u8;
        }
        return lut;
    }

    let mut cumulative = 0u64;
    let span = (total - cdf_min) as f64;
    for (level, count) in histogram.iter().enumerate() {
        cumulative += count;
        let scaled = (cumulative.saturating_sub(cdf_min)) as f64 / span * 255.0;
        lut[level] = scaled.round().clamp(0.0, 255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_equalize_stretches_narrow_range() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([100, 100, 100]));
        image.put_pixel(1, 0, Rgb([110, 110, 110]));

        let equalized = equalize(image);
        assert_eq!(equalized.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(equalized.get_pixel(1, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_equalize_leaves_flat_image_untouched() {
        let image = RgbImage::from_pixel(4, 4, Rgb([10, 200, 30]));
        let equalized = equalize(image.clone());
        assert_eq!(equalized, image);
    }
}
