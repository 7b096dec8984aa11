use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Reads pixel dimensions of images for size-based preference policies
pub trait ImageSizeReader: Send + Sync {
    /// `None` when the image cannot be read
    fn dimensions(&self, path: &Path) -> Option<(u32, u32)>;

    /// Pixel area; unreadable images have area 0
    fn area(&self, path: &Path) -> u64 {
        self.dimensions(path)
            .map(|(width, height)| u64::from(width) * u64::from(height))
            .unwrap_or(0)
    }
}

/// Reads dimensions from the image header and remembers them for its lifetime
#[derive(Debug, Default)]
pub struct HeaderSizeReader {
    known: Mutex<HashMap<PathBuf, Option<(u32, u32)>>>,
}

impl HeaderSizeReader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageSizeReader for HeaderSizeReader {
    fn dimensions(&self, path: &Path) -> Option<(u32, u32)> {
        if let Some(known) = self
            .known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            return *known;
        }

        let dimensions = match image::image_dimensions(path) {
            Ok(dimensions) => Some(dimensions),
            Err(e) => {
                debug!("Could not read dimensions of {}: {}", path.display(), e);
                None
            }
        };

        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), dimensions);
        dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_header_reader_reports_area() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        RgbImage::from_pixel(6, 3, Rgb([9, 9, 9])).save(&path).unwrap();

        let reader = HeaderSizeReader::new();
        assert_eq!(reader.dimensions(&path), Some((6, 3)));
        assert_eq!(reader.area(&path), 18);
    }

    #[test]
    fn test_unreadable_image_has_zero_area() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();

        let reader = HeaderSizeReader::new();
        assert_eq!(reader.area(&path), 0);
        assert_eq!(reader.area(&dir.path().join("missing.png")), 0);
    }

    #[test]
    fn test_dimensions_are_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("square.png");
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])).save(&path).unwrap();

        let reader = HeaderSizeReader::new();
        assert_eq!(reader.dimensions(&path), Some((4, 4)));

        RgbImage::from_pixel(8, 8, Rgb([0, 0, 0])).save(&path).unwrap();
        assert_eq!(reader.dimensions(&path), Some((4, 4)));
    }
}
