//! Synthesized image fixtures for the integration tests.
#![allow(dead_code)]

use image::{Rgb, RgbImage};
use image_similarity_core::{Config, ImageRef};
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// A scratch directory of generated images plus a workspace below it
pub struct TestImages {
    dir: TempDir,
}

impl TestImages {
    pub fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Configuration whose workspace lives inside the scratch directory
    pub fn config(&self) -> Config {
        Config {
            temporary_directory: Some(self.path("work")),
            ..Config::default()
        }
    }

    fn save(&self, name: &str, image: RgbImage) -> ImageRef {
        let path = self.path(name);
        image.save(&path).unwrap();
        ImageRef::resolve(path)
    }

    /// Single-colour image
    pub fn solid(&self, name: &str, width: u32, height: u32, shade: u8) -> ImageRef {
        self.save(name, RgbImage::from_pixel(width, height, Rgb([shade, shade, shade])))
    }

    /// Horizontal black-to-white ramp, or white-to-black when `inverted`
    pub fn gradient(&self, name: &str, inverted: bool) -> ImageRef {
        self.save(
            name,
            RgbImage::from_fn(64, 64, |x, _| {
                let v = (x * 4) as u8;
                let v = if inverted { 255 - v } else { v };
                Rgb([v, v, v])
            }),
        )
    }

    /// Byte-for-byte copy of an existing image
    pub fn copy(&self, source: &ImageRef, name: &str) -> ImageRef {
        let path = self.path(name);
        std::fs::copy(source.path(), &path).unwrap();
        ImageRef::resolve(path)
    }
}
