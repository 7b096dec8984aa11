use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use tempfile::{tempdir, TempDir};

use super::*;

fn workspace() -> (TempDir, Workspace) {
    let dir = tempdir().unwrap();
    let workspace = Workspace::open(Some(dir.path()), 0o755).unwrap();
    (dir, workspace)
}

fn solid_png(dir: &Path, name: &str, size: u32, color: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(size, size, Rgb(color)).save(&path).unwrap();
    path
}

/// Counts transforms so tests can observe artifact reuse
#[derive(Debug, Default)]
struct CountingStage {
    calls: AtomicUsize,
}

impl Normalizer for CountingStage {
    fn identity(&self) -> String {
        "counting".to_string()
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Propagate
    }

    fn transform(&self, input: &Path, output: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::copy(input, output)?;
        Ok(())
    }
}

#[test]
fn test_empty_pipeline_returns_input() {
    let (dir, workspace) = workspace();
    let image = solid_png(dir.path(), "a.png", 16, [1, 2, 3]);

    let pipeline = NormalizationPipeline::default();
    assert_eq!(pipeline.identity(), "none");
    assert_eq!(pipeline.normalize(&image, &workspace).unwrap(), image);
}

#[test]
fn test_missing_input_is_reported() {
    let (dir, workspace) = workspace();
    let pipeline = NormalizationPipeline::new(vec![Arc::new(SquaredSizeNormalizer::new(8))]);

    let err = pipeline
        .normalize(&dir.path().join("missing.png"), &workspace)
        .unwrap_err();
    assert!(matches!(err, Error::InputNotFound(_)));
}

#[test]
fn test_squared_size_produces_sample_square() {
    let (dir, workspace) = workspace();
    let image = solid_png(dir.path(), "a.png", 40, [200, 10, 10]);
    let pipeline = NormalizationPipeline::new(vec![Arc::new(SquaredSizeNormalizer::new(8))]);

    let normalized = pipeline.normalize(&image, &workspace).unwrap();
    assert!(normalized.starts_with(workspace.root().join("squared-size-8")));

    let decoded = load_image(&normalized).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (8, 8));
}

#[test]
fn test_sample_size_has_floor_of_two() {
    assert_eq!(SquaredSizeNormalizer::new(0).sample_size(), 2);
    assert_eq!(SquaredSizeNormalizer::new(1).identity(), "squared-size-2");
}

#[test]
fn test_stages_run_in_order_and_reuse_artifacts() {
    let (dir, workspace) = workspace();
    let image = solid_png(dir.path(), "a.png", 32, [90, 30, 200]);
    let counter = Arc::new(CountingStage::default());
    let pipeline = NormalizationPipeline::new(vec![
        Arc::new(SquaredSizeNormalizer::new(4)),
        Arc::new(GrayScaleNormalizer),
        counter.clone(),
    ]);
    assert_eq!(pipeline.identity(), "squared-size-4>grayscale>counting");

    let first = pipeline.normalize(&image, &workspace).unwrap();
    let second = pipeline.normalize(&image, &workspace).unwrap();

    assert_eq!(first, second);
    assert_eq!(counter.calls.load(Ordering::SeqCst), 1);

    let decoded = load_image(&first).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (4, 4));
    assert!(decoded.as_luma8().is_some());
}

#[test]
fn test_corrupt_input_propagates_for_resize() {
    let (dir, workspace) = workspace();
    let corrupt = dir.path().join("corrupt.png");
    std::fs::write(&corrupt, b"definitely not a png").unwrap();
    let pipeline = NormalizationPipeline::new(vec![Arc::new(SquaredSizeNormalizer::new(8))]);

    let err = pipeline.normalize(&corrupt, &workspace).unwrap_err();
    assert!(matches!(err, Error::NormalizationFailed { .. }));
}

#[test]
fn test_corrupt_input_passes_through_grayscale() {
    let (dir, workspace) = workspace();
    let corrupt = dir.path().join("corrupt.png");
    std::fs::write(&corrupt, b"definitely not a png").unwrap();
    let pipeline = NormalizationPipeline::new(vec![Arc::new(GrayScaleNormalizer)]);

    let normalized = pipeline.normalize(&corrupt, &workspace).unwrap();
    assert_ne!(normalized, corrupt);
    assert_eq!(std::fs::read(normalized).unwrap(), b"definitely not a png");
}

#[test]
fn test_histogram_stage_writes_png() {
    let (dir, workspace) = workspace();
    let image = solid_png(dir.path(), "a.png", 8, [12, 34, 56]);
    let pipeline = NormalizationPipeline::new(vec![Arc::new(HistogramNormalizer)]);

    let normalized = pipeline.normalize(&image, &workspace).unwrap();
    let decoded = load_image(&normalized).unwrap();
    assert_eq!(decoded.to_rgb8().get_pixel(0, 0), &Rgb([12, 34, 56]));
}
