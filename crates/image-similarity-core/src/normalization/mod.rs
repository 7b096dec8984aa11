//! # Normalization Pipeline
//!
//! Strategies rarely compare images as they come: they first shrink them to a
//! small sample square, drop colour, or equalize the histogram. Each of those
//! steps is a [`Normalizer`] stage, and a [`NormalizationPipeline`] chains them
//! in registration order, feeding each stage the previous stage's output.
//!
//! ## Caching
//!
//! A stage writes its output to a deterministic path inside the
//! [`Workspace`]: `<workspace>/<stage identity>/<artifact key>.png`. When that
//! path already exists the stage is skipped and the artifact reused, so
//! normalizing the same image twice costs one `stat` per stage.
//!
//! ## Failures
//!
//! Each stage declares a [`FailurePolicy`]. `Propagate` turns a failed
//! transform into [`Error::NormalizationFailed`]; `Passthrough` copies the
//! stage input unchanged to the artifact path and carries on.

mod grayscale;
mod histogram;
mod squared_size;

pub use grayscale::GrayScaleNormalizer;
pub use histogram::HistogramNormalizer;
pub use squared_size::SquaredSizeNormalizer;

use image::DynamicImage;
use log::{debug, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::fingerprint::artifact_key;
use crate::logging::log_normalization_error;
use crate::workspace::Workspace;

/// What a stage does when its transform fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Report [`Error::NormalizationFailed`]
    Propagate,

    /// Copy the stage input as the stage output
    Passthrough,
}

/// One pre-comparison transform
pub trait Normalizer: Send + Sync + fmt::Debug {
    /// Identity of the stage including its configuration, e.g. `squared-size-8`
    ///
    /// Used as the artifact directory name and as part of result-cache keys,
    /// so it must change whenever the output would.
    fn identity(&self) -> String;

    fn failure_policy(&self) -> FailurePolicy;

    /// Read `input` and write the derived image as PNG to `output`
    fn transform(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Ordered chain of normalizer stages
#[derive(Clone, Default)]
pub struct NormalizationPipeline {
    stages: Vec<Arc<dyn Normalizer>>,
}

impl fmt::Debug for NormalizationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NormalizationPipeline")
            .field(&self.identity())
            .finish()
    }
}

impl NormalizationPipeline {
    pub fn new(stages: Vec<Arc<dyn Normalizer>>) -> Self {
        Self { stages }
    }

    /// Append a stage to the end of the chain
    pub fn register(&mut self, stage: Arc<dyn Normalizer>) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[Arc<dyn Normalizer>] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Identity of the whole chain, `none` when empty
    pub fn identity(&self) -> String {
        if self.stages.is_empty() {
            return "none".to_string();
        }
        self.stages
            .iter()
            .map(|stage| stage.identity())
            .collect::<Vec<_>>()
            .join(">")
    }

    /// Run every stage over `image`, returning the final artifact path
    ///
    /// An empty pipeline returns the input path itself.
    pub fn normalize(&self, image: &Path, workspace: &Workspace) -> Result<PathBuf> {
        if !image.is_file() {
            return Err(Error::InputNotFound(image.to_path_buf()));
        }

        let mut current = image.to_path_buf();
        for stage in &self.stages {
            current = apply_stage(stage.as_ref(), &current, workspace)?;
        }
        Ok(current)
    }
}

fn apply_stage(stage: &dyn Normalizer, input: &Path, workspace: &Workspace) -> Result<PathBuf> {
    let identity = stage.identity();
    let dest = workspace
        .stage_dir(&identity)?
        .join(format!("{}.png", artifact_key(input)?));

    if dest.exists() {
        debug!("Reusing {} artifact for {}", identity, input.display());
        return Ok(dest);
    }

    match workspace.write_atomic(&dest, |tmp| stage.transform(input, tmp)) {
        Ok(()) => Ok(dest),
        Err(e) => {
            log_normalization_error(&identity, input, &e);
            match stage.failure_policy() {
                FailurePolicy::Propagate => Err(Error::NormalizationFailed {
                    stage: identity,
                    path: input.to_path_buf(),
                    reason: e.to_string(),
                }),
                FailurePolicy::Passthrough => {
                    warn!(
                        "Stage {} passing {} through unchanged",
                        identity,
                        input.display()
                    );
                    workspace.write_atomic(&dest, |tmp| {
                        std::fs::copy(input, tmp)?;
                        Ok(())
                    })?;
                    Ok(dest)
                }
            }
        }
    }
}

/// Decode an image, sniffing the format from its content
///
/// Artifacts always carry a `.png` extension, including passthrough copies
/// of other formats, so the extension cannot be trusted.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let image = image::io::Reader::open(path)?
        .with_guessed_format()?
        .decode()?;
    Ok(image)
}

fn save_png(image: &DynamicImage, output: &Path) -> Result<()> {
    image.save_with_format(output, image::ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests;
