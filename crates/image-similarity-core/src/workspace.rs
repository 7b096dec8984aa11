//! Normalization workspace: the directory holding derived image artifacts.
//!
//! Artifacts are written to a temporary file in the destination directory and
//! renamed into place without clobbering, so concurrent writers of the same
//! artifact settle on whichever finished first and readers never see a
//! partially written file.
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Name of the subdirectory created under the configured base directory
pub const WORKSPACE_DIR_NAME: &str = "image-similarity";

/// Directory where normalizer stages keep their cached outputs
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open (creating if needed) the workspace below `base`
    ///
    /// When `base` is `None` the per-user cache directory is used, falling
    /// back to the system temporary directory.
    pub fn open(base: Option<&Path>, mode: u32) -> Result<Self> {
        let base = match base {
            Some(base) => base.to_path_buf(),
            None => default_base_directory(),
        };
        let root = base.join(WORKSPACE_DIR_NAME);

        if !root.exists() {
            create_dir_with_mode(&root, mode).map_err(|e| Error::TemporaryDirectoryUnwritable {
                path: root.clone(),
                reason: e.to_string(),
            })?;
            info!("Created normalization workspace at {}", root.display());
        }

        // Probe writability up front; nothing works without it
        tempfile::tempfile_in(&root).map_err(|e| Error::TemporaryDirectoryUnwritable {
            path: root.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory reserved for one normalizer stage
    pub fn stage_dir(&self, stage: &str) -> Result<PathBuf> {
        let dir = self.root.join(stage);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Produce `dest` through `write`, publishing it atomically
    ///
    /// `write` receives a temporary path in the same directory as `dest`.
    /// If another writer published `dest` first, its artifact is kept.
    pub fn write_atomic<F>(&self, dest: &Path, write: F) -> Result<()>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let dir = dest.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(dir)?;

        let temp = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(".png")
            .tempfile_in(dir)?;
        write(temp.path())?;

        match temp.persist_noclobber(dest) {
            Ok(_) => Ok(()),
            Err(_) if dest.exists() => {
                debug!("Artifact {} was published by another writer", dest.display());
                Ok(())
            }
            Err(e) => Err(Error::Io(e.error)),
        }
    }

    /// Remove artifacts not modified for at least `older_than`; all when `None`
    ///
    /// Returns the number of files removed.
    pub fn prune(&self, older_than: Option<Duration>) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let expired = match older_than {
                None => true,
                Some(lifetime) => entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .and_then(|modified| now.duration_since(modified).ok())
                    .map(|age| age >= lifetime)
                    .unwrap_or(false),
            };

            if expired && std::fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }

        info!(
            "Pruned {} artifacts from {}",
            removed,
            self.root.display()
        );
        Ok(removed)
    }
}

fn default_base_directory() -> PathBuf {
    directories::ProjectDirs::from("", "", WORKSPACE_DIR_NAME)
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(std::env::temp_dir)
}

#[cfg(unix)]
fn create_dir_with_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(mode)
        .create(path)?;
    // The process umask narrows the mode passed to mkdir; apply it explicitly
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn create_dir_with_mode(path: &Path, _mode: u32) -> std::io::Result<()> {
    std::fs::create_dir_all(path)
}
