use log::debug;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::ImageRef;

/// Extensions of the formats the comparison strategies can decode
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Expand files and directories into image references
///
/// Directories are walked up to `max_depth` levels (unlimited when `None`);
/// files named explicitly are taken as they are. The result is deduplicated
/// and sorted.
pub fn discover_images<P: AsRef<Path>>(paths: &[P], max_depth: Option<usize>) -> Result<Vec<ImageRef>> {
    // Convert to a collection of PathBufs first
    let paths: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();

    let found = paths
        .par_iter()
        .map(|path| discover_in_path(path, max_depth))
        .collect::<Vec<Result<Vec<ImageRef>>>>()
        .into_iter()
        .try_fold(BTreeSet::new(), |mut acc, result| {
            acc.extend(result?);
            Ok::<_, Error>(acc)
        })?;

    Ok(found.into_iter().collect())
}

fn discover_in_path(path: &Path, max_depth: Option<usize>) -> Result<Vec<ImageRef>> {
    if !path.exists() {
        return Err(Error::InputNotFound(path.to_path_buf()));
    }
    if path.is_file() {
        return Ok(vec![ImageRef::resolve(path)]);
    }

    let images: Vec<ImageRef> = WalkDir::new(path)
        .max_depth(max_depth.unwrap_or(usize::MAX))
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| has_image_extension(e.path()))
        .map(|e| ImageRef::resolve(e.path()))
        .collect();

    debug!("Found {} images under {}", images.len(), path.display());
    Ok(images)
}

/// Returns if the given path has a supported image extension
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"DUMMY IMAGE DATA").unwrap();
        path
    }

    #[test]
    fn test_has_image_extension() {
        assert!(has_image_extension(Path::new("test.jpg")));
        assert!(has_image_extension(Path::new("test.JPEG")));
        assert!(has_image_extension(Path::new("test.png")));
        assert!(has_image_extension(Path::new("test.webp")));
        assert!(!has_image_extension(Path::new("test.txt")));
        assert!(!has_image_extension(Path::new("test")));
    }

    #[test]
    fn test_discover_walks_directories_with_depth_limit() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        touch(dir.path(), "b.png");
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "notes.txt");
        touch(&nested, "c.gif");

        let all = discover_images(&[dir.path()], None).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0] < w[1]));

        let shallow = discover_images(&[dir.path()], Some(1)).unwrap();
        assert_eq!(shallow.len(), 2);
    }

    #[test]
    fn test_explicit_files_are_kept_and_deduplicated() {
        let dir = tempdir().unwrap();
        let file = touch(dir.path(), "photo.png");

        let found = discover_images(&[file.clone(), file, dir.path().to_path_buf()], None).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let dir = tempdir().unwrap();
        let err = discover_images(&[dir.path().join("absent")], None).unwrap_err();
        assert!(matches!(err, Error::InputNotFound(_)));
    }
}
