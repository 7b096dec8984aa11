//! Stable identities for images and normalized artifacts.
//!
//! Result-cache keys are built from the blake3 digest of the bytes a strategy
//! actually reads, so a cached score survives process restarts and follows
//! the content rather than the file name. Normalizer artifact names use the
//! cheaper [`artifact_key`], which only looks at the path and file metadata.
use crate::error::{Error, Result};
use std::time::UNIX_EPOCH;

use std::{fs::File, io::Read, path::Path};

/// Compute the blake3 digest of a file's content as a hex string
pub fn fingerprint<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();

    // Open the file with explicit scope to ensure it's closed promptly
    let hash = {
        let mut file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::InputNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;

        let mut hasher = blake3::Hasher::new();

        // Read the file in chunks and update the hasher
        let mut buffer = [0; 8192]; // 8KB buffer
        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        hasher.finalize()
    };

    Ok(hash.to_hex().to_string())
}

/// Derive a deterministic artifact name from a path, its length and mtime
///
/// A file rewritten in place gets a new key, so stale normalized artifacts are
/// never reused for it.
pub fn artifact_key<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::InputNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;

    let modified = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);

    let mut hasher = blake3::Hasher::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(&metadata.len().to_le_bytes());
    hasher.update(&modified.to_le_bytes());
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_follows_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        let c = dir.path().join("c.bin");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();
        std::fs::write(&c, b"other bytes").unwrap();

        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&c).unwrap());
    }

    #[test]
    fn test_fingerprint_matches_blake3_of_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        std::fs::write(&a, b"abc").unwrap();

        let expected = blake3::hash(b"abc").to_hex().to_string();
        assert_eq!(fingerprint(&a).unwrap(), expected);
    }

    #[test]
    fn test_missing_file_is_input_not_found() {
        let err = fingerprint("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, Error::InputNotFound(_)));

        let err = artifact_key("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, Error::InputNotFound(_)));
    }

    #[test]
    fn test_artifact_key_differs_per_path() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        std::fs::write(&a, b"same").unwrap();
        std::fs::write(&b, b"same").unwrap();

        assert_ne!(artifact_key(&a).unwrap(), artifact_key(&b).unwrap());
        assert_eq!(artifact_key(&a).unwrap(), artifact_key(&a).unwrap());
    }
}
