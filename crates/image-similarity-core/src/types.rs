use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Handle to an input image.
///
/// Identity is the path: two references are the same image when their paths
/// compare equal. [`ImageRef::resolve`] canonicalizes existing files so that
/// `./a.png` and `a.png` collapse to one identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImageRef(PathBuf);

impl ImageRef {
    /// Wrap a path as-is
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Wrap a path, canonicalizing it when the file exists
    pub fn resolve(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::canonicalize(path) {
            Ok(canonical) => Self(canonical),
            Err(_) => Self(path.to_path_buf()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn exists(&self) -> bool {
        self.0.is_file()
    }
}

impl AsRef<Path> for ImageRef {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl From<PathBuf> for ImageRef {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&Path> for ImageRef {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// How a strategy's score takes part in the aggregate of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonMode {
    /// A score within threshold ends the evaluation of the pair immediately
    Strict,

    /// The score is always averaged with the other passthrough scores
    Passthrough,
}

/// Difference score of one unordered pair; lower means more similar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseResult {
    pub left: ImageRef,
    pub right: ImageRef,
    /// Score in `[0, 1]`, 0 = identical
    pub score: f64,
}

impl PairwiseResult {
    pub fn is_within(&self, threshold: f64) -> bool {
        self.score <= threshold
    }
}

/// Rule used to pick one survivor per duplicate cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PreferencePolicy {
    /// Keep the first candidate encountered
    Any,

    /// Keep the candidate with the largest pixel area
    #[default]
    PreferLargerImage,

    /// Keep the candidate with the smallest pixel area
    PreferSmallerImage,

    /// Keep the partner closest to the originating duplicate
    PreferLowerDifference,

    /// Keep the partner furthest from the originating duplicate
    PreferLargerDifference,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_missing_path_is_kept_verbatim() {
        let image = ImageRef::resolve("does/not/exist.png");
        assert_eq!(image.path(), Path::new("does/not/exist.png"));
        assert!(!image.exists());
    }

    #[test]
    fn test_resolve_collapses_relative_spellings() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.png");
        std::fs::write(&file, b"x").unwrap();

        let direct = ImageRef::resolve(&file);
        let dotted = ImageRef::resolve(dir.path().join(".").join("a.png"));
        assert_eq!(direct, dotted);
    }

    #[test]
    fn test_pairwise_threshold_is_inclusive() {
        let result = PairwiseResult {
            left: ImageRef::new("a"),
            right: ImageRef::new("b"),
            score: 0.05,
        };
        assert!(result.is_within(0.05));
        assert!(!result.is_within(0.049));
    }
}
