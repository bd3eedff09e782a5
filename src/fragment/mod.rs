//! Fragment loading and validation
//!
//! A fragment is validated as a unit before any merge step runs: a file
//! with a single malformed line is rejected whole, and the error carries
//! every offending line.

mod discover;

pub use discover::{discover, DiscoveryError, DEFAULT_FRAGMENT_GLOB};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use kfrag_grammar::{Directive, LineDefect, ValidationResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

/// A validated fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// Where the fragment was read from
    pub path: PathBuf,

    /// Directives in file order
    pub directives: Vec<Directive>,

    /// SHA-256 of the raw file bytes
    pub digest: String,
}

/// Fragment input errors
#[derive(Debug, thiserror::Error)]
pub enum FragmentError {
    #[error("fragment not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("fragment not readable: {}: {reason}", .path.display())]
    FileNotReadable { path: PathBuf, reason: String },

    #[error("malformed fragment {}: {} invalid line(s)", .path.display(), .defects.len())]
    Malformed {
        path: PathBuf,
        defects: Vec<LineDefect>,
    },
}

impl FragmentError {
    /// Path of the offending fragment
    pub fn path(&self) -> &Path {
        match self {
            FragmentError::FileNotFound { path }
            | FragmentError::FileNotReadable { path, .. }
            | FragmentError::Malformed { path, .. } => path,
        }
    }

    /// Offending lines, verbatim (empty unless malformed)
    pub fn offending_lines(&self) -> Vec<&str> {
        match self {
            FragmentError::Malformed { defects, .. } => {
                defects.iter().map(|d| d.text.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl Fragment {
    /// Read and validate a fragment file
    pub fn load(path: &Path) -> Result<Self, FragmentError> {
        if !path.exists() {
            return Err(FragmentError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        if !path.is_file() {
            return Err(FragmentError::FileNotReadable {
                path: path.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }

        let bytes = fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FragmentError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => FragmentError::FileNotReadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        let digest = hex::encode(Sha256::digest(&bytes));

        let text = String::from_utf8(bytes).map_err(|e| FragmentError::FileNotReadable {
            path: path.to_path_buf(),
            reason: format!("invalid UTF-8: {}", e),
        })?;

        let mut fragment = Self::from_text(path, &text)?;
        fragment.digest = digest;
        debug!(
            fragment = %path.display(),
            directives = fragment.directives.len(),
            "fragment validated"
        );
        Ok(fragment)
    }

    /// Validate fragment text that did not come from disk
    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Result<Self, FragmentError> {
        let path = path.into();
        let result: ValidationResult = kfrag_grammar::validate(text);
        if !result.accepted {
            return Err(FragmentError::Malformed {
                path,
                defects: result.defects,
            });
        }
        Ok(Self {
            path,
            directives: result.into_directives(),
            digest: hex::encode(Sha256::digest(text.as_bytes())),
        })
    }

    /// Display name for logs and reports
    pub fn name(&self) -> String {
        self.path.display().to_string()
    }

    /// True if the fragment has no directives
    pub fn is_noop(&self) -> bool {
        self.directives.is_empty()
    }
}

/// Validate every fragment before anything is merged.
///
/// All fragments are checked even after a failure so the caller can
/// report every problem at once.
pub fn validate_all<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Fragment>, Vec<FragmentError>> {
    let mut fragments = Vec::with_capacity(paths.len());
    let mut errors = Vec::new();

    for path in paths {
        match Fragment::load(path.as_ref()) {
            Ok(f) => fragments.push(f),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(fragments)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kfrag_grammar::OptionValue;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn write_fragment(contents: &str) -> NamedTempFile {
        let mut temp = NamedTempFile::new().unwrap();
        write!(temp, "{}", contents).unwrap();
        temp
    }

    #[test]
    fn test_load_valid_fragment() {
        let temp = write_fragment("# sanitizers\nCONFIG_KASAN=y\n# CONFIG_RANDOMIZE_BASE is not set\n");
        let fragment = Fragment::load(temp.path()).unwrap();
        assert_eq!(fragment.directives.len(), 2);
        assert_eq!(fragment.directives[0].value, OptionValue::Enabled);
        assert_eq!(fragment.digest.len(), 64);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = Fragment::load(&dir.path().join("kasan.config"));
        assert!(matches!(result, Err(FragmentError::FileNotFound { .. })));
    }

    #[test]
    fn test_directory_is_not_readable() {
        let dir = TempDir::new().unwrap();
        let result = Fragment::load(dir.path());
        assert!(matches!(result, Err(FragmentError::FileNotReadable { .. })));
    }

    #[test]
    fn test_invalid_utf8_is_not_readable() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(&[0xff, 0xfe, b'\n']).unwrap();
        let result = Fragment::load(temp.path());
        assert!(matches!(result, Err(FragmentError::FileNotReadable { .. })));
    }

    #[test]
    fn test_malformed_reports_all_lines() {
        let temp = write_fragment("CONFIG_A=y\nCONFIG_B=yes\nCONFIG_C is not set\n");
        let err = Fragment::load(temp.path()).unwrap_err();
        assert_eq!(err.offending_lines(), vec!["CONFIG_B=yes", "CONFIG_C is not set"]);
        assert_eq!(err.path(), temp.path());
    }

    #[test]
    fn test_validate_all_collects_every_failure() {
        let good = write_fragment("CONFIG_A=y\n");
        let bad = write_fragment("nonsense\n");
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.config");

        let errors = validate_all(&[good.path(), bad.path(), missing.as_path()]).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], FragmentError::Malformed { .. }));
        assert!(matches!(errors[1], FragmentError::FileNotFound { .. }));
    }

    #[test]
    fn test_validate_all_preserves_order() {
        let first = write_fragment("CONFIG_A=y\n");
        let second = write_fragment("CONFIG_B=m\n");
        let fragments = validate_all(&[second.path(), first.path()]).unwrap();
        assert_eq!(fragments[0].directives[0].name, "CONFIG_B");
        assert_eq!(fragments[1].directives[0].name, "CONFIG_A");
    }

    #[test]
    fn test_comment_only_fragment_is_noop() {
        let fragment = Fragment::from_text("notes.config", "# nothing here\n\n").unwrap();
        assert!(fragment.is_noop());
    }
}
