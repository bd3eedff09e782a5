//! Fragment directory discovery

use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use walkdir::WalkDir;

/// Files picked up from a fragment directory unless configured otherwise
pub const DEFAULT_FRAGMENT_GLOB: &str = "*.config";

/// Errors while scanning a fragment directory
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("fragment directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Walk error: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Glob pattern error: {0}")]
    GlobError(#[from] globset::Error),
}

/// List fragment files directly inside `dir` whose file name matches
/// `pattern`, sorted by file name.
///
/// Sorting makes application order deterministic, so directories can use
/// numeric prefixes (`10-base.config`, `20-debug.config`) to order layers.
pub fn discover(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !dir.is_dir() {
        return Err(DiscoveryError::NotFound(dir.to_path_buf()));
    }

    let matcher: GlobMatcher = Glob::new(pattern)?.compile_matcher();
    let mut found = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if matcher.is_match(entry.file_name()) {
            found.push(entry.into_path());
        }
    }

    Ok(found)
}
