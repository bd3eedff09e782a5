//! External collaborator capabilities
//!
//! The pipeline never talks to the environment directly. Each external
//! collaborator sits behind one small trait:
//!
//! - [`BaselineSource`]: produces the starting snapshot
//! - [`FragmentMerger`]: overlays one fragment onto a snapshot
//! - [`DependencyResolver`]: fills in options left unspecified
//! - [`SnapshotPersister`]: writes the timestamped audit copy
//!
//! In-process implementations live in [`overlay`] and [`audit`]; the
//! kernel-tree implementations in [`kernel`] shell out to `make` and
//! `scripts/kconfig/merge_config.sh`.

pub mod audit;
pub mod kernel;
pub mod overlay;

pub use audit::AuditTrail;
pub use kernel::{DefconfigBaseline, KernelTree, MakeResolver, MergeScript};
pub use overlay::{DefaultTableResolver, EmptyBaseline, FileBaseline, IdentityResolver, OverlayMerger};

use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use kfrag_grammar::LineDefect;

use crate::fragment::Fragment;
use crate::snapshot::{ConfigurationSnapshot, SnapshotError};

/// Errors reported by a capability
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("baseline configuration missing: {}", .path.display())]
    MissingBaseline { path: PathBuf },

    #[error("tool not found: {program}")]
    ToolNotFound { program: String },

    #[error("{program} exited with {}", status_text(.status))]
    ToolFailed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn status_text(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "no status (killed by signal)".to_string(),
    }
}

impl CapabilityError {
    /// Diagnostic output captured from a failed tool, if any
    pub fn tool_output(&self) -> Option<&str> {
        match self {
            CapabilityError::ToolFailed { stderr, .. } if !stderr.is_empty() => Some(stderr),
            _ => None,
        }
    }

    /// Offending lines when a tool left behind an unreadable `.config`
    pub fn defects(&self) -> &[LineDefect] {
        match self {
            CapabilityError::Snapshot(e) => e.defects(),
            _ => &[],
        }
    }
}

/// Produces the starting snapshot
pub trait BaselineSource {
    /// Short description for logs and reports
    fn describe(&self) -> String;

    fn load_baseline(&self) -> Result<ConfigurationSnapshot, CapabilityError>;
}

/// Applies one validated fragment onto a snapshot
pub trait FragmentMerger {
    fn describe(&self) -> String;

    /// Return the snapshot with `fragment` applied. Later directives for
    /// the same name must win.
    fn merge(
        &self,
        snapshot: ConfigurationSnapshot,
        fragment: &Fragment,
    ) -> Result<ConfigurationSnapshot, CapabilityError>;
}

/// Assigns defaults to options the fragments left unspecified
pub trait DependencyResolver {
    fn describe(&self) -> String;

    fn resolve(&self, snapshot: ConfigurationSnapshot)
        -> Result<ConfigurationSnapshot, CapabilityError>;
}

/// Writes the immutable audit copy of a finalized configuration
pub trait SnapshotPersister {
    fn describe(&self) -> String;

    /// Copy `config_path` to a name derived from `at`
    fn persist(&self, config_path: &Path, at: NaiveDateTime)
        -> Result<PersistedArtifact, CapabilityError>;
}

/// A written audit artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedArtifact {
    /// Path of the artifact
    pub path: PathBuf,

    /// SHA-256 of the artifact bytes
    pub digest: String,

    /// Size in bytes
    pub bytes: u64,

    /// Timestamp embedded in the name
    pub created_at: NaiveDateTime,
}

/// The set of collaborators a pipeline runs against
pub struct Capabilities {
    pub baseline: Box<dyn BaselineSource>,
    pub merger: Box<dyn FragmentMerger>,
    pub resolver: Box<dyn DependencyResolver>,
    pub persister: Box<dyn SnapshotPersister>,
}

impl Capabilities {
    /// Everything in-process: empty baseline, key/value overlay, no
    /// dependency resolution, audit copies under `audit_dir`.
    pub fn in_process(audit_dir: impl Into<PathBuf>) -> Self {
        Self {
            baseline: Box::new(EmptyBaseline),
            merger: Box::new(OverlayMerger),
            resolver: Box::new(IdentityResolver),
            persister: Box::new(AuditTrail::new(audit_dir)),
        }
    }

    pub fn with_baseline(mut self, baseline: impl BaselineSource + 'static) -> Self {
        self.baseline = Box::new(baseline);
        self
    }

    pub fn with_merger(mut self, merger: impl FragmentMerger + 'static) -> Self {
        self.merger = Box::new(merger);
        self
    }

    pub fn with_resolver(mut self, resolver: impl DependencyResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_persister(mut self, persister: impl SnapshotPersister + 'static) -> Self {
        self.persister = Box::new(persister);
        self
    }
}
