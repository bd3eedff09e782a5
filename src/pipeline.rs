//! Fragment merge pipeline
//!
//! Runs one all-or-nothing invocation:
//! - Validate every fragment
//! - Load the baseline
//! - Merge fragments strictly in order (fail fast)
//! - Resolve unspecified options
//! - Write the finalized config and its timestamped audit copy
//!
//! ```text
//! Start -> Validated -> BaselineLoaded -> Merging(1..N) -> Resolved -> Persisted -> Done
//! ```
//!
//! Any failure moves the pipeline to the terminal `Failed` state. There is
//! no retry and no partial success.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, Utc};
use kfrag_grammar::OptionValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::capability::{Capabilities, CapabilityError, PersistedArtifact};
use crate::fragment::{self, Fragment, FragmentError};
use crate::snapshot::{ConfigurationSnapshot, SnapshotError};
use crate::summary::{
    ExitCode, FailureKind, FragmentOverride, FragmentRecord, PipelineReport, RequestedValueDrift,
    REPORT_SCHEMA_ID, REPORT_SCHEMA_VERSION,
};

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Start,
    Validated,
    BaselineLoaded,
    /// Applying fragment `index` of `total` (1-based)
    Merging { index: usize, total: usize },
    Resolved,
    Persisted,
    Done,
    Failed { kind: FailureKind },
}

impl PipelineState {
    /// Whether `next` is a legal successor of this state
    pub fn can_advance_to(&self, next: &PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Done, _) | (Failed { .. }, _) => false,
            (_, Failed { .. }) => true,
            (Start, Validated) => true,
            // Dry runs stop after validation.
            (Validated, Done) => true,
            (Validated, BaselineLoaded) => true,
            (BaselineLoaded, Merging { index: 1, total }) => *total >= 1,
            (BaselineLoaded, Resolved) => true,
            (Merging { index, total }, Merging { index: next, total: t }) => {
                t == total && *next == index + 1 && next <= t
            }
            (Merging { index, total }, Resolved) => index == total,
            (Resolved, Persisted) => true,
            (Persisted, Done) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed { .. })
    }
}

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{} fragment(s) failed validation", .errors.len())]
    Input { errors: Vec<FragmentError> },

    #[error("baseline unavailable: {0}")]
    Baseline(#[source] CapabilityError),

    #[error("merge failed at fragment {index}/{total} ({}): {source}", .fragment.display())]
    Merge {
        fragment: PathBuf,
        index: usize,
        total: usize,
        #[source]
        source: CapabilityError,
    },

    #[error("dependency resolution failed: {0}")]
    Resolution(#[source] CapabilityError),

    #[error("finalized configuration is empty")]
    EmptyResult,

    #[error("could not write {}: {source}", .path.display())]
    WriteConfig {
        path: PathBuf,
        #[source]
        source: SnapshotError,
    },

    #[error("audit copy failed: {0}")]
    Persist(#[source] CapabilityError),

    #[error("invalid state transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },
}

impl PipelineError {
    /// Failure category
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Input { .. } => FailureKind::Input,
            PipelineError::Merge { .. } => FailureKind::Merge,
            PipelineError::Baseline(_)
            | PipelineError::Resolution(_)
            | PipelineError::EmptyResult => FailureKind::Resolution,
            PipelineError::WriteConfig { .. } | PipelineError::Persist(_) => FailureKind::Persist,
            PipelineError::InvalidTransition { .. } => FailureKind::Internal,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        self.kind().exit_code()
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Fragment files, in application order
    pub fragments: Vec<PathBuf>,

    /// Where the finalized configuration is written
    pub output_config: PathBuf,

    /// Validate and report the plan without touching any collaborator
    pub dry_run: bool,
}

impl PipelineConfig {
    pub fn new(fragments: Vec<PathBuf>, output_config: impl Into<PathBuf>) -> Self {
        Self {
            fragments,
            output_config: output_config.into(),
            dry_run: false,
        }
    }
}

type Clock = Box<dyn Fn() -> NaiveDateTime>;

/// One pipeline invocation
pub struct Pipeline {
    config: PipelineConfig,
    capabilities: Capabilities,
    clock: Clock,
    run_id: String,
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig, capabilities: Capabilities) -> Self {
        Self {
            config,
            capabilities,
            clock: Box::new(|| Local::now().naive_local()),
            run_id: generate_run_id(),
            state: PipelineState::Start,
            history: vec![PipelineState::Start],
        }
    }

    /// Replace the clock used to timestamp the audit artifact
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// States visited so far
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Run the pipeline to `Done` or `Failed`.
    ///
    /// A pipeline runs once; calling this again after a terminal state
    /// returns `InvalidTransition`.
    pub fn run(&mut self) -> PipelineResult<PipelineReport> {
        let started_at = Utc::now();
        match self.execute(started_at) {
            Ok(report) => Ok(report),
            Err(e) => {
                let kind = e.kind();
                error!(run_id = %self.run_id, kind = ?kind, error = %e, "pipeline failed");
                if !self.state.is_terminal() {
                    self.state = PipelineState::Failed { kind };
                    self.history.push(self.state);
                }
                Err(e)
            }
        }
    }

    fn advance(&mut self, next: PipelineState) -> PipelineResult<()> {
        if !self.state.can_advance_to(&next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(from = ?self.state, to = ?next, "pipeline transition");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    fn execute(&mut self, started_at: chrono::DateTime<Utc>) -> PipelineResult<PipelineReport> {
        if self.state != PipelineState::Start {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: PipelineState::Validated,
            });
        }

        // 1. Validate every fragment before anything is merged
        let fragments = fragment::validate_all(&self.config.fragments)
            .map_err(|errors| PipelineError::Input { errors })?;
        self.advance(PipelineState::Validated)?;
        info!(run_id = %self.run_id, fragments = fragments.len(), "fragments validated");

        let mut report = self.new_report(started_at, &fragments);

        if self.config.dry_run {
            self.advance(PipelineState::Done)?;
            report.states = self.history.clone();
            report.finished_at = Utc::now();
            return Ok(report);
        }

        // 2. Baseline
        let mut snapshot = self
            .capabilities
            .baseline
            .load_baseline()
            .map_err(PipelineError::Baseline)?;
        report.baseline_options = snapshot.len();
        self.advance(PipelineState::BaselineLoaded)?;
        info!(baseline = %report.baseline, options = snapshot.len(), "baseline loaded");

        // 3. Merge in order; fragment i+1 sees the result of fragment i
        let total = fragments.len();
        for (i, fragment) in fragments.iter().enumerate() {
            let index = i + 1;
            self.advance(PipelineState::Merging { index, total })?;

            for o in snapshot.redefinitions(&fragment.directives) {
                info!(
                    fragment = %fragment.name(),
                    option = %o.name,
                    previous = %o.previous,
                    new = %o.new,
                    "option redefined"
                );
                report.overrides.push(FragmentOverride {
                    fragment: fragment.path.clone(),
                    name: o.name,
                    previous: o.previous,
                    new: o.new,
                });
            }

            snapshot = self
                .capabilities
                .merger
                .merge(snapshot, fragment)
                .map_err(|source| PipelineError::Merge {
                    fragment: fragment.path.clone(),
                    index,
                    total,
                    source,
                })?;
            info!(index, total, fragment = %fragment.name(), "fragment merged");
        }

        // 4. Resolve unspecified options
        snapshot = self
            .capabilities
            .resolver
            .resolve(snapshot)
            .map_err(PipelineError::Resolution)?;
        if snapshot.is_empty() {
            return Err(PipelineError::EmptyResult);
        }
        self.advance(PipelineState::Resolved)?;
        report.final_options = snapshot.len();

        report.drift = requested_value_drift(&fragments, &snapshot);
        for d in &report.drift {
            warn!(
                option = %d.name,
                requested = %d.requested,
                actual = ?d.actual.as_ref().map(|v| v.to_string()),
                fragment = %d.fragment.display(),
                "requested value not in final configuration"
            );
        }

        // 5. Finalize and persist
        write_if_changed(&snapshot, &self.config.output_config)?;
        let artifact: PersistedArtifact = self
            .capabilities
            .persister
            .persist(&self.config.output_config, (self.clock)())
            .map_err(PipelineError::Persist)?;
        self.advance(PipelineState::Persisted)?;

        report.output_config = Some(self.config.output_config.clone());
        report.artifact = Some(artifact);

        self.advance(PipelineState::Done)?;
        report.states = self.history.clone();
        report.finished_at = Utc::now();
        info!(run_id = %self.run_id, options = report.final_options, "pipeline done");
        Ok(report)
    }

    fn new_report(
        &self,
        started_at: chrono::DateTime<Utc>,
        fragments: &[Fragment],
    ) -> PipelineReport {
        PipelineReport {
            schema_version: REPORT_SCHEMA_VERSION,
            schema_id: REPORT_SCHEMA_ID.to_string(),
            run_id: self.run_id.clone(),
            started_at,
            finished_at: started_at,
            dry_run: self.config.dry_run,
            baseline: self.capabilities.baseline.describe(),
            merger: self.capabilities.merger.describe(),
            resolver: self.capabilities.resolver.describe(),
            persister: self.capabilities.persister.describe(),
            fragments: fragments
                .iter()
                .map(|f| FragmentRecord {
                    path: f.path.clone(),
                    digest: f.digest.clone(),
                    directives: f.directives.len(),
                })
                .collect(),
            baseline_options: 0,
            final_options: 0,
            overrides: Vec::new(),
            drift: Vec::new(),
            output_config: None,
            artifact: None,
            states: Vec::new(),
        }
    }
}

/// Write the finalized snapshot unless the file on disk already holds
/// exactly this configuration (a resolver that works in place leaves the
/// tool's own formatting untouched).
fn write_if_changed(snapshot: &ConfigurationSnapshot, path: &Path) -> PipelineResult<()> {
    if path.is_file() {
        if let Ok(existing) = ConfigurationSnapshot::load(path) {
            if existing == *snapshot {
                debug!(path = %path.display(), "finalized configuration already on disk");
                return Ok(());
            }
        }
    }
    snapshot
        .write(path)
        .map_err(|source| PipelineError::WriteConfig {
            path: path.to_path_buf(),
            source,
        })
}

/// Compare the last request for every option against the final snapshot.
///
/// A disabled request is satisfied by an absent option.
pub fn requested_value_drift(
    fragments: &[Fragment],
    snapshot: &ConfigurationSnapshot,
) -> Vec<RequestedValueDrift> {
    let mut requested: BTreeMap<&str, (&OptionValue, &Path)> = BTreeMap::new();
    for fragment in fragments {
        for d in &fragment.directives {
            requested.insert(d.name.as_str(), (&d.value, fragment.path.as_path()));
        }
    }

    requested
        .into_iter()
        .filter_map(|(name, (value, path))| {
            let actual = snapshot.get(name);
            let satisfied = match actual {
                Some(a) => a == value,
                None => value.is_disabled(),
            };
            if satisfied {
                None
            } else {
                Some(RequestedValueDrift {
                    name: name.to_string(),
                    fragment: path.to_path_buf(),
                    requested: value.clone(),
                    actual: actual.cloned(),
                })
            }
        })
        .collect()
}

/// Generate a new run_id using ULID (sortable, filesystem-safe)
pub fn generate_run_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}
