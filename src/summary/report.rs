//! Pipeline report (pipeline_report.json)

use chrono::{DateTime, Utc};
use kfrag_grammar::OptionValue;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::capability::PersistedArtifact;
use crate::pipeline::PipelineState;

/// Schema version for pipeline_report.json
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for pipeline_report.json
pub const REPORT_SCHEMA_ID: &str = "kfrag/pipeline_report@1";

/// A fragment that took part in the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentRecord {
    pub path: PathBuf,
    /// SHA-256 of the raw fragment bytes
    pub digest: String,
    pub directives: usize,
}

/// An option redefined by a fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentOverride {
    /// Fragment that redefined the option
    pub fragment: PathBuf,
    pub name: String,
    pub previous: OptionValue,
    pub new: OptionValue,
}

/// A requested value that did not survive dependency resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedValueDrift {
    pub name: String,
    /// Fragment holding the last request for the option
    pub fragment: PathBuf,
    pub requested: OptionValue,
    /// None when resolution dropped the option entirely
    pub actual: Option<OptionValue>,
}

/// Outcome of a successful pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// Run identifier (ULID)
    pub run_id: String,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// True when only validation ran
    pub dry_run: bool,

    /// Collaborator descriptions
    pub baseline: String,
    pub merger: String,
    pub resolver: String,

    /// Where audit copies go
    pub persister: String,

    /// Fragments in application order
    pub fragments: Vec<FragmentRecord>,

    /// Options in the baseline snapshot
    pub baseline_options: usize,

    /// Options in the finalized snapshot
    pub final_options: usize,

    /// Redefinitions across baseline and fragments
    pub overrides: Vec<FragmentOverride>,

    /// Requested values changed by resolution
    pub drift: Vec<RequestedValueDrift>,

    /// Finalized configuration handed to the build
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_config: Option<PathBuf>,

    /// Audit copy of the finalized configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PersistedArtifact>,

    /// States visited, in order
    pub states: Vec<PipelineState>,
}

impl PipelineReport {
    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            )
        })?;
        fs::write(path, json)
    }

    /// Wall-clock duration in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Multi-line human summary
    pub fn to_human(&self) -> String {
        let mut out = String::new();
        if self.dry_run {
            let _ = writeln!(out, "Plan (dry run, run {}):", self.run_id);
            let _ = writeln!(out, "  Baseline: {}", self.baseline);
            for (i, f) in self.fragments.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {}. {} ({} directive(s))",
                    i + 1,
                    f.path.display(),
                    f.directives
                );
            }
            let _ = writeln!(out, "  Merge: {}", self.merger);
            let _ = writeln!(out, "  Resolve: {}", self.resolver);
            let _ = writeln!(out, "  Audit copies: {}", self.persister);
            return out;
        }

        let _ = writeln!(
            out,
            "Run {}: {} fragment(s) merged in {}ms",
            self.run_id,
            self.fragments.len(),
            self.duration_ms()
        );
        let _ = writeln!(
            out,
            "  Options: {} baseline -> {} final",
            self.baseline_options, self.final_options
        );
        if !self.overrides.is_empty() {
            let _ = writeln!(out, "  Redefined: {}", self.overrides.len());
        }
        for d in &self.drift {
            let actual = d
                .actual
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "<absent>".to_string());
            let _ = writeln!(
                out,
                "  Requested {}={} ({}), got {}",
                d.name,
                d.requested,
                d.fragment.display(),
                actual
            );
        }
        if let Some(ref path) = self.output_config {
            let _ = writeln!(out, "  Config: {}", path.display());
        }
        if let Some(ref artifact) = self.artifact {
            let _ = writeln!(out, "  Audit copy: {}", artifact.path.display());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> PipelineReport {
        let now = Utc::now();
        PipelineReport {
            schema_version: REPORT_SCHEMA_VERSION,
            schema_id: REPORT_SCHEMA_ID.to_string(),
            run_id: "01hx".to_string(),
            started_at: now,
            finished_at: now,
            dry_run: false,
            baseline: "empty".to_string(),
            merger: "builtin overlay".to_string(),
            resolver: "none".to_string(),
            persister: "build".to_string(),
            fragments: vec![FragmentRecord {
                path: PathBuf::from("kasan.config"),
                digest: "00".repeat(32),
                directives: 2,
            }],
            baseline_options: 0,
            final_options: 2,
            overrides: vec![],
            drift: vec![RequestedValueDrift {
                name: "CONFIG_KASAN".to_string(),
                fragment: PathBuf::from("kasan.config"),
                requested: OptionValue::Enabled,
                actual: None,
            }],
            output_config: Some(PathBuf::from("build/.config")),
            artifact: None,
            states: vec![PipelineState::Start, PipelineState::Done],
        }
    }

    #[test]
    fn test_serialization() {
        let json = report().to_json().unwrap();
        assert!(json.contains("\"schema_id\": \"kfrag/pipeline_report@1\""));
        assert!(json.contains("\"final_options\": 2"));
        assert!(!json.contains("\"artifact\""));
    }

    #[test]
    fn test_human_mentions_drift() {
        let human = report().to_human();
        assert!(human.starts_with("Run 01hx: 1 fragment(s) merged in 0ms\n"));
        assert!(human.contains("Requested CONFIG_KASAN=y (kasan.config), got <absent>"));
        assert!(human.contains("Config: build/.config"));
    }

    #[test]
    fn test_dry_run_human_lists_plan() {
        let mut r = report();
        r.dry_run = true;
        let human = r.to_human();
        assert!(human.starts_with("Plan (dry run"));
        assert!(human.contains("1. kasan.config (2 directive(s))"));
        assert!(human.contains("Audit copies: build\n"));
    }
}
