//! Typed view of the merged settings
//!
//! The merged JSON object is deserialized into [`Settings`], checked, and
//! turned into the concrete collaborators a pipeline runs against.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::effective::ConfigError;
use crate::capability::{
    AuditTrail, Capabilities, DefconfigBaseline, EmptyBaseline, FileBaseline, IdentityResolver,
    KernelTree, MakeResolver, MergeScript, OverlayMerger,
};
use crate::fragment::{discover, DEFAULT_FRAGMENT_GLOB};

/// Where the starting snapshot comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineKind {
    /// `make <target>` in the kernel tree
    Make,
    /// An existing `.config` file
    File,
    /// No baseline at all
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeBackend {
    /// `scripts/kconfig/merge_config.sh`
    Script,
    /// In-process key/value overlay
    Builtin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveBackend {
    Make,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineSettings {
    pub kind: BaselineKind,

    #[serde(default = "default_baseline_target")]
    pub target: String,

    /// Required when `kind = "file"`
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeSettings {
    pub backend: MergeBackend,

    /// Override the helper location inside the kernel tree
    #[serde(default)]
    pub script: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveSettings {
    pub backend: ResolveBackend,

    #[serde(default = "default_resolve_target")]
    pub target: String,
}

fn default_baseline_target() -> String {
    "defconfig".to_string()
}

fn default_resolve_target() -> String {
    "olddefconfig".to_string()
}

fn default_fragment_glob() -> String {
    DEFAULT_FRAGMENT_GLOB.to_string()
}

/// Settings after all layers are merged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub arch: String,
    pub kernel_dir: PathBuf,
    pub output_dir: PathBuf,

    /// Directory for audit copies (default: `output_dir`)
    #[serde(default)]
    pub audit_dir: Option<PathBuf>,

    pub make: String,

    #[serde(default)]
    pub cross_compile: Option<String>,

    pub baseline: BaselineSettings,
    pub merge: MergeSettings,
    pub resolve: ResolveSettings,

    /// Explicit fragments, applied after any discovered ones
    #[serde(default)]
    pub fragments: Vec<PathBuf>,

    #[serde(default)]
    pub fragment_dir: Option<PathBuf>,

    #[serde(default = "default_fragment_glob")]
    pub fragment_glob: String,
}

impl Settings {
    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arch.trim().is_empty() {
            return Err(ConfigError::ValidationError("arch must not be empty".to_string()));
        }
        if self.make.trim().is_empty() {
            return Err(ConfigError::ValidationError("make must not be empty".to_string()));
        }
        if self.baseline.kind == BaselineKind::File && self.baseline.file.is_none() {
            return Err(ConfigError::ValidationError(
                "baseline.kind = \"file\" requires baseline.file".to_string(),
            ));
        }
        if self.baseline.kind == BaselineKind::Make && self.baseline.target.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "baseline.target must not be empty".to_string(),
            ));
        }
        if self.resolve.backend == ResolveBackend::Make && self.resolve.target.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "resolve.target must not be empty".to_string(),
            ));
        }
        if self.fragment_glob.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "fragment_glob must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Fragments in application order: those found in `fragment_dir`
    /// (sorted by file name), then the explicit list.
    pub fn fragment_paths(&self) -> Result<Vec<PathBuf>, ConfigError> {
        let mut paths = Vec::new();
        if let Some(ref dir) = self.fragment_dir {
            let found = discover(dir, &self.fragment_glob)
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
            paths.extend(found);
        }
        paths.extend(self.fragments.iter().cloned());
        Ok(paths)
    }

    /// `<output_dir>/.config`
    pub fn output_config(&self) -> PathBuf {
        self.output_dir.join(".config")
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.audit_dir.clone().unwrap_or_else(|| self.output_dir.clone())
    }

    fn kernel_tree(&self) -> Result<KernelTree, ConfigError> {
        let tree = KernelTree::new(&self.kernel_dir, &self.output_dir, &self.arch)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", self.kernel_dir.display(), e)))?;
        Ok(tree
            .with_make(&self.make)
            .with_cross_compile(self.cross_compile.clone()))
    }

    /// Build the collaborators these settings select
    pub fn capabilities(&self) -> Result<Capabilities, ConfigError> {
        let mut caps = Capabilities::in_process(self.audit_dir());

        match self.baseline.kind {
            BaselineKind::Make => {
                caps = caps.with_baseline(DefconfigBaseline::new(
                    self.kernel_tree()?,
                    &self.baseline.target,
                ));
            }
            BaselineKind::File => {
                // validate() guarantees the path is present
                let file = self.baseline.file.clone().ok_or_else(|| {
                    ConfigError::ValidationError("baseline.file is not set".to_string())
                })?;
                caps = caps.with_baseline(FileBaseline::new(file));
            }
            BaselineKind::Empty => {
                caps = caps.with_baseline(EmptyBaseline);
            }
        }

        match self.merge.backend {
            MergeBackend::Script => {
                let mut script = MergeScript::new(self.kernel_tree()?);
                if let Some(ref path) = self.merge.script {
                    script = script.with_script(path);
                }
                caps = caps.with_merger(script);
            }
            MergeBackend::Builtin => {
                caps = caps.with_merger(OverlayMerger);
            }
        }

        match self.resolve.backend {
            ResolveBackend::Make => {
                caps = caps.with_resolver(MakeResolver::new(
                    self.kernel_tree()?,
                    &self.resolve.target,
                ));
            }
            ResolveBackend::None => {
                caps = caps.with_resolver(IdentityResolver);
            }
        }

        Ok(caps.with_persister(AuditTrail::new(self.audit_dir())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{BaselineSource, DependencyResolver, FragmentMerger};
    use crate::config::EffectiveConfig;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn settings_with(cli: serde_json::Value) -> Result<Settings, ConfigError> {
        EffectiveConfig::build(None, None, Some(cli))?.settings()
    }

    #[test]
    fn test_defaults_deserialize() {
        let settings = settings_with(json!({})).unwrap();
        assert_eq!(settings.baseline.kind, BaselineKind::Make);
        assert_eq!(settings.merge.backend, MergeBackend::Script);
        assert_eq!(settings.resolve.backend, ResolveBackend::Make);
        assert_eq!(settings.output_config(), PathBuf::from("build/.config"));
        assert_eq!(settings.audit_dir(), PathBuf::from("build"));
    }

    #[test]
    fn test_file_baseline_requires_path() {
        let result = settings_with(json!({"baseline": {"kind": "file"}}));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = settings_with(json!({"merge": {"backend": "magic"}}));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_in_process_selection() {
        let settings = settings_with(json!({
            "baseline": {"kind": "empty"},
            "merge": {"backend": "builtin"},
            "resolve": {"backend": "none"},
            "audit_dir": "audit"
        }))
        .unwrap();
        assert_eq!(settings.audit_dir(), PathBuf::from("audit"));

        let caps = settings.capabilities().unwrap();
        assert_eq!(caps.baseline.describe(), EmptyBaseline.describe());
        assert_eq!(caps.merger.describe(), OverlayMerger.describe());
        assert_eq!(caps.resolver.describe(), IdentityResolver.describe());
    }

    #[test]
    fn test_fragment_paths_discovered_first() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("20-debug.config"), "CONFIG_A=y\n").unwrap();
        fs::write(dir.path().join("10-base.config"), "CONFIG_B=y\n").unwrap();
        fs::write(dir.path().join("README"), "notes\n").unwrap();

        let settings = settings_with(json!({
            "fragment_dir": dir.path(),
            "fragments": ["local.config"]
        }))
        .unwrap();

        let paths = settings.fragment_paths().unwrap();
        assert_eq!(
            paths,
            vec![
                dir.path().join("10-base.config"),
                dir.path().join("20-debug.config"),
                PathBuf::from("local.config"),
            ]
        );
    }

    #[test]
    fn test_missing_fragment_dir() {
        let settings = settings_with(json!({"fragment_dir": "/nonexistent/fragments"})).unwrap();
        assert!(settings.fragment_paths().is_err());
    }
}
