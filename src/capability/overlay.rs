//! In-process capability implementations

use std::path::PathBuf;

use tracing::debug;

use super::{BaselineSource, CapabilityError, DependencyResolver, FragmentMerger};
use crate::fragment::Fragment;
use crate::snapshot::ConfigurationSnapshot;

/// Baseline with no options set
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyBaseline;

impl BaselineSource for EmptyBaseline {
    fn describe(&self) -> String {
        "empty".to_string()
    }

    fn load_baseline(&self) -> Result<ConfigurationSnapshot, CapabilityError> {
        Ok(ConfigurationSnapshot::new())
    }
}

/// Baseline read from an existing `.config` file
#[derive(Debug, Clone)]
pub struct FileBaseline {
    pub path: PathBuf,
}

impl FileBaseline {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BaselineSource for FileBaseline {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn load_baseline(&self) -> Result<ConfigurationSnapshot, CapabilityError> {
        if !self.path.is_file() {
            return Err(CapabilityError::MissingBaseline {
                path: self.path.clone(),
            });
        }
        Ok(ConfigurationSnapshot::load(&self.path)?)
    }
}

/// Key/value overlay with no dependency awareness
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayMerger;

impl FragmentMerger for OverlayMerger {
    fn describe(&self) -> String {
        "builtin overlay".to_string()
    }

    fn merge(
        &self,
        snapshot: ConfigurationSnapshot,
        fragment: &Fragment,
    ) -> Result<ConfigurationSnapshot, CapabilityError> {
        let (merged, overrides) = snapshot.overlay(&fragment.directives);
        debug!(
            fragment = %fragment.name(),
            overrides = overrides.len(),
            "overlay applied"
        );
        Ok(merged)
    }
}

/// Leaves the snapshot untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl DependencyResolver for IdentityResolver {
    fn describe(&self) -> String {
        "none".to_string()
    }

    fn resolve(
        &self,
        snapshot: ConfigurationSnapshot,
    ) -> Result<ConfigurationSnapshot, CapabilityError> {
        Ok(snapshot)
    }
}

/// Fills options absent from the snapshot from a fixed table.
///
/// Options already present, including explicitly disabled ones, are kept.
#[derive(Debug, Clone, Default)]
pub struct DefaultTableResolver {
    pub defaults: ConfigurationSnapshot,
}

impl DefaultTableResolver {
    pub fn new(defaults: ConfigurationSnapshot) -> Self {
        Self { defaults }
    }
}

impl DependencyResolver for DefaultTableResolver {
    fn describe(&self) -> String {
        format!("default table ({} options)", self.defaults.len())
    }

    fn resolve(
        &self,
        mut snapshot: ConfigurationSnapshot,
    ) -> Result<ConfigurationSnapshot, CapabilityError> {
        for (name, value) in self.defaults.iter() {
            if !snapshot.contains(name) {
                snapshot.set(name, value.clone());
            }
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kfrag_grammar::OptionValue;
    use tempfile::TempDir;

    #[test]
    fn test_empty_baseline() {
        assert!(EmptyBaseline.load_baseline().unwrap().is_empty());
    }

    #[test]
    fn test_file_baseline_missing() {
        let dir = TempDir::new().unwrap();
        let baseline = FileBaseline::new(dir.path().join(".config"));
        assert!(matches!(
            baseline.load_baseline(),
            Err(CapabilityError::MissingBaseline { .. })
        ));
    }

    #[test]
    fn test_file_baseline_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".config");
        std::fs::write(&path, "CONFIG_KVM=y\n# CONFIG_EXPERT is not set\n").unwrap();
        let snapshot = FileBaseline::new(&path).load_baseline().unwrap();
        assert_eq!(snapshot.get("CONFIG_KVM"), Some(&OptionValue::Enabled));
        assert_eq!(snapshot.get("CONFIG_EXPERT"), Some(&OptionValue::Disabled));
    }

    #[test]
    fn test_overlay_merger() {
        let fragment = Fragment::from_text("a.config", "CONFIG_A=m\n").unwrap();
        let merged = OverlayMerger
            .merge(ConfigurationSnapshot::new(), &fragment)
            .unwrap();
        assert_eq!(merged.get("CONFIG_A"), Some(&OptionValue::Module));
    }

    #[test]
    fn test_default_table_fills_only_missing() {
        let mut defaults = ConfigurationSnapshot::new();
        defaults.set("CONFIG_A", OptionValue::Enabled);
        defaults.set("CONFIG_B", OptionValue::Int(100));

        let mut snapshot = ConfigurationSnapshot::new();
        snapshot.set("CONFIG_A", OptionValue::Disabled);

        let resolved = DefaultTableResolver::new(defaults).resolve(snapshot).unwrap();
        assert_eq!(resolved.get("CONFIG_A"), Some(&OptionValue::Disabled));
        assert_eq!(resolved.get("CONFIG_B"), Some(&OptionValue::Int(100)));
    }
}
