//! Built-in defaults (layer 1)
//!
//! Hardcoded defaults for every setting.

use serde::{Deserialize, Serialize};

use crate::fragment::DEFAULT_FRAGMENT_GLOB;

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Kernel architecture (default: derived from the host)
    pub arch: String,

    /// Kernel source tree (default: ".")
    pub kernel_dir: String,

    /// Out-of-tree build directory (default: "build")
    pub output_dir: String,

    /// Make program (default: "make")
    pub make: String,

    /// Baseline source (default: "make")
    pub baseline_kind: String,

    /// Make target producing the baseline (default: "defconfig")
    pub baseline_target: String,

    /// Merge backend (default: "script")
    pub merge_backend: String,

    /// Resolve backend (default: "make")
    pub resolve_backend: String,

    /// Make target resolving unset options (default: "olddefconfig")
    pub resolve_target: String,

    /// Fragment file pattern inside a fragment directory
    pub fragment_glob: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            arch: host_kernel_arch().to_string(),
            kernel_dir: ".".to_string(),
            output_dir: "build".to_string(),
            make: "make".to_string(),
            baseline_kind: "make".to_string(),
            baseline_target: "defconfig".to_string(),
            merge_backend: "script".to_string(),
            resolve_backend: "make".to_string(),
            resolve_target: "olddefconfig".to_string(),
            fragment_glob: DEFAULT_FRAGMENT_GLOB.to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "arch": self.arch,
            "kernel_dir": self.kernel_dir,
            "output_dir": self.output_dir,
            "make": self.make,
            "baseline": {
                "kind": self.baseline_kind,
                "target": self.baseline_target
            },
            "merge": {
                "backend": self.merge_backend
            },
            "resolve": {
                "backend": self.resolve_backend,
                "target": self.resolve_target
            },
            "fragments": [],
            "fragment_glob": self.fragment_glob
        })
    }
}

/// Kernel `ARCH=` name for the machine we are running on
pub fn host_kernel_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x86_64",
        "x86" => "x86",
        "aarch64" => "arm64",
        "arm" => "arm",
        "riscv64" => "riscv",
        "powerpc64" => "powerpc",
        "s390x" => "s390",
        "loongarch64" => "loongarch",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.kernel_dir, ".");
        assert_eq!(defaults.output_dir, "build");
        assert_eq!(defaults.baseline_target, "defconfig");
        assert_eq!(defaults.resolve_target, "olddefconfig");
        assert_eq!(defaults.fragment_glob, "*.config");
        assert!(!defaults.arch.is_empty());
    }

    #[test]
    fn test_to_value() {
        let value = BuiltinDefaults::default().to_value();

        assert_eq!(value["baseline"]["kind"], "make");
        assert_eq!(value["merge"]["backend"], "script");
        assert_eq!(value["resolve"]["target"], "olddefconfig");
        assert!(value["fragments"].as_array().unwrap().is_empty());
    }
}
