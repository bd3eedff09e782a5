//! Kernel source tree collaborators
//!
//! These implementations invoke the kernel's own configuration tooling.
//! The `.config` inside the build output directory is the serialization
//! boundary: the snapshot is written there before a tool runs and read
//! back afterwards.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, info};

use super::{BaselineSource, CapabilityError, DependencyResolver, FragmentMerger};
use crate::fragment::Fragment;
use crate::snapshot::ConfigurationSnapshot;

/// Location of the merge helper inside a kernel tree
pub const MERGE_SCRIPT: &str = "scripts/kconfig/merge_config.sh";

/// Stderr lines kept from a failed tool
const STDERR_TAIL_LINES: usize = 40;

/// A kernel source tree and its out-of-tree build directory
#[derive(Debug, Clone)]
pub struct KernelTree {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub arch: String,
    pub make: String,
    pub cross_compile: Option<String>,
}

impl KernelTree {
    /// Both directories are made absolute because `make -C` changes the
    /// working directory before `O=` is interpreted.
    pub fn new(
        source_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        arch: impl Into<String>,
    ) -> io::Result<Self> {
        Ok(Self {
            source_dir: absolute(source_dir.as_ref())?,
            output_dir: absolute(output_dir.as_ref())?,
            arch: arch.into(),
            make: "make".to_string(),
            cross_compile: None,
        })
    }

    pub fn with_make(mut self, make: impl Into<String>) -> Self {
        self.make = make.into();
        self
    }

    pub fn with_cross_compile(mut self, prefix: Option<String>) -> Self {
        self.cross_compile = prefix;
        self
    }

    /// `<output_dir>/.config`
    pub fn config_path(&self) -> PathBuf {
        self.output_dir.join(".config")
    }

    /// Arguments for `make <target>` against this tree
    pub fn make_args(&self, target: &str) -> Vec<String> {
        let mut args = vec![
            "-C".to_string(),
            self.source_dir.display().to_string(),
            format!("O={}", self.output_dir.display()),
            format!("ARCH={}", self.arch),
        ];
        if let Some(ref prefix) = self.cross_compile {
            args.push(format!("CROSS_COMPILE={}", prefix));
        }
        args.push(target.to_string());
        args
    }

    fn run_make(&self, target: &str) -> Result<Output, CapabilityError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let mut command = Command::new(&self.make);
        command.args(self.make_args(target));
        run_tool(&self.make, &mut command)
    }

    fn read_config(&self) -> Result<ConfigurationSnapshot, CapabilityError> {
        let path = self.config_path();
        if !path.is_file() {
            return Err(CapabilityError::MissingBaseline { path });
        }
        Ok(ConfigurationSnapshot::load(&path)?)
    }
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

/// Run a tool to completion, mapping spawn and exit failures.
pub(crate) fn run_tool(program: &str, command: &mut Command) -> Result<Output, CapabilityError> {
    debug!(command = ?command, "running tool");

    let output = command.output().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CapabilityError::ToolNotFound {
            program: program.to_string(),
        },
        _ => CapabilityError::Io(e),
    })?;

    if !output.status.success() {
        return Err(CapabilityError::ToolFailed {
            program: program.to_string(),
            status: output.status.code(),
            stderr: tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_LINES),
        });
    }

    Ok(output)
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

/// Baseline produced by a make target such as `defconfig`
#[derive(Debug, Clone)]
pub struct DefconfigBaseline {
    pub tree: KernelTree,
    pub target: String,
}

impl DefconfigBaseline {
    pub fn new(tree: KernelTree, target: impl Into<String>) -> Self {
        Self {
            tree,
            target: target.into(),
        }
    }
}

impl BaselineSource for DefconfigBaseline {
    fn describe(&self) -> String {
        format!("make {} (ARCH={})", self.target, self.tree.arch)
    }

    fn load_baseline(&self) -> Result<ConfigurationSnapshot, CapabilityError> {
        info!(make_target = %self.target, arch = %self.tree.arch, "generating baseline");
        self.tree.run_make(&self.target)?;
        self.tree.read_config()
    }
}

/// Merges through the kernel's `merge_config.sh` helper
#[derive(Debug, Clone)]
pub struct MergeScript {
    pub tree: KernelTree,
    pub script: PathBuf,
}

impl MergeScript {
    /// Use the helper shipped in the tree
    pub fn new(tree: KernelTree) -> Self {
        let script = tree.source_dir.join(MERGE_SCRIPT);
        Self { tree, script }
    }

    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = script.into();
        self
    }

    /// Arguments passed to `sh`
    pub fn script_args(&self, fragment: &Path) -> Vec<String> {
        vec![
            self.script.display().to_string(),
            "-m".to_string(),
            "-O".to_string(),
            self.tree.output_dir.display().to_string(),
            self.tree.config_path().display().to_string(),
            fragment.display().to_string(),
        ]
    }
}

impl FragmentMerger for MergeScript {
    fn describe(&self) -> String {
        self.script.display().to_string()
    }

    fn merge(
        &self,
        snapshot: ConfigurationSnapshot,
        fragment: &Fragment,
    ) -> Result<ConfigurationSnapshot, CapabilityError> {
        if !self.script.is_file() {
            return Err(CapabilityError::ToolNotFound {
                program: self.script.display().to_string(),
            });
        }

        snapshot.write(&self.tree.config_path())?;

        // Relative to our working directory, not the source tree.
        let fragment_path = absolute(&fragment.path)?;
        let mut command = Command::new("sh");
        command
            .args(self.script_args(&fragment_path))
            .current_dir(&self.tree.source_dir)
            .env("ARCH", &self.tree.arch);
        let program = self.script.display().to_string();
        run_tool(&program, &mut command)?;

        self.tree.read_config()
    }
}

/// Dependency resolution through a make target such as `olddefconfig`
#[derive(Debug, Clone)]
pub struct MakeResolver {
    pub tree: KernelTree,
    pub target: String,
}

impl MakeResolver {
    pub fn new(tree: KernelTree, target: impl Into<String>) -> Self {
        Self {
            tree,
            target: target.into(),
        }
    }
}

impl DependencyResolver for MakeResolver {
    fn describe(&self) -> String {
        format!("make {}", self.target)
    }

    fn resolve(
        &self,
        snapshot: ConfigurationSnapshot,
    ) -> Result<ConfigurationSnapshot, CapabilityError> {
        snapshot.write(&self.tree.config_path())?;
        self.tree.run_make(&self.target)?;
        self.tree.read_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kfrag_grammar::OptionValue;
    use tempfile::TempDir;

    fn tree(dir: &TempDir) -> KernelTree {
        KernelTree::new(dir.path().join("linux"), dir.path().join("build"), "x86_64").unwrap()
    }

    #[test]
    fn test_make_args() {
        let dir = TempDir::new().unwrap();
        let tree = tree(&dir).with_cross_compile(Some("aarch64-linux-gnu-".to_string()));
        let args = tree.make_args("defconfig");
        assert_eq!(args[0], "-C");
        assert!(args[2].starts_with("O=/"));
        assert_eq!(args[3], "ARCH=x86_64");
        assert_eq!(args[4], "CROSS_COMPILE=aarch64-linux-gnu-");
        assert_eq!(args[5], "defconfig");
    }

    #[test]
    fn test_relative_dirs_become_absolute() {
        let tree = KernelTree::new("linux", "build", "arm64").unwrap();
        assert!(tree.source_dir.is_absolute());
        assert!(tree.output_dir.is_absolute());
        assert!(tree.config_path().ends_with("build/.config"));
    }

    #[test]
    fn test_missing_make_is_tool_not_found() {
        let dir = TempDir::new().unwrap();
        let tree = tree(&dir).with_make("kfrag-test-no-such-make");
        let result = DefconfigBaseline::new(tree, "defconfig").load_baseline();
        assert!(matches!(result, Err(CapabilityError::ToolNotFound { .. })));
    }

    #[test]
    fn test_missing_merge_script() {
        let dir = TempDir::new().unwrap();
        let merger = MergeScript::new(tree(&dir));
        let fragment = Fragment::from_text("a.config", "CONFIG_A=y\n").unwrap();
        let result = merger.merge(ConfigurationSnapshot::new(), &fragment);
        assert!(matches!(result, Err(CapabilityError::ToolNotFound { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_merge_script_round_trip_through_config_file() {
        let dir = TempDir::new().unwrap();
        let tree = tree(&dir);
        std::fs::create_dir_all(&tree.source_dir).unwrap();

        // Stand-in helper: append the fragment to the base config in place.
        let script = dir.path().join("merge.sh");
        std::fs::write(&script, "#!/bin/sh\nshift 3\ncat \"$2\" >> \"$1\"\n").unwrap();

        let fragment_path = dir.path().join("kasan.config");
        std::fs::write(&fragment_path, "CONFIG_KASAN=y\n").unwrap();
        let fragment = Fragment::load(&fragment_path).unwrap();

        let mut base = ConfigurationSnapshot::new();
        base.set("CONFIG_KVM", OptionValue::Module);

        let merged = MergeScript::new(tree).with_script(&script).merge(base, &fragment).unwrap();
        assert_eq!(merged.get("CONFIG_KVM"), Some(&OptionValue::Module));
        assert_eq!(merged.get("CONFIG_KASAN"), Some(&OptionValue::Enabled));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_merge_script_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let tree = tree(&dir);
        std::fs::create_dir_all(&tree.source_dir).unwrap();

        let script = dir.path().join("merge.sh");
        std::fs::write(&script, "#!/bin/sh\necho 'cannot merge' >&2\nexit 3\n").unwrap();
        let fragment = Fragment::from_text(dir.path().join("x.config"), "CONFIG_X=y\n").unwrap();

        let err = MergeScript::new(tree)
            .with_script(&script)
            .merge(ConfigurationSnapshot::new(), &fragment)
            .unwrap_err();
        match err {
            CapabilityError::ToolFailed { status, stderr, .. } => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "cannot merge");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
    }
}
