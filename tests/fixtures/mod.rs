//! Shared test fixtures
//!
//! - Grammar corpus (single lines and their expected classification)
//! - Fragment files used by the pipeline scenarios
//! - A stand-in kernel tree whose tools are small shell scripts

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Path to the grammar corpus fixture
pub fn grammar_corpus_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/grammar_corpus/corpus.json")
}

/// Directory holding the fragment fixtures
pub fn fragments_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/fragments")
}

/// A fragment fixture by file name
pub fn fragment(name: &str) -> PathBuf {
    fragments_dir().join(name)
}

/// Expected classification of one corpus line
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LineExpectation {
    Blank,
    Comment,
    Directive { name: String, value: String },
    Defect { code: String },
}

/// Grammar test case from corpus.json
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GrammarTestCase {
    pub id: String,
    pub line: String,
    pub expected: LineExpectation,
}

/// Full grammar corpus
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GrammarCorpus {
    pub schema_version: u32,
    pub description: String,
    pub test_cases: Vec<GrammarTestCase>,
}

impl GrammarCorpus {
    /// Load corpus from the fixture file
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(grammar_corpus_path())?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Write an executable shell script
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, format!("#!/bin/sh\n{}", body)).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

/// Stand-in for `make`: `defconfig` writes a small baseline, hex values
/// included, to `O=/.config`,
/// `olddefconfig` appends defaults for options the config does not mention.
#[cfg(unix)]
pub const FAKE_MAKE: &str = r#"out=""
target=""
for arg in "$@"; do
  case "$arg" in
    O=*) out="${arg#O=}" ;;
    -C|ARCH=*|CROSS_COMPILE=*) ;;
    -*) ;;
    *) target="$arg" ;;
  esac
done
mkdir -p "$out"
case "$target" in
  defconfig)
    printf 'CONFIG_64BIT=y\nCONFIG_KVM=y\n# CONFIG_KASAN is not set\nCONFIG_RANDOMIZE_BASE=y\nCONFIG_PHYSICAL_START=0x1000000\nCONFIG_ILLEGAL_POINTER_VALUE=0xdead000000000000\n' > "$out/.config"
    ;;
  olddefconfig)
    grep -q '^CONFIG_PRINTK[=]' "$out/.config" || echo 'CONFIG_PRINTK=y' >> "$out/.config"
    ;;
  *)
    echo "make: *** No rule to make target '$target'." >&2
    exit 2
    ;;
esac
"#;

/// Stand-in for `merge_config.sh -m -O <out> <base> <fragment>`: later
/// lines for a name replace earlier ones.
#[cfg(unix)]
pub const FAKE_MERGE_SCRIPT: &str = r##"shift 3
base="$1"
frag="$2"
tmp="$base.tmp"
cp "$base" "$tmp"
while IFS= read -r line || [ -n "$line" ]; do
  case "$line" in
    "# "*" is not set") name="${line#\# }"; name="${name% is not set}" ;;
    \#*|"") continue ;;
    *=*) name="${line%%=*}" ;;
    *) continue ;;
  esac
  grep -v -e "^$name=" -e "^# $name is not set\$" "$tmp" > "$tmp.2" || true
  mv "$tmp.2" "$tmp"
  echo "$line" >> "$tmp"
done < "$frag"
mv "$tmp" "$base"
"##;

/// A kernel tree with stand-in tools, rooted in `root`
#[cfg(unix)]
pub struct FakeKernelTree {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub make: PathBuf,
}

#[cfg(unix)]
impl FakeKernelTree {
    pub fn create(root: &Path) -> Self {
        let source_dir = root.join("linux");
        let output_dir = root.join("build");
        let make = root.join("bin/make");
        write_script(&make, FAKE_MAKE);
        write_script(
            &source_dir.join("scripts/kconfig/merge_config.sh"),
            FAKE_MERGE_SCRIPT,
        );
        Self {
            source_dir,
            output_dir,
            make,
        }
    }
}
