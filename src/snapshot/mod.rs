//! Configuration snapshot
//!
//! The accumulated mapping from option name to value. A snapshot is
//! threaded by value through every merge step; the on-disk `.config`
//! file is only its serialization boundary.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use kfrag_grammar::{render_option, Directive, LineDefect, OptionValue};
use serde::{Deserialize, Serialize};

/// Header written at the top of rendered snapshots.
const HEADER: &str = "#\n# Automatically generated file; DO NOT EDIT.\n# Merged by kfrag\n#\n";

/// Mapping from option name to value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationSnapshot {
    options: BTreeMap<String, OptionValue>,
}

/// An option whose value was redefined by a later directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    pub name: String,
    pub previous: OptionValue,
    pub new: OptionValue,
}

/// Difference between two snapshots for one option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "lowercase")]
pub enum OptionChange {
    Added {
        name: String,
        value: OptionValue,
    },
    Removed {
        name: String,
        value: OptionValue,
    },
    Changed {
        name: String,
        from: OptionValue,
        to: OptionValue,
    },
}

impl OptionChange {
    /// Option name this change refers to
    pub fn name(&self) -> &str {
        match self {
            OptionChange::Added { name, .. }
            | OptionChange::Removed { name, .. }
            | OptionChange::Changed { name, .. } => name,
        }
    }

    /// One-line human rendering, in the style of `diffconfig`
    pub fn to_human(&self) -> String {
        match self {
            OptionChange::Added { name, value } => format!("+{} {}", name, value),
            OptionChange::Removed { name, value } => format!("-{} {}", name, value),
            OptionChange::Changed { name, from, to } => format!(" {} {} -> {}", name, from, to),
        }
    }
}

/// Errors reading or writing a snapshot file
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{path} has {} malformed line(s)", .defects.len())]
    Malformed {
        path: String,
        defects: Vec<LineDefect>,
    },
}

impl SnapshotError {
    /// Offending lines of a malformed file; empty for IO errors
    pub fn defects(&self) -> &[LineDefect] {
        match self {
            SnapshotError::Malformed { defects, .. } => defects,
            SnapshotError::Io { .. } => &[],
        }
    }
}

impl ConfigurationSnapshot {
    /// Empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `.config` text.
    ///
    /// The fragment grammar applies, widened to accept the hex values the
    /// kernel tools write. Comments other than negations are dropped.
    pub fn parse(text: &str) -> Result<Self, Vec<LineDefect>> {
        let result = kfrag_grammar::validate_generated(text);
        if !result.accepted {
            return Err(result.defects);
        }
        let (snapshot, _) = Self::new().overlay(&result.into_directives());
        Ok(snapshot)
    }

    /// Read and parse a `.config` file
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let text = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text).map_err(|defects| SnapshotError::Malformed {
            path: path.display().to_string(),
            defects,
        })
    }

    /// Render in `.config` format, options in name order
    pub fn render(&self) -> String {
        let mut out = String::from(HEADER);
        for (name, value) in &self.options {
            out.push_str(&render_option(name, value));
            out.push('\n');
        }
        out
    }

    /// Write the rendered snapshot, creating parent directories
    pub fn write(&self, path: &Path) -> Result<(), SnapshotError> {
        let io_err = |source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        fs::write(path, self.render()).map_err(io_err)
    }

    /// Apply directives in order; the last directive for a name wins.
    ///
    /// Returns the new snapshot and every redefinition of an existing
    /// option to a different value.
    pub fn overlay(mut self, directives: &[Directive]) -> (Self, Vec<Override>) {
        let overrides = self.redefinitions(directives);
        for directive in directives {
            self.options
                .insert(directive.name.clone(), directive.value.clone());
        }
        (self, overrides)
    }

    /// Redefinitions `directives` would cause, without applying them
    pub fn redefinitions(&self, directives: &[Directive]) -> Vec<Override> {
        let mut pending: BTreeMap<&str, &OptionValue> = BTreeMap::new();
        let mut overrides = Vec::new();
        for directive in directives {
            let previous = pending
                .get(directive.name.as_str())
                .copied()
                .or_else(|| self.options.get(&directive.name));
            if let Some(previous) = previous {
                if *previous != directive.value {
                    overrides.push(Override {
                        name: directive.name.clone(),
                        previous: previous.clone(),
                        new: directive.value.clone(),
                    });
                }
            }
            pending.insert(directive.name.as_str(), &directive.value);
        }
        overrides
    }

    /// Set a single option
    pub fn set(&mut self, name: impl Into<String>, value: OptionValue) -> Option<OptionValue> {
        self.options.insert(name.into(), value)
    }

    /// Look up an option
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    /// True if the option has any value, including disabled
    pub fn contains(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Options in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Changes needed to go from `self` to `other`, in name order
    pub fn diff(&self, other: &ConfigurationSnapshot) -> Vec<OptionChange> {
        let mut changes = Vec::new();
        for (name, value) in &self.options {
            match other.options.get(name) {
                None => changes.push(OptionChange::Removed {
                    name: name.clone(),
                    value: value.clone(),
                }),
                Some(new) if new != value => changes.push(OptionChange::Changed {
                    name: name.clone(),
                    from: value.clone(),
                    to: new.clone(),
                }),
                Some(_) => {}
            }
        }
        for (name, value) in &other.options {
            if !self.options.contains_key(name) {
                changes.push(OptionChange::Added {
                    name: name.clone(),
                    value: value.clone(),
                });
            }
        }
        changes.sort_by(|a, b| a.name().cmp(b.name()));
        changes
    }
}

impl FromIterator<(String, OptionValue)> for ConfigurationSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, OptionValue)>>(iter: I) -> Self {
        Self {
            options: iter.into_iter().collect(),
        }
    }
}
