//! Layered settings
//!
//! Settings are merged from four layers, later layers winning:
//! 1. Built-in defaults
//! 2. Host config (`$XDG_CONFIG_HOME/kfrag/config.toml`)
//! 3. Repo config (`./kfrag.toml`)
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;
mod settings;

pub use defaults::{host_kernel_arch, BuiltinDefaults};
pub use effective::{
    default_host_config_path, ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig,
    REPO_CONFIG_FILE,
};
pub use merge::{deep_merge, merge_layers};
pub use settings::{
    BaselineKind, BaselineSettings, MergeBackend, MergeSettings, ResolveBackend, ResolveSettings,
    Settings,
};
