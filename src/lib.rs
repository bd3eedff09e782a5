//! kconfig-fragments - validate and merge Linux kernel configuration fragments
//!
//! Fragments are small `.config` excerpts. This crate checks each one
//! against the Kconfig line grammar, applies them in order on top of a
//! baseline configuration, lets the kernel's own tooling resolve option
//! dependencies, and keeps a timestamped copy of every finalized result.

pub mod capability;
pub mod config;
pub mod fragment;
pub mod logging;
pub mod pipeline;
pub mod snapshot;
pub mod summary;

pub use capability::{
    BaselineSource, Capabilities, CapabilityError, DependencyResolver, FragmentMerger,
    SnapshotPersister,
};
pub use config::{ConfigError, EffectiveConfig, Settings};
pub use fragment::{validate_all, Fragment, FragmentError};
pub use kfrag_grammar::{Directive, OptionValue, ValidationResult};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineState};
pub use snapshot::{ConfigurationSnapshot, OptionChange};
pub use summary::{ExitCode, FailureKind, PipelineReport};
