//! Failure taxonomy and stable exit codes

use serde::{Deserialize, Serialize};

/// Failure kind - categorizes why a pipeline invocation aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Tool settings could not be loaded or are invalid
    Config,
    /// Fragment missing, unreadable or malformed
    Input,
    /// The merge collaborator rejected a fragment
    Merge,
    /// Baseline generation or dependency resolution failed
    Resolution,
    /// Final configuration or audit copy could not be written
    Persist,
    /// Pipeline attempted an illegal state transition
    Internal,
}

impl FailureKind {
    /// Get the stable exit code for this failure kind
    pub fn exit_code(&self) -> ExitCode {
        match self {
            FailureKind::Config => ExitCode::Config,
            FailureKind::Input => ExitCode::Input,
            FailureKind::Merge => ExitCode::Merge,
            FailureKind::Resolution => ExitCode::Resolution,
            FailureKind::Persist => ExitCode::Persist,
            FailureKind::Internal => ExitCode::Internal,
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            FailureKind::Config => "Configuration error",
            FailureKind::Input => "Invalid fragment input",
            FailureKind::Merge => "Fragment merge failed",
            FailureKind::Resolution => "Configuration resolution failed",
            FailureKind::Persist => "Could not persist configuration",
            FailureKind::Internal => "Internal pipeline error",
        }
    }
}

/// Stable process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful execution
    #[default]
    Success = 0,
    /// Settings error
    Config = 1,
    /// Internal error
    Internal = 2,
    /// Fragment input error
    Input = 10,
    /// Merge error
    Merge = 20,
    /// Resolution error
    Resolution = 30,
    /// Persist error
    Persist = 40,
}

impl ExitCode {
    /// Get the integer value of the exit code
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_exit_codes() {
        assert_eq!(FailureKind::Input.exit_code().as_i32(), 10);
        assert_eq!(FailureKind::Merge.exit_code().as_i32(), 20);
        assert_eq!(FailureKind::Resolution.exit_code().as_i32(), 30);
        assert_eq!(FailureKind::Persist.exit_code().as_i32(), 40);
    }

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::Config.as_i32(), 1);
        assert_eq!(ExitCode::Internal.as_i32(), 2);
        assert_eq!(FailureKind::Config.exit_code(), ExitCode::Config);
        assert_eq!(FailureKind::Internal.exit_code(), ExitCode::Internal);
    }

    #[test]
    fn test_description() {
        assert_eq!(FailureKind::Input.description(), "Invalid fragment input");
        assert_eq!(
            FailureKind::Resolution.description(),
            "Configuration resolution failed"
        );
    }

    #[test]
    fn test_failure_kind_serialization() {
        let json = serde_json::to_string(&FailureKind::Resolution).unwrap();
        assert_eq!(json, "\"RESOLUTION\"");
    }
}
