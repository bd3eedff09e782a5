//! Validation result types.

use serde::{Deserialize, Serialize};

use crate::directive::Directive;

/// Why a line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefectReason {
    /// `NAME is not set` without the leading `#`.
    #[error("negation is missing its leading '#'")]
    MissingCommentMarker,

    /// Left-hand side is not `[A-Za-z0-9_]+`.
    #[error("invalid option name '{name}'")]
    InvalidName { name: String },

    /// Right-hand side is not `y`, `m`, `n`, a quoted string or an integer.
    #[error("invalid value '{value}'")]
    InvalidValue { value: String },

    /// Integer literal does not fit in 64 bits.
    #[error("integer '{value}' out of range")]
    IntegerOutOfRange { value: String },

    /// Neither a comment nor an assignment.
    #[error("not an assignment, negation or comment")]
    NotADirective,
}

impl DefectReason {
    /// Machine-readable code.
    pub fn to_code(&self) -> &'static str {
        match self {
            DefectReason::MissingCommentMarker => "MISSING_COMMENT_MARKER",
            DefectReason::InvalidName { .. } => "INVALID_NAME",
            DefectReason::InvalidValue { .. } => "INVALID_VALUE",
            DefectReason::IntegerOutOfRange { .. } => "INTEGER_OUT_OF_RANGE",
            DefectReason::NotADirective => "NOT_A_DIRECTIVE",
        }
    }
}

/// An offending line, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDefect {
    /// 1-based line number.
    pub line_number: usize,
    /// The line exactly as read (without its terminator).
    pub text: String,
    /// Why it was rejected.
    pub reason: DefectReason,
}

/// A directive with the line it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberedDirective {
    /// 1-based line number.
    pub line_number: usize,
    /// The parsed directive.
    pub directive: Directive,
}

/// Outcome of validating a whole fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    /// True when no line was rejected.
    pub accepted: bool,

    /// Directives in file order.
    #[serde(default)]
    pub directives: Vec<NumberedDirective>,

    /// Every rejected line, in file order.
    #[serde(default)]
    pub defects: Vec<LineDefect>,

    /// Count of blank and comment lines.
    #[serde(default)]
    pub ignored_lines: usize,
}

impl ValidationResult {
    /// The rejected lines, verbatim.
    pub fn offending_lines(&self) -> Vec<&str> {
        self.defects.iter().map(|d| d.text.as_str()).collect()
    }

    /// Directives without their line numbers.
    pub fn into_directives(self) -> Vec<Directive> {
        self.directives.into_iter().map(|d| d.directive).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(DefectReason::NotADirective.to_code(), "NOT_A_DIRECTIVE");
        assert_eq!(
            DefectReason::InvalidName {
                name: "A B".to_string()
            }
            .to_code(),
            "INVALID_NAME"
        );
    }

    #[test]
    fn test_defect_serialization() {
        let defect = LineDefect {
            line_number: 3,
            text: "CONFIG_FOO is not set".to_string(),
            reason: DefectReason::MissingCommentMarker,
        };
        let json = serde_json::to_string(&defect).unwrap();
        assert!(json.contains("MISSING_COMMENT_MARKER"));
        assert!(json.contains("\"line_number\":3"));
    }
}
