//! Line grammar for Kconfig fragment files.
//!
//! A fragment is a text file with one directive per line:
//!
//! ```text
//! <blank line>
//! # <free text>
//! # NAME is not set
//! NAME=y | m | n | "<string>" | <integer>
//! ```
//!
//! Validation is all-or-nothing: every offending line is reported, and a
//! fragment with any offending line is rejected as a whole.
//!
//! `.config` files written by the kernel tools follow the same grammar but
//! may also carry hexadecimal values (`CONFIG_PHYSICAL_START=0x1000000`).
//! Those are read with [`Syntax::Generated`]; fragments stay decimal-only.

mod directive;
mod parser;
mod result;

pub use directive::{render_option, Directive, DirectiveForm, OptionValue};
pub use parser::{parse_line, parse_line_with, LineKind};
pub use result::{DefectReason, LineDefect, NumberedDirective, ValidationResult};

use regex_lite::Regex;
use std::sync::OnceLock;

/// Which dialect of the line grammar to accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Syntax {
    /// Hand-written fragments: integers are decimal only.
    Fragment,
    /// `.config` files written by the kernel tools: hex literals allowed.
    Generated,
}

pub(crate) struct Patterns {
    pub name: Regex,
    pub negation: Regex,
    pub bare_negation: Regex,
    pub integer: Regex,
    pub hex: Regex,
}

pub(crate) fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        name: compile(r"^[A-Za-z0-9_]+$"),
        negation: compile(r"^# ([A-Za-z0-9_]+) is not set$"),
        bare_negation: compile(r"^\s*[A-Za-z0-9_]+ is not set\s*$"),
        integer: compile(r"^-?[0-9]+$"),
        hex: compile(r"^0[xX][0-9a-fA-F]+$"),
    })
}

fn compile(pattern: &str) -> Regex {
    // Patterns are literals above; a failure here is a programming error.
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern}: {e}"))
}

/// Validate a whole fragment.
///
/// Every line is classified; the result lists all directives in order and
/// every offending line verbatim.
pub fn validate(text: &str) -> ValidationResult {
    validate_with(text, Syntax::Fragment)
}

/// Validate a `.config` file written by the kernel tools.
pub fn validate_generated(text: &str) -> ValidationResult {
    validate_with(text, Syntax::Generated)
}

fn validate_with(text: &str, syntax: Syntax) -> ValidationResult {
    let mut directives = Vec::new();
    let mut defects = Vec::new();
    let mut ignored_lines = 0;

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        match parse_line_with(line, syntax) {
            Ok(LineKind::Blank) | Ok(LineKind::Comment) => ignored_lines += 1,
            Ok(LineKind::Directive(directive)) => directives.push(NumberedDirective {
                line_number,
                directive,
            }),
            Err(reason) => defects.push(LineDefect {
                line_number,
                text: line.to_string(),
                reason,
            }),
        }
    }

    ValidationResult {
        accepted: defects.is_empty(),
        directives,
        defects,
        ignored_lines,
    }
}
