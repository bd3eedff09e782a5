//! Single-line classifier.

use crate::directive::{Directive, OptionValue};
use crate::patterns;
use crate::result::DefectReason;
use crate::Syntax;

/// Classification of one fragment line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// Empty or whitespace only.
    Blank,
    /// `#` followed by free text.
    Comment,
    /// Assignment or negation.
    Directive(Directive),
}

/// Classify a single fragment line.
///
/// A trailing carriage return is ignored. Assignments and negations must
/// match exactly; whitespace around `=` is not accepted.
pub fn parse_line(line: &str) -> Result<LineKind, DefectReason> {
    parse_line_with(line, Syntax::Fragment)
}

/// Classify a single line under the given syntax.
pub fn parse_line_with(line: &str, syntax: Syntax) -> Result<LineKind, DefectReason> {
    let line = line.strip_suffix('\r').unwrap_or(line);

    if line.trim().is_empty() {
        return Ok(LineKind::Blank);
    }

    let p = patterns();

    if let Some(caps) = p.negation.captures(line) {
        return Ok(LineKind::Directive(Directive::negate(&caps[1])));
    }

    if line.trim_start().starts_with('#') {
        return Ok(LineKind::Comment);
    }

    if p.bare_negation.is_match(line) {
        return Err(DefectReason::MissingCommentMarker);
    }

    if let Some((name, raw)) = line.split_once('=') {
        if !p.name.is_match(name) {
            return Err(DefectReason::InvalidName {
                name: name.to_string(),
            });
        }
        let value = OptionValue::parse_with(raw, syntax)?;
        return Ok(LineKind::Directive(Directive::assign(name, value)));
    }

    Err(DefectReason::NotADirective)
}
