//! Option values and directives.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::result::DefectReason;
use crate::Syntax;

/// Value assigned to a configuration option.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OptionValue {
    /// `y`
    Enabled,
    /// `m`
    Module,
    /// `n`, or a `# NAME is not set` line.
    Disabled,
    /// Double-quoted string, stored unescaped.
    Str(String),
    /// Decimal integer.
    Int(i64),
    /// Hexadecimal literal as the kernel tools write it, e.g. `0x1000000`.
    ///
    /// Kept verbatim. Only accepted in generated `.config` files.
    Hex(String),
}

impl OptionValue {
    /// Parse the right-hand side of a fragment `NAME=VALUE` line.
    pub fn parse(raw: &str) -> Result<Self, DefectReason> {
        Self::parse_with(raw, Syntax::Fragment)
    }

    /// Parse a value under the given syntax.
    pub fn parse_with(raw: &str, syntax: Syntax) -> Result<Self, DefectReason> {
        match raw {
            "y" => return Ok(OptionValue::Enabled),
            "m" => return Ok(OptionValue::Module),
            "n" => return Ok(OptionValue::Disabled),
            _ => {}
        }

        if raw.starts_with('"') {
            return unquote(raw)
                .map(OptionValue::Str)
                .ok_or_else(|| DefectReason::InvalidValue {
                    value: raw.to_string(),
                });
        }

        if crate::patterns().integer.is_match(raw) {
            return raw
                .parse::<i64>()
                .map(OptionValue::Int)
                .map_err(|_| DefectReason::IntegerOutOfRange {
                    value: raw.to_string(),
                });
        }

        if syntax == Syntax::Generated && crate::patterns().hex.is_match(raw) {
            return Ok(OptionValue::Hex(raw.to_string()));
        }

        Err(DefectReason::InvalidValue {
            value: raw.to_string(),
        })
    }

    /// Render as it appears on the right-hand side of an assignment.
    pub fn render(&self) -> String {
        match self {
            OptionValue::Enabled => "y".to_string(),
            OptionValue::Module => "m".to_string(),
            OptionValue::Disabled => "n".to_string(),
            OptionValue::Str(s) => quote(s),
            OptionValue::Int(i) => i.to_string(),
            OptionValue::Hex(h) => h.clone(),
        }
    }

    /// True for `Disabled`.
    pub fn is_disabled(&self) -> bool {
        matches!(self, OptionValue::Disabled)
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Syntactic form a directive was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveForm {
    /// `NAME=value`
    Assignment,
    /// `# NAME is not set`
    Negation,
}

/// A single option directive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Directive {
    /// Option name, e.g. `CONFIG_KASAN`.
    pub name: String,
    /// Value the directive assigns.
    pub value: OptionValue,
    /// How the directive was spelled.
    pub form: DirectiveForm,
}

impl Directive {
    /// `NAME=value`
    pub fn assign(name: impl Into<String>, value: OptionValue) -> Self {
        Self {
            name: name.into(),
            value,
            form: DirectiveForm::Assignment,
        }
    }

    /// `# NAME is not set`
    pub fn negate(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: OptionValue::Disabled,
            form: DirectiveForm::Negation,
        }
    }

    /// Render the directive as a fragment line.
    ///
    /// Disabled options always use the negation form, which is what the
    /// kernel's own configuration tools write.
    pub fn to_line(&self) -> String {
        render_option(&self.name, &self.value)
    }
}

/// Render one `name`/`value` pair as a `.config` line.
pub fn render_option(name: &str, value: &OptionValue) -> String {
    match value {
        OptionValue::Disabled => format!("# {} is not set", name),
        other => format!("{}={}", name, other.render()),
    }
}

fn unquote(raw: &str) -> Option<String> {
    let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?),
            '"' => return None,
            other => out.push(other),
        }
    }
    Some(out)
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
