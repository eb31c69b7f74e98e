//! Output formatting for command results.
//!
//! Supports pretty JSON, `KEY=value` env lines and plain text, plus a
//! dotted query (`Spec.Containers[0].Image`) applied before formatting.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde_json::Value;

use duplo_core::{DuploError, Result};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// `KEY=value` lines for shell `eval`.
    Env,
    /// Raw strings, compact JSON for everything else.
    Text,
}

impl Format {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Env => "env",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = DuploError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "env" => Ok(Self::Env),
            "text" => Ok(Self::Text),
            other => Err(DuploError::invalid_argument(
                "output",
                format!("unknown format '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Index(usize),
}

fn parse_query(query: &str) -> Result<Vec<Step>> {
    let invalid = |why: &str| DuploError::invalid_argument("query", format!("{why} in '{query}'"));
    let mut steps = Vec::new();

    for part in query.split('.') {
        let (key, mut rest) = part.split_once('[').unwrap_or((part, ""));
        if key.is_empty() && rest.is_empty() {
            return Err(invalid("empty segment"));
        }
        if !key.is_empty() {
            steps.push(Step::Key(key.to_string()));
        }
        while !rest.is_empty() {
            let (index, after) = rest.split_once(']').ok_or_else(|| invalid("unclosed '['"))?;
            let index = index.parse().map_err(|_| invalid("bad index"))?;
            steps.push(Step::Index(index));
            rest = match after.strip_prefix('[') {
                Some(next) => next,
                None if after.is_empty() => "",
                None => return Err(invalid("unexpected text after ']'")),
            };
        }
    }
    Ok(steps)
}

/// Applies a dotted query to `value`; missing keys and indexes give `null`.
///
/// # Errors
///
/// Returns an error for a malformed query.
pub fn query(value: &Value, query: &str) -> Result<Value> {
    let steps = parse_query(query)?;
    let found = steps.iter().try_fold(value, |current, step| match step {
        Step::Key(key) => current.get(key.as_str()),
        Step::Index(index) => current.get(*index),
    });
    Ok(found.cloned().unwrap_or(Value::Null))
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Renders `value` in `format`.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render(value: &Value, format: Format) -> Result<String> {
    let mut out = match format {
        Format::Json => serde_json::to_string_pretty(value)
            .map_err(|e| anyhow::anyhow!("JSON serialization failed: {e}"))?,
        Format::Env => match value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| format!("{k}={}", scalar(v)))
                .collect::<Vec<_>>()
                .join("\n"),
            other => scalar(other),
        },
        Format::Text => match value {
            Value::Array(items) if items.iter().all(Value::is_string) => items
                .iter()
                .map(scalar)
                .collect::<Vec<_>>()
                .join("\n"),
            other => scalar(other),
        },
    };
    if !out.is_empty() {
        out.push('\n');
    }
    Ok(out)
}

/// Writes `value` in `format`.
///
/// # Errors
///
/// Returns an error if rendering or writing fails.
pub fn write<W: Write>(writer: &mut W, value: &Value, format: Format) -> anyhow::Result<()> {
    writer.write_all(render(value, format)?.as_bytes())?;
    Ok(())
}
