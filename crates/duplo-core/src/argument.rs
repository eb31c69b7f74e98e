//! Argument descriptors.
//!
//! An [`Argument`] describes one command-line argument: its flags, how raw
//! tokens are coerced, how repeated values are collected, and its default.
//! Descriptors are built once and shared between every command that takes
//! the same argument.
//!
//! ```rust
//! use duplo_core::argument::{Argument, ValueType};
//!
//! let replicas = Argument::new("replicas")
//!     .flag("--replicas")
//!     .flag("-r")
//!     .value_type(ValueType::Integer)
//!     .help("Number of replicas.");
//!
//! assert!(!replicas.is_positional());
//! assert_eq!(replicas.coerce("3")?, serde_json::json!(3));
//! # Ok::<(), duplo_core::DuploError>(())
//! ```

use serde_json::{Map, Value};

use crate::error::{DuploError, Result};

/// Converts one raw token into a value.
pub type CoerceFn = fn(&str) -> std::result::Result<Value, String>;

/// Folds every collected value of an argument into its final value.
pub type CollectFn = fn(Vec<Value>) -> std::result::Result<Value, String>;

/// How a raw token is converted into a value.
#[derive(Debug, Clone, Copy, Default)]
pub enum ValueType {
    /// Keep the token as a string.
    #[default]
    String,
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// `true`/`false`, `yes`/`no`, `on`/`off`, `1`/`0`.
    Boolean,
    /// Inline JSON document.
    Json,
    /// Caller-supplied conversion.
    Custom(CoerceFn),
}

impl ValueType {
    /// Short name used in schemas and error messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Json => "json",
            Self::Custom(_) => "custom",
        }
    }

    fn coerce(self, raw: &str) -> std::result::Result<Value, String> {
        match self {
            Self::String => Ok(Value::String(raw.to_string())),
            Self::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("expected an integer, got '{raw}'")),
            Self::Float => raw
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| format!("expected a number, got '{raw}'")),
            Self::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("expected a boolean, got '{raw}'")),
            },
            Self::Json => {
                serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))
            }
            Self::Custom(f) => f(raw),
        }
    }
}

/// How occurrences of an argument are collected.
#[derive(Debug, Clone, Copy, Default)]
pub enum ArgAction {
    /// Keep the last value.
    #[default]
    Store,
    /// Collect every occurrence into a list.
    Append,
    /// Flag without a value; present means `true`.
    StoreTrue,
    /// Flag without a value; present means `false`.
    StoreFalse,
    /// Flag without a value; counts occurrences.
    Count,
    /// Collect every occurrence, then fold them with a custom function.
    Custom(CollectFn),
}

impl ArgAction {
    /// Short name used in schemas.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Append => "append",
            Self::StoreTrue => "store_true",
            Self::StoreFalse => "store_false",
            Self::Count => "count",
            Self::Custom(_) => "custom",
        }
    }
}

/// Number of tokens an argument consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nargs {
    /// Exactly this many values.
    Exactly(usize),
    /// Zero or one value (`?`).
    Optional,
    /// Any number of values (`*`).
    ZeroOrMore,
    /// At least one value (`+`).
    OneOrMore,
    /// Every remaining token, hyphenated ones included.
    Remainder,
}

impl Nargs {
    /// The argparse-style symbol for the arity.
    #[must_use]
    pub fn symbol(&self) -> String {
        match self {
            Self::Exactly(n) => n.to_string(),
            Self::Optional => "?".into(),
            Self::ZeroOrMore => "*".into(),
            Self::OneOrMore => "+".into(),
            Self::Remainder => "...".into(),
        }
    }

    const fn is_multiple(self) -> bool {
        !matches!(self, Self::Optional | Self::Exactly(0 | 1))
    }
}

/// Descriptor of one command-line argument.
#[derive(Debug, Clone)]
pub struct Argument {
    name: String,
    flags: Vec<String>,
    value_type: ValueType,
    default: Option<Value>,
    choices: Option<Vec<String>>,
    required: bool,
    action: ArgAction,
    nargs: Option<Nargs>,
    help: Option<String>,
    dest: Option<String>,
    env: Option<String>,
}

impl Argument {
    /// Creates a positional string argument.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: Vec::new(),
            value_type: ValueType::String,
            default: None,
            choices: None,
            required: false,
            action: ArgAction::Store,
            nargs: None,
            help: None,
            dest: None,
            env: None,
        }
    }

    /// Adds a flag (`--long` or `-s`), which makes the argument optional.
    #[must_use]
    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    /// Sets the coercion applied to raw tokens.
    #[must_use]
    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Restricts values to a closed set.
    #[must_use]
    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Marks a flagged argument as required.
    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets how occurrences are collected.
    #[must_use]
    pub fn action(mut self, action: ArgAction) -> Self {
        self.action = action;
        self
    }

    /// Sets the arity.
    #[must_use]
    pub fn nargs(mut self, nargs: Nargs) -> Self {
        self.nargs = Some(nargs);
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Overrides the destination name.
    #[must_use]
    pub fn dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    /// Environment variable consulted when the flag is absent.
    #[must_use]
    pub fn env(mut self, var: impl Into<String>) -> Self {
        self.env = Some(var.into());
        self
    }

    /// Copy of this descriptor with a different default.
    #[must_use]
    pub fn with_default(&self, value: Value) -> Self {
        let mut arg = self.clone();
        arg.default = Some(value);
        arg
    }

    /// Logical name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when no flags were supplied.
    #[must_use]
    pub fn is_positional(&self) -> bool {
        self.flags.is_empty()
    }

    /// Flags as they appear on the command line; a positional argument
    /// answers with its own name.
    #[must_use]
    pub fn cli_flags(&self) -> Vec<String> {
        if self.is_positional() {
            vec![self.name.clone()]
        } else {
            self.flags.clone()
        }
    }

    /// Long flags (without the leading `--`).
    pub fn long_flags(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().filter_map(|f| f.strip_prefix("--"))
    }

    /// Short flags (the character after a single `-`).
    pub fn short_flags(&self) -> impl Iterator<Item = char> {
        self.flags
            .iter()
            .filter(|f| !f.starts_with("--"))
            .filter_map(|f| f.strip_prefix('-'))
            .filter_map(|s| s.chars().next())
    }

    /// Key the parsed value is stored under.
    ///
    /// Positional arguments use their name. Flagged arguments use the first
    /// long flag, falling back to the name, with dashes turned into
    /// underscores.
    #[must_use]
    pub fn dest_name(&self) -> String {
        if let Some(dest) = &self.dest {
            return dest.clone();
        }
        if self.is_positional() {
            return self.name.clone();
        }
        let base = self.long_flags().next().unwrap_or(self.name.as_str());
        base.replace('-', "_")
    }

    /// Coercion applied to raw tokens.
    #[must_use]
    pub const fn get_value_type(&self) -> ValueType {
        self.value_type
    }

    /// Default value, if any.
    #[must_use]
    pub fn get_default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Allowed values, if restricted.
    #[must_use]
    pub fn get_choices(&self) -> Option<&[String]> {
        self.choices.as_deref()
    }

    /// Whether the argument must be supplied.
    ///
    /// Positional arguments are required unless they have a default or an
    /// arity that accepts zero values.
    #[must_use]
    pub fn is_required(&self) -> bool {
        if self.is_positional() {
            self.default.is_none()
                && !matches!(
                    self.nargs,
                    Some(Nargs::Optional | Nargs::ZeroOrMore | Nargs::Remainder)
                )
        } else {
            self.required
        }
    }

    /// Collection action.
    #[must_use]
    pub const fn get_action(&self) -> ArgAction {
        self.action
    }

    /// Arity, if set.
    #[must_use]
    pub const fn get_nargs(&self) -> Option<Nargs> {
        self.nargs
    }

    /// Help text, if any.
    #[must_use]
    pub fn get_help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    /// Environment fallback, if any.
    #[must_use]
    pub fn get_env(&self) -> Option<&str> {
        self.env.as_deref()
    }

    /// Whether occurrences carry a value.
    #[must_use]
    pub const fn takes_value(&self) -> bool {
        !matches!(
            self.action,
            ArgAction::StoreTrue | ArgAction::StoreFalse | ArgAction::Count
        )
    }

    /// Whether the parsed value is a list of values.
    #[must_use]
    pub fn is_multiple(&self) -> bool {
        matches!(self.action, ArgAction::Append | ArgAction::Custom(_))
            || self.nargs.is_some_and(Nargs::is_multiple)
    }

    /// Coerces one raw token the way the parser would.
    pub fn coerce(&self, raw: &str) -> Result<Value> {
        self.value_type
            .coerce(raw)
            .map_err(|message| DuploError::invalid_argument(self.dest_name(), message))
    }

    /// Schema of the descriptor; unset attributes are omitted.
    #[must_use]
    pub fn schema(&self) -> Value {
        let mut map = Map::new();
        map.insert("name".into(), Value::from(self.name.clone()));
        map.insert("dest".into(), Value::from(self.dest_name()));
        map.insert("positional".into(), Value::Bool(self.is_positional()));
        if !self.flags.is_empty() {
            map.insert("flags".into(), Value::from(self.flags.clone()));
        }
        map.insert("type".into(), Value::from(self.value_type.as_str()));
        map.insert("action".into(), Value::from(self.action.as_str()));
        map.insert("required".into(), Value::Bool(self.is_required()));
        if let Some(default) = &self.default {
            map.insert("default".into(), default.clone());
        }
        if let Some(choices) = &self.choices {
            map.insert("choices".into(), Value::from(choices.clone()));
        }
        if let Some(nargs) = self.nargs {
            map.insert("nargs".into(), Value::from(nargs.symbol()));
        }
        if let Some(help) = &self.help {
            map.insert("help".into(), Value::from(help.clone()));
        }
        if let Some(env) = &self.env {
            map.insert("env".into(), Value::from(env.clone()));
        }
        Value::Object(map)
    }
}
