//! Parser builder.
//!
//! Turns a registered schema into a fresh `clap` command and parses token
//! lists against it. Values are collected raw from `clap` and then coerced
//! by the descriptors themselves, so a descriptor used as a coercion
//! function and a descriptor used through the parser agree on every value.

use std::collections::BTreeMap;

use clap::builder::PossibleValuesParser;
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::ArgMatches;
use serde_json::{Map, Value};

use crate::argument::{ArgAction, Argument, Nargs};
use crate::error::{DuploError, Result};
use crate::schema::{CommandKey, SchemaRegistry};

/// Parsed argument values keyed by destination name.
///
/// Absent optional arguments without a default are stored as `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedArgs {
    values: BTreeMap<String, Value>,
}

impl ParsedArgs {
    /// Creates an empty set of values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds or replaces a value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Value for `name`, treating `null` as absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    /// Whether a non-null value is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Optional string value.
    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Required string value.
    pub fn require_str(&self, name: &str) -> Result<&str> {
        match self.get(name) {
            None => Err(DuploError::MissingArgument(name.to_string())),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(DuploError::invalid_argument(
                name,
                format!("expected a string, got {other}"),
            )),
        }
    }

    /// Boolean value; absent means `false`.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Optional integer value.
    #[must_use]
    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// List value; a scalar becomes a one-element list.
    #[must_use]
    pub fn list(&self, name: &str) -> Vec<Value> {
        match self.get(name) {
            None => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
        }
    }

    /// Every value as a JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<String, Value>>(),
        )
    }

    /// Iterates over names and values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Parser over one command's arguments.
#[derive(Debug, Clone)]
pub struct Parser<'a> {
    name: String,
    arguments: &'a [Argument],
}

impl SchemaRegistry {
    /// Builds a parser for the schema registered under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DuploError::UnregisteredCommand`] for unknown keys.
    pub fn parser(&self, key: &CommandKey) -> Result<Parser<'_>> {
        let arguments = self.get(key)?;
        Ok(Parser::new(key.as_str(), arguments))
    }
}

impl<'a> Parser<'a> {
    /// Creates a parser over a slice of descriptors.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: &'a [Argument]) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Renames the command shown in usage and help text.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Descriptors accepted by this parser.
    #[must_use]
    pub const fn arguments(&self) -> &'a [Argument] {
        self.arguments
    }

    /// The `clap` command for the descriptors.
    #[must_use]
    pub fn command(&self) -> clap::Command {
        self.arguments.iter().fold(
            clap::Command::new(self.name.clone())
                .no_binary_name(true)
                .disable_version_flag(true),
            |cmd, arg| cmd.arg(to_clap_arg(arg)),
        )
    }

    /// Rendered help text.
    #[must_use]
    pub fn help(&self) -> String {
        self.command().render_help().to_string()
    }

    /// Parses a token list.
    ///
    /// # Errors
    ///
    /// Returns [`DuploError::Usage`] for tokens that do not match the
    /// schema and [`DuploError::HelpRequested`] when `--help` was given.
    pub fn parse<I, S>(&self, tokens: I) -> Result<ParsedArgs>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let matches = self
            .command()
            .try_get_matches_from(tokens)
            .map_err(from_clap)?;

        let mut parsed = ParsedArgs::new();
        for arg in self.arguments {
            let value = extract(arg, &matches)?;
            parsed.insert(arg.dest_name(), value);
        }
        Ok(parsed)
    }

    /// Parses the flags this parser knows and hands back everything else.
    ///
    /// Known flags may appear anywhere in `tokens`; unknown tokens keep their
    /// relative order. Everything after `--` is left untouched.
    ///
    /// # Errors
    ///
    /// Same as [`Parser::parse`] for the known tokens.
    pub fn parse_known<I, S>(&self, tokens: I) -> Result<(ParsedArgs, Vec<String>)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut known = Vec::new();
        let mut rest = Vec::new();
        let mut tokens = tokens.into_iter().map(Into::into);

        while let Some(token) = tokens.next() {
            if token == "--" {
                rest.push(token);
                rest.extend(tokens.by_ref());
                break;
            }
            let (flag, inline_value) = match token.split_once('=') {
                Some((flag, _)) if flag.starts_with('-') => (flag.to_string(), true),
                _ => (token.clone(), false),
            };
            match self.lookup_flag(&flag) {
                Some(arg) if arg.takes_value() && !inline_value => {
                    known.push(token);
                    if let Some(value) = tokens.next() {
                        known.push(value);
                    }
                }
                Some(_) => known.push(token),
                None if self.attached_short(&token).is_some() => known.push(token),
                None => rest.push(token),
            }
        }

        let parsed = self.parse(known)?;
        Ok((parsed, rest))
    }

    /// Short flag with its value glued on, as in `-Tacme`.
    fn attached_short(&self, token: &str) -> Option<&'a Argument> {
        let rest = token.strip_prefix('-').filter(|r| !r.starts_with('-'))?;
        let mut chars = rest.chars();
        let c = chars.next()?;
        if chars.as_str().is_empty() {
            return None;
        }
        self.arguments
            .iter()
            .find(|arg| arg.takes_value() && arg.short_flags().any(|s| s == c))
    }

    fn lookup_flag(&self, token: &str) -> Option<&'a Argument> {
        if let Some(long) = token.strip_prefix("--") {
            return self
                .arguments
                .iter()
                .find(|arg| arg.long_flags().any(|l| l == long));
        }
        let short = token.strip_prefix('-')?;
        let mut chars = short.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return None;
        };
        self.arguments
            .iter()
            .find(|arg| arg.short_flags().any(|s| s == c))
    }
}

fn to_clap_arg(arg: &Argument) -> clap::Arg {
    let dest = arg.dest_name();
    let mut out = clap::Arg::new(dest.clone());

    let mut longs = arg.long_flags();
    if let Some(long) = longs.next() {
        out = out.long(long.to_string()).value_name(dest.to_uppercase());
    }
    for alias in longs {
        out = out.visible_alias(alias.to_string());
    }
    let mut shorts = arg.short_flags();
    if let Some(short) = shorts.next() {
        out = out.short(short);
    }
    for alias in shorts {
        out = out.visible_short_alias(alias);
    }

    out = match arg.get_action() {
        ArgAction::Store => out.action(clap::ArgAction::Set),
        ArgAction::Append | ArgAction::Custom(_) => out.action(clap::ArgAction::Append),
        ArgAction::StoreTrue => out.action(clap::ArgAction::SetTrue),
        ArgAction::StoreFalse => out.action(clap::ArgAction::SetFalse),
        ArgAction::Count => out.action(clap::ArgAction::Count),
    };

    if arg.takes_value() {
        if let Some(nargs) = arg.get_nargs() {
            out = match nargs {
                Nargs::Exactly(n) => out.num_args(n),
                Nargs::Optional => out.num_args(0..=1),
                Nargs::ZeroOrMore => out.num_args(0..),
                Nargs::OneOrMore => out.num_args(1..),
                Nargs::Remainder => out
                    .num_args(0..)
                    .trailing_var_arg(true)
                    .allow_hyphen_values(true),
            };
        }
        if let Some(choices) = arg.get_choices() {
            out = out.value_parser(PossibleValuesParser::new(choices.iter().cloned()));
        }
    }

    out = out.required(arg.is_required());
    if let Some(help) = arg.get_help() {
        out = out.help(help.to_string());
    }
    if let Some(env) = arg.get_env() {
        out = out.env(env.to_string());
    }
    out
}

fn extract(arg: &Argument, matches: &ArgMatches) -> Result<Value> {
    let id = arg.dest_name();
    let supplied = !matches!(
        matches.value_source(&id),
        None | Some(ValueSource::DefaultValue)
    );

    match arg.get_action() {
        ArgAction::StoreTrue | ArgAction::StoreFalse => {
            if !supplied {
                if let Some(default) = arg.get_default() {
                    return Ok(default.clone());
                }
            }
            Ok(Value::Bool(matches.get_flag(&id)))
        }
        ArgAction::Count => Ok(Value::from(matches.get_count(&id))),
        action => {
            let raw: Vec<String> = matches
                .get_raw(&id)
                .map(|values| {
                    values
                        .map(|v| v.to_string_lossy().into_owned())
                        .collect()
                })
                .unwrap_or_default();

            if raw.is_empty() {
                return match (arg.get_default(), action) {
                    (Some(default), _) => Ok(default.clone()),
                    (None, ArgAction::Custom(collect)) => collect(Vec::new()).map_err(|message| {
                        DuploError::usage(format!("invalid value for '{id}': {message}"))
                    }),
                    (None, _) if arg.is_multiple() => Ok(Value::Array(Vec::new())),
                    (None, _) => Ok(Value::Null),
                };
            }

            let values = raw
                .iter()
                .map(|token| arg.coerce(token))
                .collect::<Result<Vec<_>>>()
                .map_err(|e| DuploError::usage(e.to_string()))?;

            match action {
                ArgAction::Custom(collect) => collect(values).map_err(|message| {
                    DuploError::usage(format!("invalid value for '{id}': {message}"))
                }),
                _ if arg.is_multiple() => Ok(Value::Array(values)),
                _ => Ok(values.into_iter().last().unwrap_or(Value::Null)),
            }
        }
    }
}

fn from_clap(err: clap::Error) -> DuploError {
    let rendered = err.render().to_string();
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            DuploError::HelpRequested(rendered)
        }
        _ => {
            let message = rendered.trim_end();
            DuploError::usage(message.strip_prefix("error: ").unwrap_or(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Signature;
    use serde_json::json;

    fn key_value_map(values: Vec<Value>) -> std::result::Result<Value, String> {
        let mut map = Map::new();
        for value in values {
            let pair = value.as_str().unwrap_or_default();
            let (k, v) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected KEY=VALUE, got '{pair}'"))?;
            map.insert(k.to_string(), Value::from(v));
        }
        Ok(Value::Object(map))
    }

    fn registry() -> (SchemaRegistry, CommandKey) {
        let name = Argument::new("name").help("Service name.");
        let image = Argument::new("image").flag("--image").default_value("ubuntu");
        let replicas = Argument::new("replicas")
            .flag("--replicas")
            .flag("-r")
            .value_type(crate::argument::ValueType::Integer);
        let wait = Argument::new("wait").flag("--wait").action(ArgAction::StoreTrue);
        let kind = Argument::new("kind")
            .flag("--kind")
            .choices(["deployment", "statefulset"]);
        let env = Argument::new("env")
            .flag("--env")
            .flag("-e")
            .action(ArgAction::Custom(key_value_map));

        let signature = Signature::new()
            .arg(&name)
            .arg_with_default(&image, "alpine")
            .arg(&replicas)
            .arg(&wait)
            .arg(&kind)
            .arg(&env)
            .plain("body");

        let mut registry = SchemaRegistry::new();
        let key = CommandKey::new("DuploService", "create");
        registry.register(key.clone(), &signature);
        (registry, key)
    }

    #[test]
    fn parses_positionals_and_flags() {
        let (registry, key) = registry();
        let parser = registry.parser(&key).unwrap();
        let parsed = parser
            .parse(["web", "--replicas", "3", "--wait", "-e", "A=1", "-e", "B=2"])
            .unwrap();

        assert_eq!(parsed.str("name"), Some("web"));
        assert_eq!(parsed.i64("replicas"), Some(3));
        assert!(parsed.flag("wait"));
        assert_eq!(parsed.get("env"), Some(&json!({"A": "1", "B": "2"})));
    }

    #[test]
    fn signature_default_is_the_parsed_default() {
        let (registry, key) = registry();
        let parser = registry.parser(&key).unwrap();
        let parsed = parser.parse(["web"]).unwrap();
        assert_eq!(parsed.str("image"), Some("alpine"));
        assert!(!parsed.flag("wait"));
        assert!(!parsed.contains("replicas"));
    }

    #[test]
    fn absent_custom_action_folds_nothing() {
        let (registry, key) = registry();
        let parser = registry.parser(&key).unwrap();
        let parsed = parser.parse(["web"]).unwrap();
        assert_eq!(parsed.get("env"), Some(&json!({})));
    }

    #[test]
    fn missing_positional_is_usage_error() {
        let (registry, key) = registry();
        let parser = registry.parser(&key).unwrap();
        let err = parser.parse(Vec::<String>::new()).err();
        assert!(matches!(err, Some(DuploError::Usage { .. })));
        assert_eq!(err.map(|e| e.code()), Some(2));
    }

    #[test]
    fn bad_choice_is_usage_error() {
        let (registry, key) = registry();
        let parser = registry.parser(&key).unwrap();
        let err = parser.parse(["web", "--kind", "daemonset"]).err();
        assert!(matches!(err, Some(DuploError::Usage { .. })));
    }

    #[test]
    fn bad_type_is_usage_error() {
        let (registry, key) = registry();
        let parser = registry.parser(&key).unwrap();
        let err = parser.parse(["web", "--replicas", "lots"]).err();
        assert!(matches!(err, Some(DuploError::Usage { ref message }) if message.contains("replicas")));
    }

    #[test]
    fn custom_action_error_is_usage_error() {
        let (registry, key) = registry();
        let parser = registry.parser(&key).unwrap();
        let err = parser.parse(["web", "--env", "novalue"]).err();
        assert!(matches!(err, Some(DuploError::Usage { ref message }) if message.contains("KEY=VALUE")));
    }

    #[test]
    fn help_is_not_a_usage_error() {
        let (registry, key) = registry();
        let parser = registry
            .parser(&key)
            .unwrap()
            .named("service create");
        let err = parser.parse(["--help"]).err();
        assert!(matches!(err, Some(DuploError::HelpRequested(ref text)) if text.contains("--replicas")));
    }

    #[test]
    fn unregistered_key_is_not_a_usage_error() {
        let (registry, _) = registry();
        let err = registry
            .parser(&CommandKey::new("DuploService", "explode"))
            .err();
        assert!(matches!(err, Some(DuploError::UnregisteredCommand(_))));
        assert_eq!(err.map(|e| e.code()), Some(3));
    }

    #[test]
    fn parse_known_splits_tokens() {
        let args = [
            Argument::new("tenant").flag("--tenant").flag("-t"),
            Argument::new("wait").flag("--wait").action(ArgAction::StoreTrue),
            Argument::new("output").flag("--output").flag("-o").default_value("json"),
        ];
        let parser = Parser::new("DuploClient.new", &args);
        let (parsed, rest) = parser
            .parse_known([
                "service", "-t", "dev", "find", "web", "--wait", "--output=env", "--image", "x",
            ])
            .unwrap();

        assert_eq!(parsed.str("tenant"), Some("dev"));
        assert!(parsed.flag("wait"));
        assert_eq!(parsed.str("output"), Some("env"));
        assert_eq!(rest, vec!["service", "find", "web", "--image", "x"]);
    }

    #[test]
    fn parse_known_accepts_attached_short_values() {
        let args = [
            Argument::new("tenant").flag("--tenant").flag("-t"),
            Argument::new("wait").flag("--wait").flag("-w").action(ArgAction::StoreTrue),
            Argument::new("output").flag("--output").flag("-o").default_value("json"),
        ];
        let parser = Parser::new("DuploClient.new", &args);
        let (parsed, rest) = parser
            .parse_known(["-tacme", "secret", "-oenv", "create", "db", "-dA=1", "-wx"])
            .unwrap();

        assert_eq!(parsed.str("tenant"), Some("acme"));
        assert_eq!(parsed.str("output"), Some("env"));
        assert!(!parsed.flag("wait"));
        assert_eq!(rest, vec!["secret", "create", "db", "-dA=1", "-wx"]);
    }

    #[test]
    fn parse_known_stops_at_double_dash() {
        let args = [Argument::new("wait").flag("--wait").action(ArgAction::StoreTrue)];
        let parser = Parser::new("DuploClient.new", &args);
        let (parsed, rest) = parser
            .parse_known(["host", "--", "--wait"])
            .unwrap();
        assert!(!parsed.flag("wait"));
        assert_eq!(rest, vec!["host", "--", "--wait"]);
    }

    #[test]
    fn remainder_collects_hyphenated_tokens() {
        let args = [
            Argument::new("name"),
            Argument::new("command").nargs(Nargs::Remainder),
        ];
        let parser = Parser::new("exec", &args);
        let parsed = parser
            .parse(["web", "ls", "-la", "/tmp"])
            .unwrap();
        assert_eq!(parsed.get("command"), Some(&json!(["ls", "-la", "/tmp"])));
    }

    #[test]
    fn parsed_args_accessors() {
        let parsed = ParsedArgs::new()
            .with("name", "web")
            .with("count", 2)
            .with("gone", Value::Null);
        assert_eq!(parsed.require_str("name").unwrap(), "web");
        assert!(matches!(
            parsed.require_str("gone"),
            Err(DuploError::MissingArgument(ref n)) if n == "gone"
        ));
        assert!(matches!(
            parsed.require_str("count"),
            Err(DuploError::InvalidArgument { .. })
        ));
        assert_eq!(parsed.list("name"), vec![json!("web")]);
        assert_eq!(parsed.to_value()["count"], json!(2));
    }
}
