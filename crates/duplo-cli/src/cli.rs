//! Global flags, registry bootstrap and top-level token handling.
//!
//! Global flags are argument descriptors registered under
//! `DuploClient.new`. They are parsed with `parse_known`, so they may appear
//! anywhere on the command line; whatever is left names the resource, the
//! command and the command's own arguments.

use std::fmt::Write as _;

use once_cell::sync::Lazy;

use duplo_core::{
    ArgAction, Argument, CommandKey, DuploError, ParsedArgs, Registry, ResourceEntry, Result,
    Signature, ValueType,
};

use crate::resources::{DuploHosts, DuploSecret, DuploService, DuploTenant};

/// Program name used in usage text.
pub const PROGRAM: &str = "duploctl";

/// API host URL.
pub static HOST: Lazy<Argument> = Lazy::new(|| {
    Argument::new("host")
        .flag("--host")
        .flag("-H")
        .env("DUPLO_HOST")
        .help("Portal URL, e.g. https://example.duplocloud.net.")
});

/// API bearer token.
pub static TOKEN: Lazy<Argument> = Lazy::new(|| {
    Argument::new("token")
        .flag("--token")
        .flag("-t")
        .env("DUPLO_TOKEN")
        .help("Bearer token for the portal.")
});

/// Tenant name.
pub static TENANT: Lazy<Argument> = Lazy::new(|| {
    Argument::new("tenant")
        .flag("--tenant")
        .flag("-T")
        .env("DUPLO_TENANT")
        .help("Tenant name for tenant-scoped resources.")
});

/// Tenant id.
pub static TENANT_ID: Lazy<Argument> = Lazy::new(|| {
    Argument::new("tenant_id")
        .flag("--tenant-id")
        .flag("--tenantid")
        .env("DUPLO_TENANT_ID")
        .help("Tenant id; skips the tenant lookup.")
});

/// Output format.
pub static OUTPUT: Lazy<Argument> = Lazy::new(|| {
    Argument::new("output")
        .flag("--output")
        .flag("-o")
        .choices(["json", "env", "text"])
        .default_value("json")
        .env("DUPLO_OUTPUT")
        .help("Output format.")
});

/// Dotted query applied to the result.
pub static QUERY: Lazy<Argument> = Lazy::new(|| {
    Argument::new("query")
        .flag("--query")
        .flag("-q")
        .help("Path into the result, e.g. Spec.Containers[0].Image.")
});

/// Block until changes converge.
pub static WAIT: Lazy<Argument> = Lazy::new(|| {
    Argument::new("wait")
        .flag("--wait")
        .flag("-w")
        .action(ArgAction::StoreTrue)
        .help("Wait for mutating commands to finish.")
});

/// Wait budget in seconds.
pub static WAIT_TIMEOUT: Lazy<Argument> = Lazy::new(|| {
    Argument::new("wait_timeout")
        .flag("--wait-timeout")
        .value_type(ValueType::Integer)
        .default_value(3600)
        .env("DUPLO_WAIT_TIMEOUT")
        .help("Seconds to wait before giving up.")
});

/// Log filter used when `RUST_LOG` is unset.
pub static LOG_LEVEL: Lazy<Argument> = Lazy::new(|| {
    Argument::new("log_level")
        .flag("--log-level")
        .flag("-L")
        .choices(["trace", "debug", "info", "warn", "error"])
        .default_value("warn")
        .env("DUPLO_LOG_LEVEL")
        .help("Log level.")
});

/// Named context from the config file.
pub static CONTEXT: Lazy<Argument> = Lazy::new(|| {
    Argument::new("context")
        .flag("--context")
        .flag("-c")
        .env("DUPLO_CONTEXT")
        .help("Context to use from the config file.")
});

/// Path of the config file.
pub static CONFIG_FILE: Lazy<Argument> = Lazy::new(|| {
    Argument::new("config_file")
        .flag("--config-file")
        .env("DUPLO_CONFIG")
        .help("Config file path (default ~/.duplo/config.toml).")
});

/// Schema key of the global flags.
#[must_use]
pub fn client_key() -> CommandKey {
    CommandKey::new("DuploClient", "new")
}

/// Signature of the client constructor.
#[must_use]
pub fn client_signature() -> Signature {
    Signature::new()
        .arg(&HOST)
        .arg(&TOKEN)
        .arg(&TENANT)
        .arg(&TENANT_ID)
        .arg(&OUTPUT)
        .arg(&QUERY)
        .arg(&WAIT)
        .arg(&WAIT_TIMEOUT)
        .arg(&LOG_LEVEL)
        .arg(&CONTEXT)
        .arg(&CONFIG_FILE)
}

/// Builds the registry with the global flags and every resource.
///
/// # Errors
///
/// Fails on a bad scope or a duplicate resource name.
pub fn bootstrap() -> Result<Registry> {
    let mut registry = Registry::new();
    registry.register_schema(client_key(), &client_signature());
    registry.register::<DuploTenant>("tenant", "portal")?;
    registry.register::<DuploService>("service", "tenant")?;
    registry.register::<DuploHosts>("host", "tenant")?;
    registry.register::<DuploSecret>("secret", "tenant")?;
    Ok(registry)
}

/// Splits global flags from the rest of the command line.
///
/// # Errors
///
/// Returns a usage error for malformed global flags.
pub fn parse_globals<I, S>(registry: &Registry, tokens: I) -> Result<(ParsedArgs, Vec<String>)>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    registry
        .parser(&client_key())?
        .named(PROGRAM)
        .parse_known(tokens)
}

/// What the remaining tokens ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Global help and the resource list.
    Overview,
    /// Commands of one resource.
    Describe(String),
    /// A command run.
    Run {
        /// Resource name.
        resource: String,
        /// Command name.
        command: String,
        /// Tokens for the command parser.
        args: Vec<String>,
    },
}

fn is_help(token: &str) -> bool {
    matches!(token, "-h" | "--help" | "help")
}

impl Invocation {
    /// Classifies the tokens left after the global flags.
    ///
    /// # Errors
    ///
    /// Returns a usage error when a flag stands where the resource belongs.
    pub fn from_tokens(tokens: Vec<String>) -> Result<Self> {
        let mut tokens = tokens.into_iter().skip_while(|t| t == "--");
        let Some(resource) = tokens.next() else {
            return Ok(Self::Overview);
        };
        if is_help(&resource) {
            return Ok(Self::Overview);
        }
        if resource.starts_with('-') {
            return Err(DuploError::usage(format!(
                "unexpected argument '{resource}' found\n\nUsage: {PROGRAM} [OPTIONS] <resource> <command> [args]..."
            )));
        }
        let Some(command) = tokens.next() else {
            return Ok(Self::Describe(resource));
        };
        if is_help(&command) {
            return Ok(Self::Describe(resource));
        }
        Ok(Self::Run {
            resource,
            command,
            args: tokens.collect(),
        })
    }
}

/// Global help followed by the registered resources.
///
/// # Errors
///
/// Fails only if the global schema is missing.
pub fn overview(registry: &Registry) -> Result<String> {
    let mut out = registry.parser(&client_key())?.named(PROGRAM).help();
    out = out.replacen(
        &format!("Usage: {PROGRAM} [OPTIONS]"),
        &format!("Usage: {PROGRAM} [OPTIONS] <resource> <command> [args]..."),
        1,
    );
    let width = registry
        .resources()
        .iter()
        .map(|e| e.name().len())
        .max()
        .unwrap_or(0);

    let _ = writeln!(out, "\nResources:");
    for entry in registry.resources().iter() {
        let commands: Vec<_> = entry.commands().iter().map(|c| c.name).collect();
        let _ = writeln!(
            out,
            "  {:<width$}  {:<6}  {}",
            entry.name(),
            entry.scope().as_str(),
            commands.join(", ")
        );
    }
    Ok(out)
}

/// Commands of one resource with their usage lines.
///
/// # Errors
///
/// Returns [`DuploError::UnknownResource`] for unregistered names.
pub fn describe(registry: &Registry, resource: &str) -> Result<String> {
    let entry = registry.resources().get(resource)?;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{resource} ({}, {} scope)\n\nCommands:",
        entry.type_name(),
        entry.scope()
    );
    for command in entry.commands() {
        let usage = usage_line(registry, entry, command.name)?;
        let _ = writeln!(out, "  {usage}");
        if !command.doc.is_empty() {
            let _ = writeln!(out, "      {}", command.doc);
        }
    }
    Ok(out)
}

fn usage_line(registry: &Registry, entry: &ResourceEntry, command: &str) -> Result<String> {
    let key = CommandKey::new(entry.type_name(), command);
    let mut parts = vec![entry.name().to_string(), command.to_string()];
    for arg in registry.schemas().get(&key)? {
        let dest = arg.dest_name();
        let shown = if arg.is_positional() {
            format!("<{dest}>")
        } else {
            let flag = arg.cli_flags().into_iter().next().unwrap_or_default();
            if arg.takes_value() {
                format!("{flag} <{dest}>")
            } else {
                flag
            }
        };
        let shown = if arg.is_multiple() {
            format!("{shown}...")
        } else {
            shown
        };
        parts.push(if arg.is_required() {
            shown
        } else {
            format!("[{shown}]")
        });
    }
    Ok(parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn registry() -> Registry {
        bootstrap().unwrap()
    }

    #[test]
    fn bootstrap_registers_every_resource() {
        let registry = registry();
        let names: Vec<_> = registry.resources().iter().map(ResourceEntry::name).collect();
        assert_eq!(names, ["host", "secret", "service", "tenant"]);
        assert!(registry.schemas().contains(&client_key()));
    }

    #[test]
    fn globals_are_recognised_anywhere() {
        let registry = registry();
        let (globals, rest) = parse_globals(
            &registry,
            ["service", "--tenant", "acme", "find", "web", "-o", "text", "--wait"],
        )
        .unwrap();

        assert_eq!(globals.str("tenant"), Some("acme"));
        assert_eq!(globals.str("output"), Some("text"));
        assert!(globals.flag("wait"));
        assert_eq!(rest, ["service", "find", "web"]);
    }

    #[test]
    fn attached_short_globals() {
        let registry = registry();
        let (globals, rest) =
            parse_globals(&registry, ["-Tacme", "secret", "-oenv", "create", "db", "-dA=1"]).unwrap();
        assert_eq!(globals.str("tenant"), Some("acme"));
        assert_eq!(globals.str("output"), Some("env"));
        assert_eq!(rest, ["secret", "create", "db", "-dA=1"]);
    }

    #[test]
    fn global_defaults() {
        let registry = registry();
        let (globals, rest) =
            parse_globals(&registry, ["tenant", "list"]).unwrap();
        assert_eq!(globals.i64("wait_timeout"), Some(3600));
        assert_eq!(globals.str("log_level"), Some("warn"));
        assert_eq!(rest, ["tenant", "list"]);
    }

    #[test]
    fn bad_output_choice_is_a_usage_error() {
        let registry = registry();
        let err = parse_globals(&registry, ["-o", "yaml", "tenant", "list"]).err();
        assert!(matches!(err, Some(DuploError::Usage { .. })));
    }

    #[test_case(&[], &Invocation::Overview ; "nothing")]
    #[test_case(&["--help"], &Invocation::Overview ; "help flag")]
    #[test_case(&["service"], &Invocation::Describe("service".into()) ; "resource only")]
    #[test_case(&["service", "-h"], &Invocation::Describe("service".into()) ; "resource help")]
    fn classifies_listing_tokens(tokens: &[&str], expected: &Invocation) {
        let tokens = tokens.iter().map(ToString::to_string).collect();
        assert_eq!(&Invocation::from_tokens(tokens).unwrap(), expected);
    }

    #[test]
    fn classifies_runs() {
        let tokens = ["service", "find", "web", "--help"].map(String::from).to_vec();
        assert_eq!(
            Invocation::from_tokens(tokens).unwrap(),
            Invocation::Run {
                resource: "service".into(),
                command: "find".into(),
                args: vec!["web".into(), "--help".into()],
            }
        );
    }

    #[test]
    fn stray_flag_is_a_usage_error() {
        let err = Invocation::from_tokens(vec!["--bogus".into()]).err();
        assert_eq!(err.map(|e| e.code()), Some(2));
    }

    #[test]
    fn overview_lists_resources() {
        let text = overview(&registry()).unwrap();
        assert!(text.contains("--host"));
        assert!(text.contains("Resources:"));
        assert!(text.contains("secret"));
    }

    #[test]
    fn describe_shows_usage_lines() {
        let text = describe(&registry(), "secret").unwrap();
        assert!(text.contains("secret create <name> [--data <data>...]"));
        assert!(text.contains("secret find <name>"));
    }

    #[test]
    fn describe_unknown_resource() {
        let err = describe(&registry(), "nope").err();
        assert!(matches!(err, Some(DuploError::UnknownResource(_))));
    }
}
