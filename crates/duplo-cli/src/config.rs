//! Client settings.
//!
//! Settings come from three layers, highest precedence first:
//! - global flags and their `DUPLO_*` environment fallbacks
//! - the selected context of the TOML config file
//! - built-in defaults
//!
//! ```toml
//! current-context = "prod"
//!
//! [contexts.prod]
//! host = "https://prod.duplocloud.net"
//! token = "..."
//! tenant = "web"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use duplo_core::{ClientSettings, DuploError, ParsedArgs, Result, WaitPolicy};

use crate::output::Format;

/// One named context in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextConfig {
    /// Portal URL.
    pub host: Option<String>,
    /// Bearer token.
    pub token: Option<String>,
    /// Default tenant name.
    pub tenant: Option<String>,
}

/// The TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextFile {
    /// Context used when none is named.
    #[serde(rename = "current-context", default)]
    pub current_context: Option<String>,
    /// Contexts by name.
    #[serde(default)]
    pub contexts: BTreeMap<String, ContextConfig>,
}

impl ContextFile {
    /// `~/.duplo/config.toml`, if a home directory exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".duplo").join("config.toml"))
    }

    /// Load the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DuploError::Config(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse the file contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DuploError::Config(format!("invalid TOML: {e}")))
    }

    /// The named context, or the current one when `name` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if a context is named but missing.
    pub fn select(&self, name: Option<&str>) -> Result<Option<&ContextConfig>> {
        let Some(name) = name.or(self.current_context.as_deref()) else {
            return Ok(None);
        };
        self.contexts
            .get(name)
            .map(Some)
            .ok_or_else(|| DuploError::Config(format!("context '{name}' not found")))
    }
}

/// Resolved client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Portal URL.
    pub host: Option<String>,
    /// Bearer token.
    pub token: Option<String>,
    /// Tenant name.
    pub tenant: Option<String>,
    /// Tenant id.
    pub tenant_id: Option<String>,
    /// Output format.
    pub output: Format,
    /// Query applied to results.
    pub query: Option<String>,
    /// Whether mutating commands wait.
    pub wait: bool,
    /// Wait budget.
    pub wait_timeout: Duration,
    /// Log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Context to select from the config file.
    pub context: Option<String>,
    /// Explicit config file path.
    pub config_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: None,
            token: None,
            tenant: None,
            tenant_id: None,
            output: Format::Json,
            query: None,
            wait: false,
            wait_timeout: WaitPolicy::DEFAULT_TIMEOUT,
            log_level: "warn".to_string(),
            context: None,
            config_file: None,
        }
    }
}

fn owned(args: &ParsedArgs, name: &str) -> Option<String> {
    args.str(name).map(str::to_string)
}

impl Settings {
    /// Settings from parsed global flags.
    ///
    /// # Errors
    ///
    /// Returns an error for a negative wait timeout or an unknown format.
    pub fn from_args(args: &ParsedArgs) -> Result<Self> {
        let defaults = Self::default();
        let wait_timeout = match args.i64("wait_timeout") {
            Some(secs) => u64::try_from(secs)
                .map(Duration::from_secs)
                .map_err(|_| DuploError::invalid_argument("wait_timeout", "must not be negative"))?,
            None => defaults.wait_timeout,
        };
        let output = match args.str("output") {
            Some(raw) => raw.parse()?,
            None => defaults.output,
        };

        Ok(Self {
            host: owned(args, "host"),
            token: owned(args, "token"),
            tenant: owned(args, "tenant"),
            tenant_id: owned(args, "tenant_id"),
            output,
            query: owned(args, "query"),
            wait: args.flag("wait"),
            wait_timeout,
            log_level: owned(args, "log_level").unwrap_or(defaults.log_level),
            context: owned(args, "context"),
            config_file: args.str("config_file").map(PathBuf::from),
        })
    }

    /// Fills unset fields from the config file.
    ///
    /// A missing default file is fine unless a context was named; a missing
    /// explicit file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or invalid, or the named
    /// context is missing.
    pub fn apply_context_file(&mut self) -> Result<()> {
        let path = match (&self.config_file, ContextFile::default_path()) {
            (Some(path), _) => path.clone(),
            (None, Some(path)) if path.exists() => path,
            (None, _) => {
                return match &self.context {
                    Some(name) => Err(DuploError::Config(format!(
                        "context '{name}' requested but no config file exists"
                    ))),
                    None => Ok(()),
                };
            }
        };

        let file = ContextFile::from_file(&path)?;
        if let Some(context) = file.select(self.context.as_deref())? {
            debug!(path = %path.display(), "Applying config context");
            self.merge(context);
        }
        Ok(())
    }

    /// Fills unset host, token and tenant from `context`.
    pub fn merge(&mut self, context: &ContextConfig) {
        if self.host.is_none() {
            self.host.clone_from(&context.host);
        }
        if self.token.is_none() {
            self.token.clone_from(&context.token);
        }
        if self.tenant.is_none() {
            self.tenant.clone_from(&context.tenant);
        }
    }

    /// Checks that a request can be sent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a missing or malformed host or a
    /// missing token.
    pub fn validate(&self) -> Result<()> {
        let host = self
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| DuploError::Config("host is required (--host or DUPLO_HOST)".into()))?;

        if !host.starts_with("http://") && !host.starts_with("https://") {
            return Err(DuploError::Config(format!(
                "host must start with http:// or https://, got '{host}'"
            )));
        }

        if self.token.as_deref().is_none_or(str::is_empty) {
            return Err(DuploError::Config(
                "token is required (--token or DUPLO_TOKEN)".into(),
            ));
        }
        Ok(())
    }

    /// Settings handed to the client context.
    #[must_use]
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            tenant: self.tenant.clone(),
            tenant_id: self.tenant_id.clone(),
            wait: self.wait,
            wait_timeout: self.wait_timeout,
            ..ClientSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CONFIG: &str = r#"
current-context = "prod"

[contexts.prod]
host = "https://prod.duplocloud.net"
token = "prod-token"
tenant = "web"

[contexts.dev]
host = "https://dev.duplocloud.net"
token = "dev-token"
"#;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes())
            .unwrap();
        file
    }

    fn settings_with(file: &NamedTempFile) -> Settings {
        Settings {
            config_file: Some(file.path().to_path_buf()),
            ..Settings::default()
        }
    }

    #[test]
    fn test_parse_context_file() {
        let file = ContextFile::from_toml(CONFIG).unwrap();
        assert_eq!(file.current_context.as_deref(), Some("prod"));
        assert_eq!(file.contexts.len(), 2);
    }

    #[test]
    fn test_select_defaults_to_current_context() {
        let file = ContextFile::from_toml(CONFIG).unwrap();
        let selected = file.select(None).unwrap().expect("current context");
        assert_eq!(selected.tenant.as_deref(), Some("web"));
    }

    #[test]
    fn test_select_unknown_context_fails() {
        let file = ContextFile::from_toml(CONFIG).unwrap();
        assert!(matches!(file.select(Some("qa")), Err(DuploError::Config(_))));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(ContextFile::from_toml("current-context = ").is_err());
    }

    #[test]
    fn test_flags_win_over_context() {
        let file = create_temp_config(CONFIG);
        let mut settings = Settings {
            host: Some("https://override.duplocloud.net".into()),
            ..settings_with(&file)
        };
        assert!(settings.apply_context_file().is_ok());
        assert_eq!(settings.host.as_deref(), Some("https://override.duplocloud.net"));
        assert_eq!(settings.token.as_deref(), Some("prod-token"));
        assert_eq!(settings.tenant.as_deref(), Some("web"));
    }

    #[test]
    fn test_named_context_is_used() {
        let file = create_temp_config(CONFIG);
        let mut settings = Settings {
            context: Some("dev".into()),
            ..settings_with(&file)
        };
        assert!(settings.apply_context_file().is_ok());
        assert_eq!(settings.token.as_deref(), Some("dev-token"));
        assert!(settings.tenant.is_none());
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let mut settings = Settings {
            config_file: Some(PathBuf::from("/nonexistent/duplo/config.toml")),
            ..Settings::default()
        };
        assert!(matches!(
            settings.apply_context_file(),
            Err(DuploError::Config(_))
        ));
    }

    #[test]
    fn test_validate_requires_host_and_token() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_err());

        settings.host = Some("prod.duplocloud.net".into());
        settings.token = Some("t".into());
        assert!(settings.validate().is_err());

        settings.host = Some("https://prod.duplocloud.net".into());
        assert!(settings.validate().is_ok());

        settings.token = None;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_from_args() {
        let args = ParsedArgs::new()
            .with("host", "https://h")
            .with("output", "env")
            .with("wait", true)
            .with("wait_timeout", 60)
            .with("log_level", "debug");
        let settings = Settings::from_args(&args).unwrap();
        assert_eq!(settings.output, Format::Env);
        assert!(settings.wait);
        assert_eq!(settings.wait_timeout, Duration::from_secs(60));
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.client_settings().wait_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_negative_wait_timeout_rejected() {
        let args = ParsedArgs::new().with("wait_timeout", -5);
        assert!(Settings::from_args(&args).is_err());
    }
}
