//! Error types for the duplo-core crate.
//!
//! Every failure the framework can report is a variant of [`DuploError`],
//! and every variant carries a numeric code that the binary turns into a
//! process exit status.

use thiserror::Error;

/// Fallback code for failures without a more specific one.
pub const GENERAL_ERROR: i32 = 1;

/// Code for malformed or missing command-line arguments.
pub const USAGE_ERROR: i32 = 2;

/// Code for names that are not registered commands or resources.
pub const UNREGISTERED: i32 = 3;

/// Code for a wait budget that ran out before the resource converged.
pub const TIMED_OUT: i32 = 124;

/// Code for client configuration problems (sysexits `EX_CONFIG`).
pub const CONFIG_ERROR: i32 = 78;

/// Code reported when the API answers 404.
pub const NOT_FOUND: i32 = 404;

/// Errors raised by the command and resource framework.
#[derive(Debug, Error)]
pub enum DuploError {
    /// Arguments did not match the command schema.
    #[error("usage error: {message}")]
    Usage {
        /// Parser message, usually including the usage line.
        message: String,
    },

    /// Help or version output was requested instead of a command run.
    #[error("{0}")]
    HelpRequested(String),

    /// A schema key has no registered command.
    #[error("'{0}' is not a registered command")]
    UnregisteredCommand(String),

    /// No resource is registered under the name.
    #[error("resource not found: {0}")]
    UnknownResource(String),

    /// The resource exists but has no command with the name.
    #[error("command '{command}' not found on resource '{resource}'")]
    UnknownCommand {
        /// Resource the command was looked up on.
        resource: String,
        /// Command name that was requested.
        command: String,
    },

    /// Scope outside the closed set `{portal, tenant}`.
    #[error("Invalid scope '{0}': expected one of portal, tenant")]
    InvalidScope(String),

    /// A resource name was registered twice.
    #[error("resource already registered: {0}")]
    DuplicateResource(String),

    /// A command read an argument that was not supplied.
    #[error("missing argument: {0}")]
    MissingArgument(String),

    /// A command read an argument with the wrong shape.
    #[error("invalid argument '{name}': {message}")]
    InvalidArgument {
        /// Argument destination name.
        name: String,
        /// What was wrong with the value.
        message: String,
    },

    /// A dispatched command failed in a way the framework did not anticipate.
    #[error("{resource} {command} failed: {message}")]
    Invocation {
        /// Resource name.
        resource: String,
        /// Command name.
        command: String,
        /// Underlying failure.
        message: String,
        /// Command documentation shown as a hint.
        usage: Option<String>,
    },

    /// A waited-on resource reached a state it cannot recover from.
    #[error("resource failed: {0}")]
    FailedResource(String),

    /// The wait engine ran out of attempts.
    #[error("timed out waiting: {0}")]
    Timeout(String),

    /// The API reported that the object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The API answered with an error status.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// Client configuration is incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Glue failure inside a command body.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DuploError {
    /// Creates a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Creates an invalid-argument error.
    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Domain code carried by the error.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::HelpRequested(_) => 0,
            Self::Usage { .. } => USAGE_ERROR,
            Self::UnregisteredCommand(_)
            | Self::UnknownResource(_)
            | Self::UnknownCommand { .. } => UNREGISTERED,
            Self::Timeout(_) => TIMED_OUT,
            Self::Config(_) => CONFIG_ERROR,
            Self::NotFound(_) => NOT_FOUND,
            Self::Api { status, .. } => i32::from(*status),
            Self::InvalidScope(_)
            | Self::DuplicateResource(_)
            | Self::MissingArgument(_)
            | Self::InvalidArgument { .. }
            | Self::Invocation { .. }
            | Self::FailedResource(_)
            | Self::Transport(_)
            | Self::Other(_) => GENERAL_ERROR,
        }
    }

    /// Process exit status for the error.
    ///
    /// Codes that do not fit in a process status fall back to
    /// [`GENERAL_ERROR`].
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::try_from(self.code()).unwrap_or(GENERAL_ERROR as u8)
    }

    /// Whether the wait engine may poll again after seeing this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Api { .. } | Self::Transport(_) | Self::Other(_)
        )
    }

    /// Usage hint attached to an invocation error.
    #[must_use]
    pub fn usage_hint(&self) -> Option<&str> {
        match self {
            Self::Invocation { usage, .. } => usage.as_deref(),
            _ => None,
        }
    }
}

/// Result type for framework operations.
pub type Result<T> = std::result::Result<T, DuploError>;
