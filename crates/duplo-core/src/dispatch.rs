//! `<resource> <command> [args]` dispatch.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use crate::context::ClientContext;
use crate::error::{DuploError, Result};
use crate::parser::ParsedArgs;
use crate::registry::Registry;
use crate::resource::{CommandInfo, LoadedResource};

/// Routes invocations through the registries to command handlers.
#[derive(Debug)]
pub struct Dispatcher<'a> {
    registry: &'a Registry,
    client: Arc<ClientContext>,
}

impl<'a> Dispatcher<'a> {
    /// Creates a dispatcher bound to `client`.
    #[must_use]
    pub fn new(registry: &'a Registry, client: Arc<ClientContext>) -> Self {
        Self { registry, client }
    }

    /// Loads the resource registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DuploError::UnknownResource`] for unregistered names.
    pub fn load(&self, name: &str) -> Result<Box<dyn LoadedResource>> {
        self.registry.resources().load(name, &self.client)
    }

    /// Parses `tokens` against the command's schema and runs it.
    ///
    /// # Errors
    ///
    /// Anything [`Registry::parse_command`] or [`Dispatcher::invoke`]
    /// returns.
    pub fn dispatch<I, S>(&self, resource: &str, command: &str, tokens: I) -> Result<Value>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args = self.registry.parse_command(resource, command, tokens)?;
        self.invoke(resource, command, &args)
    }

    /// Runs a command with arguments that were already parsed.
    ///
    /// # Errors
    ///
    /// - [`DuploError::UnknownResource`] / [`DuploError::UnknownCommand`]
    ///   for names that are not registered.
    /// - [`DuploError::Invocation`] when the handler fails on its arguments or
    ///   with an unexpected error; the command documentation rides along as
    ///   the usage hint.
    /// - Any other framework error from the handler, unchanged.
    pub fn invoke(&self, resource: &str, command: &str, args: &ParsedArgs) -> Result<Value> {
        let entry = self.registry.resources().get(resource)?;
        let info = entry
            .command(command)
            .ok_or_else(|| DuploError::UnknownCommand {
                resource: resource.to_string(),
                command: command.to_string(),
            })?;

        debug!(resource, command, key = %info.key, "Dispatching command");
        entry
            .load(&self.client)
            .invoke(command, args)
            .map_err(|err| invocation_error(resource, info, err))
    }
}

fn invocation_error(resource: &str, info: &CommandInfo, err: DuploError) -> DuploError {
    let usage = (!info.doc.is_empty()).then(|| info.doc.to_string());
    match err {
        DuploError::MissingArgument(_) | DuploError::InvalidArgument { .. } => {
            DuploError::Invocation {
                resource: resource.to_string(),
                command: info.name.to_string(),
                message: err.to_string(),
                usage,
            }
        }
        DuploError::Other(inner) => {
            error!(resource, command = info.name, error = ?inner, "Command failed");
            DuploError::Invocation {
                resource: resource.to_string(),
                command: info.name.to_string(),
                message: format!("{inner:#}"),
                usage,
            }
        }
        other => other,
    }
}
