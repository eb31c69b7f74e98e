//! Command signatures and the schema registry.
//!
//! A command declares its parameters as a [`Signature`]. Only parameters
//! carrying an [`Argument`] descriptor reach the command line; the rest are
//! plain parameters filled in by programmatic callers. Registering a
//! signature records the exposed descriptors, in declaration order, under
//! the command's [`CommandKey`].

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::argument::Argument;
use crate::error::{DuploError, Result};

/// One parameter of a command.
#[derive(Debug, Clone)]
pub enum Param {
    /// Parameter exposed through a descriptor.
    Arg {
        /// The descriptor.
        argument: Argument,
        /// Signature-level default, which overrides the descriptor's.
        default: Option<Value>,
    },
    /// Parameter that never appears on the command line.
    Plain {
        /// Parameter name.
        name: String,
    },
}

/// Ordered parameter list of a command.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    /// Creates an empty signature.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter annotated with a descriptor.
    #[must_use]
    pub fn arg(mut self, argument: &Argument) -> Self {
        self.params.push(Param::Arg {
            argument: argument.clone(),
            default: None,
        });
        self
    }

    /// Appends an annotated parameter with its own default.
    #[must_use]
    pub fn arg_with_default(mut self, argument: &Argument, default: impl Into<Value>) -> Self {
        self.params.push(Param::Arg {
            argument: argument.clone(),
            default: Some(default.into()),
        });
        self
    }

    /// Appends a parameter that is not exposed on the command line.
    #[must_use]
    pub fn plain(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param::Plain { name: name.into() });
        self
    }

    /// All parameters, exposed or not.
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Descriptors exposed on the command line, with signature defaults
    /// applied.
    #[must_use]
    pub fn arguments(&self) -> Vec<Argument> {
        self.params
            .iter()
            .filter_map(|param| match param {
                Param::Arg {
                    argument,
                    default: Some(default),
                } => Some(argument.with_default(default.clone())),
                Param::Arg {
                    argument,
                    default: None,
                } => Some(argument.clone()),
                Param::Plain { .. } => None,
            })
            .collect()
    }
}

/// Fully-qualified command identifier: `<Type>.<method>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandKey(String);

impl CommandKey {
    /// Builds the key for a method on a type.
    #[must_use]
    pub fn new(type_name: &str, method: &str) -> Self {
        Self(format!("{type_name}.{method}"))
    }

    /// The key as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Map from command key to its ordered argument schema.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: HashMap<CommandKey, Vec<Argument>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the exposed arguments of a signature under `key`.
    ///
    /// A second registration under the same key replaces the first.
    /// Returns the number of exposed arguments.
    pub fn register(&mut self, key: CommandKey, signature: &Signature) -> usize {
        let arguments = signature.arguments();
        let count = arguments.len();
        if self.entries.insert(key.clone(), arguments).is_some() {
            debug!(key = %key, "Replaced command schema");
        } else {
            debug!(key = %key, arguments = count, "Registered command schema");
        }
        count
    }

    /// Schema registered under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DuploError::UnregisteredCommand`] if nothing is registered
    /// under the key.
    pub fn get(&self, key: &CommandKey) -> Result<&[Argument]> {
        self.entries
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| DuploError::UnregisteredCommand(key.to_string()))
    }

    /// Whether `key` is registered.
    #[must_use]
    pub fn contains(&self, key: &CommandKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn name_arg() -> Argument {
        Argument::new("name").help("Resource name.")
    }

    fn image_arg() -> Argument {
        Argument::new("image").flag("--image").default_value("ubuntu")
    }

    #[test]
    fn plain_params_are_not_exposed() {
        let signature = Signature::new()
            .arg(&name_arg())
            .plain("body")
            .arg(&image_arg())
            .plain("patches");

        let mut registry = SchemaRegistry::new();
        let key = CommandKey::new("DuploService", "create");
        assert_eq!(registry.register(key.clone(), &signature), 2);

        let schema = registry.get(&key).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema[0].name(), "name");
        assert_eq!(schema[1].name(), "image");
        assert_eq!(signature.params().len(), 4);
    }

    #[test]
    fn signature_default_overrides_descriptor_default() {
        let signature = Signature::new().arg_with_default(&image_arg(), "alpine");
        let arguments = signature.arguments();
        assert_eq!(arguments[0].get_default(), Some(&json!("alpine")));
    }

    #[test]
    fn unregistered_key_is_an_error() {
        let registry = SchemaRegistry::new();
        let err = registry.get(&CommandKey::new("DuploService", "nope")).err();
        assert!(matches!(
            err,
            Some(DuploError::UnregisteredCommand(ref k)) if k == "DuploService.nope"
        ));
    }

    #[test]
    fn reregistering_overwrites() {
        let mut registry = SchemaRegistry::new();
        let key = CommandKey::new("DuploHost", "find");
        registry.register(key.clone(), &Signature::new().arg(&name_arg()));
        registry.register(key.clone(), &Signature::new());

        assert_eq!(registry.len(), 1);
        assert!(registry.get(&key).map(<[Argument]>::is_empty).unwrap_or(false));
    }

    #[test]
    fn key_format() {
        assert_eq!(CommandKey::new("DuploTenant", "list").as_str(), "DuploTenant.list");
    }
}
