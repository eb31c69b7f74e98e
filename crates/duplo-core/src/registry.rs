//! Process-wide registration of resources and command schemas.
//!
//! A bootstrap function builds one [`Registry`] at startup by calling
//! [`Registry::register`] for every resource type. After that the registry
//! is only read.

use tracing::info;

use crate::error::{DuploError, Result};
use crate::parser::{ParsedArgs, Parser};
use crate::resource::{Resource, ResourceEntry, ResourceRegistry};
use crate::schema::{CommandKey, SchemaRegistry, Signature};
use crate::scope::Scope;

/// Schema and resource registries, populated together.
#[derive(Debug, Default)]
pub struct Registry {
    schemas: SchemaRegistry,
    resources: ResourceRegistry,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers resource type `R` under `name`.
    ///
    /// The scope is validated before anything is recorded, and every command
    /// schema is stored under `<R::TYPE_NAME>.<command>`.
    ///
    /// # Errors
    ///
    /// Returns [`DuploError::InvalidScope`] for a scope outside
    /// `{portal, tenant}` and [`DuploError::DuplicateResource`] if `name` is
    /// already taken.
    pub fn register<R: Resource>(&mut self, name: &str, scope: &str) -> Result<&ResourceEntry> {
        let scope: Scope = scope.parse()?;
        if self.resources.contains(name) {
            return Err(DuploError::DuplicateResource(name.to_string()));
        }

        let (entry, schemas) = ResourceEntry::build::<R>(name, scope);
        for (key, signature) in &schemas {
            self.schemas.register(key.clone(), signature);
        }

        info!(
            resource = %name,
            type_name = R::TYPE_NAME,
            scope = %scope,
            commands = schemas.len(),
            "Registered resource"
        );
        self.resources.insert(entry)
    }

    /// Registers a standalone signature, such as the client constructor's
    /// global flags.
    pub fn register_schema(&mut self, key: CommandKey, signature: &Signature) -> usize {
        self.schemas.register(key, signature)
    }

    /// Parser for the schema under `key`.
    pub fn parser(&self, key: &CommandKey) -> Result<Parser<'_>> {
        self.schemas.parser(key)
    }

    /// Resolves `<resource> <command>` and parses `tokens` against the
    /// command's schema.
    ///
    /// Needs no client, so usage and help errors surface before any
    /// configuration is loaded.
    ///
    /// # Errors
    ///
    /// - [`DuploError::UnknownResource`] / [`DuploError::UnknownCommand`]
    ///   for names that are not registered.
    /// - [`DuploError::Usage`] or [`DuploError::HelpRequested`] from parsing.
    pub fn parse_command<I, S>(
        &self,
        resource: &str,
        command: &str,
        tokens: I,
    ) -> Result<ParsedArgs>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let info = self
            .resources
            .get(resource)?
            .command(command)
            .ok_or_else(|| DuploError::UnknownCommand {
                resource: resource.to_string(),
                command: command.to_string(),
            })?;
        self.parser(&info.key)?
            .named(format!("{resource} {command}"))
            .parse(tokens)
    }

    /// The schema registry.
    #[must_use]
    pub const fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// The resource registry.
    #[must_use]
    pub const fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::Argument;
    use crate::context::ClientSettings;
    use crate::parser::ParsedArgs;
    use crate::resource::{Command, ResourceContext};
    use crate::testing::{MemoryTransport, client_for};
    use serde_json::{Value, json};
    use std::sync::Arc;

    struct Volume {
        context: ResourceContext,
    }

    impl Volume {
        fn find(&self, args: &ParsedArgs) -> Result<Value> {
            let name = args.require_str("name")?;
            Ok(json!({ "Name": name, "Path": self.context.endpoint(&["GetVolumes"])? }))
        }

        fn resize(&self, args: &ParsedArgs) -> Result<Value> {
            Ok(json!({ "Size": args.i64("size") }))
        }
    }

    impl Resource for Volume {
        const TYPE_NAME: &'static str = "DuploVolume";

        fn new(context: ResourceContext) -> Self {
            Self { context }
        }

        fn context(&self) -> &ResourceContext {
            &self.context
        }

        fn commands() -> Vec<Command<Self>> {
            let name = Argument::new("name");
            let size = Argument::new("size")
                .flag("--size")
                .value_type(crate::argument::ValueType::Integer)
                .default_value(10);
            vec![
                Command::new("find", "Find a volume by name.", Self::find)
                    .signature(Signature::new().arg(&name).plain("body")),
                Command::new("resize", "Resize a volume.", Self::resize)
                    .signature(Signature::new().arg(&name).arg_with_default(&size, 20)),
            ]
        }
    }

    #[test]
    fn register_records_schemas_and_entry() {
        let mut registry = Registry::new();
        assert!(registry.register::<Volume>("volume", "tenant").is_ok());

        let find = CommandKey::new("DuploVolume", "find");
        assert_eq!(registry.schemas().get(&find).map(<[Argument]>::len).unwrap(), 1);

        let parsed = registry
            .parser(&CommandKey::new("DuploVolume", "resize"))
            .and_then(|p| p.parse(["data"]))
            .unwrap();
        assert_eq!(parsed.i64("size"), Some(20));

        let entry = registry.resources().get("volume");
        assert!(entry.is_ok_and(|e| e.scope() == Scope::Tenant && e.commands().len() == 2));
    }

    #[test]
    fn parse_command_needs_no_client() {
        let mut registry = Registry::new();
        registry.register::<Volume>("volume", "tenant").unwrap();

        let parsed = registry.parse_command("volume", "resize", ["data", "--size", "5"]).unwrap();
        assert_eq!(parsed.i64("size"), Some(5));

        let help = registry.parse_command("volume", "resize", ["--help"]).unwrap_err();
        assert!(matches!(help, DuploError::HelpRequested(ref text) if text.contains("volume resize")));

        let usage = registry.parse_command("volume", "find", Vec::<String>::new()).unwrap_err();
        assert!(matches!(usage, DuploError::Usage { .. }));

        let command = registry.parse_command("volume", "shrink", ["data"]).unwrap_err();
        assert!(matches!(command, DuploError::UnknownCommand { .. }));
        let resource = registry.parse_command("disk", "find", ["data"]).unwrap_err();
        assert!(matches!(resource, DuploError::UnknownResource(_)));
    }

    #[test]
    fn bogus_scope_fails_before_anything_is_recorded() {
        let mut registry = Registry::new();
        let err = registry.register::<Volume>("volume", "bogus").err();
        assert!(err.is_some_and(|e| e.to_string().contains("Invalid scope")));
        assert!(registry.resources().is_empty());
        assert!(registry.schemas().is_empty());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut registry = Registry::new();
        assert!(registry.register::<Volume>("volume", "tenant").is_ok());
        assert!(matches!(
            registry.register::<Volume>("volume", "portal"),
            Err(DuploError::DuplicateResource(_))
        ));
        assert_eq!(registry.resources().get("volume").unwrap().scope(), Scope::Tenant);
    }

    #[test]
    fn tenant_helpers_depend_on_scope() {
        let mut registry = Registry::new();
        assert!(registry.register::<Volume>("volume", "tenant").is_ok());
        assert!(registry.register::<Volume>("shared-volume", "portal").is_ok());

        let client = client_for(
            Arc::new(MemoryTransport::new()),
            ClientSettings {
                tenant: Some("acme".into()),
                ..ClientSettings::default()
            },
        );

        let loaded = registry.resources().load("volume", &client).unwrap();
        let tenant = loaded.context().tenant().expect("tenant scope attached");
        assert!(tenant.tenant().is_ok());
        assert_eq!(tenant.tenant_id().unwrap(), "tid-1");
        assert_eq!(tenant.prefixed_name("foo").unwrap(), "duploservices-acme-foo");

        let portal = registry.resources().load("shared-volume", &client).unwrap();
        assert!(portal.context().tenant().is_none());
    }
}
