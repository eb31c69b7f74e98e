//! Resources, their command tables, and the resource registry.
//!
//! A resource type implements [`Resource`]: it names its type, declares
//! its endpoint layout, and lists its commands. Each command pairs a
//! [`Signature`] with a handler function pointer. Registration turns the
//! list into a [`ResourceEntry`] holding a name-keyed handler table and a
//! loader that binds a fresh instance to a client context.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::context::{ClientContext, ClientSettings, Transport};
use crate::error::{DuploError, Result};
use crate::parser::ParsedArgs;
use crate::schema::{CommandKey, Signature};
use crate::scope::{ApiVersion, Scope, ScopeContext, TenantScope};
use crate::wait::{Poll, WaitPolicy};

/// Handler invoked with parsed arguments.
pub type Handler<R> = fn(&R, &ParsedArgs) -> Result<Value>;

/// One command of a resource.
pub struct Command<R> {
    name: &'static str,
    doc: &'static str,
    signature: Signature,
    handler: Handler<R>,
}

impl<R> fmt::Debug for Command<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl<R> Command<R> {
    /// Creates a command with an empty signature.
    #[must_use]
    pub fn new(name: &'static str, doc: &'static str, handler: Handler<R>) -> Self {
        Self {
            name,
            doc,
            signature: Signature::new(),
            handler,
        }
    }

    /// Sets the parameter list.
    #[must_use]
    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    /// Command name as typed on the command line.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Documentation, used as the usage hint.
    #[must_use]
    pub const fn doc(&self) -> &'static str {
        self.doc
    }

    /// Parameter list.
    #[must_use]
    pub const fn get_signature(&self) -> &Signature {
        &self.signature
    }
}

/// What a loaded resource instance is bound to.
#[derive(Debug)]
pub struct ResourceContext {
    client: Arc<ClientContext>,
    scope: ScopeContext,
}

impl ResourceContext {
    /// Creates a context with the scope capability for `scope`.
    #[must_use]
    pub fn new(client: Arc<ClientContext>, scope: Scope, api: ApiVersion) -> Self {
        let scope = ScopeContext::new(scope, client.clone(), api);
        Self { client, scope }
    }

    /// The shared client.
    #[must_use]
    pub fn client(&self) -> &ClientContext {
        &self.client
    }

    /// The scope capability.
    #[must_use]
    pub const fn scope(&self) -> &ScopeContext {
        &self.scope
    }

    /// Tenant capability; `None` for portal-scoped resources.
    #[must_use]
    pub const fn tenant(&self) -> Option<&TenantScope> {
        self.scope.tenant()
    }

    /// Tenant capability, or an error for portal-scoped resources.
    pub fn require_tenant(&self) -> Result<&TenantScope> {
        self.tenant().ok_or_else(|| {
            DuploError::Config("resource is portal scoped and has no tenant".into())
        })
    }

    /// Endpoint in the resource's scope and layout.
    pub fn endpoint(&self, segments: &[&str]) -> Result<String> {
        self.scope.endpoint(segments)
    }

    /// The API transport.
    #[must_use]
    pub fn transport(&self) -> &dyn Transport {
        self.client.transport()
    }

    /// Client settings.
    #[must_use]
    pub fn settings(&self) -> &ClientSettings {
        self.client.settings()
    }

    /// Client-wide wait policy.
    #[must_use]
    pub fn wait_policy(&self) -> WaitPolicy {
        self.client.wait_policy()
    }

    /// Polls `predicate` with the client-wide wait policy.
    pub fn wait<T, F>(&self, predicate: F) -> Result<T>
    where
        F: FnMut() -> Result<Poll<T>>,
    {
        self.client.wait(predicate)
    }
}

/// A resource type participating in dispatch.
pub trait Resource: Sized + 'static {
    /// Implementing type name; the first half of every command key.
    const TYPE_NAME: &'static str;

    /// Parent type name, for introspection.
    const PARENT: &'static str = "DuploResource";

    /// Endpoint layout.
    const API: ApiVersion = ApiVersion::V2;

    /// Binds an instance to its context.
    fn new(context: ResourceContext) -> Self;

    /// The bound context.
    fn context(&self) -> &ResourceContext;

    /// Command table, built once at registration.
    fn commands() -> Vec<Command<Self>>;
}

/// A resource instance with its type erased.
pub trait LoadedResource {
    /// Registered resource name.
    fn name(&self) -> &str;

    /// The bound context.
    fn context(&self) -> &ResourceContext;

    /// Runs the named command.
    ///
    /// # Errors
    ///
    /// Returns [`DuploError::UnknownCommand`] for names outside the
    /// command table, or whatever the handler returns.
    fn invoke(&self, command: &str, args: &ParsedArgs) -> Result<Value>;
}

struct Bound<R> {
    name: String,
    resource: R,
    handlers: Arc<HashMap<&'static str, Handler<R>>>,
}

impl<R: Resource> LoadedResource for Bound<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn context(&self) -> &ResourceContext {
        self.resource.context()
    }

    fn invoke(&self, command: &str, args: &ParsedArgs) -> Result<Value> {
        let handler = self
            .handlers
            .get(command)
            .ok_or_else(|| DuploError::UnknownCommand {
                resource: self.name.clone(),
                command: command.to_string(),
            })?;
        handler(&self.resource, args)
    }
}

type Loader = Box<dyn Fn(Arc<ClientContext>) -> Box<dyn LoadedResource> + Send + Sync>;

/// Public view of one registered command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    /// Command name.
    pub name: &'static str,
    /// Documentation.
    pub doc: &'static str,
    /// Schema key.
    pub key: CommandKey,
}

/// Registry entry for one resource.
pub struct ResourceEntry {
    name: String,
    type_name: &'static str,
    parent: &'static str,
    scope: Scope,
    api: ApiVersion,
    commands: Vec<CommandInfo>,
    loader: Loader,
}

impl fmt::Debug for ResourceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceEntry")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("scope", &self.scope)
            .field("commands", &self.commands.len())
            .finish_non_exhaustive()
    }
}

impl ResourceEntry {
    /// Builds the entry for `R`, consuming its command table.
    ///
    /// Returns the entry together with each command's key and signature so
    /// the caller can record the schemas.
    #[must_use]
    pub fn build<R: Resource>(name: &str, scope: Scope) -> (Self, Vec<(CommandKey, Signature)>) {
        let mut infos = Vec::new();
        let mut schemas = Vec::new();
        let mut handlers = HashMap::new();

        for command in R::commands() {
            let key = CommandKey::new(R::TYPE_NAME, command.name);
            infos.push(CommandInfo {
                name: command.name,
                doc: command.doc,
                key: key.clone(),
            });
            handlers.insert(command.name, command.handler);
            schemas.push((key, command.signature));
        }

        let handlers = Arc::new(handlers);
        let bound_name = name.to_string();
        let loader: Loader = Box::new(move |client| {
            let context = ResourceContext::new(client, scope, R::API);
            let bound: Box<dyn LoadedResource> = Box::new(Bound {
                name: bound_name.clone(),
                resource: R::new(context),
                handlers: Arc::clone(&handlers),
            });
            bound
        });

        let entry = Self {
            name: name.to_string(),
            type_name: R::TYPE_NAME,
            parent: R::PARENT,
            scope,
            api: R::API,
            commands: infos,
            loader,
        };
        (entry, schemas)
    }

    /// Registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Implementing type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Parent type name.
    #[must_use]
    pub const fn parent(&self) -> &'static str {
        self.parent
    }

    /// Scope the resource was registered with.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// Endpoint layout.
    #[must_use]
    pub const fn api(&self) -> ApiVersion {
        self.api
    }

    /// Commands in declaration order.
    #[must_use]
    pub fn commands(&self) -> &[CommandInfo] {
        &self.commands
    }

    /// Looks up one command.
    #[must_use]
    pub fn command(&self, name: &str) -> Option<&CommandInfo> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Binds a fresh instance to `client`.
    #[must_use]
    pub fn load(&self, client: &Arc<ClientContext>) -> Box<dyn LoadedResource> {
        (self.loader)(Arc::clone(client))
    }
}

/// Map from resource name to its entry.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    entries: BTreeMap<String, ResourceEntry>,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry.
    ///
    /// # Errors
    ///
    /// Returns [`DuploError::DuplicateResource`] if the name is taken.
    pub fn insert(&mut self, entry: ResourceEntry) -> Result<&ResourceEntry> {
        match self.entries.entry(entry.name.clone()) {
            std::collections::btree_map::Entry::Occupied(_) => {
                Err(DuploError::DuplicateResource(entry.name))
            }
            std::collections::btree_map::Entry::Vacant(slot) => Ok(&*slot.insert(entry)),
        }
    }

    /// Entry registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DuploError::UnknownResource`] for unregistered names.
    pub fn get(&self, name: &str) -> Result<&ResourceEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| DuploError::UnknownResource(name.to_string()))
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Loads the resource registered under `name`.
    pub fn load(&self, name: &str, client: &Arc<ClientContext>) -> Result<Box<dyn LoadedResource>> {
        Ok(self.get(name)?.load(client))
    }

    /// Entries sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.entries.values()
    }

    /// Number of registered resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
