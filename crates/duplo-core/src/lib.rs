//! # duplo-core
//!
//! Command and resource framework for `duploctl`.
//!
//! Every `duploctl <resource> <command> [args]` invocation runs through this
//! crate:
//!
//! - **Argument descriptors** describe one CLI argument and coerce raw
//!   tokens into values
//! - **Signatures** list a command's parameters; the annotated ones become
//!   its schema in the **schema registry**
//! - **Parsers** are built on demand from a registered schema
//! - The **resource registry** maps resource names to their type, scope and
//!   command table
//! - The **dispatcher** loads a resource, parses the tokens and invokes the
//!   command
//! - The **wait engine** polls a predicate until a cloud change converges
//!
//! ## Overview
//!
//! ```text
//!  bootstrap ──register──► ┌───────────────────────────────────────────┐
//!                          │                 Registry                  │
//!                          │  ┌───────────────┐   ┌─────────────────┐  │
//!                          │  │    Schema     │   │    Resource     │  │
//!                          │  │   Registry    │   │    Registry     │  │
//!                          │  └───────┬───────┘   └────────┬────────┘  │
//!                          └──────────┼────────────────────┼───────────┘
//!                                     │ parser             │ load
//!                                     ▼                    ▼
//!  tokens ──────────────────────► ┌────────────────────────────┐
//!                                 │         Dispatcher         │
//!                                 └─────────────┬──────────────┘
//!                                               │ invoke
//!                                               ▼
//!                                 ┌────────────────────────────┐
//!                                 │  handler ──► WaitPolicy    │
//!                                 └────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use duplo_core::{Argument, CommandKey, SchemaRegistry, Signature};
//!
//! let name = Argument::new("name").help("Service name.");
//! let image = Argument::new("image").flag("--image").default_value("ubuntu");
//!
//! let mut schemas = SchemaRegistry::new();
//! let key = CommandKey::new("DuploService", "update_image");
//! schemas.register(key.clone(), &Signature::new().arg(&name).arg_with_default(&image, "alpine"));
//!
//! let args = schemas.parser(&key)?.parse(["web"])?;
//! assert_eq!(args.str("name"), Some("web"));
//! assert_eq!(args.str("image"), Some("alpine"));
//! # Ok::<(), duplo_core::DuploError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod argument;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod parser;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod scope;
pub mod wait;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use argument::{ArgAction, Argument, Nargs, ValueType};
pub use context::{ClientContext, ClientSettings, TenantDirectory, Transport};
pub use dispatch::Dispatcher;
pub use error::{DuploError, Result};
pub use parser::{ParsedArgs, Parser};
pub use registry::Registry;
pub use resource::{
    Command, CommandInfo, Handler, LoadedResource, Resource, ResourceContext, ResourceEntry,
    ResourceRegistry,
};
pub use schema::{CommandKey, Param, SchemaRegistry, Signature};
pub use scope::{ApiVersion, PortalScope, Scope, ScopeContext, Tenant, TenantScope};
pub use wait::{Poll, WaitPolicy};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
