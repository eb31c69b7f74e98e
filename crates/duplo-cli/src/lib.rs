//! # duplo-cli
//!
//! `duploctl`, the command-line client for the DuploCloud portal API.
//!
//! ```text
//! duploctl [global flags] <resource> <command> [args]
//!
//! ┌──────────┐  parse_known   ┌──────────┐  dispatch   ┌────────────┐
//! │  tokens  │──────────────►│ Settings │────────────►│ duplo-core │
//! └──────────┘                └──────────┘             └─────┬──────┘
//!                                                            │ Transport
//!                                                            ▼
//!                                                     ┌────────────┐
//!                                                     │ portal API │
//!                                                     └────────────┘
//! ```
//!
//! The framework lives in `duplo-core`; this crate supplies the global
//! flags, the config file, the HTTP transport, output formatting and the
//! resources themselves.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod cli;
pub mod config;
pub mod http;
pub mod output;
pub mod resources;

pub use cli::{Invocation, bootstrap};
pub use config::{ContextFile, Settings};
pub use http::{ApiTenants, HttpTransport};
pub use output::Format;
