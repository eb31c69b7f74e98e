//! Resources exposed by `duploctl`.
//!
//! | Resource  | Scope  | API | Commands                               |
//! |-----------|--------|-----|----------------------------------------|
//! | `tenant`  | portal | v2  | `list`, `find`, `create`, `delete`     |
//! | `service` | tenant | v2  | `list`, `find`, `delete`, `update_image` |
//! | `host`    | tenant | v2  | `list`, `find`, `start`, `stop`        |
//! | `secret`  | tenant | v3  | `list`, `find`, `create`, `delete`     |

pub mod args;
pub mod host;
pub mod secret;
pub mod service;
pub mod tenant;

pub use host::DuploHosts;
pub use secret::DuploSecret;
pub use service::DuploService;
pub use tenant::DuploTenant;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::Value;

    use duplo_core::testing::{MemoryTransport, client_for};
    use duplo_core::{ClientSettings, Dispatcher, Result};

    use crate::cli::bootstrap;

    pub fn transport() -> Arc<MemoryTransport> {
        Arc::new(MemoryTransport::new())
    }

    /// Dispatches against the full registry as tenant `acme`, with a wait
    /// budget of three attempts and no sleeping.
    pub fn dispatch(
        transport: &Arc<MemoryTransport>,
        wait: bool,
        resource: &str,
        command: &str,
        tokens: &[&str],
    ) -> Result<Value> {
        let registry = bootstrap()?;
        let client = client_for(
            Arc::clone(transport),
            ClientSettings {
                tenant: Some("acme".into()),
                wait,
                wait_timeout: Duration::from_secs(3),
                poll_interval: Duration::ZERO,
                ..ClientSettings::default()
            },
        );
        Dispatcher::new(&registry, client).dispatch(resource, command, tokens.iter().copied())
    }
}
