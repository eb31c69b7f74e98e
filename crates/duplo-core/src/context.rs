//! Client context shared by every loaded resource.
//!
//! The framework never talks HTTP or resolves tenants itself. It consumes
//! two collaborators, [`Transport`] and [`TenantDirectory`], and the
//! settings parsed from the global flags.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::Result;
use crate::scope::Tenant;
use crate::wait::{Poll, WaitPolicy};

/// Request/response access to the management API.
///
/// Paths are relative to the API host, e.g. `subscriptions/<id>/GetPods`.
pub trait Transport: Send + Sync {
    /// `GET` a path.
    fn get(&self, path: &str) -> Result<Value>;

    /// `POST` a JSON body.
    fn post(&self, path: &str, body: &Value) -> Result<Value>;

    /// `PUT` a JSON body.
    fn put(&self, path: &str, body: &Value) -> Result<Value>;

    /// `DELETE` a path.
    fn delete(&self, path: &str) -> Result<Value>;
}

/// Resolves a tenant name or id into a full tenant record.
pub trait TenantDirectory: Send + Sync {
    /// Finds a tenant by account name or tenant id.
    fn find(&self, name_or_id: &str) -> Result<Tenant>;
}

/// Settings taken from the global flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Tenant name.
    pub tenant: Option<String>,
    /// Tenant id; wins over the name when both are set.
    pub tenant_id: Option<String>,
    /// Whether mutating commands block until the change converges.
    pub wait: bool,
    /// Default wait timeout.
    pub wait_timeout: Duration,
    /// Default interval between wait attempts.
    pub poll_interval: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            tenant: None,
            tenant_id: None,
            wait: false,
            wait_timeout: WaitPolicy::DEFAULT_TIMEOUT,
            poll_interval: WaitPolicy::DEFAULT_POLL_INTERVAL,
        }
    }
}

/// The ambient client every resource is bound to.
pub struct ClientContext {
    transport: Arc<dyn Transport>,
    tenants: Arc<dyn TenantDirectory>,
    settings: ClientSettings,
}

impl fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ClientContext {
    /// Creates a client context.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        tenants: Arc<dyn TenantDirectory>,
        settings: ClientSettings,
    ) -> Self {
        Self {
            transport,
            tenants,
            settings,
        }
    }

    /// The API transport.
    #[must_use]
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// The tenant lookup collaborator.
    #[must_use]
    pub fn tenants(&self) -> &dyn TenantDirectory {
        self.tenants.as_ref()
    }

    /// Parsed client settings.
    #[must_use]
    pub const fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Wait policy built from the client-wide defaults.
    #[must_use]
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(self.settings.wait_timeout)
            .with_poll_interval(self.settings.poll_interval)
    }

    /// Polls `predicate` with the client-wide wait policy.
    pub fn wait<T, F>(&self, predicate: F) -> Result<T>
    where
        F: FnMut() -> Result<Poll<T>>,
    {
        self.wait_policy().wait(predicate)
    }
}
