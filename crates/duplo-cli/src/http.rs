//! HTTP transport and tenant lookup over the portal API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use duplo_core::{DuploError, Result, Tenant, TenantDirectory, Transport};

/// Request timeout for a single API call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Blocking JSON transport with bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    host: String,
    token: String,
}

impl HttpTransport {
    /// Create a transport for `host`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(host: &str, token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("duploctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DuploError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Absolute URL of an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.host, path.trim_start_matches('/'))
    }

    fn send(&self, request: RequestBuilder, method: &str, path: &str) -> Result<Value> {
        debug!(method, path, "Sending request");
        let response = request
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .map_err(|e| DuploError::Transport(format!("{method} {path}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| DuploError::Transport(format!("{method} {path}: {e}")))?;

        if status == StatusCode::NOT_FOUND {
            return Err(DuploError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            warn!(method, path, status = status.as_u16(), "Request failed");
            return Err(DuploError::Api {
                status: status.as_u16(),
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            });
        }
        Ok(parse_body(&body))
    }
}

/// Parses a response body; empty bodies are `null` and non-JSON bodies are
/// returned as a string.
fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

impl Transport for HttpTransport {
    fn get(&self, path: &str) -> Result<Value> {
        self.send(self.client.get(self.url(path)), "GET", path)
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(self.client.post(self.url(path)).json(body), "POST", path)
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(self.client.put(self.url(path)).json(body), "PUT", path)
    }

    fn delete(&self, path: &str) -> Result<Value> {
        self.send(self.client.delete(self.url(path)), "DELETE", path)
    }
}

/// Path listing the tenants visible to the token.
pub const TENANTS_PATH: &str = "adminproxy/GetTenantNamesForUser";

/// Tenant lookup through the API.
#[derive(Clone)]
pub struct ApiTenants {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ApiTenants {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiTenants").finish_non_exhaustive()
    }
}

impl ApiTenants {
    /// Create a directory backed by `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl TenantDirectory for ApiTenants {
    fn find(&self, name_or_id: &str) -> Result<Tenant> {
        let listed = self.transport.get(TENANTS_PATH)?;
        let tenants: Vec<Tenant> = serde_json::from_value(listed)
            .map_err(|e| anyhow::anyhow!("unexpected tenant list: {e}"))?;
        tenants
            .into_iter()
            .find(|t| t.account_name == name_or_id || t.tenant_id == name_or_id)
            .ok_or_else(|| DuploError::NotFound(format!("tenant '{name_or_id}'")))
    }
}
