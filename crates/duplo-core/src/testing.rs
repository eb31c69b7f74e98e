//! In-memory collaborators for tests.
//!
//! Enabled inside this crate's tests and, for downstream crates, through
//! the `testing` feature.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::context::{ClientContext, ClientSettings, TenantDirectory, Transport};
use crate::error::{DuploError, Result};
use crate::scope::Tenant;

/// HTTP method of a recorded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
}

/// A request seen by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Method.
    pub method: Method,
    /// API path.
    pub path: String,
    /// JSON body for `POST`/`PUT`.
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
enum Reply {
    Json(Value),
    Status(u16, String),
}

/// Transport answering from canned replies.
///
/// Each route holds a queue of replies. Replies are consumed in order and
/// the last one repeats. Unknown routes answer 404.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<Request>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryTransport {
    /// Creates a transport with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a JSON reply for a route.
    pub fn on(&self, method: Method, path: &str, reply: Value) -> &Self {
        self.push(method, path, Reply::Json(reply))
    }

    /// Queues an error status for a route.
    pub fn fail(&self, method: Method, path: &str, status: u16, message: &str) -> &Self {
        self.push(method, path, Reply::Status(status, message.to_string()))
    }

    fn push(&self, method: Method, path: &str, reply: Reply) -> &Self {
        lock(&self.routes)
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        lock(&self.requests).clone()
    }

    /// Number of requests received for a route.
    #[must_use]
    pub fn calls(&self, method: Method, path: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn respond(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        lock(&self.requests).push(Request {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });

        let reply = {
            let mut routes = lock(&self.routes);
            let queue = routes.get_mut(&(method, path.to_string()));
            match queue {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Json(value)) => Ok(value),
            Some(Reply::Status(404, _)) | None => Err(DuploError::NotFound(path.to_string())),
            Some(Reply::Status(status, message)) => Err(DuploError::Api { status, message }),
        }
    }
}

impl Transport for MemoryTransport {
    fn get(&self, path: &str) -> Result<Value> {
        self.respond(Method::Get, path, None)
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.respond(Method::Post, path, Some(body))
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.respond(Method::Put, path, Some(body))
    }

    fn delete(&self, path: &str) -> Result<Value> {
        self.respond(Method::Delete, path, None)
    }
}

/// Tenant directory over a fixed list.
#[derive(Debug, Default)]
pub struct StaticTenants {
    tenants: Vec<Tenant>,
    lookups: AtomicUsize,
}

impl StaticTenants {
    /// Creates a directory over `tenants`.
    #[must_use]
    pub fn new(tenants: Vec<Tenant>) -> Self {
        Self {
            tenants,
            lookups: AtomicUsize::new(0),
        }
    }

    /// Number of `find` calls so far.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl TenantDirectory for StaticTenants {
    fn find(&self, name_or_id: &str) -> Result<Tenant> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.tenants
            .iter()
            .find(|t| t.account_name == name_or_id || t.tenant_id == name_or_id)
            .cloned()
            .ok_or_else(|| DuploError::NotFound(format!("tenant {name_or_id}")))
    }
}

/// Client over `transport` with a single tenant `acme` (id `tid-1`).
#[must_use]
pub fn client_for(transport: Arc<MemoryTransport>, settings: ClientSettings) -> Arc<ClientContext> {
    let tenants = StaticTenants::new(vec![Tenant::new("tid-1", "acme")]);
    Arc::new(ClientContext::new(transport, Arc::new(tenants), settings))
}
