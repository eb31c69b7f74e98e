//! Hosts (tenant scoped native hosts).

use serde_json::{Value, json};
use tracing::info;

use duplo_core::{
    Command, DuploError, ParsedArgs, Poll, Resource, ResourceContext, Result, Signature,
};

use super::args::NAME;

/// Host states that never lead to running or stopped.
const FAILED_STATES: &[&str] = &["error", "failed", "terminated"];

/// Tenant hosts. Names are namespaced with the tenant prefix.
#[derive(Debug)]
pub struct DuploHosts {
    context: ResourceContext,
}

/// Progress of a host towards `target`.
fn host_state(host: &Value, target: &str) -> Poll<Value> {
    let name = host["FriendlyName"].as_str().unwrap_or_default();
    let status = host["Status"].as_str().unwrap_or_default().to_lowercase();
    if status == target {
        Poll::Ready(host.clone())
    } else if FAILED_STATES.contains(&status.as_str()) {
        Poll::failed(format!("host '{name}' is {status}"))
    } else {
        Poll::waiting(format!("Waiting for host '{name}' to be {target} (currently {status})"))
    }
}

impl DuploHosts {
    fn all(&self) -> Result<Vec<Value>> {
        let path = self.context.endpoint(&["GetNativeHosts"])?;
        let listed = self.context.transport().get(&path)?;
        Ok(listed.as_array().cloned().unwrap_or_default())
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        let full = self.context.require_tenant()?.prefixed_name(name)?;
        self.all()?
            .into_iter()
            .find(|h| h["FriendlyName"] == full.as_str())
            .ok_or_else(|| DuploError::NotFound(format!("host '{full}'")))
    }

    fn list(&self, _: &ParsedArgs) -> Result<Value> {
        Ok(Value::Array(self.all()?))
    }

    fn find(&self, args: &ParsedArgs) -> Result<Value> {
        self.lookup(args.require_str("name")?)
    }

    fn power(&self, args: &ParsedArgs, action: &str, target: &str) -> Result<Value> {
        let name = args.require_str("name")?;
        let host = self.lookup(name)?;
        let id = host["InstanceId"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("host '{name}' has no InstanceId"))?;

        let path = self.context.endpoint(&[action, id])?;
        self.context.transport().post(&path, &Value::Null)?;
        info!(host = name, instance = id, action, "Host action requested");

        if self.context.settings().wait {
            self.context
                .wait(|| self.lookup(name).map(|h| host_state(&h, target)))?;
        }
        Ok(json!({ "message": format!("Host '{name}' {target}") }))
    }

    fn start(&self, args: &ParsedArgs) -> Result<Value> {
        self.power(args, "startNativeHost", "running")
    }

    fn stop(&self, args: &ParsedArgs) -> Result<Value> {
        self.power(args, "stopNativeHost", "stopped")
    }
}

impl Resource for DuploHosts {
    const TYPE_NAME: &'static str = "DuploHosts";

    fn new(context: ResourceContext) -> Self {
        Self { context }
    }

    fn context(&self) -> &ResourceContext {
        &self.context
    }

    fn commands() -> Vec<Command<Self>> {
        vec![
            Command::new("list", "List the hosts in the tenant.", Self::list),
            Command::new("find", "Find a host by name.", Self::find)
                .signature(Signature::new().arg(&NAME)),
            Command::new("start", "Start a host by name.", Self::start)
                .signature(Signature::new().arg(&NAME)),
            Command::new("stop", "Stop a host by name.", Self::stop)
                .signature(Signature::new().arg(&NAME)),
        ]
    }
}
