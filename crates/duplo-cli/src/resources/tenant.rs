//! Tenants (portal scoped).

use serde_json::{Value, json};
use tracing::info;

use duplo_core::{
    Command, DuploError, ParsedArgs, Poll, Resource, ResourceContext, Result, Signature,
};

use super::args::{NAME, PLAN};

/// Tenant management through the admin endpoints.
#[derive(Debug)]
pub struct DuploTenant {
    context: ResourceContext,
}

impl DuploTenant {
    fn all(&self) -> Result<Vec<Value>> {
        let path = self.context.endpoint(&["admin", "GetTenantsForUser"])?;
        let listed = self.context.transport().get(&path)?;
        Ok(listed.as_array().cloned().unwrap_or_default())
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        self.all()?
            .into_iter()
            .find(|t| t["AccountName"] == name)
            .ok_or_else(|| DuploError::NotFound(format!("tenant '{name}'")))
    }

    fn list(&self, _: &ParsedArgs) -> Result<Value> {
        Ok(Value::Array(self.all()?))
    }

    fn find(&self, args: &ParsedArgs) -> Result<Value> {
        self.lookup(args.require_str("name")?)
    }

    fn create(&self, args: &ParsedArgs) -> Result<Value> {
        let name = args.require_str("name")?;
        let plan = args.require_str("plan")?;
        let path = self.context.endpoint(&["admin", "AddTenant"])?;
        self.context
            .transport()
            .post(&path, &json!({ "AccountName": name, "PlanID": plan }))?;
        info!(tenant = name, plan, "Tenant requested");

        if self.context.settings().wait {
            self.context.wait(|| match self.lookup(name) {
                Ok(tenant) => Ok(Poll::Ready(tenant)),
                Err(DuploError::NotFound(_)) => Ok(Poll::waiting(format!(
                    "Waiting for tenant '{name}' to appear"
                ))),
                Err(err) => Err(err),
            })?;
        }
        Ok(json!({ "message": format!("Tenant '{name}' created") }))
    }

    fn delete(&self, args: &ParsedArgs) -> Result<Value> {
        let name = args.require_str("name")?;
        let tenant = self.lookup(name)?;
        let id = tenant["TenantId"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("tenant '{name}' has no TenantId"))?;
        let path = self.context.endpoint(&["admin", "DeleteTenant", id])?;
        self.context.transport().post(&path, &Value::Null)?;
        Ok(json!({ "message": format!("Tenant '{name}' deleted") }))
    }
}

impl Resource for DuploTenant {
    const TYPE_NAME: &'static str = "DuploTenant";

    fn new(context: ResourceContext) -> Self {
        Self { context }
    }

    fn context(&self) -> &ResourceContext {
        &self.context
    }

    fn commands() -> Vec<Command<Self>> {
        vec![
            Command::new("list", "List all tenants visible to the token.", Self::list),
            Command::new("find", "Find a tenant by name.", Self::find)
                .signature(Signature::new().arg(&NAME)),
            Command::new("create", "Create a tenant: create <name> [--plan <plan>]", Self::create)
                .signature(Signature::new().arg(&NAME).arg(&PLAN)),
            Command::new("delete", "Delete a tenant by name.", Self::delete)
                .signature(Signature::new().arg(&NAME)),
        ]
    }
}
