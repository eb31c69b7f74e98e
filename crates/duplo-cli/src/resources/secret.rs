//! Kubernetes secrets (tenant scoped, v3 API).

use serde_json::{Map, Value, json};

use duplo_core::{ApiVersion, Command, ParsedArgs, Resource, ResourceContext, Result, Signature};

use super::args::{DATA, NAME};

/// Kubernetes secrets in the tenant namespace.
#[derive(Debug)]
pub struct DuploSecret {
    context: ResourceContext,
}

impl DuploSecret {
    fn list(&self, _: &ParsedArgs) -> Result<Value> {
        let path = self.context.endpoint(&[])?;
        self.context.transport().get(&path)
    }

    fn find(&self, args: &ParsedArgs) -> Result<Value> {
        let path = self.context.endpoint(&[args.require_str("name")?])?;
        self.context.transport().get(&path)
    }

    fn create(&self, args: &ParsedArgs) -> Result<Value> {
        let name = args.require_str("name")?;
        let data = args
            .get("data")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        let body = json!({
            "SecretName": name,
            "SecretType": "Opaque",
            "SecretData": data,
        });
        let path = self.context.endpoint(&[])?;
        self.context.transport().post(&path, &body)
    }

    fn delete(&self, args: &ParsedArgs) -> Result<Value> {
        let name = args.require_str("name")?;
        let path = self.context.endpoint(&[name])?;
        self.context.transport().delete(&path)?;
        Ok(json!({ "message": format!("Secret '{name}' deleted") }))
    }
}

impl Resource for DuploSecret {
    const TYPE_NAME: &'static str = "DuploSecret";
    const API: ApiVersion = ApiVersion::V3 { slug: "k8s/secret" };

    fn new(context: ResourceContext) -> Self {
        Self { context }
    }

    fn context(&self) -> &ResourceContext {
        &self.context
    }

    fn commands() -> Vec<Command<Self>> {
        vec![
            Command::new("list", "List the secrets in the tenant.", Self::list),
            Command::new("find", "Find a secret by name.", Self::find)
                .signature(Signature::new().arg(&NAME)),
            Command::new(
                "create",
                "Create a secret: create <name> --data KEY=VALUE...",
                Self::create,
            )
            .signature(Signature::new().arg(&NAME).arg(&DATA)),
            Command::new("delete", "Delete a secret by name.", Self::delete)
                .signature(Signature::new().arg(&NAME)),
        ]
    }
}
