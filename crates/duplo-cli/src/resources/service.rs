//! Services (tenant scoped, replication controllers).

use serde_json::{Value, json};
use tracing::info;

use duplo_core::{
    Command, DuploError, ParsedArgs, Poll, Resource, ResourceContext, Result, Signature,
};

use super::args::{IMAGE, NAME};

/// Pod status reported for a running container.
const RUNNING: i64 = 1;

/// Tenant services.
#[derive(Debug)]
pub struct DuploService {
    context: ResourceContext,
}

fn image_of(pod: &Value) -> Option<&str> {
    pod["Containers"][0]["Image"].as_str()
}

/// Rollout progress of `service` towards `image`, from a pod listing.
fn rollout(pods: &[Value], service: &str, image: &str, replicas: usize) -> Poll<()> {
    let pods: Vec<_> = pods.iter().filter(|p| p["Name"] == service).collect();
    let ready = pods
        .iter()
        .filter(|p| {
            image_of(p) == Some(image)
                && p["CurrentStatus"].as_i64() == Some(RUNNING)
                && p["DesiredStatus"].as_i64() == Some(RUNNING)
        })
        .count();

    if !pods.is_empty() && ready == pods.len() && ready >= replicas {
        Poll::Ready(())
    } else {
        Poll::waiting(format!(
            "Waiting for '{service}' to run {image} ({ready}/{} pods ready)",
            replicas.max(pods.len())
        ))
    }
}

impl DuploService {
    fn all(&self) -> Result<Vec<Value>> {
        let path = self.context.endpoint(&["GetReplicationControllers"])?;
        let listed = self.context.transport().get(&path)?;
        Ok(listed.as_array().cloned().unwrap_or_default())
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        self.all()?
            .into_iter()
            .find(|s| s["Name"] == name)
            .ok_or_else(|| DuploError::NotFound(format!("service '{name}'")))
    }

    fn list(&self, _: &ParsedArgs) -> Result<Value> {
        Ok(Value::Array(self.all()?))
    }

    fn find(&self, args: &ParsedArgs) -> Result<Value> {
        self.lookup(args.require_str("name")?)
    }

    fn delete(&self, args: &ParsedArgs) -> Result<Value> {
        let name = args.require_str("name")?;
        let path = self.context.endpoint(&["ReplicationControllerUpdate"])?;
        self.context
            .transport()
            .post(&path, &json!({ "Name": name, "State": "delete" }))?;
        Ok(json!({ "message": format!("Service '{name}' deleted") }))
    }

    fn update_image(&self, args: &ParsedArgs) -> Result<Value> {
        let name = args.require_str("name")?;
        let image = args.require_str("image")?;
        let service = self.lookup(name)?;

        let path = self.context.endpoint(&["ReplicationControllerChange"])?;
        let body = json!({
            "Name": name,
            "Image": image,
            "AllocationTags": service["Template"]["AllocationTags"],
        });
        self.context.transport().post(&path, &body)?;
        info!(service = name, image, "Image update requested");

        if self.context.settings().wait {
            let replicas = service["Replicas"]
                .as_u64()
                .and_then(|r| usize::try_from(r).ok())
                .unwrap_or(1);
            let pods_path = self.context.endpoint(&["GetPods"])?;
            self.context.wait(|| {
                let pods = self.context.transport().get(&pods_path)?;
                let pods = pods.as_array().map_or(&[][..], Vec::as_slice);
                Ok(rollout(pods, name, image, replicas))
            })?;
        }
        Ok(json!({ "message": format!("Successfully updated image for service '{name}'") }))
    }
}

impl Resource for DuploService {
    const TYPE_NAME: &'static str = "DuploService";

    fn new(context: ResourceContext) -> Self {
        Self { context }
    }

    fn context(&self) -> &ResourceContext {
        &self.context
    }

    fn commands() -> Vec<Command<Self>> {
        vec![
            Command::new("list", "List the services in the tenant.", Self::list),
            Command::new("find", "Find a service by name.", Self::find)
                .signature(Signature::new().arg(&NAME)),
            Command::new("delete", "Delete a service by name.", Self::delete)
                .signature(Signature::new().arg(&NAME)),
            Command::new(
                "update_image",
                "Update the image of a service: update_image <name> <image>",
                Self::update_image,
            )
            .signature(Signature::new().arg(&NAME).arg(&IMAGE)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{dispatch, transport};
    use super::*;
    use duplo_core::testing::Method;

    const SERVICES: &str = "subscriptions/tid-1/GetReplicationControllers";
    const CHANGE: &str = "subscriptions/tid-1/ReplicationControllerChange";
    const PODS: &str = "subscriptions/tid-1/GetPods";

    fn pod(image: &str, status: i64) -> Value {
        json!({
            "Name": "web",
            "CurrentStatus": status,
            "DesiredStatus": 1,
            "Containers": [ { "Image": image } ]
        })
    }

    fn services() -> Value {
        json!([{ "Name": "web", "Replicas": 2, "Template": { "AllocationTags": "blue" } }])
    }

    #[test]
    fn rollout_waits_for_every_replica() {
        let old = pod("nginx:1.24", 1);
        let new = pod("nginx:1.25", 1);
        let starting = pod("nginx:1.25", 0);

        assert!(matches!(rollout(&[old.clone(), new.clone()], "web", "nginx:1.25", 2), Poll::Waiting(_)));
        assert!(matches!(rollout(&[new.clone(), starting], "web", "nginx:1.25", 2), Poll::Waiting(_)));
        assert!(matches!(rollout(&[new.clone()], "web", "nginx:1.25", 2), Poll::Waiting(_)));
        assert!(matches!(rollout(&[], "web", "nginx:1.25", 1), Poll::Waiting(_)));
        assert_eq!(rollout(&[new.clone(), new], "web", "nginx:1.25", 2), Poll::Ready(()));
    }

    #[test]
    fn find_by_name() {
        let transport = transport();
        transport.on(Method::Get, SERVICES, services());
        let found = dispatch(&transport, false, "service", "find", &["web"]);
        assert_eq!(found.unwrap()["Replicas"], json!(2));
    }

    #[test]
    fn update_image_posts_change_without_waiting() {
        let transport = transport();
        transport.on(Method::Get, SERVICES, services());
        transport.on(Method::Post, CHANGE, json!(null));

        let result = dispatch(&transport, false, "service", "update_image", &["web", "nginx:1.25"]);
        assert!(result.is_ok());
        let body = transport
            .requests()
            .into_iter()
            .find(|r| r.path == CHANGE)
            .and_then(|r| r.body);
        assert_eq!(
            body,
            Some(json!({ "Name": "web", "Image": "nginx:1.25", "AllocationTags": "blue" }))
        );
        assert_eq!(transport.calls(Method::Get, PODS), 0);
    }

    #[test]
    fn update_image_waits_for_pods() {
        let transport = transport();
        transport.on(Method::Get, SERVICES, services());
        transport.on(Method::Post, CHANGE, json!(null));
        transport
            .on(Method::Get, PODS, json!([pod("nginx:1.24", 1), pod("nginx:1.24", 1)]))
            .on(Method::Get, PODS, json!([pod("nginx:1.25", 1), pod("nginx:1.25", 1)]));

        let result = dispatch(&transport, true, "service", "update_image", &["web", "nginx:1.25"]);
        assert!(result.is_ok());
        assert_eq!(transport.calls(Method::Get, PODS), 2);
    }

    #[test]
    fn update_image_times_out() {
        let transport = transport();
        transport.on(Method::Get, SERVICES, services());
        transport.on(Method::Post, CHANGE, json!(null));
        transport.on(Method::Get, PODS, json!([pod("nginx:1.24", 1)]));

        let err = dispatch(&transport, true, "service", "update_image", &["web", "nginx:1.25"]).err();
        assert!(matches!(err, Some(DuploError::Timeout(_))));
        assert_eq!(transport.calls(Method::Get, PODS), 3);
    }

    #[test]
    fn update_image_requires_both_positionals() {
        let transport = transport();
        let err = dispatch(&transport, false, "service", "update_image", &["web"]).err();
        assert_eq!(err.map(|e| e.code()), Some(2));
    }
}
