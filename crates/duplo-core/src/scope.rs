//! Resource scopes and the capabilities each one carries.
//!
//! A resource is either portal scoped (global endpoints) or tenant scoped.
//! Tenant-scoped resources hold a [`TenantScope`], which resolves the
//! current tenant lazily, namespaces names, and builds tenant endpoints.
//! Portal-scoped resources hold a [`PortalScope`], which only builds
//! endpoints.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::ClientContext;
use crate::error::{DuploError, Result};

/// Namespace prefix shared by every tenant.
pub const TENANT_PREFIX: &str = "duploservices";

/// Where a resource's endpoints live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Global endpoints.
    Portal,
    /// Endpoints under one tenant.
    Tenant,
}

impl Scope {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Portal => "portal",
            Self::Tenant => "tenant",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = DuploError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "portal" => Ok(Self::Portal),
            "tenant" => Ok(Self::Tenant),
            other => Err(DuploError::InvalidScope(other.to_string())),
        }
    }
}

/// Endpoint layout of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    /// `subscriptions/<tenant_id>/<path>`, or `<path>` for the portal.
    V2,
    /// `v3/subscriptions/<tenant_id>/<slug>/...`, or `v3/<slug>/...`.
    V3 {
        /// Resource slug, e.g. `k8s/secret`.
        slug: &'static str,
    },
}

impl ApiVersion {
    /// Endpoint under a tenant.
    #[must_use]
    pub fn tenant_endpoint(&self, tenant_id: &str, segments: &[&str]) -> String {
        match self {
            Self::V2 => join(&["subscriptions", tenant_id], segments),
            Self::V3 { slug } => join(&["v3", "subscriptions", tenant_id, slug], segments),
        }
    }

    /// Endpoint outside any tenant.
    #[must_use]
    pub fn portal_endpoint(&self, segments: &[&str]) -> String {
        match self {
            Self::V2 => join(&[], segments),
            Self::V3 { slug } => join(&["v3", slug], segments),
        }
    }
}

fn join(base: &[&str], segments: &[&str]) -> String {
    base.iter()
        .chain(segments)
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Tenant record as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Tenant id.
    #[serde(rename = "TenantId")]
    pub tenant_id: String,
    /// Account (tenant) name.
    #[serde(rename = "AccountName")]
    pub account_name: String,
    /// Infrastructure plan.
    #[serde(rename = "PlanID", default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
}

impl Tenant {
    /// Creates a tenant record.
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            account_name: account_name.into(),
            plan_id: None,
        }
    }

    /// Namespace prefix for the tenant: `duploservices-<account>-`.
    #[must_use]
    pub fn prefix(&self) -> String {
        format!("{TENANT_PREFIX}-{}-", self.account_name)
    }
}

/// Tenant capability held by tenant-scoped resources.
pub struct TenantScope {
    client: Arc<ClientContext>,
    api: ApiVersion,
    tenant: OnceCell<Tenant>,
}

impl fmt::Debug for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantScope")
            .field("api", &self.api)
            .field("tenant", &self.tenant.get())
            .finish_non_exhaustive()
    }
}

impl TenantScope {
    /// Creates an unresolved tenant scope.
    #[must_use]
    pub fn new(client: Arc<ClientContext>, api: ApiVersion) -> Self {
        Self {
            client,
            api,
            tenant: OnceCell::new(),
        }
    }

    /// The current tenant, looked up on first use and cached afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`DuploError::Config`] when neither a tenant name nor an id
    /// was configured, or the lookup error.
    pub fn tenant(&self) -> Result<&Tenant> {
        self.tenant.get_or_try_init(|| {
            let settings = self.client.settings();
            let key = settings
                .tenant_id
                .as_deref()
                .or(settings.tenant.as_deref())
                .ok_or_else(|| DuploError::Config("a tenant name or id is required".into()))?;
            debug!(tenant = key, "Resolving tenant");
            self.client.tenants().find(key)
        })
    }

    /// Tenant id; an explicitly configured id avoids the lookup.
    pub fn tenant_id(&self) -> Result<String> {
        if let Some(id) = &self.client.settings().tenant_id {
            return Ok(id.clone());
        }
        Ok(self.tenant()?.tenant_id.clone())
    }

    /// Adds the tenant namespace prefix to `name` unless already present.
    pub fn prefixed_name(&self, name: &str) -> Result<String> {
        let prefix = self.tenant()?.prefix();
        if name.starts_with(&prefix) {
            Ok(name.to_string())
        } else {
            Ok(format!("{prefix}{name}"))
        }
    }

    /// Endpoint under the current tenant.
    pub fn endpoint(&self, segments: &[&str]) -> Result<String> {
        Ok(self.api.tenant_endpoint(&self.tenant_id()?, segments))
    }
}

/// Portal capability held by portal-scoped resources.
#[derive(Debug, Clone, Copy)]
pub struct PortalScope {
    api: ApiVersion,
}

impl PortalScope {
    /// Creates a portal scope.
    #[must_use]
    pub const fn new(api: ApiVersion) -> Self {
        Self { api }
    }

    /// Endpoint outside any tenant.
    #[must_use]
    pub fn endpoint(&self, segments: &[&str]) -> String {
        self.api.portal_endpoint(segments)
    }
}

/// Scope capability of a loaded resource.
#[derive(Debug)]
pub enum ScopeContext {
    /// Portal scoped.
    Portal(PortalScope),
    /// Tenant scoped.
    Tenant(TenantScope),
}

impl ScopeContext {
    /// Builds the capability for `scope`.
    #[must_use]
    pub fn new(scope: Scope, client: Arc<ClientContext>, api: ApiVersion) -> Self {
        match scope {
            Scope::Portal => Self::Portal(PortalScope::new(api)),
            Scope::Tenant => Self::Tenant(TenantScope::new(client, api)),
        }
    }

    /// Which scope this is.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        match self {
            Self::Portal(_) => Scope::Portal,
            Self::Tenant(_) => Scope::Tenant,
        }
    }

    /// Tenant capability, present only for tenant scope.
    #[must_use]
    pub const fn tenant(&self) -> Option<&TenantScope> {
        match self {
            Self::Tenant(tenant) => Some(tenant),
            Self::Portal(_) => None,
        }
    }

    /// Endpoint in whichever scope applies.
    pub fn endpoint(&self, segments: &[&str]) -> Result<String> {
        match self {
            Self::Portal(portal) => Ok(portal.endpoint(segments)),
            Self::Tenant(tenant) => tenant.endpoint(segments),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ClientSettings, TenantDirectory, Transport};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use test_case::test_case;

    struct NoTransport;

    impl Transport for NoTransport {
        fn get(&self, path: &str) -> Result<Value> {
            Err(DuploError::NotFound(path.to_string()))
        }
        fn post(&self, path: &str, _body: &Value) -> Result<Value> {
            Err(DuploError::NotFound(path.to_string()))
        }
        fn put(&self, path: &str, _body: &Value) -> Result<Value> {
            Err(DuploError::NotFound(path.to_string()))
        }
        fn delete(&self, path: &str) -> Result<Value> {
            Err(DuploError::NotFound(path.to_string()))
        }
    }

    #[derive(Default)]
    struct CountingTenants {
        lookups: AtomicUsize,
    }

    impl TenantDirectory for CountingTenants {
        fn find(&self, name_or_id: &str) -> Result<Tenant> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            match name_or_id {
                "acme" | "tid-1" => Ok(Tenant::new("tid-1", "acme")),
                other => Err(DuploError::NotFound(format!("tenant {other}"))),
            }
        }
    }

    fn scope_with(settings: ClientSettings, api: ApiVersion) -> (TenantScope, Arc<CountingTenants>) {
        let tenants = Arc::new(CountingTenants::default());
        let client = Arc::new(ClientContext::new(
            Arc::new(NoTransport),
            tenants.clone(),
            settings,
        ));
        (TenantScope::new(client, api), tenants)
    }

    fn named(tenant: &str) -> ClientSettings {
        ClientSettings {
            tenant: Some(tenant.into()),
            ..ClientSettings::default()
        }
    }

    #[test_case("portal", Scope::Portal ; "portal")]
    #[test_case("tenant", Scope::Tenant ; "tenant")]
    fn scope_parses(raw: &str, expected: Scope) {
        assert_eq!(raw.parse::<Scope>().unwrap(), expected);
    }

    #[test]
    fn bogus_scope_is_rejected() {
        let err = "bogus".parse::<Scope>().err();
        assert!(err.is_some_and(|e| e.to_string().contains("Invalid scope")));
    }

    #[test]
    fn prefixed_name_adds_prefix_once() {
        let (scope, _) = scope_with(named("acme"), ApiVersion::V2);
        assert_eq!(scope.prefixed_name("foo").unwrap(), "duploservices-acme-foo");
        assert_eq!(
            scope.prefixed_name("duploservices-acme-foo").unwrap(),
            "duploservices-acme-foo"
        );
    }

    #[test]
    fn tenant_is_resolved_once() {
        let (scope, tenants) = scope_with(named("acme"), ApiVersion::V2);
        assert!(scope.tenant().is_ok());
        assert!(scope.prefixed_name("a").is_ok());
        assert!(scope.endpoint(&["GetPods"]).is_ok());
        assert_eq!(tenants.lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn explicit_tenant_id_skips_lookup() {
        let settings = ClientSettings {
            tenant_id: Some("tid-explicit".into()),
            ..ClientSettings::default()
        };
        let (scope, tenants) = scope_with(settings, ApiVersion::V2);
        assert_eq!(scope.tenant_id().unwrap(), "tid-explicit");
        assert_eq!(tenants.lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_tenant_is_a_config_error() {
        let (scope, _) = scope_with(ClientSettings::default(), ApiVersion::V2);
        assert!(matches!(scope.tenant(), Err(DuploError::Config(_))));
    }

    #[test]
    fn unknown_tenant_propagates_lookup_error() {
        let (scope, _) = scope_with(named("globex"), ApiVersion::V2);
        assert!(matches!(scope.tenant_id(), Err(DuploError::NotFound(_))));
    }

    #[test_case(&[], "v3/subscriptions/tid-1/k8s/secret" ; "no segments")]
    #[test_case(&["x"], "v3/subscriptions/tid-1/k8s/secret/x" ; "name")]
    #[test_case(&["x", "y"], "v3/subscriptions/tid-1/k8s/secret/x/y" ; "name and subpath")]
    fn v3_tenant_endpoint(segments: &[&str], expected: &str) {
        let (scope, _) = scope_with(named("acme"), ApiVersion::V3 { slug: "k8s/secret" });
        assert_eq!(scope.endpoint(segments).unwrap(), expected);
    }

    #[test_case(&[], "v3/admin/plans" ; "no segments")]
    #[test_case(&["x"], "v3/admin/plans/x" ; "name")]
    #[test_case(&["x", "y"], "v3/admin/plans/x/y" ; "name and subpath")]
    fn v3_portal_endpoint(segments: &[&str], expected: &str) {
        let portal = PortalScope::new(ApiVersion::V3 { slug: "admin/plans" });
        assert_eq!(portal.endpoint(segments), expected);
    }

    #[test]
    fn v2_endpoints() {
        let (scope, _) = scope_with(named("acme"), ApiVersion::V2);
        assert_eq!(
            scope.endpoint(&["GetReplicationControllers"]).unwrap(),
            "subscriptions/tid-1/GetReplicationControllers"
        );
        let portal = PortalScope::new(ApiVersion::V2);
        assert_eq!(
            portal.endpoint(&["adminproxy", "GetTenantNamesForUser"]),
            "adminproxy/GetTenantNamesForUser"
        );
    }

    #[test]
    fn scope_context_exposes_tenant_only_for_tenant_scope() {
        let tenants: Arc<dyn TenantDirectory> = Arc::new(CountingTenants::default());
        let client = Arc::new(ClientContext::new(Arc::new(NoTransport), tenants, named("acme")));

        let tenant = ScopeContext::new(Scope::Tenant, client.clone(), ApiVersion::V2);
        assert!(tenant.tenant().is_some());
        assert_eq!(tenant.scope(), Scope::Tenant);

        let portal = ScopeContext::new(Scope::Portal, client, ApiVersion::V2);
        assert!(portal.tenant().is_none());
        assert_eq!(portal.endpoint(&["admin", "GetTenants"]).unwrap(), "admin/GetTenants");
    }

    #[test]
    fn tenant_record_deserializes_api_shape() {
        let tenant: Tenant = serde_json::from_str(
            r#"{"TenantId":"tid-1","AccountName":"acme","PlanID":"default"}"#,
        )
        .unwrap();
        assert_eq!(tenant.account_name, "acme");
        assert_eq!(tenant.plan_id.as_deref(), Some("default"));
        assert_eq!(tenant.prefix(), "duploservices-acme-");
    }
}
