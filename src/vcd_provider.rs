//! Provider: resources and data sources on top of the vCD client.
//!
//! ## Flow
//!
//! 1. [`VcdProvider::connect`] logs in and resolves the configured org and VDC
//! 2. Callers look up a type with [`VcdProvider::resource`] or
//!    [`VcdProvider::data_source`]
//! 3. `create`, `read`, `update`, `delete` take and return [`ResourceData`]
//!
//! The provider-level helpers validate attributes against the type's schema
//! before any API call and refuse updates that touch force-new attributes.

use std::{future::Future, pin::Pin, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, MutexGuard};

use crate::vcd_client::{VcdClient, VcdClientConfig, VcdError};
use crate::vcd_data_sources::{OrgDataSource, StorageProfileDataSource, VmDataSource};
use crate::vcd_org::Org;
use crate::vcd_resources::{CatalogResource, DiskResource, NetworkResource, VAppResource};
use crate::vcd_retry::RetryFailure;
use crate::vcd_schema::{ResourceSchema, SchemaError};
use crate::vcd_vdc::Vdc;

/// Return type for async trait operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Error type for provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Attributes do not match the schema.
    #[error("invalid {resource} attributes: {}", join_errors(.errors))]
    Validation {
        /// Resource or data source type.
        resource: &'static str,
        /// Every problem found.
        errors: Vec<SchemaError>,
    },

    /// An object with that name already exists.
    #[error("{kind} '{name}' already exists")]
    Conflict {
        /// Object kind.
        kind: &'static str,
        /// Object name.
        name: String,
    },

    /// No resource or data source with that type name.
    #[error("unknown {kind} type '{name}'")]
    UnknownType {
        /// `resource` or `data source`.
        kind: &'static str,
        /// Requested type name.
        name: String,
    },

    /// The change cannot be applied in place.
    #[error("{resource}: changing {} requires replacement", .attributes.join(", "))]
    RequiresReplacement {
        /// Resource type.
        resource: &'static str,
        /// Force-new attributes that changed.
        attributes: Vec<&'static str>,
    },

    /// The operation needs an id.
    #[error("{0} has no id")]
    MissingId(&'static str),

    /// The object does not exist anymore.
    #[error("{kind} '{id}' does not exist")]
    Gone {
        /// Resource type.
        kind: &'static str,
        /// Resource id.
        id: String,
    },

    /// Client or API failure.
    #[error(transparent)]
    Client(#[from] VcdError),
}

impl From<RetryFailure<VcdError>> for ProviderError {
    fn from(failure: RetryFailure<VcdError>) -> Self {
        Self::Client(failure.into())
    }
}

fn join_errors(errors: &[SchemaError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Resource data
// ============================================================================

/// Id and attributes of one resource instance.
///
/// An empty id means the resource does not exist (or no longer exists).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    /// Resource id, empty when absent.
    #[serde(default)]
    pub id: String,
    /// Attribute values.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ResourceData {
    /// Data with no id yet.
    #[must_use]
    pub const fn new(attributes: Map<String, Value>) -> Self {
        Self {
            id: String::new(),
            attributes,
        }
    }

    /// Data for an existing resource.
    #[must_use]
    pub fn with_id(id: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    /// Whether the resource exists.
    #[must_use]
    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    /// Mark the resource as gone.
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    /// The id, or [`ProviderError::MissingId`].
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty.
    pub fn require_id(&self, kind: &'static str) -> ProviderResult<&str> {
        if self.id.is_empty() {
            Err(ProviderError::MissingId(kind))
        } else {
            Ok(&self.id)
        }
    }

    /// String attribute; absent, null and non-string values are `None`.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    /// String attribute, empty when absent.
    #[must_use]
    pub fn str_or_empty(&self, name: &str) -> &str {
        self.get_str(name).unwrap_or_default()
    }

    /// Non-empty string attribute.
    #[must_use]
    pub fn non_empty_str(&self, name: &str) -> Option<&str> {
        self.get_str(name).filter(|s| !s.is_empty())
    }

    /// Integer attribute.
    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.attributes.get(name).and_then(Value::as_i64)
    }

    /// Boolean attribute.
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.attributes.get(name).and_then(Value::as_bool)
    }

    /// List attribute, empty when absent.
    #[must_use]
    pub fn get_list(&self, name: &str) -> &[Value] {
        self.attributes
            .get(name)
            .and_then(Value::as_array)
            .map_or(&[], Vec::as_slice)
    }

    /// Set an attribute.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    /// Set an attribute, or remove it when `None`.
    pub fn set_opt<V: Into<Value>>(&mut self, name: &str, value: Option<V>) {
        match value {
            Some(v) => self.set(name, v),
            None => {
                self.attributes.remove(name);
            }
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// A manageable vCD object type.
pub trait VcdResource: Send + Sync {
    /// Type name (e.g. `vcd_disk`).
    fn name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> ResourceSchema;

    /// Create the object; the returned data carries the new id.
    fn create<'a>(
        &'a self,
        provider: &'a VcdProvider,
        data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>>;

    /// Refresh the attributes; the id is cleared if the object is gone.
    fn read<'a>(
        &'a self,
        provider: &'a VcdProvider,
        data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>>;

    /// Apply in-place changes from `old` to `new`.
    fn update<'a>(
        &'a self,
        provider: &'a VcdProvider,
        old: ResourceData,
        new: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>>;

    /// Delete the object.
    fn delete<'a>(
        &'a self,
        provider: &'a VcdProvider,
        data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<()>>;
}

/// A read-only vCD lookup.
pub trait VcdDataSource: Send + Sync {
    /// Type name (e.g. `vcd_org`).
    fn name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> ResourceSchema;

    /// Look the object up from the query attributes.
    fn read<'a>(
        &'a self,
        provider: &'a VcdProvider,
        data: ResourceData,
    ) -> BoxFuture<'a, ProviderResult<ResourceData>>;
}

// ============================================================================
// Provider
// ============================================================================

/// Logged-in provider bound to one org and one VDC.
///
/// The org and VDC documents are refreshed in place, so each sits behind an
/// async mutex; hold at most one guard across an await.
#[derive(Debug)]
pub struct VcdProvider {
    client: VcdClient,
    org: Mutex<Org>,
    vdc: Mutex<Vdc>,
    max_retry_timeout: Duration,
}

impl VcdProvider {
    /// Log in, fetch the org and find the configured VDC.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails or the org or VDC cannot be
    /// retrieved.
    pub async fn connect(cfg: VcdClientConfig) -> Result<Self, VcdError> {
        let client = VcdClient::connect(cfg).await?;
        let org = client.get_org().await?;
        let vdc = org.find_vdc(&client.config().vdc).await?;
        tracing::info!(
            org = %org.record().name,
            vdc = %vdc.record().name,
            "vCD provider ready"
        );

        Ok(Self {
            max_retry_timeout: client.config().max_retry_timeout(),
            client,
            org: Mutex::new(org),
            vdc: Mutex::new(vdc),
        })
    }

    /// Underlying client.
    #[must_use]
    pub const fn client(&self) -> &VcdClient {
        &self.client
    }

    /// Budget for retried operations.
    #[must_use]
    pub const fn max_retry_timeout(&self) -> Duration {
        self.max_retry_timeout
    }

    /// Lock the org.
    pub async fn org(&self) -> MutexGuard<'_, Org> {
        self.org.lock().await
    }

    /// Lock the VDC.
    pub async fn vdc(&self) -> MutexGuard<'_, Vdc> {
        self.vdc.lock().await
    }

    /// Every resource type.
    #[must_use]
    pub fn resources() -> Vec<Box<dyn VcdResource>> {
        vec![
            Box::new(CatalogResource),
            Box::new(DiskResource),
            Box::new(NetworkResource),
            Box::new(VAppResource),
        ]
    }

    /// Every data source type.
    #[must_use]
    pub fn data_sources() -> Vec<Box<dyn VcdDataSource>> {
        vec![
            Box::new(OrgDataSource),
            Box::new(VmDataSource),
            Box::new(StorageProfileDataSource),
        ]
    }

    /// Resource type by name.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UnknownType`] if no resource has that name.
    pub fn resource(name: &str) -> ProviderResult<Box<dyn VcdResource>> {
        Self::resources()
            .into_iter()
            .find(|r| r.name() == name)
            .ok_or_else(|| ProviderError::UnknownType {
                kind: "resource",
                name: name.to_string(),
            })
    }

    /// Data source type by name.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UnknownType`] if no data source has that name.
    pub fn data_source(name: &str) -> ProviderResult<Box<dyn VcdDataSource>> {
        Self::data_sources()
            .into_iter()
            .find(|r| r.name() == name)
            .ok_or_else(|| ProviderError::UnknownType {
                kind: "data source",
                name: name.to_string(),
            })
    }

    /// Validate and create.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown, validation fails or the
    /// create fails.
    pub async fn create(&self, kind: &str, attributes: Map<String, Value>) -> ProviderResult<ResourceData> {
        let resource = Self::resource(kind)?;
        validate(&resource.schema(), &attributes)?;
        tracing::info!(resource = kind, "creating");
        resource.create(self, ResourceData::new(attributes)).await
    }

    /// Read by id. The returned id is empty if the object is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or the read fails.
    pub async fn read(&self, kind: &str, id: &str) -> ProviderResult<ResourceData> {
        let resource = Self::resource(kind)?;
        resource
            .read(self, ResourceData::with_id(id, Map::new()))
            .await
    }

    /// Read the current state, then apply `attributes` in place.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Gone`] if the object no longer exists and
    /// [`ProviderError::RequiresReplacement`] if a force-new attribute changed.
    pub async fn update(
        &self,
        kind: &str,
        id: &str,
        attributes: Map<String, Value>,
    ) -> ProviderResult<ResourceData> {
        let resource = Self::resource(kind)?;
        let schema = resource.schema();
        let attributes = schema.user_settable(&attributes);
        validate(&schema, &attributes)?;

        let old = resource
            .read(self, ResourceData::with_id(id, Map::new()))
            .await?;
        if !old.has_id() {
            return Err(ProviderError::Gone {
                kind: resource.name(),
                id: id.to_string(),
            });
        }

        let attributes = schema.keep_computed_defaults(&old.attributes, &attributes);
        let replaced = schema.requires_replacement(&old.attributes, &attributes);
        if !replaced.is_empty() {
            return Err(ProviderError::RequiresReplacement {
                resource: resource.name(),
                attributes: replaced,
            });
        }

        tracing::info!(resource = kind, id, "updating");
        resource
            .update(self, old, ResourceData::with_id(id, attributes))
            .await
    }

    /// Delete by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or the delete fails.
    pub async fn delete(&self, kind: &str, id: &str) -> ProviderResult<()> {
        let resource = Self::resource(kind)?;
        tracing::info!(resource = kind, id, "deleting");
        resource
            .delete(self, ResourceData::with_id(id, Map::new()))
            .await
    }

    /// Validate and look up a data source.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown, validation fails or the
    /// lookup fails.
    pub async fn read_data_source(
        &self,
        kind: &str,
        attributes: Map<String, Value>,
    ) -> ProviderResult<ResourceData> {
        let source = Self::data_source(kind)?;
        validate(&source.schema(), &attributes)?;
        source.read(self, ResourceData::new(attributes)).await
    }
}

fn validate(schema: &ResourceSchema, attributes: &Map<String, Value>) -> ProviderResult<()> {
    schema
        .validate(attributes)
        .map_err(|errors| ProviderError::Validation {
            resource: schema.name,
            errors,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{mount_get, mount_login, org_xml, test_config, vdc_xml};
    use serde_json::json;
    use wiremock::MockServer;

    fn attrs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn registry_names_are_unique() {
        let mut names: Vec<_> = VcdProvider::resources().iter().map(|r| r.name()).collect();
        names.extend(VcdProvider::data_sources().iter().map(|d| d.name()));
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert!(VcdProvider::resource("vcd_disk").is_ok());
        assert!(VcdProvider::data_source("vcd_org").is_ok());
    }

    #[test]
    fn unknown_types_are_rejected() {
        let err = VcdProvider::resource("vcd_firewall").err().unwrap();
        assert_eq!(err.to_string(), "unknown resource type 'vcd_firewall'");
        assert!(VcdProvider::data_source("vcd_disk").is_err());
    }

    #[test]
    fn resource_data_accessors() {
        let mut data = ResourceData::new(attrs(json!({
            "name": "d1", "empty": "", "size": 3, "on": true, "pool": [1, 2]
        })));
        assert!(!data.has_id());
        assert!(matches!(data.require_id("vcd_disk"), Err(ProviderError::MissingId("vcd_disk"))));

        assert_eq!(data.get_str("name"), Some("d1"));
        assert_eq!(data.non_empty_str("empty"), None);
        assert_eq!(data.str_or_empty("missing"), "");
        assert_eq!(data.get_i64("size"), Some(3));
        assert_eq!(data.get_bool("on"), Some(true));
        assert_eq!(data.get_list("pool").len(), 2);
        assert!(data.get_list("name").is_empty());

        data.set_opt::<String>("name", None);
        assert!(data.get_str("name").is_none());
        data.id = "d1".into();
        assert_eq!(data.require_id("vcd_disk").unwrap(), "d1");
        data.clear_id();
        assert!(!data.has_id());
    }

    #[test]
    fn validation_error_lists_every_problem() {
        let err = validate(
            &VcdProvider::resource("vcd_disk").unwrap().schema(),
            &attrs(json!({"size": "lots", "color": "red"})),
        )
        .unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("invalid vcd_disk attributes: "), "{text}");
        assert!(text.contains("unknown attribute 'color'"), "{text}");
        assert!(text.contains("missing required attribute 'name'"), "{text}");
        assert!(text.contains("wrong disk size 'lots'"), "{text}");
    }

    #[tokio::test]
    async fn connect_resolves_org_and_vdc() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_login(&server).await;
        mount_get(&server, "/api/org/1", org_xml(&uri, &[])).await;
        mount_get(&server, "/api/vdc/2", vdc_xml(&uri, &[])).await;

        let provider = VcdProvider::connect(test_config(&server)).await.unwrap();
        assert_eq!(provider.org().await.record().name, "acme");
        assert_eq!(provider.vdc().await.record().name, "vdc-1");
        assert_eq!(provider.max_retry_timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn connect_fails_on_unknown_vdc() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount_login(&server).await;
        mount_get(&server, "/api/org/1", org_xml(&uri, &[])).await;

        let mut cfg = test_config(&server);
        cfg.vdc = "vdc-9".into();
        let err = VcdProvider::connect(cfg).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
