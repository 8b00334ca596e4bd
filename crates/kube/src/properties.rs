//! ClusterProperty registry adapter.

use async_trait::async_trait;
use cluster_info_reconciler::{Error, PropertyRecord, PropertySource, Result};
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::{Api, Client};
use serde_json::Value;
use tracing::debug;

pub const GROUP: &str = "about.k8s.io";
pub const VERSION: &str = "v1alpha1";
pub const KIND: &str = "ClusterProperty";
pub const PLURAL: &str = "clusterproperties";

/// Lists cluster-scoped ClusterProperty resources.
pub struct ClusterPropertySource {
    api: Api<DynamicObject>,
}

impl ClusterPropertySource {
    /// Create a source backed by `client`.
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all_with(client, &api_resource()),
        }
    }
}

#[async_trait]
impl PropertySource for ClusterPropertySource {
    async fn list(&self) -> Result<Vec<PropertyRecord>> {
        let list = self
            .api
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::source_failed(e.to_string()))?;

        let records: Vec<PropertyRecord> =
            list.items.into_iter().filter_map(record_from_object).collect();
        debug!(count = records.len(), "Listed cluster properties");
        Ok(records)
    }
}

/// API resource descriptor for ClusterProperty.
pub fn api_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(GROUP, VERSION, KIND), PLURAL)
}

/// Convert a ClusterProperty object into a record.
///
/// Objects without a name are skipped; a missing `spec.value` becomes an
/// empty string.
pub fn record_from_object(object: DynamicObject) -> Option<PropertyRecord> {
    let name = object.metadata.name?;
    let value = object
        .data
        .get("spec")
        .and_then(|spec| spec.get("value"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(PropertyRecord::new(name, value))
}
