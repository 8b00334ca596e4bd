//! ConfigMap document store.

use async_trait::async_trait;
use cluster_info_reconciler::{Document, DocumentRef, DocumentStore, Error, Result};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use serde_json::{Value, json};
use tracing::debug;

/// Reads and writes ConfigMaps as reconciler documents.
pub struct ConfigMapStore {
    client: Client,
}

impl ConfigMapStore {
    /// Create a store backed by `client`.
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, reference: &DocumentRef) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &reference.namespace)
    }
}

#[async_trait]
impl DocumentStore for ConfigMapStore {
    async fn get(&self, reference: &DocumentRef) -> Result<Document> {
        let configmap = self
            .api(reference)
            .get(&reference.name)
            .await
            .map_err(|e| store_error("get", reference, e))?;
        Ok(document_from_configmap(reference.clone(), configmap))
    }

    /// Writes the whole data container as a merge patch.
    ///
    /// The fetched resource version rides along, so a ConfigMap changed by
    /// someone else since the read is rejected with a conflict instead of
    /// overwritten.
    async fn update(&self, document: Document) -> Result<()> {
        let patch = merge_patch(&document);
        self.api(&document.reference)
            .patch(
                &document.reference.name,
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await
            .map_err(|e| store_error("update", &document.reference, e))?;
        debug!(document = %document.reference, "ConfigMap patched");
        Ok(())
    }
}

/// Convert a fetched ConfigMap into a document.
pub fn document_from_configmap(reference: DocumentRef, configmap: ConfigMap) -> Document {
    Document {
        reference,
        resource_version: configmap.metadata.resource_version,
        data: configmap.data,
    }
}

/// Build the JSON merge patch that writes a document's data container.
pub fn merge_patch(document: &Document) -> Value {
    let mut patch = json!({ "data": document.data.clone().unwrap_or_default() });
    if let (Some(version), Some(object)) = (&document.resource_version, patch.as_object_mut()) {
        object.insert(
            "metadata".to_string(),
            json!({ "resourceVersion": version }),
        );
    }
    patch
}

fn store_error(operation: &str, reference: &DocumentRef, error: kube::Error) -> Error {
    match error {
        kube::Error::Api(response) if response.code == 404 => {
            Error::not_found(reference.to_string())
        }
        other => Error::store_failed(operation, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::core::ErrorResponse;

    use super::*;

    fn reference() -> DocumentRef {
        DocumentRef::new("default", "cluster-info")
    }

    #[test]
    fn test_document_from_configmap_copies_data_and_version() {
        let configmap = ConfigMap {
            metadata: ObjectMeta {
                name: Some("cluster-info".to_string()),
                namespace: Some("default".to_string()),
                resource_version: Some("42".to_string()),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([(
                "config.yaml".to_string(),
                "clusterName: cluster-7\n".to_string(),
            )])),
            ..ConfigMap::default()
        };

        let document = document_from_configmap(reference(), configmap);

        assert_eq!(document.resource_version.as_deref(), Some("42"));
        assert_eq!(
            document.entry("config.yaml"),
            Some("clusterName: cluster-7\n")
        );
    }

    #[test]
    fn test_document_from_configmap_without_data() {
        let document = document_from_configmap(reference(), ConfigMap::default());
        assert!(document.data.is_none());
    }

    #[test]
    fn test_merge_patch_carries_resource_version() {
        let mut document =
            Document::new(reference()).with_entry("config.yaml", "clusterName: cluster-7\n");
        document.resource_version = Some("42".to_string());

        assert_eq!(
            merge_patch(&document),
            json!({
                "metadata": { "resourceVersion": "42" },
                "data": { "config.yaml": "clusterName: cluster-7\n" },
            })
        );
    }

    #[test]
    fn test_merge_patch_without_resource_version() {
        let document = Document::new(reference());
        assert_eq!(merge_patch(&document), json!({ "data": {} }));
    }

    #[test]
    fn test_not_found_is_mapped() {
        let error = kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "configmaps \"cluster-info\" not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        });

        assert_eq!(
            store_error("get", &reference(), error),
            Error::not_found("default/cluster-info")
        );
    }

    #[test]
    fn test_conflict_is_store_failure() {
        let error = kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "the object has been modified".to_string(),
            reason: "Conflict".to_string(),
            code: 409,
        });

        assert!(matches!(
            store_error("update", &reference(), error),
            Error::StoreFailed { ref operation, .. } if operation == "update"
        ));
    }
}
