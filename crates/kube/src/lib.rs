//! Kubernetes adapters for the cluster-info reconciler.
//!
//! - [`ClusterPropertySource`] lists `about.k8s.io/v1alpha1` ClusterProperty
//!   resources as property records.
//! - [`ConfigMapStore`] reads and writes the target ConfigMap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod configmap;
pub mod properties;

pub use configmap::ConfigMapStore;
pub use properties::ClusterPropertySource;

use kube::Client;
use tracing::info;

/// Build a Kubernetes client from the in-cluster or kubeconfig environment.
///
/// # Errors
///
/// Returns an error if no usable cluster configuration is found.
pub async fn connect() -> kube::Result<Client> {
    let client = Client::try_default().await?;
    info!(namespace = client.default_namespace(), "Kubernetes client ready");
    Ok(client)
}
