//! Property source abstraction.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::types::PropertyRecord;

/// Reads the current list of property records from the registry.
#[async_trait]
pub trait PropertySource: Send + Sync {
    /// List every property record currently registered.
    async fn list(&self) -> Result<Vec<PropertyRecord>>;
}

/// Simple in-memory property source.
#[derive(Default)]
pub struct InMemoryPropertySource {
    records: RwLock<Vec<PropertyRecord>>,
    failure: RwLock<Option<String>>,
}

impl InMemoryPropertySource {
    /// Create a new source with initial records.
    pub fn new(records: Vec<PropertyRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            failure: RwLock::new(None),
        }
    }

    /// Replace the registered records.
    pub async fn set(&self, records: Vec<PropertyRecord>) {
        *self.records.write().await = records;
    }

    /// Make every `list` call fail with `reason` until cleared with `None`.
    pub async fn set_failure(&self, reason: Option<String>) {
        *self.failure.write().await = reason;
    }
}

#[async_trait]
impl PropertySource for InMemoryPropertySource {
    async fn list(&self) -> Result<Vec<PropertyRecord>> {
        if let Some(reason) = self.failure.read().await.as_ref() {
            return Err(Error::source_failed(reason.clone()));
        }
        Ok(self.records.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_reflects_set() {
        let source = InMemoryPropertySource::default();
        assert_eq!(source.list().await, Ok(Vec::new()));

        source
            .set(vec![PropertyRecord::new("id.k8s.io", "cluster-7")])
            .await;

        assert_eq!(
            source.list().await,
            Ok(vec![PropertyRecord::new("id.k8s.io", "cluster-7")])
        );
    }

    #[tokio::test]
    async fn test_failure_until_cleared() {
        let source = InMemoryPropertySource::new(vec![PropertyRecord::new("a", "1")]);

        source.set_failure(Some("registry down".to_string())).await;
        assert_eq!(
            source.list().await,
            Err(Error::source_failed("registry down"))
        );

        source.set_failure(None).await;
        assert_eq!(source.list().await.map(|r| r.len()), Ok(1));
    }
}
