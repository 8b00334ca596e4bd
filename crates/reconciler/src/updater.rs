//! Fetch-merge-write of snapshots into the persisted document.
//!
//! [`DocumentUpdater::apply`] performs one read and at most one write. It has
//! no cross-call locking of its own: callers go through [`UpdateScheduler`],
//! which runs applies strictly one after another so two read-merge-write
//! cycles can never interleave.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::codec::{decode_file, encode_file};
use crate::error::{Error, Result};
use crate::executor::SerialExecutor;
use crate::store::DocumentStore;
use crate::types::{Document, DocumentRef, Snapshot};

/// Upper bound for each individual store call.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(1);

/// What a single apply did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The document was written with this many keys added or changed.
    Updated { keys_changed: usize },
    /// The document already matched the snapshot; nothing was written.
    Unchanged,
    /// The document could not be fetched.
    FetchFailed,
    /// The merged document could not be written.
    WriteFailed,
}

/// Merges snapshots into one file of one persisted document.
pub struct DocumentUpdater {
    store: Arc<dyn DocumentStore>,
    reference: DocumentRef,
    file_name: String,
    timeout: Duration,
}

impl DocumentUpdater {
    /// Create an updater for `file_name` inside the referenced document.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        reference: DocumentRef,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            reference,
            file_name: file_name.into(),
            timeout: STORE_TIMEOUT,
        }
    }

    /// Override the per-call store timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The document this updater writes to.
    pub const fn reference(&self) -> &DocumentRef {
        &self.reference
    }

    /// Merge `change` into the document, writing only if something differs.
    ///
    /// Failures are logged and reported through the outcome; the next poll
    /// cycle is the retry.
    pub async fn apply(&self, change: &Snapshot) -> ApplyOutcome {
        let mut document = match self.fetch().await {
            Ok(document) => document,
            Err(e) => {
                error!(
                    document = %self.reference,
                    error = %e,
                    "Failed to get document"
                );
                return ApplyOutcome::FetchFailed;
            }
        };

        let data = document.data.get_or_insert_with(BTreeMap::new);
        let mut values = data
            .get(&self.file_name)
            .map(|text| decode_file(text))
            .unwrap_or_default();

        let keys_changed = merge_into(&mut values, change);
        if keys_changed == 0 {
            debug!(document = %self.reference, "Document already up to date");
            return ApplyOutcome::Unchanged;
        }

        let encoded = match encode_file(&self.file_name, &values) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(document = %self.reference, error = %e, "Failed to encode file");
                return ApplyOutcome::WriteFailed;
            }
        };
        data.insert(self.file_name.clone(), encoded);

        match self.write(document).await {
            Ok(()) => {
                info!(
                    document = %self.reference,
                    file = %self.file_name,
                    keys_changed,
                    "Document updated"
                );
                ApplyOutcome::Updated { keys_changed }
            }
            Err(e) => {
                error!(
                    document = %self.reference,
                    error = %e,
                    "Failed to update document"
                );
                ApplyOutcome::WriteFailed
            }
        }
    }

    async fn fetch(&self) -> Result<Document> {
        tokio::time::timeout(self.timeout, self.store.get(&self.reference))
            .await
            .map_err(|_| Error::timeout("get", self.timeout))?
    }

    async fn write(&self, document: Document) -> Result<()> {
        tokio::time::timeout(self.timeout, self.store.update(document))
            .await
            .map_err(|_| Error::timeout("update", self.timeout))?
    }
}

/// Set every key of `change` that is missing or different in `current`.
///
/// Keys absent from `change` are left alone. Returns the number of keys set;
/// zero means the document needs no write.
pub fn merge_into(current: &mut BTreeMap<String, String>, change: &Snapshot) -> usize {
    let mut changed = 0_usize;
    for (key, value) in change.iter() {
        if current.get(key).map(String::as_str) != Some(value) {
            current.insert(key.to_string(), value.to_string());
            changed = changed.saturating_add(1);
        }
    }
    changed
}

/// Serializes document updates through a [`SerialExecutor`].
///
/// This is the single entry point for writers: [`UpdateScheduler::schedule`]
/// returns at once and the apply runs after every earlier one has finished.
pub struct UpdateScheduler {
    updater: Arc<DocumentUpdater>,
    executor: SerialExecutor,
}

impl UpdateScheduler {
    /// Create a scheduler and spawn its worker on the current runtime.
    pub fn new(updater: DocumentUpdater) -> Self {
        Self {
            updater: Arc::new(updater),
            executor: SerialExecutor::new(),
        }
    }

    /// Queue `change` to be merged into the document.
    pub fn schedule(&self, change: Snapshot) {
        let updater = Arc::clone(&self.updater);
        debug!(
            document = %updater.reference(),
            keys = change.len(),
            queued = self.executor.pending(),
            "Scheduling update"
        );
        self.executor.exec(async move {
            updater.apply(&change).await;
        });
    }

    /// Number of updates queued or running.
    pub fn pending(&self) -> usize {
        self.executor.pending()
    }

    /// Stop accepting updates and wait up to `grace` for queued ones.
    ///
    /// Returns `true` if every queued update finished.
    pub async fn shutdown(self, grace: Duration) -> bool {
        self.executor.shutdown(grace).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::store::InMemoryDocumentStore;

    const FILE: &str = "config.yaml";

    fn reference() -> DocumentRef {
        DocumentRef::new("default", "cluster-info")
    }

    async fn store_with(document: Document) -> Arc<InMemoryDocumentStore> {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.insert(document).await;
        store
    }

    fn updater(store: &Arc<InMemoryDocumentStore>) -> DocumentUpdater {
        DocumentUpdater::new(store.clone(), reference(), FILE)
    }

    async fn stored_file(store: &InMemoryDocumentStore) -> BTreeMap<String, String> {
        let document = store.document(&reference()).await.expect("document exists");
        decode_file(document.entry(FILE).unwrap_or_default())
    }

    #[test]
    fn test_merge_preserves_unrelated_keys() {
        let mut current = BTreeMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ]);

        let changed = merge_into(&mut current, &Snapshot::from_iter([("b", "3")]));

        assert_eq!(changed, 1);
        assert_eq!(
            current,
            BTreeMap::from([
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "3".to_string()),
            ])
        );
    }

    #[test]
    fn test_merge_identical_values_reports_no_diff() {
        let mut current = BTreeMap::from([("a".to_string(), "1".to_string())]);
        assert_eq!(merge_into(&mut current, &Snapshot::from_iter([("a", "1")])), 0);
    }

    #[test]
    fn test_merge_empty_change_is_no_diff() {
        let mut current = BTreeMap::new();
        assert_eq!(merge_into(&mut current, &Snapshot::new()), 0);
        assert!(current.is_empty());
    }

    #[tokio::test]
    async fn test_apply_initializes_missing_data_container() {
        let store = store_with(Document::new(reference())).await;

        let outcome = updater(&store)
            .apply(&Snapshot::from_iter([("clusterName", "cluster-7")]))
            .await;

        assert_eq!(outcome, ApplyOutcome::Updated { keys_changed: 1 });
        assert_eq!(
            stored_file(&store).await.get("clusterName").map(String::as_str),
            Some("cluster-7")
        );
    }

    #[tokio::test]
    async fn test_apply_same_snapshot_twice_writes_once() {
        let store = store_with(Document::new(reference())).await;
        let updater = updater(&store);
        let change = Snapshot::from_iter([("clusterName", "cluster-7")]);

        assert_eq!(
            updater.apply(&change).await,
            ApplyOutcome::Updated { keys_changed: 1 }
        );
        assert_eq!(updater.apply(&change).await, ApplyOutcome::Unchanged);
        assert_eq!(store.updates(), 1);
        assert_eq!(store.gets(), 2);
    }

    #[tokio::test]
    async fn test_apply_preserves_existing_file_keys() {
        let store =
            store_with(Document::new(reference()).with_entry(FILE, "a: \"1\"\nb: \"2\"\n")).await;

        updater(&store)
            .apply(&Snapshot::from_iter([("b", "3")]))
            .await;

        let file = stored_file(&store).await;
        assert_eq!(file.get("a").map(String::as_str), Some("1"));
        assert_eq!(file.get("b").map(String::as_str), Some("3"));
    }

    #[tokio::test]
    async fn test_apply_preserves_other_data_entries() {
        let store =
            store_with(Document::new(reference()).with_entry("other.txt", "keep me")).await;

        updater(&store)
            .apply(&Snapshot::from_iter([("clusterName", "cluster-7")]))
            .await;

        let document = store.document(&reference()).await.unwrap();
        assert_eq!(document.entry("other.txt"), Some("keep me"));
    }

    #[tokio::test]
    async fn test_apply_treats_malformed_file_as_empty() {
        let store =
            store_with(Document::new(reference()).with_entry(FILE, "a: [unterminated")).await;

        let outcome = updater(&store)
            .apply(&Snapshot::from_iter([("clusterName", "cluster-7")]))
            .await;

        assert_eq!(outcome, ApplyOutcome::Updated { keys_changed: 1 });
        assert_eq!(
            stored_file(&store).await,
            BTreeMap::from([("clusterName".to_string(), "cluster-7".to_string())])
        );
    }

    #[tokio::test]
    async fn test_apply_missing_document_is_fetch_failure() {
        let store = Arc::new(InMemoryDocumentStore::new());

        let outcome = updater(&store)
            .apply(&Snapshot::from_iter([("a", "1")]))
            .await;

        assert_eq!(outcome, ApplyOutcome::FetchFailed);
        assert_eq!(store.updates(), 0);
    }

    #[tokio::test]
    async fn test_apply_fetch_error_skips_write() {
        let store = store_with(Document::new(reference())).await;
        store.fail_next_get();

        let outcome = updater(&store)
            .apply(&Snapshot::from_iter([("a", "1")]))
            .await;

        assert_eq!(outcome, ApplyOutcome::FetchFailed);
        assert_eq!(store.updates(), 0);
    }

    #[tokio::test]
    async fn test_apply_write_error_is_reported() {
        let store = store_with(Document::new(reference())).await;
        store.fail_next_update();
        let updater = updater(&store);
        let change = Snapshot::from_iter([("a", "1")]);

        assert_eq!(updater.apply(&change).await, ApplyOutcome::WriteFailed);
        // The next apply retries naturally.
        assert_eq!(
            updater.apply(&change).await,
            ApplyOutcome::Updated { keys_changed: 1 }
        );
    }

    #[tokio::test]
    async fn test_apply_slow_store_times_out() {
        let store = Arc::new(InMemoryDocumentStore::new().with_latency(Duration::from_millis(200)));
        store.insert(Document::new(reference())).await;

        let outcome = DocumentUpdater::new(store.clone(), reference(), FILE)
            .with_timeout(Duration::from_millis(20))
            .apply(&Snapshot::from_iter([("a", "1")]))
            .await;

        assert_eq!(outcome, ApplyOutcome::FetchFailed);
        assert_eq!(store.updates(), 0);
    }

    #[tokio::test]
    async fn test_apply_slow_write_times_out() {
        let store = Arc::new(
            InMemoryDocumentStore::new().with_update_latency(Duration::from_millis(200)),
        );
        store.insert(Document::new(reference())).await;
        let change = Snapshot::from_iter([("a", "1")]);

        let outcome = DocumentUpdater::new(store.clone(), reference(), FILE)
            .with_timeout(Duration::from_millis(20))
            .apply(&change)
            .await;

        assert_eq!(outcome, ApplyOutcome::WriteFailed);
        assert_eq!(store.updates(), 1);
        assert!(stored_file(&store).await.is_empty());

        // A later cycle with room for the write succeeds.
        assert_eq!(
            updater(&store).apply(&change).await,
            ApplyOutcome::Updated { keys_changed: 1 }
        );
        assert_eq!(
            stored_file(&store).await.get("a").map(String::as_str),
            Some("1")
        );
    }

    #[tokio::test]
    async fn test_scheduler_applies_in_order() {
        let store = store_with(Document::new(reference())).await;
        let scheduler = UpdateScheduler::new(updater(&store));

        scheduler.schedule(Snapshot::from_iter([("clusterName", "first")]));
        scheduler.schedule(Snapshot::from_iter([("clusterName", "second")]));

        assert!(scheduler.shutdown(Duration::from_secs(5)).await);
        assert_eq!(
            stored_file(&store).await.get("clusterName").map(String::as_str),
            Some("second")
        );
        assert_eq!(store.updates(), 2);
    }
}
