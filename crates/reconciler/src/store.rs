//! Document store abstraction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::types::{Document, DocumentRef};

/// Reads and writes persisted documents.
///
/// The store owns document lifecycle; the reconciler never creates or
/// deletes documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by identity.
    async fn get(&self, reference: &DocumentRef) -> Result<Document>;

    /// Replace a document with new content.
    async fn update(&self, document: Document) -> Result<()>;
}

/// One completed store call and the window it occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallRecord {
    /// `"get"` or `"update"`.
    pub operation: &'static str,
    pub started: Instant,
    pub finished: Instant,
}

impl CallRecord {
    /// Whether the two calls were in flight at the same time.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.started < other.finished && other.started < self.finished
    }
}

/// In-memory document store with call instrumentation.
///
/// Every call is counted and logged with its start and finish instants, and
/// the highest number of calls seen in flight at once is recorded. Optional
/// latency widens each call's window.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<DocumentRef, Document>>,
    latency: Duration,
    update_latency: Duration,
    calls: Mutex<Vec<CallRecord>>,
    gets: AtomicUsize,
    updates: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_next_get: AtomicBool,
    fail_next_update: AtomicBool,
    version: AtomicU64,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Delay only `update` calls by `latency`, on top of any common latency.
    #[must_use]
    pub fn with_update_latency(mut self, latency: Duration) -> Self {
        self.update_latency = latency;
        self
    }

    /// Insert or overwrite a document without counting it as an update.
    pub async fn insert(&self, mut document: Document) {
        document.resource_version = Some(self.next_version());
        self.documents
            .write()
            .await
            .insert(document.reference.clone(), document);
    }

    /// Read a document without counting it as a get.
    pub async fn document(&self, reference: &DocumentRef) -> Option<Document> {
        self.documents.read().await.get(reference).cloned()
    }

    /// Fail the next `get` call.
    pub fn fail_next_get(&self) {
        self.fail_next_get.store(true, Ordering::SeqCst);
    }

    /// Fail the next `update` call.
    pub fn fail_next_update(&self) {
        self.fail_next_update.store(true, Ordering::SeqCst);
    }

    /// Number of `get` calls so far.
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `update` calls so far, including failed ones.
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at the same time.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Every finished call, in completion order.
    ///
    /// Calls cancelled mid-flight are logged too, finishing when dropped.
    pub fn call_log(&self) -> Vec<CallRecord> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_version(&self) -> String {
        self.version
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1)
            .to_string()
    }

    async fn enter(&self, operation: &'static str, extra_latency: Duration) -> CallGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = CallGuard {
            store: self,
            operation,
            started: Instant::now(),
        };
        let latency = self.latency.saturating_add(extra_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        guard
    }
}

/// Marks a store call as finished when dropped.
struct CallGuard<'a> {
    store: &'a InMemoryDocumentStore,
    operation: &'static str,
    started: Instant,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.store
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CallRecord {
                operation: self.operation,
                started: self.started,
                finished: Instant::now(),
            });
        self.store.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, reference: &DocumentRef) -> Result<Document> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter("get", Duration::ZERO).await;

        if self.fail_next_get.swap(false, Ordering::SeqCst) {
            return Err(Error::store_failed("get", "injected failure"));
        }

        self.documents
            .read()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| Error::not_found(reference.to_string()))
    }

    async fn update(&self, mut document: Document) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter("update", self.update_latency).await;

        if self.fail_next_update.swap(false, Ordering::SeqCst) {
            return Err(Error::store_failed("update", "injected failure"));
        }

        let mut documents = self.documents.write().await;
        let stored = documents
            .get_mut(&document.reference)
            .ok_or_else(|| Error::not_found(document.reference.to_string()))?;

        if document.resource_version.is_some()
            && document.resource_version != stored.resource_version
        {
            return Err(Error::store_failed("update", "resource version conflict"));
        }

        document.resource_version = Some(self.next_version());
        *stored = document;
        Ok(())
    }
}
