//! K8s-style reconciliation loop for the cluster-info document.
//!
//! The loop keeps one persisted key-value file in sync with the property
//! records found in a registry:
//!
//! - **Observe**: list the current property records
//! - **Snapshot**: translate names and build the desired key-value map
//! - **Diff**: merge the snapshot into the stored file
//! - **Apply**: write the document back only if something changed
//!
//! # Single writer
//!
//! The merge is a read-modify-write with no compare-and-swap from the store.
//! Every apply goes through an [`UpdateScheduler`], which queues snapshots on
//! a single worker so two merges never overlap. Polling never waits on the
//! store.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cluster_info_reconciler::{
//!     DocumentRef, DocumentUpdater, InMemoryDocumentStore, InMemoryPropertySource,
//!     LoopConfig, PollingLoop, TranslationTable, UpdateScheduler,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(InMemoryDocumentStore::new());
//!     let source = Arc::new(InMemoryPropertySource::default());
//!     let updater = DocumentUpdater::new(
//!         store,
//!         DocumentRef::new("default", "cluster-info"),
//!         "config.yaml",
//!     );
//!
//!     let mut polling = PollingLoop::new(
//!         source,
//!         Arc::new(TranslationTable::from_iter([("id.k8s.io", "clusterName")])),
//!         UpdateScheduler::new(updater),
//!         LoopConfig::default(),
//!     );
//!
//!     // Run until stopped
//!     // polling.run().await;
//!     // polling.shutdown(Duration::from_secs(5)).await;
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod codec;
pub mod error;
pub mod executor;
pub mod r#loop;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod types;
pub mod updater;

// Re-export main types
pub use codec::{decode_file, encode_file};
pub use error::{Error, Result};
pub use executor::SerialExecutor;
pub use r#loop::{LoopConfig, LoopStopper, PollingLoop};
pub use snapshot::build_snapshot;
pub use source::{InMemoryPropertySource, PropertySource};
pub use store::{CallRecord, DocumentStore, InMemoryDocumentStore};
pub use types::{Document, DocumentRef, PropertyRecord, Snapshot, TranslationTable};
pub use updater::{ApplyOutcome, DocumentUpdater, STORE_TIMEOUT, UpdateScheduler, merge_into};
