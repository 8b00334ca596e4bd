//! Continuous polling loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::snapshot::build_snapshot;
use crate::source::PropertySource;
use crate::types::TranslationTable;
use crate::updater::UpdateScheduler;

/// Configuration for the polling loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Pause between poll cycles.
    pub interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Polls the property source and schedules a snapshot every cycle.
///
/// Errors never end the loop; only [`LoopStopper::stop`] does.
pub struct PollingLoop {
    /// Registry of property records.
    source: Arc<dyn PropertySource>,
    /// Name translation applied to every record.
    translation: Arc<TranslationTable>,
    /// Serialized document writer.
    scheduler: UpdateScheduler,
    /// Loop configuration.
    config: LoopConfig,
    /// Stop signal receiver.
    stop_rx: watch::Receiver<bool>,
    /// Stop signal sender (for external control).
    stop_tx: watch::Sender<bool>,
}

impl PollingLoop {
    /// Create a new polling loop.
    pub fn new(
        source: Arc<dyn PropertySource>,
        translation: Arc<TranslationTable>,
        scheduler: UpdateScheduler,
        config: LoopConfig,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            source,
            translation,
            scheduler,
            config,
            stop_rx,
            stop_tx,
        }
    }

    /// Run the loop until stopped.
    ///
    /// Each iteration polls once and then sleeps for the configured interval.
    /// A stop request cuts either phase short; a cycle interrupted while
    /// listing is dropped before anything is scheduled.
    pub async fn run(&mut self) {
        info!(
            interval_ms = self.config.interval.as_millis(),
            translations = self.translation.len(),
            "Starting polling loop"
        );

        let interval = self.config.interval;
        let mut stop = self.stop_rx.clone();
        while !*stop.borrow_and_update() {
            tokio::select! {
                _ = self.poll_once() => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    debug!("Stop requested during poll, dropping cycle");
                    continue;
                }
            }

            tokio::select! {
                () = tokio::time::sleep(interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(pending = self.scheduler.pending(), "Polling loop stopped");
    }

    /// Run a single poll cycle.
    ///
    /// Returns the number of records seen. A failed listing is logged and
    /// schedules nothing.
    pub async fn poll_once(&self) -> usize {
        let records = match self.source.list().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to list cluster properties");
                return 0;
            }
        };

        let snapshot = build_snapshot(&records, &self.translation);
        debug!(
            records = records.len(),
            keys = snapshot.len(),
            "Built snapshot"
        );
        self.scheduler.schedule(snapshot);

        records.len()
    }

    /// Stop the loop.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Get a stopper handle.
    pub fn stopper(&self) -> LoopStopper {
        LoopStopper {
            stop_tx: self.stop_tx.clone(),
        }
    }

    /// Drain queued updates, waiting at most `grace`.
    ///
    /// Returns `true` if every queued update finished.
    pub async fn shutdown(self, grace: Duration) -> bool {
        self.scheduler.shutdown(grace).await
    }
}

/// Handle to stop a polling loop.
#[derive(Clone)]
pub struct LoopStopper {
    stop_tx: watch::Sender<bool>,
}

impl LoopStopper {
    /// Stop the loop.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}
