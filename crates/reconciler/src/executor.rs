//! Single-worker FIFO executor.
//!
//! Jobs submitted through [`SerialExecutor::exec`] run one at a time, in
//! submission order, on a dedicated tokio task. Submission never blocks and
//! never fails from the caller's point of view.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

type Job = BoxFuture<'static, ()>;

/// Unbounded FIFO queue drained by a single worker task.
pub struct SerialExecutor {
    tx: mpsc::UnboundedSender<Job>,
    worker: JoinHandle<()>,
    pending: Arc<AtomicUsize>,
}

impl SerialExecutor {
    /// Create an executor and spawn its worker on the current runtime.
    ///
    /// Must be called from within a tokio runtime, which is why there is no
    /// `Default` impl.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker = tokio::spawn(drain(rx, Arc::clone(&pending)));
        Self {
            tx,
            worker,
            pending,
        }
    }

    /// Queue a job behind every job submitted before it.
    pub fn exec<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job.boxed()).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            warn!("Executor worker is gone, dropping job");
        }
    }

    /// Number of jobs queued or running.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Close the queue and wait up to `grace` for queued jobs to finish.
    ///
    /// Returns `true` if the queue fully drained.
    pub async fn shutdown(self, grace: Duration) -> bool {
        let Self {
            tx,
            worker,
            pending,
        } = self;
        drop(tx);

        debug!(pending = pending.load(Ordering::SeqCst), "Draining executor");

        match tokio::time::timeout(grace, worker).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(error = %e, "Executor worker failed");
                false
            }
            Err(_) => {
                warn!(
                    pending = pending.load(Ordering::SeqCst),
                    grace_ms = grace.as_millis(),
                    "Executor did not drain in time"
                );
                false
            }
        }
    }
}

async fn drain(mut rx: mpsc::UnboundedReceiver<Job>, pending: Arc<AtomicUsize>) {
    while let Some(job) = rx.recv().await {
        if AssertUnwindSafe(job).catch_unwind().await.is_err() {
            error!("Executor job panicked");
        }
        pending.fetch_sub(1, Ordering::SeqCst);
    }
    debug!("Executor queue closed");
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use std::sync::Mutex;

    use super::*;

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let executor = SerialExecutor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..20_u32 {
            let seen = Arc::clone(&seen);
            executor.exec(async move {
                // Earlier jobs sleep longer; order must still hold.
                tokio::time::sleep(Duration::from_millis(u64::from(20 - i))).await;
                seen.lock().unwrap().push(i);
            });
        }

        assert!(executor.shutdown(Duration::from_secs(5)).await);
        assert_eq!(*seen.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_jobs_never_overlap() {
        let executor = SerialExecutor::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            executor.exec(async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            });
        }

        assert!(executor.shutdown(Duration::from_secs(5)).await);
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exec_does_not_wait_for_job() {
        let executor = SerialExecutor::new();

        executor.exec(tokio::time::sleep(Duration::from_millis(200)));
        executor.exec(async {});

        assert_eq!(executor.pending(), 2);
        assert!(executor.shutdown(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_shutdown_gives_up_after_grace() {
        let executor = SerialExecutor::new();
        executor.exec(tokio::time::sleep(Duration::from_secs(60)));

        assert!(!executor.shutdown(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_worker() {
        let executor = SerialExecutor::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let explode = true;
        executor.exec(async move {
            if explode {
                panic!("boom");
            }
        });
        let counter = Arc::clone(&ran);
        executor.exec(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(executor.shutdown(Duration::from_secs(5)).await);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
