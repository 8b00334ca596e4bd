//! # cluster-info-k8s
//!
//! Keeps the `cluster-info` ConfigMap in sync with the cluster's
//! `ClusterProperty` resources.
//!
//! ## Initialization Sequence
//!
//! 1. **Configuration** - Read `NSM_*` environment variables
//! 2. **Tracing** - Install the subscriber at the configured level
//! 3. **Kubernetes Client** - Build the client from in-cluster config or kubeconfig
//! 4. **Polling Loop** - Poll properties every second and schedule updates
//!
//! Any failure before the loop starts exits with a non-zero status.
//!
//! ## Shutdown
//!
//! SIGINT, SIGTERM, SIGHUP and SIGQUIT stop the loop after its current
//! iteration. Queued ConfigMap updates get a short grace period to drain.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cluster_info_core::ClusterInfoConfig;
use cluster_info_kube::{ClusterPropertySource, ConfigMapStore};
use cluster_info_reconciler::{
    DocumentRef, DocumentUpdater, LoopConfig, PollingLoop, TranslationTable, UpdateScheduler,
};

/// How long queued updates may run after the loop stops.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let config = ClusterInfoConfig::from_env().context("error processing config from env")?;

    init_tracing(config.log_level);

    info!("Starting cluster-info-k8s...");
    info!(
        namespace = %config.namespace,
        configmap = %config.configmap_name,
        file = %config.file_name,
        translations = config.translation_map.len(),
        otel_endpoint = %config.open_telemetry_endpoint,
        metrics_export_interval_ms = config.metrics_export_interval.as_millis(),
        "Configuration loaded"
    );

    let client = cluster_info_kube::connect()
        .await
        .context("Failed to create Kubernetes client")?;

    let updater = DocumentUpdater::new(
        Arc::new(ConfigMapStore::new(client.clone())),
        DocumentRef::new(&config.namespace, &config.configmap_name),
        config.file_name.clone(),
    );

    let mut polling = PollingLoop::new(
        Arc::new(ClusterPropertySource::new(client)),
        Arc::new(TranslationTable::new(config.translation_map.clone())),
        UpdateScheduler::new(updater),
        LoopConfig::default(),
    );

    let stopper = polling.stopper();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => {
                info!(signal, "Received signal, initiating graceful shutdown");
                stopper.stop();
            }
            Err(err) => error!("Failed to listen for shutdown signal: {}", err),
        }
    });

    polling.run().await;

    if !polling.shutdown(DRAIN_GRACE).await {
        warn!("Exiting with ConfigMap updates still queued");
    }

    info!("cluster-info-k8s stopped gracefully");
    Ok(())
}

/// Initialize tracing subscriber; `RUST_LOG` overrides the configured level.
fn init_tracing(level: LevelFilter) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for a termination signal and return its name.
#[cfg(unix)]
async fn wait_for_shutdown() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            "SIGINT"
        }
        _ = terminate.recv() => "SIGTERM",
        _ = hangup.recv() => "SIGHUP",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}

/// Wait for Ctrl+C.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}
