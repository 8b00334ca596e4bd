//! Process configuration loaded from `NSM_*` environment variables.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::level_filters::LevelFilter;

use crate::error::Error;
use crate::result::Result;

pub const ENV_LOG_LEVEL: &str = "NSM_LOG_LEVEL";
pub const ENV_CONFIGMAP_NAME: &str = "NSM_CONFIGMAP_NAME";
pub const ENV_NAMESPACE: &str = "NSM_NAMESPACE";
pub const ENV_OPEN_TELEMETRY_ENDPOINT: &str = "NSM_OPENTELEMETRYENDPOINT";
pub const ENV_METRICS_EXPORT_INTERVAL: &str = "NSM_METRICS_EXPORT_INTERVAL";
pub const ENV_TRANSLATION_MAP: &str = "NSM_TRANSLATION_MAP";
pub const ENV_FILE_NAME: &str = "NSM_FILE_NAME";

const DEFAULT_LOG_LEVEL: &str = "INFO";
const DEFAULT_CONFIGMAP_NAME: &str = "cluster-info";
const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_OPEN_TELEMETRY_ENDPOINT: &str = "otel-collector.observability.svc.cluster.local:4317";
const DEFAULT_METRICS_EXPORT_INTERVAL: &str = "10s";
const DEFAULT_TRANSLATION_MAP: &str = "id.k8s.io:clusterName";
const DEFAULT_FILE_NAME: &str = "config.yaml";

/// Configuration for the cluster-info reconciler.
///
/// Built once at startup and passed by reference; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfoConfig {
    /// Minimum level emitted by the log subscriber.
    pub log_level: LevelFilter,
    /// Name of the ConfigMap to write.
    pub configmap_name: String,
    /// Namespace holding the ConfigMap.
    pub namespace: String,
    /// OpenTelemetry collector endpoint.
    pub open_telemetry_endpoint: String,
    /// Interval between metric exports.
    pub metrics_export_interval: Duration,
    /// Replaces a cluster property name with another when present.
    pub translation_map: BTreeMap<String, String>,
    /// Data key inside the ConfigMap holding the YAML file.
    pub file_name: String,
}

impl Default for ClusterInfoConfig {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::INFO,
            configmap_name: DEFAULT_CONFIGMAP_NAME.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            open_telemetry_endpoint: DEFAULT_OPEN_TELEMETRY_ENDPOINT.to_string(),
            metrics_export_interval: Duration::from_secs(10),
            translation_map: BTreeMap::from([(
                "id.k8s.io".to_string(),
                "clusterName".to_string(),
            )]),
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }
}

impl ClusterInfoConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is present but malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unset variables fall back to their defaults. A variable set to an
    /// empty string is taken as-is.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed, or if the ConfigMap
    /// name, namespace or file name ends up empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Self {
            log_level: parse_log_level(&var(ENV_LOG_LEVEL, DEFAULT_LOG_LEVEL))?,
            configmap_name: var(ENV_CONFIGMAP_NAME, DEFAULT_CONFIGMAP_NAME),
            namespace: var(ENV_NAMESPACE, DEFAULT_NAMESPACE),
            open_telemetry_endpoint: var(
                ENV_OPEN_TELEMETRY_ENDPOINT,
                DEFAULT_OPEN_TELEMETRY_ENDPOINT,
            ),
            metrics_export_interval: parse_duration(
                ENV_METRICS_EXPORT_INTERVAL,
                &var(ENV_METRICS_EXPORT_INTERVAL, DEFAULT_METRICS_EXPORT_INTERVAL),
            )?,
            translation_map: parse_translation_map(&var(
                ENV_TRANSLATION_MAP,
                DEFAULT_TRANSLATION_MAP,
            ))?,
            file_name: var(ENV_FILE_NAME, DEFAULT_FILE_NAME),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        [
            (ENV_CONFIGMAP_NAME, &self.configmap_name),
            (ENV_NAMESPACE, &self.namespace),
            (ENV_FILE_NAME, &self.file_name),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map_or(Ok(()), |(field, _)| {
            Err(Error::invalid_config(field, "must not be empty"))
        })
    }
}

/// Parse a log level, accepting the logrus names used by NSM deployments.
///
/// # Errors
///
/// Returns `InvalidLogLevel` for unknown names.
pub fn parse_log_level(value: &str) -> Result<LevelFilter> {
    match value.trim().to_ascii_lowercase().as_str() {
        "panic" | "fatal" | "error" => Ok(LevelFilter::ERROR),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "info" => Ok(LevelFilter::INFO),
        "debug" => Ok(LevelFilter::DEBUG),
        "trace" => Ok(LevelFilter::TRACE),
        _ => Err(Error::invalid_log_level(value)),
    }
}

/// Parse a duration such as `500ms`, `10s`, `5m` or `1h`.
///
/// # Errors
///
/// Returns `InvalidDuration` if the unit is missing or the number is not a
/// non-negative integer.
pub fn parse_duration(field: &str, value: &str) -> Result<Duration> {
    let trimmed = value.trim();
    let invalid = || Error::invalid_duration(field, value);

    // Checked in order so "ms" is not mistaken for "s" or "m".
    let (digits, millis_per_unit) = [("ms", 1_u64), ("s", 1_000), ("m", 60_000), ("h", 3_600_000)]
        .into_iter()
        .find_map(|(suffix, millis)| trimmed.strip_suffix(suffix).map(|d| (d, millis)))
        .ok_or_else(invalid)?;

    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(millis_per_unit))
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}

/// Parse a `key:value,key:value` translation map.
///
/// # Errors
///
/// Returns `InvalidTranslationMap` for entries without a `:` separator or
/// with an empty key.
pub fn parse_translation_map(value: &str) -> Result<BTreeMap<String, String>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((key, mapped)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), mapped.trim().to_string()))
            }
            _ => Err(Error::invalid_translation_map(entry)),
        })
        .collect()
}
