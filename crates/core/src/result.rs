//! Result type definition for startup operations.

use crate::error::Error;

/// The standard Result type for configuration and startup operations.
///
/// # Examples
///
/// ```ignore
/// fn startup() -> Result<String> {
///     let config = ClusterInfoConfig::from_env()?;
///     Ok(config.namespace)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;
