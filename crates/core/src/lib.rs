//! Core types shared by the cluster-info binary and its crates.
//!
//! Everything here is resolved once at startup. Errors from this crate are
//! fatal: the process refuses to enter the reconciliation loop with a bad
//! configuration.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod error;
pub mod result;

pub use config::ClusterInfoConfig;
pub use error::Error;
pub use result::Result;
