//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

// ── Deployment errors ─────────────────────────────────────────────────────────

/// Failures raised by a deployment phase.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("instance could not be provisioned: {0}")]
    Provision(String),

    #[error("{what} did not complete within {}s", .after.as_secs())]
    Timeout { what: String, after: Duration },

    #[error("{address} not reachable over SSH after {}s", .after.as_secs())]
    ReadinessTimeout { address: String, after: Duration },

    #[error("cannot connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error(
        "artifact sync failed at {}: {reason} ({} file(s) copied before the failure)",
        .failed.display(),
        .copied.len()
    )]
    Transfer {
        failed: PathBuf,
        reason: String,
        copied: Vec<PathBuf>,
        directories_created: Vec<PathBuf>,
    },

    #[error("remote command `{command}` exited with status {exit_code}\n{stderr}")]
    RemoteCommand {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("health check on {url} failed after {attempts} attempt(s): {detail}")]
    HealthCheckFailure {
        url: String,
        attempts: u32,
        detail: String,
    },
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to loading and validating the environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("Neither LAUNCH_TEMPLATE_ID nor LAUNCH_TEMPLATE_NAME is set")]
    NoLaunchTemplate,
}
