//! Loading configuration from the process environment.

use anyhow::{Context, Result};

use crate::domain::{DeployConfig, ReleaseConfig};

/// Variables whose name or value is not valid UTF-8 are skipped.
fn utf8_vars() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os().filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
}

/// Read and validate the canary session configuration.
///
/// # Errors
///
/// Returns an error naming the missing or invalid variable.
pub fn load_from_env() -> Result<DeployConfig> {
    DeployConfig::from_vars(utf8_vars()).context("invalid configuration")
}

/// Read and validate the host release configuration.
///
/// # Errors
///
/// Returns an error naming the missing or invalid variable.
pub fn load_release_from_env() -> Result<ReleaseConfig> {
    ReleaseConfig::from_vars(utf8_vars()).context("invalid release configuration")
}
