//! JSON output helpers.
//!
//! `--json` prints exactly one document on stdout: the session report on a
//! completed run, or an error object when the run could not start.

use anyhow::{Context, Result};

use crate::domain::{ReleaseReport, SessionReport};

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Format a finished session as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_report(report: &SessionReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("JSON serialization failed")
}

/// Format a finished release as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_release(report: &ReleaseReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("JSON serialization failed")
}
