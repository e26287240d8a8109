//! Health check domain types and pure classification functions.
//!
//! This module is intentionally free of I/O, async, and external layer imports.
//! All functions take data in and return data out.

use std::time::Duration;

use serde::Serialize;

/// The only status code that counts as healthy.
pub const HEALTHY_STATUS: u16 = 200;

/// Classification of a single probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// The endpoint answered with an HTTP status.
    Status(u16),
    /// No answer yet (connection refused, timeout); worth retrying.
    Transient(String),
    /// The probe can never succeed (malformed URL, DNS failure).
    Fatal(String),
}

impl ProbeResult {
    /// Only a 200 answer counts as healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Status(HEALTHY_STATUS))
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

/// Final result of a health poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckOutcome {
    pub healthy: bool,
    pub last_status: Option<u16>,
    pub attempts: u32,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Description of the last non-healthy observation.
    pub detail: Option<String>,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Classify the output of `curl -s -o /dev/null -w '%{http_code}'`.
///
/// curl exit codes 1 (unsupported protocol), 3 (malformed URL) and
/// 6 (host not resolvable) are fatal. Any other non-zero exit, or a
/// `000` status, means nothing answered yet.
#[must_use]
pub fn classify_curl(exit_code: i32, stdout: &str, stderr: &str) -> ProbeResult {
    let reported = stdout.trim().parse::<u16>().ok().filter(|c| *c != 0);
    match (exit_code, reported) {
        (0, Some(code)) => ProbeResult::Status(code),
        (1 | 3 | 6, _) => ProbeResult::Fatal(curl_reason(exit_code, stderr)),
        (_, Some(code)) => ProbeResult::Status(code),
        _ => ProbeResult::Transient(curl_reason(exit_code, stderr)),
    }
}

fn curl_reason(exit_code: i32, stderr: &str) -> String {
    let meaning = match exit_code {
        0 => "no status reported",
        1 => "unsupported protocol",
        3 => "malformed URL",
        6 => "could not resolve host",
        7 => "connection refused",
        28 => "request timed out",
        52 => "empty reply from server",
        56 => "connection reset",
        127 => "curl not installed on the instance",
        _ => "request failed",
    };
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("curl exit {exit_code}: {meaning}")
    } else {
        format!("curl exit {exit_code}: {meaning} ({stderr})")
    }
}
