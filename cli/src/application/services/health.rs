//! Application-level health polling.
//!
//! Kept apart from readiness probing: a failure here means the deployed
//! service is unhealthy, not that the host is unreachable.

use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::application::ports::{HealthProbe, RemoteTransport};
use crate::domain::health::classify_curl;
use crate::domain::{HealthCheckOutcome, PollPolicy, ProbeResult, shell_quote};

/// Per-request limit for a single remote curl.
const PROBE_MAX_TIME: Duration = Duration::from_secs(10);

/// Probe `url` every `policy.interval` until it answers 200 or the
/// deadline passes.
///
/// A [`ProbeResult::Fatal`] observation ends the poll immediately; retrying
/// a malformed URL or an unresolvable host cannot succeed.
pub async fn poll_until_healthy(
    probe: &impl HealthProbe,
    url: &str,
    policy: PollPolicy,
) -> HealthCheckOutcome {
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let mut attempts = 0u32;
    let mut last_status = None;
    let mut detail = None;

    while Instant::now() < deadline {
        attempts += 1;
        let result = probe.probe(url).await;
        if let Some(code) = result.status() {
            last_status = Some(code);
        }
        tracing::info!(
            url,
            attempt = attempts,
            status = ?result.status(),
            elapsed_secs = start.elapsed().as_secs(),
            "health check"
        );

        if result.is_healthy() {
            return HealthCheckOutcome {
                healthy: true,
                last_status,
                attempts,
                elapsed: start.elapsed(),
                detail: None,
            };
        }
        match result {
            ProbeResult::Fatal(reason) => {
                tracing::warn!(url, %reason, "health check cannot succeed, giving up");
                detail = Some(reason);
                break;
            }
            ProbeResult::Status(code) => detail = Some(format!("status {code}")),
            ProbeResult::Transient(reason) => detail = Some(reason),
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        sleep(policy.interval.min(remaining)).await;
    }

    HealthCheckOutcome {
        healthy: false,
        last_status,
        attempts,
        elapsed: start.elapsed(),
        detail: detail.or_else(|| Some("no attempt made".to_string())),
    }
}

/// Probes a URL from inside the instance by running `curl` over the transport.
pub struct RemoteHttpProbe<'a, T: RemoteTransport> {
    transport: &'a T,
    conn: &'a T::Connection,
}

impl<'a, T: RemoteTransport> RemoteHttpProbe<'a, T> {
    pub fn new(transport: &'a T, conn: &'a T::Connection) -> Self {
        Self { transport, conn }
    }
}

/// The curl invocation for one probe.
#[must_use]
pub fn curl_command(url: &str) -> String {
    format!(
        "curl -s -o /dev/null -w '%{{http_code}}' --max-time {} {}",
        PROBE_MAX_TIME.as_secs(),
        shell_quote(url)
    )
}

impl<T: RemoteTransport> HealthProbe for RemoteHttpProbe<'_, T> {
    async fn probe(&self, url: &str) -> ProbeResult {
        match self.transport.execute(self.conn, &curl_command(url)).await {
            Ok(out) => classify_curl(out.exit_code, &out.stdout, &out.stderr),
            Err(e) => ProbeResult::Transient(format!("{e:#}")),
        }
    }
}
