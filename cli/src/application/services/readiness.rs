//! Host-level readiness: wait until the transport can connect.

use anyhow::Result;
use tokio::time::{Instant, sleep};

use crate::application::ports::{RemoteTarget, RemoteTransport};
use crate::domain::{DeployError, PollPolicy};

/// Poll `transport.connect` until it succeeds or `policy.timeout` passes.
///
/// Connect failures inside the window are retried after `policy.interval`.
/// A zero timeout fails without attempting a connection. Each successful
/// probe connection is released immediately.
///
/// # Errors
///
/// Returns [`DeployError::ReadinessTimeout`] when the deadline passes.
pub async fn await_reachable(
    transport: &impl RemoteTransport,
    target: &RemoteTarget,
    policy: PollPolicy,
) -> Result<()> {
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let mut attempt = 0u32;

    while Instant::now() < deadline {
        attempt += 1;
        match transport.connect(target).await {
            Ok(conn) => {
                drop(conn);
                tracing::info!(
                    address = %target.address,
                    attempt,
                    elapsed_secs = start.elapsed().as_secs(),
                    "SSH is ready"
                );
                return Ok(());
            }
            Err(e) => {
                tracing::info!(
                    address = %target.address,
                    attempt,
                    error = %format!("{e:#}"),
                    "SSH not available yet"
                );
            }
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        sleep(policy.interval.min(remaining)).await;
    }

    Err(DeployError::ReadinessTimeout {
        address: target.address.clone(),
        after: policy.timeout,
    }
    .into())
}
