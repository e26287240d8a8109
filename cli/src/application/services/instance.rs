//! Instance lifecycle: launch, wait for running, terminate.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result};
use tokio::time::{Instant, sleep};

use crate::application::ports::{InstanceProvider, ProgressReporter};
use crate::domain::{
    DeployError, Instance, InstanceState, LaunchTemplate, PollPolicy, TerminationOutcome,
};

/// Launch one instance from `template`.
///
/// # Errors
///
/// Returns [`DeployError::Provision`] if the provider rejects the request
/// (invalid template, quota exceeded) or returns no usable id.
pub async fn launch(provider: &impl InstanceProvider, template: &LaunchTemplate) -> Result<Instance> {
    let id = provider
        .launch_instance(template)
        .await
        .map_err(|e| DeployError::Provision(format!("{e:#}")))
        .with_context(|| format!("launching from template {template}"))?;
    anyhow::ensure!(
        !id.trim().is_empty(),
        DeployError::Provision("provider returned an empty instance id".into())
    );
    tracing::info!(instance_id = %id, "instance launched");
    Ok(Instance::pending(id))
}

/// Poll the provider until `instance` is running with a public address.
///
/// "Not found yet" and "running without an address yet" keep polling;
/// terminated or failed states fail fast.
///
/// # Errors
///
/// Returns [`DeployError::Timeout`] when the bound passes, or
/// [`DeployError::Provision`] when the instance can no longer reach running.
pub async fn await_running(
    provider: &impl InstanceProvider,
    instance: &mut Instance,
    policy: PollPolicy,
) -> Result<()> {
    let deadline = Instant::now() + policy.timeout;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match provider.describe_instance(&instance.id).await {
            Ok(Some(desc)) => {
                instance.state = desc.state;
                tracing::info!(
                    instance_id = %instance.id,
                    attempt,
                    state = ?desc.state,
                    address = desc.public_address.as_deref().unwrap_or("-"),
                    "instance state"
                );
                match (desc.state, desc.public_address) {
                    (InstanceState::Running, Some(address)) => {
                        instance.public_address = Some(address);
                        return Ok(());
                    }
                    (InstanceState::Terminated | InstanceState::Failed, _) => {
                        return Err(DeployError::Provision(format!(
                            "instance {} entered state {:?} before running",
                            instance.id, desc.state
                        ))
                        .into());
                    }
                    _ => {}
                }
            }
            Ok(None) => {
                tracing::info!(instance_id = %instance.id, attempt, "instance not visible yet");
            }
            Err(e) => {
                tracing::warn!(instance_id = %instance.id, attempt, error = %format!("{e:#}"), "describe failed");
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(DeployError::Timeout {
                what: format!("instance {} reaching running state", instance.id),
                after: policy.timeout,
            }
            .into());
        }
        sleep(policy.interval.min(remaining)).await;
    }
}

/// Terminate `instance`. Never fails: this runs on the teardown path.
///
/// Returns `true` when the provider accepted the termination or already
/// considers the instance gone.
pub async fn terminate(
    provider: &impl InstanceProvider,
    instance: Instance,
    reporter: &impl ProgressReporter,
) -> bool {
    match provider.terminate_instance(&instance.id).await {
        Ok(TerminationOutcome::Terminated) => {
            tracing::info!(instance_id = %instance.id, "termination requested");
            true
        }
        Ok(TerminationOutcome::NotFound) => {
            reporter.warn(&format!("instance {} was already gone", instance.id));
            true
        }
        Err(e) => {
            reporter.warn(&format!(
                "could not terminate instance {}: {e:#}. Terminate it manually.",
                instance.id
            ));
            false
        }
    }
}
