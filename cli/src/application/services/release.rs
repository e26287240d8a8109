//! Container release to an existing host.
//!
//! Stages the SSH key, opens one connection and runs the release steps in
//! order, stopping at the first failure. The key is wiped on every path.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use tokio::time::Instant;

use crate::application::ports::{
    CredentialStager, ProgressReporter, RemoteTarget, RemoteTransport, StagedCredential,
};
use crate::application::services::remote::run_step;
use crate::domain::{ReleaseConfig, ReleaseReport, StepRecord, release_steps};

/// Run one release against `config.host`.
pub async fn release(
    config: &ReleaseConfig,
    transport: &impl RemoteTransport,
    credentials: &impl CredentialStager,
    reporter: &impl ProgressReporter,
) -> ReleaseReport {
    let mut report = ReleaseReport::new(&config.host);

    let credential = match credentials
        .stage(config.ssh.private_key.expose_secret())
        .context("staging SSH private key")
    {
        Ok(credential) => credential,
        Err(e) => {
            report.failure = Some(format!("{e:#}"));
            return report;
        }
    };

    if let Err(e) = run_steps(config, transport, credential.path(), reporter, &mut report).await {
        tracing::error!(host = %config.host, error = %format!("{e:#}"), "release failed");
        report.failure = Some(format!("{e:#}"));
    }

    if let Err(e) = credential.wipe() {
        let msg = format!("could not remove staged SSH key: {e:#}");
        reporter.warn(&msg);
        report.warnings.push(msg);
    }
    report
}

async fn run_steps<T: RemoteTransport>(
    config: &ReleaseConfig,
    transport: &T,
    identity: &std::path::Path,
    reporter: &impl ProgressReporter,
    report: &mut ReleaseReport,
) -> Result<()> {
    let target = RemoteTarget {
        address: config.host.clone(),
        user: config.ssh.user.clone(),
        port: config.ssh.port,
        identity: identity.to_path_buf(),
        connect_timeout: config.ssh.connect_timeout,
    };

    reporter.step(&format!("connecting to {}...", config.host));
    let conn = transport.connect(&target).await?;

    for step in release_steps(config) {
        reporter.step(&format!("{}...", step.label));
        let started = Instant::now();
        let result = run_step(transport, &conn, &step, reporter)
            .await
            .with_context(|| step.label)?;
        report.steps.push(StepRecord {
            label: step.label,
            exit_code: result.exit_code,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        });
        reporter.success(step.label);
    }
    Ok(())
}
