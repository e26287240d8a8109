//! Remote command steps.

use anyhow::Result;

use crate::application::ports::{ProgressReporter, RemoteTransport};
use crate::domain::{CommandResult, DeployError, RemoteStep};

/// Run `step` and turn a non-zero exit into [`DeployError::RemoteCommand`],
/// unless the step tolerates failure.
///
/// # Errors
///
/// Returns an error if the command cannot be run, or exits non-zero on an
/// intolerant step.
pub async fn run_step<T: RemoteTransport>(
    transport: &T,
    conn: &T::Connection,
    step: &RemoteStep,
    reporter: &impl ProgressReporter,
) -> Result<CommandResult> {
    tracing::info!(step = step.label, command = %step.display_command(), "running remote command");
    let result = transport.execute(conn, &step.command).await?;

    if !result.stdout.trim().is_empty() {
        tracing::info!(step = step.label, stdout = %result.stdout.trim_end(), "remote stdout");
    }
    if !result.stderr.trim().is_empty() {
        tracing::info!(step = step.label, stderr = %result.stderr.trim_end(), "remote stderr");
    }

    if result.success() {
        return Ok(result);
    }
    if step.tolerate_failure {
        reporter.warn(&format!(
            "{} exited with status {} (ignored)",
            step.label, result.exit_code
        ));
        return Ok(result);
    }
    Err(DeployError::RemoteCommand {
        command: step.display_command().to_string(),
        exit_code: result.exit_code,
        stderr: result.stderr.trim_end().to_string(),
    }
    .into())
}
