//! `canary release`: deploy the container images to an existing host.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::release::release;
use crate::domain::ReleaseConfig;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::load_release_from_env;
use crate::infra::credentials::TempKeyStager;
use crate::infra::ssh::OpenSshTransport;
use crate::output::{TerminalReporter, json, summary};

/// Load the release configuration from the environment and run it.
///
/// # Errors
///
/// Returns an error if configuration is missing or invalid, or the report
/// cannot be rendered.
pub async fn run(app: &AppContext) -> Result<i32> {
    let config = load_release_from_env()?;
    execute(app, &config).await
}

/// Run the release with an already validated configuration.
///
/// # Errors
///
/// Returns an error only if the report cannot be rendered.
pub async fn execute(app: &AppContext, config: &ReleaseConfig) -> Result<i32> {
    tracing::info!(
        host = %config.host,
        repository = %config.registry.repository,
        "starting release"
    );
    let reporter = TerminalReporter::new(&app.output);
    let transport = OpenSshTransport::new(TokioCommandRunner::default(), config.ssh.command_timeout);
    let credentials = TempKeyStager::default();

    let report = release(config, &transport, &credentials, &reporter).await;
    tracing::info!(
        host = %report.host,
        steps = report.steps.len(),
        succeeded = report.succeeded(),
        "release finished"
    );

    if app.is_json() {
        println!("{}", json::format_release(&report)?);
    } else {
        summary::render_release(&app.output, &report);
    }
    Ok(report.exit_code())
}
