//! `canary`: run one deployment session end to end.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::ProgressReporter;
use crate::application::services::orchestrator::{Orchestrator, Ports};
use crate::domain::DeployConfig;
use crate::infra::aws::AwsCliProvider;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::load_from_env;
use crate::infra::credentials::TempKeyStager;
use crate::infra::sink::ConfiguredSink;
use crate::infra::ssh::OpenSshTransport;
use crate::output::{TerminalReporter, json, summary};

/// Load configuration from the environment and run the session.
///
/// Returns the process exit code: `0` on full success, `1` otherwise.
///
/// # Errors
///
/// Returns an error if configuration is missing or invalid, or the report
/// cannot be rendered. No instance exists yet in the first case.
pub async fn run(app: &AppContext) -> Result<i32> {
    let config = load_from_env()?;
    execute(app, &config).await
}

/// Run the session with an already validated configuration.
///
/// # Errors
///
/// Returns an error only if the report cannot be rendered.
pub async fn execute(app: &AppContext, config: &DeployConfig) -> Result<i32> {
    let reporter = TerminalReporter::new(&app.output);
    for warning in &config.warnings {
        reporter.warn(warning);
    }
    tracing::info!(
        template = %config.template,
        region = %config.provider.region,
        health_url = %config.deployment.health_url,
        "starting deployment session"
    );

    let provider = AwsCliProvider::new(TokioCommandRunner::default(), &config.provider);
    let transport = OpenSshTransport::new(TokioCommandRunner::default(), config.ssh.command_timeout);
    let credentials = TempKeyStager::default();
    let sink = ConfiguredSink::from_path(config.output_file.clone());

    let orchestrator = Orchestrator::new(
        config,
        Ports {
            provider: &provider,
            transport: &transport,
            credentials: &credentials,
            sink: &sink,
            reporter: &reporter,
        },
    );
    let report = orchestrator.run().await;
    tracing::info!(
        outcome = %report.outcome,
        instance_terminated = report.instance_terminated,
        "session finished"
    );

    if app.is_json() {
        println!("{}", json::format_report(&report)?);
    } else {
        summary::render(&app.output, &report);
    }
    Ok(report.exit_code())
}
