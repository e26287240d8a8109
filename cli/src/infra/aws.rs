//! Infrastructure implementation of the `InstanceProvider` port.
//!
//! `AwsCliProvider<R>` routes every EC2 call through the `aws` CLI via a
//! `CommandRunner`, with JSON output parsed by serde. Credentials reach the
//! child process as environment variables only; they never appear in argv.

use std::process::Output;

use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::application::ports::{CommandRunner, InstanceProvider};
use crate::domain::config::ProviderConfig;
use crate::domain::{InstanceDescription, InstanceState, LaunchTemplate, TerminationOutcome};

/// Error codes the EC2 API uses for ids it does not know.
const NOT_FOUND_CODES: [&str; 2] = ["InvalidInstanceID.NotFound", "InvalidInstanceID.Malformed"];

/// Infrastructure adapter that drives EC2 through the `aws` CLI.
///
/// Generic over `R: CommandRunner` so that tests can inject a mock runner
/// without spawning real processes.
pub struct AwsCliProvider<'a, R: CommandRunner> {
    runner: R,
    config: &'a ProviderConfig,
}

impl<'a, R: CommandRunner> AwsCliProvider<'a, R> {
    pub fn new(runner: R, config: &'a ProviderConfig) -> Self {
        Self { runner, config }
    }

    async fn ec2(&self, args: &[&str]) -> Result<Output> {
        let mut full = vec!["ec2"];
        full.extend_from_slice(args);
        let region = self.config.region.as_str();
        full.extend_from_slice(&["--region", region, "--output", "json"]);

        let mut envs: Vec<(&str, &str)> = vec![
            ("AWS_PAGER", ""),
            ("AWS_REGION", region),
            ("AWS_DEFAULT_REGION", region),
        ];
        if let Some(key) = &self.config.access_key {
            envs.push(("AWS_ACCESS_KEY_ID", key.as_str()));
        }
        if let Some(secret) = &self.config.secret_key {
            envs.push(("AWS_SECRET_ACCESS_KEY", secret.expose_secret()));
        }
        if let Some(token) = &self.config.session_token {
            envs.push(("AWS_SESSION_TOKEN", token.expose_secret()));
        }

        tracing::debug!(args = ?args, region, "aws ec2");
        self.runner.run_with_env("aws", &full, &envs).await
    }
}

// ── CLI response shapes ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RunInstancesResponse {
    #[serde(default)]
    instances: Vec<LaunchedInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LaunchedInstance {
    instance_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesResponse {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<DescribedInstance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribedInstance {
    state: StateName,
    public_ip_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StateName {
    name: String,
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn is_not_found(stderr: &str) -> bool {
    NOT_FOUND_CODES.iter().any(|code| stderr.contains(code))
}

fn parse_launch(stdout: &[u8]) -> Result<String> {
    let resp: RunInstancesResponse =
        serde_json::from_slice(stdout).context("parsing run-instances output")?;
    resp.instances
        .into_iter()
        .next()
        .map(|i| i.instance_id)
        .context("run-instances returned no instances")
}

fn parse_describe(stdout: &[u8]) -> Result<Option<InstanceDescription>> {
    let resp: DescribeInstancesResponse =
        serde_json::from_slice(stdout).context("parsing describe-instances output")?;
    Ok(resp
        .reservations
        .into_iter()
        .flat_map(|r| r.instances)
        .next()
        .map(|i| InstanceDescription {
            state: InstanceState::from_provider(&i.state.name),
            public_address: i.public_ip_address.filter(|a| !a.is_empty()),
        }))
}

impl<R: CommandRunner> InstanceProvider for AwsCliProvider<'_, R> {
    async fn launch_instance(&self, template: &LaunchTemplate) -> Result<String> {
        let spec = template.to_spec_arg();
        let output = self
            .ec2(&[
                "run-instances",
                "--launch-template",
                &spec,
                "--count",
                "1",
            ])
            .await
            .context("aws ec2 run-instances")?;
        if !output.status.success() {
            anyhow::bail!("run-instances failed: {}", stderr_of(&output));
        }
        parse_launch(&output.stdout)
    }

    async fn describe_instance(&self, instance_id: &str) -> Result<Option<InstanceDescription>> {
        let output = self
            .ec2(&["describe-instances", "--instance-ids", instance_id])
            .await
            .context("aws ec2 describe-instances")?;
        if !output.status.success() {
            let stderr = stderr_of(&output);
            if is_not_found(&stderr) {
                return Ok(None);
            }
            anyhow::bail!("describe-instances failed: {stderr}");
        }
        parse_describe(&output.stdout)
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<TerminationOutcome> {
        let output = self
            .ec2(&["terminate-instances", "--instance-ids", instance_id])
            .await
            .context("aws ec2 terminate-instances")?;
        if output.status.success() {
            return Ok(TerminationOutcome::Terminated);
        }
        let stderr = stderr_of(&output);
        if is_not_found(&stderr) {
            return Ok(TerminationOutcome::NotFound);
        }
        anyhow::bail!("terminate-instances failed: {stderr}")
    }
}
