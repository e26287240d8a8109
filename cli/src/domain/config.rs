//! Deployment configuration loaded from environment variables.
//!
//! [`RawConfig`] mirrors the variables one to one and is deserialised with
//! `envy`. [`DeployConfig::from_vars`] validates it into the typed
//! configuration the orchestrator is constructed with. Reading the real
//! process environment lives in `crate::infra::config`.
//!
//! | Variable | Required | Default |
//! |---|---|---|
//! | `LAUNCH_TEMPLATE_ID` / `LAUNCH_TEMPLATE_NAME` | one of them | |
//! | `LAUNCH_TEMPLATE_VERSION` | no | `1` |
//! | `AWS_REGION` (or `AWS_DEFAULT_REGION`) | yes | |
//! | `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN` | no | inherited |
//! | `EC2_SSH_KEY` | yes | |
//! | `EC2_USER` | no | `ec2-user` |
//! | `HEALTH_CHECK_URL` | yes | |

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::domain::error::ConfigError;
use crate::domain::instance::{LaunchTemplate, TemplateRef};

/// Environment variables as read, before validation.
#[derive(Debug, Deserialize)]
pub struct RawConfig {
    launch_template_id: Option<String>,
    launch_template_name: Option<String>,
    #[serde(default = "default_template_version")]
    launch_template_version: String,

    aws_region: Option<String>,
    aws_default_region: Option<String>,
    aws_access_key_id: Option<String>,
    aws_secret_access_key: Option<String>,
    aws_session_token: Option<String>,

    ec2_ssh_key: Option<String>,
    #[serde(default = "default_user")]
    ec2_user: String,
    #[serde(default = "default_ssh_port")]
    ssh_port: u16,
    #[serde(default = "default_connect_timeout")]
    ssh_connect_timeout_secs: u64,
    #[serde(default = "default_ready_timeout")]
    ssh_ready_timeout_secs: u64,
    #[serde(default = "default_interval")]
    ssh_ready_interval_secs: u64,

    health_check_url: Option<String>,
    #[serde(default = "default_health_timeout")]
    health_check_timeout_secs: u64,
    #[serde(default = "default_interval")]
    health_check_interval_secs: u64,

    #[serde(default = "default_running_timeout")]
    instance_running_timeout_secs: u64,
    #[serde(default = "default_instance_poll")]
    instance_poll_interval_secs: u64,
    #[serde(default = "default_remote_timeout")]
    remote_command_timeout_secs: u64,

    #[serde(default = "default_source_dir")]
    deploy_source_dir: PathBuf,
    #[serde(default = "default_remote_dir")]
    deploy_remote_dir: String,
    #[serde(default = "default_start_command")]
    deploy_start_command: String,
    #[serde(default = "default_stop_command")]
    deploy_stop_command: String,
    #[serde(default = "default_test_command")]
    deploy_test_command: String,

    github_output: Option<PathBuf>,
}

fn default_template_version() -> String {
    "1".to_string()
}
pub(crate) fn default_user() -> String {
    "ec2-user".to_string()
}
pub(crate) fn default_ssh_port() -> u16 {
    22
}
pub(crate) fn default_connect_timeout() -> u64 {
    10
}
fn default_ready_timeout() -> u64 {
    300
}
fn default_interval() -> u64 {
    10
}
fn default_health_timeout() -> u64 {
    300
}
fn default_running_timeout() -> u64 {
    600
}
fn default_instance_poll() -> u64 {
    15
}
pub(crate) fn default_remote_timeout() -> u64 {
    1800
}
fn default_source_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_remote_dir() -> String {
    "deployment".to_string()
}
fn default_start_command() -> String {
    "docker-compose up -d".to_string()
}
fn default_stop_command() -> String {
    "docker-compose down --remove-orphans".to_string()
}
fn default_test_command() -> String {
    "./run_tests.sh".to_string()
}

/// Cloud provider settings passed to the provider adapter.
#[derive(Debug)]
pub struct ProviderConfig {
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<SecretString>,
    pub session_token: Option<SecretString>,
}

/// Remote shell settings.
#[derive(Debug)]
pub struct SshConfig {
    pub user: String,
    pub port: u16,
    /// PEM private key text, staged to disk only for the session.
    pub private_key: SecretString,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

/// A bounded polling policy.
impl SshConfig {
    /// Validate the SSH settings shared by every command.
    pub(crate) fn build(
        key: Option<String>,
        user: String,
        port: u16,
        connect_timeout_secs: u64,
        command_timeout_secs: u64,
    ) -> Result<Self, ConfigError> {
        let private_key = non_empty(key)
            .map(SecretString::from)
            .ok_or(ConfigError::Missing("EC2_SSH_KEY"))?;
        if !private_key.expose_secret().contains("PRIVATE KEY-----") {
            return Err(ConfigError::InvalidValue {
                key: "EC2_SSH_KEY",
                reason: "expected PEM private key text".to_string(),
            });
        }
        let user = required_text("EC2_USER", user)?;
        Ok(Self {
            user,
            port,
            private_key,
            connect_timeout: secs("SSH_CONNECT_TIMEOUT_SECS", connect_timeout_secs)?,
            command_timeout: secs("REMOTE_COMMAND_TIMEOUT_SECS", command_timeout_secs)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

/// What to deploy and how to start and verify it.
#[derive(Debug, Clone)]
pub struct DeploymentSettings {
    pub source_dir: PathBuf,
    pub remote_dir: String,
    pub start_command: String,
    /// Tolerated cleanup before start; `None` when disabled.
    pub stop_command: Option<String>,
    pub test_command: String,
    pub health_url: Url,
}

/// Validated configuration for one deployment session.
#[derive(Debug)]
pub struct DeployConfig {
    pub template: LaunchTemplate,
    pub provider: ProviderConfig,
    pub ssh: SshConfig,
    pub running: PollPolicy,
    pub readiness: PollPolicy,
    pub health: PollPolicy,
    pub deployment: DeploymentSettings,
    /// Append-only `key=value` output file for the CI system.
    pub output_file: Option<PathBuf>,
    /// Non-fatal observations made while validating.
    pub warnings: Vec<String>,
}

impl DeployConfig {
    /// Deserialize and validate configuration from `(name, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable has the wrong type, a required variable
    /// is missing, or a value fails validation.
    pub fn from_vars<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let raw: RawConfig = envy::from_iter(vars)?;
        Ok(Self::try_from(raw)?)
    }
}

impl TryFrom<RawConfig> for DeployConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, ConfigError> {
        let mut warnings = Vec::new();

        let reference = match (non_empty(raw.launch_template_id), non_empty(raw.launch_template_name)) {
            (Some(id), Some(name)) => {
                warnings.push(format!(
                    "both LAUNCH_TEMPLATE_ID and LAUNCH_TEMPLATE_NAME are set; using id {id} and ignoring name {name}"
                ));
                TemplateRef::Id(id)
            }
            (Some(id), None) => TemplateRef::Id(id),
            (None, Some(name)) => TemplateRef::Name(name),
            (None, None) => return Err(ConfigError::NoLaunchTemplate),
        };
        let template = LaunchTemplate {
            reference,
            version: raw.launch_template_version,
        };

        let region = non_empty(raw.aws_region)
            .or_else(|| non_empty(raw.aws_default_region))
            .ok_or(ConfigError::Missing("AWS_REGION"))?;
        let provider = ProviderConfig {
            region,
            access_key: non_empty(raw.aws_access_key_id),
            secret_key: non_empty(raw.aws_secret_access_key).map(SecretString::from),
            session_token: non_empty(raw.aws_session_token).map(SecretString::from),
        };

        let ssh = SshConfig::build(
            raw.ec2_ssh_key,
            raw.ec2_user,
            raw.ssh_port,
            raw.ssh_connect_timeout_secs,
            raw.remote_command_timeout_secs,
        )?;

        let health_url = parse_health_url(
            &non_empty(raw.health_check_url).ok_or(ConfigError::Missing("HEALTH_CHECK_URL"))?,
        )?;

        let deployment = DeploymentSettings {
            source_dir: raw.deploy_source_dir,
            remote_dir: required_text("DEPLOY_REMOTE_DIR", raw.deploy_remote_dir)?,
            start_command: required_text("DEPLOY_START_COMMAND", raw.deploy_start_command)?,
            stop_command: non_empty(Some(raw.deploy_stop_command)),
            test_command: required_text("DEPLOY_TEST_COMMAND", raw.deploy_test_command)?,
            health_url,
        };

        Ok(Self {
            template,
            provider,
            ssh,
            running: PollPolicy {
                timeout: Duration::from_secs(raw.instance_running_timeout_secs),
                interval: secs("INSTANCE_POLL_INTERVAL_SECS", raw.instance_poll_interval_secs)?,
            },
            readiness: PollPolicy {
                timeout: Duration::from_secs(raw.ssh_ready_timeout_secs),
                interval: secs("SSH_READY_INTERVAL_SECS", raw.ssh_ready_interval_secs)?,
            },
            health: PollPolicy {
                timeout: Duration::from_secs(raw.health_check_timeout_secs),
                interval: secs("HEALTH_CHECK_INTERVAL_SECS", raw.health_check_interval_secs)?,
            },
            deployment,
            output_file: raw.github_output.filter(|p| !p.as_os_str().is_empty()),
            warnings,
        })
    }
}

/// Validate the health URL: it must parse and use `http` or `https`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] for unparseable URLs, other schemes,
/// or URLs without a host.
pub fn parse_health_url(value: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        key: "HEALTH_CHECK_URL",
        reason,
    };
    let url = Url::parse(value).map_err(|e| invalid(format!("{value}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid(format!("{value}: missing host")));
    }
    Ok(url)
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub(crate) fn required_text(key: &'static str, value: String) -> Result<String, ConfigError> {
    non_empty(Some(value)).ok_or(ConfigError::InvalidValue {
        key,
        reason: "must not be empty".to_string(),
    })
}

/// Interval-style durations must be positive; a zero interval would spin.
pub(crate) fn secs(key: &'static str, value: u64) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(value))
}
