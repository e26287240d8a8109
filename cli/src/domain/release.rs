//! Container release to an existing host.
//!
//! [`ReleaseConfig`] is loaded from the same kind of environment as the
//! canary session, keyed on `EC2_HOST`. [`release_steps`] turns it into the
//! fixed remote sequence: registry login, container cleanup, frontend and
//! backend pull/run, and the nginx check.
//!
//! | Variable | Required | Default |
//! |---|---|---|
//! | `EC2_HOST` | yes | |
//! | `ECR_REPOSITORY_URI` | yes | |
//! | `AWS_REGION` (or `AWS_DEFAULT_REGION`) | yes | |
//! | `EC2_SSH_KEY` | yes | |
//! | `FRONTEND_IMAGE_TAG` / `BACKEND_IMAGE_TAG` | no | `frontend-latest` / `backend-latest` |
//! | `DB_USER` / `DB_PASSWORD` / `DB_HOST` / `DB_PORT` / `DB_NAME` | no | |

use std::fmt::Write as _;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::command::{RemoteStep, shell_quote};
use crate::domain::config::{
    SshConfig, default_connect_timeout, default_remote_timeout, default_ssh_port, default_user,
    non_empty,
};
use crate::domain::error::ConfigError;

/// Host port mapping for the frontend container.
pub const FRONTEND_PORTS: &str = "3000:80";
/// Host port mapping for the backend container.
pub const BACKEND_PORTS: &str = "8080:8080";

#[derive(Debug, Deserialize)]
pub struct RawReleaseConfig {
    ec2_host: Option<String>,
    #[serde(default = "default_user")]
    ec2_user: String,
    #[serde(default = "default_ssh_port")]
    ssh_port: u16,
    #[serde(default = "default_connect_timeout")]
    ssh_connect_timeout_secs: u64,
    #[serde(default = "default_remote_timeout")]
    remote_command_timeout_secs: u64,
    ec2_ssh_key: Option<String>,

    aws_region: Option<String>,
    aws_default_region: Option<String>,
    aws_access_key_id: Option<String>,
    aws_secret_access_key: Option<String>,
    aws_session_token: Option<String>,
    ecr_repository_uri: Option<String>,
    #[serde(default = "default_frontend_tag")]
    frontend_image_tag: String,
    #[serde(default = "default_backend_tag")]
    backend_image_tag: String,

    db_user: Option<String>,
    db_password: Option<String>,
    db_host: Option<String>,
    db_port: Option<String>,
    db_name: Option<String>,
}

fn default_frontend_tag() -> String {
    "frontend-latest".to_string()
}
fn default_backend_tag() -> String {
    "backend-latest".to_string()
}

/// Keys forwarded to the host for the registry login only.
#[derive(Debug)]
pub struct RegistryCredentials {
    pub access_key: String,
    pub secret_key: SecretString,
    pub session_token: Option<SecretString>,
}

#[derive(Debug)]
pub struct RegistrySettings {
    /// `<account>.dkr.ecr.<region>.amazonaws.com/<repo>`.
    pub repository: String,
    pub region: String,
    /// `None` leaves the login to the host's own AWS identity.
    pub credentials: Option<RegistryCredentials>,
}

impl RegistrySettings {
    /// The registry host `docker login` authenticates against.
    #[must_use]
    pub fn registry_host(&self) -> &str {
        self.repository
            .split_once('/')
            .map_or(self.repository.as_str(), |(host, _)| host)
    }

    #[must_use]
    pub fn image(&self, tag: &str) -> String {
        format!("{}:{tag}", self.repository)
    }
}

/// Backend database settings. Unset values are not passed to the container.
#[derive(Debug, Default)]
pub struct DatabaseSettings {
    pub user: Option<String>,
    pub password: Option<SecretString>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug)]
pub struct ReleaseConfig {
    pub host: String,
    pub ssh: SshConfig,
    pub registry: RegistrySettings,
    pub frontend_tag: String,
    pub backend_tag: String,
    pub database: DatabaseSettings,
}

impl ReleaseConfig {
    pub fn from_vars<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let raw: RawReleaseConfig = envy::from_iter(vars)?;
        Ok(Self::try_from(raw)?)
    }
}

impl TryFrom<RawReleaseConfig> for ReleaseConfig {
    type Error = ConfigError;

    fn try_from(raw: RawReleaseConfig) -> Result<Self, ConfigError> {
        let host = non_empty(raw.ec2_host).ok_or(ConfigError::Missing("EC2_HOST"))?;
        let ssh = SshConfig::build(
            raw.ec2_ssh_key,
            raw.ec2_user,
            raw.ssh_port,
            raw.ssh_connect_timeout_secs,
            raw.remote_command_timeout_secs,
        )?;

        let region = non_empty(raw.aws_region)
            .or_else(|| non_empty(raw.aws_default_region))
            .ok_or(ConfigError::Missing("AWS_REGION"))?;
        let repository = non_empty(raw.ecr_repository_uri)
            .ok_or(ConfigError::Missing("ECR_REPOSITORY_URI"))?;
        if repository.contains(char::is_whitespace) || repository.contains(':') {
            return Err(ConfigError::InvalidValue {
                key: "ECR_REPOSITORY_URI",
                reason: "expected <registry>/<repository> without a tag".to_string(),
            });
        }

        let credentials = match (
            non_empty(raw.aws_access_key_id),
            non_empty(raw.aws_secret_access_key),
        ) {
            (Some(access_key), Some(secret)) => Some(RegistryCredentials {
                access_key,
                secret_key: SecretString::from(secret),
                session_token: non_empty(raw.aws_session_token).map(SecretString::from),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("AWS_SECRET_ACCESS_KEY")),
            (None, Some(_)) => return Err(ConfigError::Missing("AWS_ACCESS_KEY_ID")),
        };

        Ok(Self {
            host,
            ssh,
            registry: RegistrySettings {
                repository,
                region,
                credentials,
            },
            frontend_tag: tag("FRONTEND_IMAGE_TAG", raw.frontend_image_tag)?,
            backend_tag: tag("BACKEND_IMAGE_TAG", raw.backend_image_tag)?,
            database: DatabaseSettings {
                user: non_empty(raw.db_user),
                password: non_empty(raw.db_password).map(SecretString::from),
                host: non_empty(raw.db_host),
                port: non_empty(raw.db_port),
                name: non_empty(raw.db_name),
            },
        })
    }
}

fn tag(key: &'static str, value: String) -> Result<String, ConfigError> {
    let value = value.trim().to_string();
    if value.is_empty() || value.contains(|c: char| c.is_whitespace() || c == '/') {
        return Err(ConfigError::InvalidValue {
            key,
            reason: "expected a single image tag".to_string(),
        });
    }
    Ok(value)
}

fn assignment(key: &str, value: &str) -> String {
    format!("{key}={}", shell_quote(value))
}

/// The remote sequence for one release. Steps that embed credentials or the
/// database password are marked sensitive.
#[must_use]
pub fn release_steps(config: &ReleaseConfig) -> Vec<RemoteStep> {
    let registry = &config.registry;

    let mut login_env = Vec::new();
    if let Some(creds) = &registry.credentials {
        login_env.push(assignment("AWS_ACCESS_KEY_ID", &creds.access_key));
        login_env.push(assignment(
            "AWS_SECRET_ACCESS_KEY",
            creds.secret_key.expose_secret(),
        ));
        if let Some(token) = &creds.session_token {
            login_env.push(assignment("AWS_SESSION_TOKEN", token.expose_secret()));
        }
    }
    let mut login_cmd = login_env.join(" ");
    if !login_cmd.is_empty() {
        login_cmd.push(' ');
    }
    let _ = write!(
        login_cmd,
        "aws ecr get-login-password --region {} | docker login -u AWS --password-stdin {}",
        shell_quote(&registry.region),
        shell_quote(registry.registry_host())
    );
    let mut login = RemoteStep::new("registry login", login_cmd);
    if registry.credentials.is_some() {
        login = login.sensitive();
    }

    let db = &config.database;
    let mut backend_env = Vec::new();
    for (key, value) in [
        ("DB_USER", db.user.as_deref()),
        ("DB_PASSWORD", db.password.as_ref().map(|p| p.expose_secret())),
        ("DB_HOST", db.host.as_deref()),
        ("DB_PORT", db.port.as_deref()),
        ("DB_NAME", db.name.as_deref()),
    ] {
        if let Some(value) = value {
            backend_env.push(format!("-e {}", assignment(key, value)));
        }
    }
    let backend_image = shell_quote(&registry.image(&config.backend_tag));
    let frontend_image = shell_quote(&registry.image(&config.frontend_tag));
    let mut run_backend = RemoteStep::new(
        "run backend",
        format!(
            "docker run -d -p {BACKEND_PORTS} {}{backend_image}",
            backend_env
                .iter()
                .map(|e| format!("{e} "))
                .collect::<String>()
        ),
    );
    if db.password.is_some() {
        run_backend = run_backend.sensitive();
    }

    vec![
        login,
        RemoteStep::new("remove containers", "docker ps -aq | xargs -r docker rm -f"),
        RemoteStep::new("pull frontend", format!("docker pull {frontend_image}")),
        RemoteStep::new(
            "run frontend",
            format!("docker run -d -p {FRONTEND_PORTS} {frontend_image}"),
        ),
        RemoteStep::new("pull backend", format!("docker pull {backend_image}")),
        run_backend,
        RemoteStep::new(
            "ensure nginx",
            "sudo systemctl is-active --quiet nginx || sudo systemctl start nginx",
        ),
    ]
}

/// One completed release step.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub label: &'static str,
    pub exit_code: i32,
    pub elapsed_ms: u64,
}

/// Final, serializable summary of a release.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseReport {
    pub host: String,
    pub steps: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub warnings: Vec<String>,
}

impl ReleaseReport {
    #[must_use]
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            steps: Vec::new(),
            failure: None,
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    /// Process exit code: 0 on full success, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.succeeded())
    }
}
