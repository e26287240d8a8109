//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::Result;

use crate::domain::{
    CommandResult, InstanceDescription, LaunchTemplate, ProbeResult, TerminationOutcome,
};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output, with an explicit timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
    /// Run a program with extra environment variables set for the child only,
    /// under the runner's default timeout.
    async fn run_with_env(
        &self,
        program: &str,
        args: &[&str],
        envs: &[(&str, &str)],
    ) -> Result<Output>;
}

// ── Instance Provider Port ────────────────────────────────────────────────────

/// Cloud provider instance primitives.
#[allow(async_fn_in_trait)]
pub trait InstanceProvider {
    /// Launch one instance from `template` and return its id.
    async fn launch_instance(&self, template: &LaunchTemplate) -> Result<String>;
    /// Describe an instance. `Ok(None)` when the provider does not know the id (yet).
    async fn describe_instance(&self, instance_id: &str) -> Result<Option<InstanceDescription>>;
    /// Request termination. Unknown ids report [`TerminationOutcome::NotFound`].
    async fn terminate_instance(&self, instance_id: &str) -> Result<TerminationOutcome>;
}

// ── Remote Transport Port ─────────────────────────────────────────────────────

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub address: String,
    pub user: String,
    pub port: u16,
    /// Path to the staged private key.
    pub identity: PathBuf,
    pub connect_timeout: Duration,
}

/// Remote shell and file copy.
///
/// `Connection` is a scoped handle: dropping it releases the underlying
/// session, so every exit path (including `?` and panics) closes it.
#[allow(async_fn_in_trait)]
pub trait RemoteTransport {
    type Connection;

    /// Open a connection.
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::DeployError::Connect`] when the endpoint refuses,
    /// times out, or rejects the identity.
    async fn connect(&self, target: &RemoteTarget) -> Result<Self::Connection>;
    /// Run `command` through the remote shell. A non-zero exit is returned in
    /// the [`CommandResult`]; `Err` means the command could not be run at all.
    async fn execute(&self, conn: &Self::Connection, command: &str) -> Result<CommandResult>;
    /// Create `remote` (and parents) if missing.
    async fn make_dir(&self, conn: &Self::Connection, remote: &str) -> Result<()>;
    /// Copy one local file to `remote`.
    async fn put_file(&self, conn: &Self::Connection, local: &Path, remote: &str) -> Result<()>;
}

// ── Health Port ───────────────────────────────────────────────────────────────

/// One application-level status probe.
#[allow(async_fn_in_trait)]
pub trait HealthProbe {
    /// Issue a single GET to `url` and classify the result. Never errors:
    /// failures are encoded as [`ProbeResult::Transient`] or [`ProbeResult::Fatal`].
    async fn probe(&self, url: &str) -> ProbeResult;
}

// ── Result Sink Port ──────────────────────────────────────────────────────────

/// Append-only key/value outputs consumed by the automation system.
pub trait OutputSink {
    /// Publish `key=value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be written.
    fn publish(&self, key: &str, value: &str) -> Result<()>;
}

// ── Credential Port ───────────────────────────────────────────────────────────

/// A private key staged on local storage for the transport to read.
pub trait StagedCredential {
    fn path(&self) -> &Path;
    /// Delete the key material.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    fn wipe(self) -> Result<()>;
}

/// Stages private key material as an owner-only file.
pub trait CredentialStager {
    type Artifact: StagedCredential;

    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    fn stage(&self, material: &str) -> Result<Self::Artifact>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
