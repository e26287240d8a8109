//! Infrastructure implementation of the `RemoteTransport` port over OpenSSH.
//!
//! `connect` starts a persistent control master (`ControlMaster=auto`,
//! `ControlPersist=yes`) on a socket inside a private temp directory. Every
//! `execute`, `make_dir` and `put_file` call multiplexes over that socket.
//! Dropping the [`SshConnection`] stops the master and removes the socket
//! directory. Host keys are pinned per connection in that same directory:
//! the instance is new, so the first key seen is accepted.

use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Output, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::application::ports::{CommandRunner, RemoteTarget, RemoteTransport};
use crate::domain::{CommandResult, DeployError, shell_quote};

/// Extra time the local `ssh` process gets beyond its own `ConnectTimeout`.
const CONNECT_GRACE: Duration = Duration::from_secs(5);

/// Timeout for a single `scp` of one file.
const COPY_TIMEOUT: Duration = Duration::from_secs(300);

/// Upper bound on `ssh -O exit` when a connection is dropped. The wait
/// blocks the dropping thread, so a wedged master is killed after this.
const MASTER_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

impl From<Output> for CommandResult {
    fn from(output: Output) -> Self {
        Self {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// An open multiplexed SSH session.
pub struct SshConnection {
    control_path: PathBuf,
    known_hosts: PathBuf,
    destination: String,
    port: u16,
    identity: PathBuf,
    connect_timeout: Duration,
    _socket_dir: TempDir,
}

impl SshConnection {
    fn open(target: &RemoteTarget) -> Result<Self> {
        let socket_dir = tempfile::Builder::new()
            .prefix("canary-ssh-")
            .tempdir()
            .context("creating SSH control socket directory")?;
        Ok(Self {
            control_path: socket_dir.path().join("cm"),
            known_hosts: socket_dir.path().join("known_hosts"),
            destination: format!("{}@{}", target.user, target.address),
            port: target.port,
            identity: target.identity.clone(),
            connect_timeout: target.connect_timeout,
            _socket_dir: socket_dir,
        })
    }

    /// Options shared by `ssh` and `scp`. The port flag differs between the
    /// two and is added by the caller.
    fn common_options(&self) -> Vec<String> {
        [
            "BatchMode=yes".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            format!("UserKnownHostsFile={}", self.known_hosts.display()),
            "LogLevel=ERROR".to_string(),
            "IdentitiesOnly=yes".to_string(),
            "ServerAliveInterval=15".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs()),
            format!("ControlPath={}", self.control_path.display()),
        ]
        .into_iter()
        .flat_map(|opt| ["-o".to_string(), opt])
        .chain(["-i".to_string(), self.identity.display().to_string()])
        .collect()
    }

    /// Arguments that start the control master and run `true` through it.
    fn master_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "ControlMaster=auto".to_string(),
            "-o".to_string(),
            "ControlPersist=yes".to_string(),
        ];
        args.extend(self.common_options());
        args.extend(["-p".to_string(), self.port.to_string()]);
        args.extend([self.destination.clone(), "true".to_string()]);
        args
    }

    /// Arguments that run `command` through the remote shell.
    fn exec_args(&self, command: &str) -> Vec<String> {
        let mut args = vec!["-o".to_string(), "ControlMaster=no".to_string()];
        args.extend(self.common_options());
        args.extend(["-p".to_string(), self.port.to_string()]);
        args.extend([
            self.destination.clone(),
            "--".to_string(),
            command.to_string(),
        ]);
        args
    }

    /// Arguments that copy `local` to `remote` with `scp`.
    ///
    /// The remote path is passed verbatim: in SFTP mode scp does not run it
    /// through a shell, so quoting would become part of the name.
    fn copy_args(&self, local: &Path, remote: &str) -> Vec<String> {
        let mut args = vec!["-q".to_string(), "-o".to_string(), "ControlMaster=no".to_string()];
        args.extend(self.common_options());
        args.extend(["-P".to_string(), self.port.to_string()]);
        args.extend([
            local.display().to_string(),
            format!("{}:{remote}", self.destination),
        ]);
        args
    }
}

impl Drop for SshConnection {
    fn drop(&mut self) {
        if !self.control_path.exists() {
            return;
        }
        let child = std::process::Command::new("ssh")
            .arg("-o")
            .arg(format!("ControlPath={}", self.control_path.display()))
            .args(["-O", "exit", self.destination.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match child.and_then(|child| wait_bounded(child, MASTER_EXIT_TIMEOUT)) {
            Ok(Some(s)) if s.success() => tracing::debug!(destination = %self.destination, "SSH master stopped"),
            Ok(Some(s)) => tracing::debug!(destination = %self.destination, status = ?s.code(), "SSH master already gone"),
            Ok(None) => tracing::warn!(destination = %self.destination, "ssh -O exit hung and was killed"),
            Err(e) => tracing::warn!(error = %e, "could not stop SSH master"),
        }
    }
}

/// Wait for `child` for at most `timeout`. Returns `None` after killing a
/// child that did not exit in time.
fn wait_bounded(mut child: Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// `RemoteTransport` backed by the system `ssh` and `scp` binaries.
///
/// Generic over `R: CommandRunner` so that tests can inject a mock runner
/// without spawning real processes.
pub struct OpenSshTransport<R: CommandRunner> {
    runner: R,
    command_timeout: Duration,
}

impl<R: CommandRunner> OpenSshTransport<R> {
    pub fn new(runner: R, command_timeout: Duration) -> Self {
        Self {
            runner,
            command_timeout,
        }
    }

    async fn ssh(&self, args: &[String], timeout: Duration) -> Result<Output> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner.run_with_timeout("ssh", &args, timeout).await
    }
}

impl<R: CommandRunner> RemoteTransport for OpenSshTransport<R> {
    type Connection = SshConnection;

    async fn connect(&self, target: &RemoteTarget) -> Result<SshConnection> {
        let conn = SshConnection::open(target)?;
        let connect_err = |reason: String| DeployError::Connect {
            address: target.address.clone(),
            reason,
        };

        let output = self
            .ssh(&conn.master_args(), target.connect_timeout + CONNECT_GRACE)
            .await
            .map_err(|e| connect_err(format!("{e:#}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let reason = if stderr.is_empty() {
                format!("ssh exited with status {:?}", output.status.code())
            } else {
                stderr
            };
            return Err(connect_err(reason).into());
        }
        tracing::debug!(destination = %conn.destination, "SSH master started");
        Ok(conn)
    }

    async fn execute(&self, conn: &SshConnection, command: &str) -> Result<CommandResult> {
        let output = self
            .ssh(&conn.exec_args(command), self.command_timeout)
            .await
            .with_context(|| format!("running remote command on {}", conn.destination))?;
        Ok(CommandResult::from(output))
    }

    async fn make_dir(&self, conn: &SshConnection, remote: &str) -> Result<()> {
        let result = self
            .execute(conn, &format!("mkdir -p {}", shell_quote(remote)))
            .await?;
        anyhow::ensure!(
            result.success(),
            "mkdir {remote} failed with status {}: {}",
            result.exit_code,
            result.stderr.trim()
        );
        Ok(())
    }

    async fn put_file(&self, conn: &SshConnection, local: &Path, remote: &str) -> Result<()> {
        let args = conn.copy_args(local, remote);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self
            .runner
            .run_with_timeout("scp", &args, COPY_TIMEOUT)
            .await
            .with_context(|| format!("copying {}", local.display()))?;
        anyhow::ensure!(
            output.status.success(),
            "scp {} failed: {}",
            local.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(())
    }
}
