//! Deployment orchestrator: the session state machine.
//!
//! Sequences launch → wait-running → wait-reachable → sync → start →
//! health → tests, then always tears down. Teardown is structural:
//! [`Orchestrator::run`] hands the session to `teardown`, which consumes it,
//! after the driven phases return, fail, or panic.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures_util::FutureExt as _;
use secrecy::ExposeSecret;
use tokio::time::Instant;

use crate::application::ports::{
    CredentialStager, InstanceProvider, OutputSink, ProgressReporter, RemoteTarget,
    RemoteTransport, StagedCredential,
};
use crate::application::services::health::{RemoteHttpProbe, poll_until_healthy};
use crate::application::services::remote::run_step;
use crate::application::services::{instance, readiness, transfer};
use crate::domain::{
    DeployConfig, DeployError, HealthCheckOutcome, Instance, Phase, PhaseRecord, PhaseStatus,
    RemoteStep, SessionReport,
};

/// Output key for the launched instance id.
pub const OUTPUT_INSTANCE_ID: &str = "instance_id";
/// Output key for the resolved public address.
pub const OUTPUT_PUBLIC_IP: &str = "public_ip";

/// Infrastructure the orchestrator drives.
pub struct Ports<'a, P, T, C, S, R> {
    pub provider: &'a P,
    pub transport: &'a T,
    pub credentials: &'a C,
    pub sink: &'a S,
    pub reporter: &'a R,
}

/// Run-scoped aggregate owned by exactly one orchestrator run.
pub struct DeploymentSession<A> {
    phase: Phase,
    phase_clock: Instant,
    phase_started_at: DateTime<Utc>,
    records: Vec<PhaseRecord>,
    instance: Option<Instance>,
    credential: Option<A>,
    instance_id: Option<String>,
    public_ip: Option<String>,
    health: Option<HealthCheckOutcome>,
    failure: Option<String>,
    warnings: Vec<String>,
}

impl<A> DeploymentSession<A> {
    fn new() -> Self {
        Self {
            phase: Phase::Created,
            phase_clock: Instant::now(),
            phase_started_at: Utc::now(),
            records: Vec::new(),
            instance: None,
            credential: None,
            instance_id: None,
            public_ip: None,
            health: None,
            failure: None,
            warnings: Vec::new(),
        }
    }

    fn close_phase(&mut self, status: PhaseStatus) {
        if !self.phase.is_recorded() {
            return;
        }
        let elapsed = self.phase_clock.elapsed();
        self.records.push(PhaseRecord {
            phase: self.phase,
            status,
            started_at: self.phase_started_at,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        });
    }

    fn advance(&mut self, to: Phase, reporter: &impl ProgressReporter) {
        debug_assert!(self.phase.can_advance_to(to), "{:?} -> {to:?}", self.phase);
        self.close_phase(PhaseStatus::Ok);
        tracing::debug!(from = ?self.phase, to = ?to, "phase transition");
        self.phase = to;
        self.phase_clock = Instant::now();
        self.phase_started_at = Utc::now();
        if to.is_working() {
            reporter.step(&format!("{to}..."));
        }
    }

    fn fail(&mut self, error: &anyhow::Error) {
        let phase = self.phase;
        tracing::error!(phase = %phase, error = %format!("{error:#}"), "phase failed");
        self.close_phase(PhaseStatus::Failed);
        self.failure = Some(format!("{phase}: {error:#}"));
        self.phase = Phase::Failed;
        self.phase_clock = Instant::now();
        self.phase_started_at = Utc::now();
    }
}

/// Drives one deployment session from launch to teardown.
pub struct Orchestrator<'a, P, T, C, S, R> {
    config: &'a DeployConfig,
    ports: Ports<'a, P, T, C, S, R>,
}

impl<'a, P, T, C, S, R> Orchestrator<'a, P, T, C, S, R>
where
    P: InstanceProvider,
    T: RemoteTransport,
    C: CredentialStager,
    S: OutputSink,
    R: ProgressReporter,
{
    pub fn new(config: &'a DeployConfig, ports: Ports<'a, P, T, C, S, R>) -> Self {
        Self { config, ports }
    }

    /// Run the full session. Never returns early without teardown.
    pub async fn run(&self) -> SessionReport {
        let mut session = DeploymentSession::new();

        let driven = AssertUnwindSafe(self.drive(&mut session))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(anyhow::anyhow!("panicked: {}", panic_message(&*panic))));

        if let Err(e) = driven {
            session.fail(&e);
        }
        self.teardown(session).await
    }

    async fn drive(&self, session: &mut DeploymentSession<C::Artifact>) -> Result<()> {
        let Ports {
            provider,
            transport,
            credentials,
            reporter,
            ..
        } = &self.ports;
        let config = self.config;
        let deployment = &config.deployment;

        let credential = credentials
            .stage(config.ssh.private_key.expose_secret())
            .context("staging SSH private key")?;
        let identity = credential.path().to_path_buf();
        session.credential = Some(credential);

        session.advance(Phase::Launching, *reporter);
        let launched = instance::launch(*provider, &config.template).await?;
        let instance_id = launched.id.clone();
        session.instance = Some(launched);
        session.instance_id = Some(instance_id.clone());
        reporter.success(&format!("instance {instance_id} launched"));
        self.publish(session, OUTPUT_INSTANCE_ID, &instance_id);

        session.advance(Phase::AwaitingRunning, *reporter);
        let running = session
            .instance
            .as_mut()
            .context("instance handle missing after launch")?;
        instance::await_running(*provider, running, config.running).await?;
        let address = running
            .public_address
            .clone()
            .context("running instance has no public address")?;
        reporter.success(&format!("instance running at {address}"));
        self.publish(session, OUTPUT_PUBLIC_IP, &address);
        session.public_ip = Some(address.clone());

        let target = RemoteTarget {
            address,
            user: config.ssh.user.clone(),
            port: config.ssh.port,
            identity,
            connect_timeout: config.ssh.connect_timeout,
        };

        session.advance(Phase::AwaitingReachable, *reporter);
        readiness::await_reachable(*transport, &target, config.readiness).await?;

        session.advance(Phase::SyncingArtifacts, *reporter);
        let conn = transport.connect(&target).await?;
        let report = transfer::upload_tree(
            *transport,
            &conn,
            &deployment.source_dir,
            &deployment.remote_dir,
        )
        .await?;
        reporter.success(&format!(
            "synced {} file(s) to {}",
            report.files_copied.len(),
            deployment.remote_dir
        ));

        session.advance(Phase::StartingServices, *reporter);
        if let Some(stop) = &deployment.stop_command {
            let step = RemoteStep::in_dir("stop services", &deployment.remote_dir, stop).tolerated();
            run_step(*transport, &conn, &step, *reporter).await?;
        }
        let start = RemoteStep::in_dir(
            "start services",
            &deployment.remote_dir,
            &deployment.start_command,
        );
        run_step(*transport, &conn, &start, *reporter).await?;

        session.advance(Phase::HealthChecking, *reporter);
        let url = deployment.health_url.as_str();
        let probe = RemoteHttpProbe::new(*transport, &conn);
        let outcome = poll_until_healthy(&probe, url, config.health).await;
        let healthy = outcome.healthy;
        let (attempts, detail) = (outcome.attempts, outcome.detail.clone());
        session.health = Some(outcome);
        if !healthy {
            return Err(DeployError::HealthCheckFailure {
                url: url.to_string(),
                attempts,
                detail: detail.unwrap_or_default(),
            }
            .into());
        }
        reporter.success(&format!("{url} healthy after {attempts} attempt(s)"));

        session.advance(Phase::RunningTests, *reporter);
        let tests = RemoteStep::in_dir("tests", &deployment.remote_dir, &deployment.test_command);
        run_step(*transport, &conn, &tests, *reporter).await?;
        drop(conn);

        session.advance(Phase::Succeeded, *reporter);
        Ok(())
    }

    /// Publish an output as soon as it is known. A sink failure is a warning:
    /// the value is still in the log for manual cleanup.
    fn publish(&self, session: &mut DeploymentSession<C::Artifact>, key: &str, value: &str) {
        tracing::info!(key, value, "output");
        if let Err(e) = self.ports.sink.publish(key, value) {
            let msg = format!("could not publish {key}={value}: {e:#}");
            self.ports.reporter.warn(&msg);
            session.warnings.push(msg);
        }
    }

    /// Terminate the instance (if one was launched) and wipe the credential.
    /// Consumes the session, so it runs exactly once.
    async fn teardown(&self, mut session: DeploymentSession<C::Artifact>) -> SessionReport {
        let reporter = self.ports.reporter;
        let outcome = if session.phase == Phase::Succeeded {
            Phase::Succeeded
        } else {
            Phase::Failed
        };
        session.advance(Phase::Terminating, reporter);

        let mut instance_terminated = false;
        if let Some(launched) = session.instance.take() {
            reporter.step(&format!("terminating instance {}...", launched.id));
            let id = launched.id.clone();
            instance_terminated = instance::terminate(self.ports.provider, launched, reporter).await;
            if instance_terminated {
                reporter.success(&format!("instance {id} terminated"));
            } else {
                session
                    .warnings
                    .push(format!("instance {id} may still be running"));
            }
        } else {
            tracing::info!("no instance was launched; nothing to terminate");
        }

        if let Some(credential) = session.credential.take()
            && let Err(e) = credential.wipe()
        {
            let msg = format!("could not remove staged SSH key: {e:#}");
            reporter.warn(&msg);
            session.warnings.push(msg);
        }

        session.advance(Phase::Terminated, reporter);
        SessionReport {
            outcome,
            instance_id: session.instance_id,
            public_ip: session.public_ip,
            phases: session.records,
            health: session.health,
            failure: session.failure,
            warnings: session.warnings,
            instance_terminated,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
