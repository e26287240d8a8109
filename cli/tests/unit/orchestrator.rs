//! End-to-end session scenarios against mocked ports.

use canary_cli::application::services::orchestrator::{
    OUTPUT_INSTANCE_ID, OUTPUT_PUBLIC_IP, Orchestrator, Ports,
};
use canary_cli::domain::{DeployConfig, Phase, PhaseStatus, SessionReport};
use canary_cli::infra::credentials::TempKeyStager;

use crate::helpers::{deploy_config, result, sample_tree};
use crate::mocks::{
    Describe, MockProvider, MockTransport, RecordingReporter, RecordingSink, Terminate,
};

struct Harness {
    _tree: tempfile::TempDir,
    keys: tempfile::TempDir,
    config: DeployConfig,
    sink: RecordingSink,
    reporter: RecordingReporter,
}

impl Harness {
    fn new() -> Self {
        let tree = sample_tree();
        let config = deploy_config(tree.path());
        Self {
            _tree: tree,
            keys: tempfile::tempdir().expect("tempdir"),
            config,
            sink: RecordingSink::default(),
            reporter: RecordingReporter::default(),
        }
    }

    async fn run(&self, provider: &MockProvider, transport: &MockTransport) -> SessionReport {
        let stager = TempKeyStager::in_dir(self.keys.path());
        Orchestrator::new(
            &self.config,
            Ports {
                provider,
                transport,
                credentials: &stager,
                sink: &self.sink,
                reporter: &self.reporter,
            },
        )
        .run()
        .await
    }

    fn staged_keys_left(&self) -> usize {
        std::fs::read_dir(self.keys.path()).expect("read keys dir").count()
    }
}

fn failed_phase(report: &SessionReport) -> Option<Phase> {
    report
        .phases
        .iter()
        .find(|r| r.status == PhaseStatus::Failed)
        .map(|r| r.phase)
}

#[tokio::test(start_paused = true)]
async fn happy_path_succeeds_publishes_outputs_and_tears_down() {
    let h = Harness::new();
    let provider = MockProvider::healthy();
    let transport = MockTransport::default();

    let report = h.run(&provider, &transport).await;

    assert_eq!(report.outcome, Phase::Succeeded, "{:?}", report.failure);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.instance_id.as_deref(), Some("i-0abc"));
    assert_eq!(report.public_ip.as_deref(), Some("203.0.113.7"));
    assert!(report.instance_terminated);
    assert_eq!(provider.terminated_ids(), vec!["i-0abc".to_string()]);

    assert_eq!(
        h.sink.entries(),
        vec![
            (OUTPUT_INSTANCE_ID.to_string(), "i-0abc".to_string()),
            (OUTPUT_PUBLIC_IP.to_string(), "203.0.113.7".to_string()),
        ]
    );

    let commands = transport.commands();
    let pos = |needle: &str| {
        commands
            .iter()
            .position(|c| c.contains(needle))
            .unwrap_or_else(|| panic!("{needle} not run: {commands:?}"))
    };
    assert!(pos("docker-compose down") < pos("docker-compose up -d"));
    assert!(pos("docker-compose up -d") < pos("curl "));
    assert!(pos("curl ") < pos("./run_tests.sh"));
    assert!(commands[pos("./run_tests.sh")].starts_with("cd 'deployment' && "));

    assert_eq!(transport.puts.lock().expect("lock").len(), 3);
    assert_eq!(transport.live_connections(), 0);
    assert_eq!(h.staged_keys_left(), 0);
    let health = report.health.expect("health outcome recorded");
    assert!(health.healthy);
    assert_eq!(health.last_status, Some(200));
}

#[tokio::test(start_paused = true)]
async fn failing_start_skips_health_and_tests_but_terminates() {
    let h = Harness::new();
    let provider = MockProvider::healthy();
    let transport = MockTransport::default().responding("docker-compose up -d", result(1, ""));

    let report = h.run(&provider, &transport).await;

    assert_eq!(report.outcome, Phase::Failed);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(failed_phase(&report), Some(Phase::StartingServices));
    assert!(!transport.ran("curl "), "health check must not run");
    assert!(!transport.ran("./run_tests.sh"), "tests must not run");
    assert!(report.health.is_none());
    assert_eq!(provider.terminated_ids(), vec!["i-0abc".to_string()]);
    assert_eq!(transport.live_connections(), 0);
    assert_eq!(h.staged_keys_left(), 0);
    let failure = report.failure.expect("failure reason");
    assert!(failure.starts_with("starting services:"), "{failure}");
    assert!(failure.contains("status 1"), "{failure}");
}

#[tokio::test(start_paused = true)]
async fn failing_stop_is_tolerated() {
    let h = Harness::new();
    let provider = MockProvider::healthy();
    let transport =
        MockTransport::default().responding("docker-compose down", result(1, "no such project"));

    let report = h.run(&provider, &transport).await;

    assert_eq!(report.outcome, Phase::Succeeded, "{:?}", report.failure);
    assert!(h.reporter.warnings().iter().any(|w| w.contains("(ignored)")));
}

#[tokio::test(start_paused = true)]
async fn launch_failure_never_terminates() {
    let h = Harness::new();
    let provider = MockProvider::launch_fails();
    let transport = MockTransport::default();

    let report = h.run(&provider, &transport).await;

    assert_eq!(report.outcome, Phase::Failed);
    assert_eq!(failed_phase(&report), Some(Phase::Launching));
    assert!(report.instance_id.is_none());
    assert!(!report.instance_terminated);
    assert!(provider.terminated_ids().is_empty());
    assert!(h.sink.entries().is_empty());
    assert_eq!(transport.connect_count(), 0);
    assert_eq!(h.staged_keys_left(), 0);
    let failure = report.failure.expect("failure reason");
    assert!(failure.contains("InstanceLimitExceeded"), "{failure}");
}

#[tokio::test(start_paused = true)]
async fn unhealthy_service_fails_after_polling_and_skips_tests() {
    let h = Harness::new();
    let provider = MockProvider::healthy();
    let transport = MockTransport::default().curl_script(vec![result(0, "503")]);

    let report = h.run(&provider, &transport).await;

    assert_eq!(report.outcome, Phase::Failed);
    assert_eq!(failed_phase(&report), Some(Phase::HealthChecking));
    assert!(!transport.ran("./run_tests.sh"));
    let health = report.health.expect("health outcome recorded");
    assert!(!health.healthy);
    assert_eq!(health.last_status, Some(503));
    assert_eq!(health.attempts, 3);
    assert_eq!(provider.terminated_ids().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failing_tests_fail_the_session() {
    let h = Harness::new();
    let provider = MockProvider::healthy();
    let transport = MockTransport::default().responding("./run_tests.sh", result(2, "1 failed"));

    let report = h.run(&provider, &transport).await;

    assert_eq!(report.outcome, Phase::Failed);
    assert_eq!(failed_phase(&report), Some(Phase::RunningTests));
    assert!(report.health.is_some_and(|o| o.healthy));
    assert!(report.instance_terminated);
}

#[tokio::test(start_paused = true)]
async fn unreachable_host_times_out_and_terminates() {
    let h = Harness::new();
    let provider = MockProvider::healthy();
    let transport = MockTransport::default().failing_connects(usize::MAX);

    let report = h.run(&provider, &transport).await;

    assert_eq!(report.outcome, Phase::Failed);
    assert_eq!(failed_phase(&report), Some(Phase::AwaitingReachable));
    assert_eq!(transport.connect_count(), 6);
    assert_eq!(h.sink.get(OUTPUT_PUBLIC_IP).as_deref(), Some("203.0.113.7"));
    assert_eq!(provider.terminated_ids().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn instance_terminated_before_running_fails_fast() {
    let h = Harness::new();
    let provider = MockProvider::with_describes(vec![
        Describe::pending(),
        Describe::State(canary_cli::domain::InstanceState::Terminated, None),
    ])
    .terminating(Terminate::NotFound);
    let transport = MockTransport::default();

    let report = h.run(&provider, &transport).await;

    assert_eq!(failed_phase(&report), Some(Phase::AwaitingRunning));
    assert_eq!(provider.describe_count(), 2);
    assert!(report.instance_terminated, "NotFound counts as gone");
    assert!(report.public_ip.is_none());
    assert!(h.sink.get(OUTPUT_PUBLIC_IP).is_none());
}

#[tokio::test(start_paused = true)]
async fn terminate_failure_is_reported_not_raised() {
    let h = Harness::new();
    let provider = MockProvider::healthy().terminating(Terminate::Error);
    let transport = MockTransport::default();

    let report = h.run(&provider, &transport).await;

    assert_eq!(report.outcome, Phase::Succeeded);
    assert!(!report.instance_terminated);
    assert!(report.warnings.iter().any(|w| w.contains("may still be running")));
    assert!(
        h.reporter
            .warnings()
            .iter()
            .any(|w| w.contains("Terminate it manually"))
    );
    assert_eq!(h.staged_keys_left(), 0);
}

#[tokio::test(start_paused = true)]
async fn sink_failure_is_a_warning() {
    let mut h = Harness::new();
    h.sink = RecordingSink::failing();
    let provider = MockProvider::healthy();
    let transport = MockTransport::default();

    let report = h.run(&provider, &transport).await;

    assert_eq!(report.outcome, Phase::Succeeded);
    assert_eq!(report.warnings.len(), 2, "{:?}", report.warnings);
}

#[tokio::test(start_paused = true)]
async fn transfer_failure_names_the_failed_file() {
    let h = Harness::new();
    let provider = MockProvider::healthy();
    let transport = MockTransport::default().failing_put(2);

    let report = h.run(&provider, &transport).await;

    assert_eq!(failed_phase(&report), Some(Phase::SyncingArtifacts));
    let failure = report.failure.expect("failure reason");
    assert!(failure.contains("two.txt"), "{failure}");
    assert!(failure.contains("1 file(s) copied"), "{failure}");
    assert!(!transport.ran("docker-compose up -d"));
    assert_eq!(provider.terminated_ids().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn panic_in_a_phase_still_tears_down() {
    let h = Harness::new();
    let provider = MockProvider::healthy();
    let transport = MockTransport::default().panicking_on_connect();

    let report = h.run(&provider, &transport).await;

    assert_eq!(report.outcome, Phase::Failed);
    assert_eq!(failed_phase(&report), Some(Phase::AwaitingReachable));
    let failure = report.failure.expect("failure reason");
    assert!(failure.contains("panicked: transport blew up"), "{failure}");
    assert_eq!(provider.terminated_ids(), vec!["i-0abc".to_string()]);
    assert_eq!(h.staged_keys_left(), 0);
}

#[tokio::test(start_paused = true)]
async fn phases_are_recorded_in_order() {
    let h = Harness::new();
    let provider = MockProvider::healthy();
    let transport = MockTransport::default();

    let report = h.run(&provider, &transport).await;

    let phases: Vec<Phase> = report.phases.iter().map(|r| r.phase).collect();
    assert_eq!(
        phases,
        vec![
            Phase::Launching,
            Phase::AwaitingRunning,
            Phase::AwaitingReachable,
            Phase::SyncingArtifacts,
            Phase::StartingServices,
            Phase::HealthChecking,
            Phase::RunningTests,
        ]
    );
    assert!(report.phases.iter().all(|r| r.status == PhaseStatus::Ok));
}

#[tokio::test(start_paused = true)]
async fn key_staging_failure_launches_nothing_and_records_no_phase() {
    let h = Harness::new();
    let provider = MockProvider::healthy();
    let transport = MockTransport::default();
    let stager = TempKeyStager::in_dir(h.keys.path().join("missing"));

    let report = Orchestrator::new(
        &h.config,
        Ports {
            provider: &provider,
            transport: &transport,
            credentials: &stager,
            sink: &h.sink,
            reporter: &h.reporter,
        },
    )
    .run()
    .await;

    assert_eq!(report.outcome, Phase::Failed);
    assert!(report.phases.is_empty(), "{:?}", report.phases);
    let failure = report.failure.expect("failure reason");
    assert!(failure.starts_with("preparing session: staging SSH private key"), "{failure}");
    assert!(provider.terminated_ids().is_empty());
    assert_eq!(transport.connect_count(), 0);
}
