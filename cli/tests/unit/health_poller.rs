//! Health polling timing and classification, on paused tokio time.

use std::time::Duration;

use canary_cli::application::services::health::{RemoteHttpProbe, poll_until_healthy};
use canary_cli::application::ports::{HealthProbe, RemoteTransport};
use canary_cli::domain::ProbeResult;

use crate::helpers::{policy, result};
use crate::mocks::{MockTransport, ScriptedProbe};

const URL: &str = "http://localhost:8080/health";

#[tokio::test(start_paused = true)]
async fn constant_503_gives_up_at_the_deadline() {
    let probe = ScriptedProbe::always(ProbeResult::Status(503));

    let outcome = poll_until_healthy(&probe, URL, policy(30, 10)).await;

    assert!(!outcome.healthy);
    assert_eq!(outcome.last_status, Some(503));
    assert!((3..=4).contains(&outcome.attempts), "{}", outcome.attempts);
    assert!(outcome.elapsed >= Duration::from_secs(30));
    assert!(outcome.elapsed < Duration::from_secs(31));
    assert_eq!(outcome.detail.as_deref(), Some("status 503"));
}

#[tokio::test(start_paused = true)]
async fn recovers_on_third_attempt() {
    let probe = ScriptedProbe::new(vec![
        ProbeResult::Status(503),
        ProbeResult::Status(503),
        ProbeResult::Status(200),
    ]);

    let outcome = poll_until_healthy(&probe, URL, policy(60, 5)).await;

    assert!(outcome.healthy);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.elapsed, Duration::from_secs(10));
    assert_eq!(outcome.detail, None);
}

#[tokio::test(start_paused = true)]
async fn only_200_counts() {
    let probe = ScriptedProbe::new(vec![ProbeResult::Status(204), ProbeResult::Status(301)]);

    let outcome = poll_until_healthy(&probe, URL, policy(20, 10)).await;

    assert!(!outcome.healthy);
    assert_eq!(outcome.last_status, Some(301));
}

#[tokio::test(start_paused = true)]
async fn fatal_result_stops_immediately() {
    let probe = ScriptedProbe::always(ProbeResult::Fatal("Could not resolve host".to_string()));

    let outcome = poll_until_healthy(&probe, URL, policy(300, 10)).await;

    assert!(!outcome.healthy);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.elapsed, Duration::ZERO);
    assert_eq!(outcome.last_status, None);
    assert_eq!(outcome.detail.as_deref(), Some("Could not resolve host"));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_keep_polling() {
    let probe = ScriptedProbe::new(vec![
        ProbeResult::Transient("connection refused".to_string()),
        ProbeResult::Transient("connection refused".to_string()),
        ProbeResult::Status(200),
    ]);

    let outcome = poll_until_healthy(&probe, URL, policy(60, 10)).await;

    assert!(outcome.healthy);
    assert_eq!(probe.call_count(), 3);
    assert_eq!(outcome.last_status, Some(200));
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_makes_no_attempt() {
    let probe = ScriptedProbe::always(ProbeResult::Status(200));

    let outcome = poll_until_healthy(&probe, URL, policy(0, 10)).await;

    assert!(!outcome.healthy);
    assert_eq!(outcome.attempts, 0);
    assert_eq!(probe.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn last_sleep_is_clamped_to_the_deadline() {
    let probe = ScriptedProbe::always(ProbeResult::Status(500));

    let outcome = poll_until_healthy(&probe, URL, policy(25, 10)).await;

    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.elapsed, Duration::from_secs(25));
}

#[tokio::test]
async fn remote_probe_runs_curl_and_classifies() {
    let key = tempfile::NamedTempFile::new().expect("tempfile");
    let transport = MockTransport::default().curl_script(vec![
        result(7, ""),
        result(0, "503"),
        result(6, ""),
    ]);
    let conn = transport
        .connect(&crate::readiness::target(key.path()))
        .await
        .expect("connect");
    let probe = RemoteHttpProbe::new(&transport, &conn);

    assert!(matches!(probe.probe(URL).await, ProbeResult::Transient(_)));
    assert_eq!(probe.probe(URL).await, ProbeResult::Status(503));
    assert!(matches!(probe.probe(URL).await, ProbeResult::Fatal(_)));
    assert!(transport.commands()[0].starts_with("curl -s -o /dev/null"));
    assert!(transport.commands()[0].ends_with("'http://localhost:8080/health'"));
}
