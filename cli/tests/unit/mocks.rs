//! Hand-written port mocks for unit tests.
//!
//! Every mock records what it was asked to do so tests can assert on the
//! calls, not just the result.

#![allow(clippy::expect_used, dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use canary_cli::application::ports::{
    HealthProbe, InstanceProvider, OutputSink, ProgressReporter, RemoteTarget, RemoteTransport,
};
use canary_cli::domain::{
    CommandResult, InstanceDescription, InstanceState, LaunchTemplate, ProbeResult,
    TerminationOutcome,
};

/// Pop the next scripted item, repeating the last one once the script runs out.
fn next_of<T: Clone>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    let mut q = queue.lock().expect("lock");
    if q.len() > 1 { q.pop_front() } else { q.front().cloned() }
}

// ── Instance provider ─────────────────────────────────────────────────────────

/// One scripted `describe_instance` answer.
#[derive(Debug, Clone)]
pub enum Describe {
    Missing,
    Error,
    State(InstanceState, Option<&'static str>),
}

impl Describe {
    pub fn running(address: &'static str) -> Self {
        Self::State(InstanceState::Running, Some(address))
    }

    pub fn pending() -> Self {
        Self::State(InstanceState::Pending, None)
    }
}

/// One scripted `terminate_instance` answer.
#[derive(Debug, Clone, Copy)]
pub enum Terminate {
    Ok,
    NotFound,
    Error,
}

pub struct MockProvider {
    launch: Option<&'static str>,
    describes: Mutex<VecDeque<Describe>>,
    terminate: Terminate,
    pub launches: AtomicUsize,
    pub describe_calls: AtomicUsize,
    pub terminated: Mutex<Vec<String>>,
}

impl MockProvider {
    /// Launches `i-0abc` and reports it running at `203.0.113.7` right away.
    pub fn healthy() -> Self {
        Self::with_describes(vec![Describe::pending(), Describe::running("203.0.113.7")])
    }

    pub fn with_describes(describes: Vec<Describe>) -> Self {
        Self {
            launch: Some("i-0abc"),
            describes: Mutex::new(describes.into()),
            terminate: Terminate::Ok,
            launches: AtomicUsize::new(0),
            describe_calls: AtomicUsize::new(0),
            terminated: Mutex::new(Vec::new()),
        }
    }

    /// Every launch is rejected.
    pub fn launch_fails() -> Self {
        Self {
            launch: None,
            ..Self::healthy()
        }
    }

    #[must_use]
    pub fn terminating(mut self, terminate: Terminate) -> Self {
        self.terminate = terminate;
        self
    }

    pub fn terminated_ids(&self) -> Vec<String> {
        self.terminated.lock().expect("lock").clone()
    }

    pub fn describe_count(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }
}

impl InstanceProvider for MockProvider {
    async fn launch_instance(&self, _template: &LaunchTemplate) -> Result<String> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        match self.launch {
            Some(id) => Ok(id.to_string()),
            None => anyhow::bail!("InstanceLimitExceeded: quota reached"),
        }
    }

    async fn describe_instance(&self, _instance_id: &str) -> Result<Option<InstanceDescription>> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        match next_of(&self.describes).expect("describe script must not be empty") {
            Describe::Missing => Ok(None),
            Describe::Error => anyhow::bail!("RequestLimitExceeded"),
            Describe::State(state, address) => Ok(Some(InstanceDescription {
                state,
                public_address: address.map(ToString::to_string),
            })),
        }
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<TerminationOutcome> {
        self.terminated
            .lock()
            .expect("lock")
            .push(instance_id.to_string());
        match self.terminate {
            Terminate::Ok => Ok(TerminationOutcome::Terminated),
            Terminate::NotFound => Ok(TerminationOutcome::NotFound),
            Terminate::Error => anyhow::bail!("UnauthorizedOperation"),
        }
    }
}

// ── Remote transport ──────────────────────────────────────────────────────────

/// Connection handle that tracks how many are still open.
pub struct MockConnection {
    live: Arc<AtomicUsize>,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockTransport {
    /// Fail this many connects before succeeding (`usize::MAX` never succeeds).
    fail_connects: usize,
    panic_on_connect: bool,
    /// 1-based index of the `put_file` call that fails.
    fail_put: Option<usize>,
    /// `(substring, result)`: the first match answers `execute`.
    responses: Vec<(&'static str, CommandResult)>,
    curl: Mutex<VecDeque<CommandResult>>,
    pub connects: AtomicUsize,
    pub live: Arc<AtomicUsize>,
    pub commands: Mutex<Vec<String>>,
    pub dirs: Mutex<Vec<String>>,
    pub puts: Mutex<Vec<String>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            fail_connects: 0,
            panic_on_connect: false,
            fail_put: None,
            responses: Vec::new(),
            curl: Mutex::new(VecDeque::from([ok("200")])),
            connects: AtomicUsize::new(0),
            live: Arc::new(AtomicUsize::new(0)),
            commands: Mutex::new(Vec::new()),
            dirs: Mutex::new(Vec::new()),
            puts: Mutex::new(Vec::new()),
        }
    }
}

fn ok(stdout: &str) -> CommandResult {
    CommandResult {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

impl MockTransport {
    #[must_use]
    pub fn failing_connects(mut self, n: usize) -> Self {
        self.fail_connects = n;
        self
    }

    #[must_use]
    pub fn panicking_on_connect(mut self) -> Self {
        self.panic_on_connect = true;
        self
    }

    #[must_use]
    pub fn failing_put(mut self, nth: usize) -> Self {
        self.fail_put = Some(nth);
        self
    }

    /// Answer commands containing `needle` with `result`.
    #[must_use]
    pub fn responding(mut self, needle: &'static str, result: CommandResult) -> Self {
        self.responses.push((needle, result));
        self
    }

    /// Script the remote curl outputs (last one repeats).
    #[must_use]
    pub fn curl_script(self, script: Vec<CommandResult>) -> Self {
        *self.curl.lock().expect("lock") = script.into();
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().expect("lock").clone()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.commands().iter().any(|c| c.contains(needle))
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn live_connections(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl RemoteTransport for MockTransport {
    type Connection = MockConnection;

    async fn connect(&self, target: &RemoteTarget) -> Result<MockConnection> {
        assert!(
            target.identity.exists(),
            "staged key must exist while connecting"
        );
        let n = self.connects.fetch_add(1, Ordering::SeqCst);
        assert!(!self.panic_on_connect, "transport blew up");
        if n < self.fail_connects {
            anyhow::bail!("Connection refused");
        }
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            live: Arc::clone(&self.live),
        })
    }

    async fn execute(&self, _conn: &MockConnection, command: &str) -> Result<CommandResult> {
        self.commands
            .lock()
            .expect("lock")
            .push(command.to_string());
        if command.starts_with("curl ") {
            return Ok(next_of(&self.curl).expect("curl script must not be empty"));
        }
        Ok(self
            .responses
            .iter()
            .find(|(needle, _)| command.contains(needle))
            .map_or_else(|| ok(""), |(_, r)| r.clone()))
    }

    async fn make_dir(&self, _conn: &MockConnection, remote: &str) -> Result<()> {
        self.dirs.lock().expect("lock").push(remote.to_string());
        Ok(())
    }

    async fn put_file(&self, _conn: &MockConnection, local: &Path, remote: &str) -> Result<()> {
        assert!(local.is_file(), "{} should exist", local.display());
        let mut puts = self.puts.lock().expect("lock");
        if self.fail_put == Some(puts.len() + 1) {
            anyhow::bail!("scp: {remote}: No space left on device");
        }
        puts.push(remote.to_string());
        Ok(())
    }
}

// ── Health probe ──────────────────────────────────────────────────────────────

pub struct ScriptedProbe {
    results: Mutex<VecDeque<ProbeResult>>,
    pub calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(results: Vec<ProbeResult>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(result: ProbeResult) -> Self {
        Self::new(vec![result])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HealthProbe for ScriptedProbe {
    async fn probe(&self, _url: &str) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        next_of(&self.results).expect("probe script must not be empty")
    }
}

// ── Output sink ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub fail: bool,
    pub entries: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().expect("lock").clone()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

impl OutputSink for RecordingSink {
    fn publish(&self, key: &str, value: &str) -> Result<()> {
        if self.fail {
            anyhow::bail!("output file is read-only");
        }
        self.entries
            .lock()
            .expect("lock")
            .push((key.to_string(), value.to_string()));
        Ok(())
    }
}

// ── Progress reporter ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingReporter {
    pub steps: Mutex<Vec<String>>,
    pub warnings: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().expect("lock").clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.steps.lock().expect("lock").push(message.to_string());
    }

    fn success(&self, _message: &str) {}

    fn warn(&self, message: &str) {
        self.warnings
            .lock()
            .expect("lock")
            .push(message.to_string());
    }
}
