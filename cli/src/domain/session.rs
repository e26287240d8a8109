//! Deployment session state machine and report types.
//!
//! Pure data: the orchestrator drives the transitions, this module only
//! decides which ones are legal.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::health::HealthCheckOutcome;

/// One state of a deployment session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Created,
    Launching,
    AwaitingRunning,
    AwaitingReachable,
    SyncingArtifacts,
    StartingServices,
    HealthChecking,
    RunningTests,
    Succeeded,
    Failed,
    Terminating,
    Terminated,
}

impl Phase {
    /// The phase that follows `self` when its operation succeeds.
    #[must_use]
    pub fn next_on_success(self) -> Option<Self> {
        Some(match self {
            Self::Created => Self::Launching,
            Self::Launching => Self::AwaitingRunning,
            Self::AwaitingRunning => Self::AwaitingReachable,
            Self::AwaitingReachable => Self::SyncingArtifacts,
            Self::SyncingArtifacts => Self::StartingServices,
            Self::StartingServices => Self::HealthChecking,
            Self::HealthChecking => Self::RunningTests,
            Self::RunningTests => Self::Succeeded,
            Self::Succeeded | Self::Failed => Self::Terminating,
            Self::Terminating => Self::Terminated,
            Self::Terminated => return None,
        })
    }

    /// Phases that run a component operation.
    #[must_use]
    pub fn is_working(self) -> bool {
        !matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Terminating | Self::Terminated
        )
    }

    /// Phases that appear in [`SessionReport::phases`]: the working phases
    /// after `Created`. Preparation and teardown are not timed.
    #[must_use]
    pub fn is_recorded(self) -> bool {
        self.is_working() && self != Self::Created
    }

    /// Whether the session may move from `self` to `to`.
    ///
    /// Working phases move forward one step or drop to `Failed`. Outcomes
    /// (`Succeeded`/`Failed`) only move to `Terminating`.
    #[must_use]
    pub fn can_advance_to(self, to: Self) -> bool {
        if to == Self::Failed {
            return self.is_working();
        }
        self.next_on_success() == Some(to)
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "preparing session",
            Self::Launching => "launching instance",
            Self::AwaitingRunning => "waiting for instance to run",
            Self::AwaitingReachable => "waiting for SSH",
            Self::SyncingArtifacts => "syncing artifacts",
            Self::StartingServices => "starting services",
            Self::HealthChecking => "health checking",
            Self::RunningTests => "running tests",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Terminating => "terminating instance",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Ok,
    Failed,
}

/// Timing and outcome of one completed phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub status: PhaseStatus,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Final, serializable summary of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub outcome: Phase,
    pub instance_id: Option<String>,
    pub public_ip: Option<String>,
    pub phases: Vec<PhaseRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthCheckOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub warnings: Vec<String>,
    pub instance_terminated: bool,
}

impl SessionReport {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome == Phase::Succeeded
    }

    /// Process exit code: 0 on full success, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.succeeded())
    }
}
