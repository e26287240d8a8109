//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod command;
pub mod config;
pub mod error;
pub mod health;
pub mod instance;
pub mod release;
pub mod session;
pub mod transfer;

pub use command::{CommandResult, RemoteStep, shell_quote};
pub use config::{DeployConfig, PollPolicy};
pub use error::{ConfigError, DeployError};
pub use health::{HealthCheckOutcome, ProbeResult};
pub use instance::{
    Instance, InstanceDescription, InstanceState, LaunchTemplate, TemplateRef, TerminationOutcome,
};
pub use release::{ReleaseConfig, ReleaseReport, StepRecord, release_steps};
pub use session::{Phase, PhaseRecord, PhaseStatus, SessionReport};
pub use transfer::{TransferPlan, TransferReport};
