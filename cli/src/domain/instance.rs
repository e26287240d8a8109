//! Instance domain types.
//!
//! Free of I/O. Provider adapters translate their own state strings into
//! [`InstanceState`] before the application layer sees them.

use std::fmt;

use serde::Serialize;

/// Launch template reference. The provider accepts either form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    Id(String),
    Name(String),
}

/// A launch template plus the version to launch from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchTemplate {
    pub reference: TemplateRef,
    pub version: String,
}

impl LaunchTemplate {
    /// Render as the provider's `Key=Value,Version=N` launch-template argument.
    #[must_use]
    pub fn to_spec_arg(&self) -> String {
        match &self.reference {
            TemplateRef::Id(id) => format!("LaunchTemplateId={id},Version={}", self.version),
            TemplateRef::Name(name) => {
                format!("LaunchTemplateName={name},Version={}", self.version)
            }
        }
    }
}

impl fmt::Display for LaunchTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            TemplateRef::Id(id) => write!(f, "{id} (version {})", self.version),
            TemplateRef::Name(name) => write!(f, "{name} (version {})", self.version),
        }
    }
}

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Pending,
    Running,
    Terminated,
    Failed,
}

impl InstanceState {
    /// Map an EC2 state name onto the lifecycle model.
    ///
    /// `shutting-down` counts as terminated; `stopping`/`stopped` and unknown
    /// names are failures because the instance will never reach `running`.
    #[must_use]
    pub fn from_provider(name: &str) -> Self {
        match name {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "shutting-down" | "terminated" => Self::Terminated,
            _ => Self::Failed,
        }
    }
}

/// Provider snapshot of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDescription {
    pub state: InstanceState,
    pub public_address: Option<String>,
}

/// Result of a terminate call at the provider boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// Termination was accepted.
    Terminated,
    /// The provider does not know the instance (already gone or never existed).
    NotFound,
}

/// A provisioned compute instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub id: String,
    pub state: InstanceState,
    pub public_address: Option<String>,
}

impl Instance {
    #[must_use]
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: InstanceState::Pending,
            public_address: None,
        }
    }
}
