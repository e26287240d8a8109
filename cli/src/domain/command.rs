//! Remote command results and step definitions.

use std::fmt;

/// Outcome of one remote command. A non-zero exit is data, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// One command for the remote shell.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteStep {
    /// Short label used in progress output.
    pub label: &'static str,
    pub command: String,
    /// Non-zero exit is logged and ignored (idempotent cleanup such as
    /// stopping containers that may not exist).
    pub tolerate_failure: bool,
    /// The command embeds secrets and is never logged or put in errors.
    pub sensitive: bool,
}

impl RemoteStep {
    #[must_use]
    pub fn new(label: &'static str, command: impl Into<String>) -> Self {
        Self {
            label,
            command: command.into(),
            tolerate_failure: false,
            sensitive: false,
        }
    }

    /// Build a step that runs `command` from within `remote_dir`.
    #[must_use]
    pub fn in_dir(label: &'static str, remote_dir: &str, command: &str) -> Self {
        Self::new(label, format!("cd {} && {command}", shell_quote(remote_dir)))
    }

    #[must_use]
    pub fn tolerated(mut self) -> Self {
        self.tolerate_failure = true;
        self
    }

    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// The command as it may appear in logs and error messages.
    #[must_use]
    pub fn display_command(&self) -> &str {
        if self.sensitive {
            "(redacted)"
        } else {
            &self.command
        }
    }
}

impl fmt::Debug for RemoteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStep")
            .field("label", &self.label)
            .field("command", &self.display_command())
            .field("tolerate_failure", &self.tolerate_failure)
            .field("sensitive", &self.sensitive)
            .finish()
    }
}

/// Quote `s` for a POSIX shell using single quotes.
///
/// Paths starting with `~/` keep the tilde outside the quotes so the remote
/// shell still expands it.
#[must_use]
pub fn shell_quote(s: &str) -> String {
    if let Some(rest) = s.strip_prefix("~/") {
        return format!("~/{}", shell_quote(rest));
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}
