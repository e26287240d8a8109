//! Implementations of the `OutputSink` port.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::OutputSink;

/// Appends `key=value` lines to a file, the format GitHub Actions reads
/// from `$GITHUB_OUTPUT`.
#[derive(Debug, Clone)]
pub struct FileOutputSink {
    path: PathBuf,
}

impl FileOutputSink {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl OutputSink for FileOutputSink {
    fn publish(&self, key: &str, value: &str) -> Result<()> {
        anyhow::ensure!(
            !key.contains(['=', '\n']) && !value.contains('\n'),
            "output {key} cannot be written as a single key=value line"
        );
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        writeln!(file, "{key}={value}").with_context(|| format!("write {}", self.path.display()))
    }
}

/// Fallback when no output file is configured: the value only reaches the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl OutputSink for LogSink {
    fn publish(&self, key: &str, value: &str) -> Result<()> {
        tracing::info!(key, value, "no output file configured");
        Ok(())
    }
}

/// Either sink, chosen from configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredSink {
    File(FileOutputSink),
    Log(LogSink),
}

impl ConfiguredSink {
    #[must_use]
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map_or(Self::Log(LogSink), |p| Self::File(FileOutputSink::new(p)))
    }
}

impl OutputSink for ConfiguredSink {
    fn publish(&self, key: &str, value: &str) -> Result<()> {
        match self {
            Self::File(sink) => sink.publish(key, value),
            Self::Log(sink) => sink.publish(key, value),
        }
    }
}
