//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, OutputFlags};
use crate::commands;

/// Provision an ephemeral EC2 instance, deploy to it, verify it, and tear it down.
///
/// All deployment settings come from environment variables
/// (`LAUNCH_TEMPLATE_ID` or `LAUNCH_TEMPLATE_NAME`, `AWS_REGION`, `EC2_SSH_KEY`,
/// `HEALTH_CHECK_URL`, ...). Without a subcommand, runs a canary session.
#[derive(Parser)]
#[command(name = "canary", version, propagate_version = true)]
pub struct Cli {
    /// Output the report in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Launch an ephemeral instance, deploy, verify, and terminate it (default)
    Canary,

    /// Deploy the container images to the existing host in `EC2_HOST`
    Release,
}

impl Cli {
    /// Build the application context for these flags.
    #[must_use]
    pub fn app(&self) -> AppContext {
        AppContext::new(OutputFlags {
            no_color: self.no_color,
            quiet: self.quiet,
            json: self.json,
        })
    }

    /// Execute the selected command. Returns the process exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the command could not be started.
    pub async fn run(&self, app: &AppContext) -> Result<i32> {
        match self.command {
            None | Some(Command::Canary) => commands::deploy::run(app).await,
            Some(Command::Release) => commands::release::run(app).await,
        }
    }
}
