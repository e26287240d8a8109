//! Canary: ephemeral EC2 deployment and verification.

use canary_cli::cli::Cli;
use canary_cli::output::json;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = cli.app();
    let code = match cli.run(&app).await {
        Ok(code) => code,
        Err(e) => {
            if app.is_json()
                && let Ok(obj) = json::format_error(&format!("{e:#}"), "SETUP")
            {
                println!("{obj}");
            }
            app.output.error(&format!("Error: {e:#}"));
            1
        }
    };
    std::process::exit(code);
}
