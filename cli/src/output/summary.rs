//! Human-readable session summary.

use std::fmt::Write as _;

use crate::domain::{PhaseStatus, ReleaseReport, SessionReport};
use crate::output::OutputContext;

/// Print the end-of-session summary.
pub fn render(ctx: &OutputContext, report: &SessionReport) {
    println!();
    ctx.header(if report.succeeded() {
        "Deployment succeeded"
    } else {
        "Deployment failed"
    });
    ctx.kv("Instance:", report.instance_id.as_deref().unwrap_or("(none)"));
    ctx.kv("Address:", report.public_ip.as_deref().unwrap_or("(none)"));
    if let Some(health) = &report.health {
        let status = health
            .last_status
            .map_or_else(|| "no response".to_string(), |s| s.to_string());
        ctx.kv(
            "Health:",
            &format!(
                "{status} after {} attempt(s) in {}s",
                health.attempts,
                health.elapsed.as_secs()
            ),
        );
    }
    ctx.kv("Phases:", &phase_line(report));
    ctx.kv(
        "Terminated:",
        if report.instance_terminated { "yes" } else { "no" },
    );
    for warning in &report.warnings {
        ctx.warn(warning);
    }
    if let Some(failure) = &report.failure {
        ctx.error(failure);
    }
}

/// Print the end-of-release summary.
pub fn render_release(ctx: &OutputContext, report: &ReleaseReport) {
    println!();
    ctx.header(if report.succeeded() {
        "Release succeeded"
    } else {
        "Release failed"
    });
    ctx.kv("Host:", &report.host);
    let steps = report
        .steps
        .iter()
        .map(|s| s.label)
        .collect::<Vec<_>>()
        .join(", ");
    ctx.kv("Steps:", if steps.is_empty() { "(none)" } else { &steps });
    for warning in &report.warnings {
        ctx.warn(warning);
    }
    if let Some(failure) = &report.failure {
        ctx.error(failure);
    }
}

/// `launching instance 1.2s, ... , running tests 4.0s (failed)`.
fn phase_line(report: &SessionReport) -> String {
    let mut line = String::new();
    for (i, record) in report.phases.iter().filter(|r| r.phase.is_recorded()).enumerate() {
        if i > 0 {
            line.push_str(", ");
        }
        #[allow(clippy::cast_precision_loss)]
        let secs = record.elapsed_ms as f64 / 1000.0;
        let _ = write!(line, "{} {secs:.1}s", record.phase);
        if record.status == PhaseStatus::Failed {
            line.push_str(" (failed)");
        }
    }
    if line.is_empty() {
        line.push_str("(none)");
    }
    line
}
