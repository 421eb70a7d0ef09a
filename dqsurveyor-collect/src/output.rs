//! Human-readable console output.
//!
//! The manifest is the machine-readable record of a run; these renderings are
//! what gets printed to stdout when the run finishes.

use dqsurveyor_core::{Registry, RunSummary};
use std::fmt::Write;
use std::path::Path;

/// One line per selected backend, then totals and alerts.
pub fn render_summary(summary: &RunSummary, manifest: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Collection run {} on {}", summary.run_id, summary.hostname);

    for outcome in &summary.backends {
        if !outcome.installed {
            let _ = writeln!(out, "  {:<11} not installed", outcome.backend);
            continue;
        }
        let _ = write!(
            out,
            "  {:<11} {} artifacts, {} failed",
            outcome.backend,
            outcome.artifacts.len(),
            outcome.failed_artifacts()
        );
        if let Some(error) = &outcome.error {
            let _ = write!(out, " (stopped: {error})");
        }
        out.push('\n');
    }

    if summary.installed_backends().next().is_none() {
        out.push_str("No dqlite backends installed\n");
    }

    for alert in &summary.alerts {
        let _ = writeln!(out, "  alert: {alert}");
    }

    if summary.cancelled {
        out.push_str("Run cancelled before completion\n");
    }
    let _ = writeln!(
        out,
        "{} artifacts ({} failed), manifest: {}",
        summary.artifact_count(),
        summary.failed_count(),
        manifest.display()
    );
    out
}

/// The registry as a table, for the `list` command.
pub fn render_backends(registry: &Registry) -> String {
    let mut out = String::new();
    for backend in registry.iter() {
        let _ = writeln!(out, "{}", backend.id);
        let _ = writeln!(out, "  database: {}", backend.db_path.display());
        let _ = writeln!(out, "  socket:   {}", backend.socket_path.display());
        let _ = writeln!(
            out,
            "  sql cmd:  {}",
            backend.sql_cmd.as_deref().unwrap_or("-")
        );
        let _ = writeln!(out, "  hook:     {}", backend.extension_hook().name());
    }
    out
}
