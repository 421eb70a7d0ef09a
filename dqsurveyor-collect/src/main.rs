//! dqlite diagnostic collection tool.
//!
//! This binary finds the snap-packaged dqlite consumers installed on a host
//! (or a mounted image of one), collects their database listings,
//! configuration and SQL query output, and writes a redacted report plus a
//! JSON manifest.
//!
//! # Security Guarantees
//! - Read-only queries and inspection commands only
//! - Keyrings and private keys are never copied
//! - Known secrets are masked before anything is written
//! - Collected output is never logged

use clap::Parser;
use dqsurveyor_collect::output::{render_backends, render_summary};
use dqsurveyor_collect::{Cli, CollectArgs, Command, resolve_hostname, run_collection};
use dqsurveyor_core::{Registry, RegistryContext, init_logging};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(
        cli.global.verbose,
        cli.global.quiet,
        cli.global.log_format.into(),
    )?;

    match cli.command.unwrap_or(Command::Collect) {
        Command::Collect => collect(&cli.collect).await,
        Command::List => {
            let hostname = resolve_hostname(cli.collect.hostname.as_deref(), &cli.collect.sysroot);
            let registry = Registry::new(RegistryContext::new(hostname, &cli.collect.sysroot));
            print!("{}", render_backends(&registry));
            Ok(())
        }
    }
}

/// Runs a collection, stopping between steps on Ctrl-C.
async fn collect(args: &CollectArgs) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current command");
            on_interrupt.cancel();
        }
    });

    info!("Output: {}", args.output.display());
    let (summary, manifest) = run_collection(args, &cancel).await?;

    info!(
        artifacts = summary.artifact_count(),
        failed = summary.failed_count(),
        "✓ Collection completed"
    );
    print!("{}", render_summary(&summary, &manifest));

    if summary.cancelled {
        anyhow::bail!("Collection cancelled");
    }
    Ok(())
}
