//! Library module for dqsurveyor-collect
//!
//! Command-line parsing and run setup live here so they can be tested; the
//! binary in main.rs only wires logging and signal handling around them.

pub mod output;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dqsurveyor_core::config::DEFAULT_PROTECTED_CONFIG_KEYS;
use dqsurveyor_core::host::{
    AlertLog, DirectorySink, SnapPackageQuery, SysrootFileReader, TokioCommandRunner,
};
use dqsurveyor_core::{
    BackendId, Collaborators, CollectionConfig, Collector, LogFormat, RunSummary,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Hostname recorded when none is given and the sysroot has none.
pub const FALLBACK_HOSTNAME: &str = "localhost";

/// CLI argument structure
#[derive(Debug, Parser)]
#[command(name = "dqsurveyor-collect")]
#[command(about = "dqlite diagnostic collection tool")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "
DQSurveyor Collector - dqlite diagnostics for snap-packaged clusters

Collects database listings, configuration files and SQL query output from
the dqlite databases embedded in:
- MicroCeph
- MicroOVN
- MicroCloud
- MicroK8s
- LXD

SECURITY FEATURES:
- Read-only: only SELECT queries and dqlite shell inspection commands
- Keyrings and private keys are never copied
- Known secrets are masked before anything is written

EXAMPLES:
  dqsurveyor-collect --output /tmp/dqlite-report
  dqsurveyor-collect --backend microceph --backend lxd
  dqsurveyor-collect --sysroot /mnt/node-image --no-cli-transport
  dqsurveyor-collect list
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub collect: CollectArgs,
}

/// Available CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Collect diagnostics from installed backends (the default)
    Collect,
    /// List the known backends and where their databases live
    List,
}

/// Options shared by every command.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,
}

/// Log output formats selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(format: LogFormatArg) -> Self {
        match format {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// Options controlling a collection run.
#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Output directory
    #[arg(
        short,
        long,
        env = "DQSURVEYOR_OUTPUT",
        default_value = "dqsurveyor-output",
        help = "Directory the report is written to"
    )]
    pub output: PathBuf,

    /// Filesystem root to inspect
    #[arg(
        long,
        env = "DQSURVEYOR_SYSROOT",
        default_value = "/",
        help = "Root of the filesystem to inspect (for mounted images)"
    )]
    pub sysroot: PathBuf,

    /// Hostname to record
    #[arg(
        long,
        env = "DQSURVEYOR_HOSTNAME",
        help = "Hostname recorded in the manifest (default: <sysroot>/etc/hostname)"
    )]
    pub hostname: Option<String>,

    /// Per-command timeout in seconds
    #[arg(
        long,
        env = "DQSURVEYOR_TIMEOUT",
        default_value_t = 300,
        help = "Timeout in seconds for each external command"
    )]
    pub timeout: u64,

    /// Restrict collection to specific backends
    #[arg(
        long = "backend",
        value_delimiter = ',',
        help = "Only collect from these backends (repeatable or comma-separated)"
    )]
    pub backends: Vec<BackendId>,

    /// Skip the SQL wrapper transport
    #[arg(long, help = "Only query through the control socket, not the SQL wrapper")]
    pub no_cli_transport: bool,

    /// Additional protected configuration keys
    #[arg(
        long = "protect-key",
        value_name = "KEY",
        help = "Additional configuration key whose value is masked (repeatable)"
    )]
    pub protect_keys: Vec<String>,
}

/// Works out the hostname to record for a run.
///
/// An explicit value wins; otherwise `<sysroot>/etc/hostname` is used, and
/// [`FALLBACK_HOSTNAME`] when that is missing or empty.
pub fn resolve_hostname(explicit: Option<&str>, sysroot: &Path) -> String {
    if let Some(hostname) = explicit.map(str::trim).filter(|h| !h.is_empty()) {
        return hostname.to_string();
    }

    std::fs::read_to_string(sysroot.join("etc").join("hostname"))
        .ok()
        .and_then(|contents| {
            contents
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| FALLBACK_HOSTNAME.to_string())
}

/// Builds and validates the run configuration from parsed arguments.
///
/// # Errors
/// Returns an error if the resulting configuration is invalid.
pub fn build_config(args: &CollectArgs) -> anyhow::Result<CollectionConfig> {
    let mut protected_keys: Vec<String> = DEFAULT_PROTECTED_CONFIG_KEYS
        .iter()
        .map(|key| (*key).to_string())
        .collect();
    for key in &args.protect_keys {
        if !protected_keys.contains(key) {
            protected_keys.push(key.clone());
        }
    }

    let config = CollectionConfig::new()
        .with_sysroot(&args.sysroot)
        .with_hostname(resolve_hostname(args.hostname.as_deref(), &args.sysroot))
        .with_command_timeout(Duration::from_secs(args.timeout))
        .with_backends(args.backends.clone())
        .with_cli_transport(!args.no_cli_transport)
        .with_protected_config_keys(protected_keys);

    config.validate().context("Invalid collection settings")?;
    Ok(config)
}

/// Runs a full collection and writes the manifest.
///
/// Returns the run summary and the manifest path.
///
/// # Errors
/// Returns an error for invalid settings or an unwritable output directory.
/// Failures of individual collection steps are only recorded in the summary.
pub async fn run_collection(
    args: &CollectArgs,
    cancel: &CancellationToken,
) -> anyhow::Result<(RunSummary, PathBuf)> {
    let config = build_config(args)?;

    tokio::fs::create_dir_all(&args.output)
        .await
        .with_context(|| format!("Failed to create output directory {}", args.output.display()))?;

    let packages = SnapPackageQuery::new(&config.sysroot);
    let runner = TokioCommandRunner::new(config.command_timeout);
    let files = SysrootFileReader::new(&config.sysroot);
    let sink = DirectorySink::new(&args.output);
    let alerts = AlertLog::new();

    let collector = Collector::new(
        config,
        Collaborators {
            packages: &packages,
            runner: &runner,
            files: &files,
            sink: &sink,
            alerts: &alerts,
        },
    )?;

    let summary = collector.run(cancel).await;
    let manifest = sink
        .write_manifest(&summary)
        .await
        .context("Failed to write run manifest")?;

    Ok((summary, manifest))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dqsurveyor-collect").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars_unset(
            [
                "DQSURVEYOR_OUTPUT",
                "DQSURVEYOR_SYSROOT",
                "DQSURVEYOR_TIMEOUT",
                "DQSURVEYOR_HOSTNAME",
            ],
            || {
                let cli = parse(&[]);
                assert!(cli.command.is_none());
                assert_eq!(cli.collect.output, PathBuf::from("dqsurveyor-output"));
                assert_eq!(cli.collect.sysroot, PathBuf::from("/"));
                assert_eq!(cli.collect.timeout, 300);
                assert!(cli.collect.backends.is_empty());
                assert!(!cli.collect.no_cli_transport);
                assert_eq!(cli.global.log_format, LogFormatArg::Text);
            },
        );
    }

    #[test]
    fn test_environment_fallbacks() {
        temp_env::with_vars(
            [
                ("DQSURVEYOR_OUTPUT", Some("/tmp/report")),
                ("DQSURVEYOR_SYSROOT", Some("/mnt/image")),
                ("DQSURVEYOR_TIMEOUT", Some("45")),
                ("DQSURVEYOR_HOSTNAME", Some("ceph-a")),
            ],
            || {
                let cli = parse(&[]);
                assert_eq!(cli.collect.output, PathBuf::from("/tmp/report"));
                assert_eq!(cli.collect.sysroot, PathBuf::from("/mnt/image"));
                assert_eq!(cli.collect.timeout, 45);
                assert_eq!(cli.collect.hostname.as_deref(), Some("ceph-a"));
            },
        );
    }

    #[test]
    fn test_arguments_override_environment() {
        temp_env::with_var("DQSURVEYOR_TIMEOUT", Some("45"), || {
            let cli = parse(&["--timeout", "10"]);
            assert_eq!(cli.collect.timeout, 10);
        });
    }

    #[test]
    fn test_backend_filter_parsing() {
        let cli = parse(&["--backend", "microceph", "--backend", "LXD,microk8s"]);
        assert_eq!(
            cli.collect.backends,
            vec![BackendId::MicroCeph, BackendId::Lxd, BackendId::MicroK8s]
        );

        let err = Cli::try_parse_from(["dqsurveyor-collect", "--backend", "postgres"]);
        assert!(err.is_err());
    }

    #[test]
    fn test_list_subcommand_with_global_flags() {
        let cli = parse(&["list", "-vv", "--log-format", "json"]);
        assert_eq!(cli.command, Some(Command::List));
        assert_eq!(cli.global.verbose, 2);
        assert_eq!(LogFormat::from(cli.global.log_format), LogFormat::Json);
    }

    #[test]
    fn test_resolve_hostname() {
        let sysroot = tempfile::tempdir().unwrap();
        assert_eq!(resolve_hostname(None, sysroot.path()), FALLBACK_HOSTNAME);

        std::fs::create_dir_all(sysroot.path().join("etc")).unwrap();
        std::fs::write(sysroot.path().join("etc/hostname"), "\nceph-b\n").unwrap();
        assert_eq!(resolve_hostname(None, sysroot.path()), "ceph-b");
        assert_eq!(resolve_hostname(Some(" node-9 "), sysroot.path()), "node-9");
        assert_eq!(resolve_hostname(Some("  "), sysroot.path()), "ceph-b");
    }

    #[test]
    fn test_build_config() {
        temp_env::with_vars_unset(["DQSURVEYOR_HOSTNAME", "DQSURVEYOR_TIMEOUT"], || {
            let cli = parse(&[
                "--hostname",
                "node-1",
                "--no-cli-transport",
                "--protect-key",
                "rgw s3 secret",
                "--protect-key",
                "rgw keystone admin password",
            ]);
            let config = build_config(&cli.collect).unwrap();
            assert_eq!(config.hostname, "node-1");
            assert!(!config.use_cli_transport);
            assert_eq!(config.command_timeout, Duration::from_secs(300));
            assert_eq!(
                config.protected_config_keys,
                vec![
                    "rgw keystone admin password".to_string(),
                    "rgw s3 secret".to_string()
                ]
            );
        });
    }

    #[test]
    fn test_build_config_rejects_zero_timeout() {
        let cli = parse(&["--hostname", "node-1", "--timeout", "0"]);
        assert!(build_config(&cli.collect).is_err());
    }

    #[test]
    fn test_build_config_rejects_relative_sysroot() {
        let cli = parse(&["--hostname", "node-1", "--sysroot", "relative"]);
        assert!(build_config(&cli.collect).is_err());
    }
}
