//! MicroK8s collection driven by the dqlite cluster topology file.
//!
//! MicroK8s does not expose the microcluster SQL schema, so instead of SQL
//! queries this hook talks to dqlite through its own shell: two cluster
//! status queries, one leader query and one `.describe` per peer listed in
//! `cluster.yaml`.

use super::{ExtensionHook, HookContext};
use crate::models::{CollectionStep, CommandLine};
use crate::planner::copy_steps;
use crate::{CollectError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Bundled dqlite shell.
pub const DQLITE_SHELL: &str = "/snap/microk8s/current/bin/dqlite";

/// Kubeconfig holding client certificates; collected, then redacted.
pub const MICROK8S_CREDENTIALS: &str = "/var/snap/microk8s/current/credentials/client.config";

/// Peer entries in `cluster.yaml` look like `- Address: 10.0.0.1:19001`.
pub const PEER_ADDRESS_PATTERN: &str = r"Address:\s*(\d+\.\d+\.\d+\.\d+:\d+)";

/// The compiled address pattern, built on first use.
fn peer_address_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(PEER_ADDRESS_PATTERN))
        .as_ref()
        .map_err(|e| CollectError::pattern("peer-address", e.clone()))
}

/// Extracts peer `ip:port` addresses in file order, without duplicates.
///
/// # Errors
/// Returns a pattern error if the address pattern cannot be compiled.
pub fn parse_peer_addresses(topology: &str) -> Result<Vec<String>> {
    let pattern = peer_address_pattern()?;

    let mut peers: Vec<String> = Vec::new();
    for captures in pattern.captures_iter(topology) {
        if let Some(address) = captures.get(1) {
            let address = address.as_str();
            if !peers.iter().any(|known| known == address) {
                peers.push(address.to_string());
            }
        }
    }
    Ok(peers)
}

/// Hook that reads the topology file and queries every peer.
#[derive(Debug, Clone, Copy)]
pub struct TopologyHook {
    dqlite_shell: &'static str,
    credentials: &'static str,
    database: &'static str,
}

impl TopologyHook {
    pub const fn microk8s() -> Self {
        Self {
            dqlite_shell: DQLITE_SHELL,
            credentials: MICROK8S_CREDENTIALS,
            database: "k8s",
        }
    }

    /// The dqlite shell invocation, up to and including the database name.
    fn shell(&self, ctx: &HookContext<'_>) -> CommandLine {
        let backend = ctx.backend;
        let servers = backend.db_file("cluster.yaml");
        CommandLine::new(self.dqlite_shell)
            .arg("-c")
            .arg(backend.db_file("cluster.crt").to_string_lossy())
            .arg("-k")
            .arg(backend.db_file("cluster.key").to_string_lossy())
            .arg("-s")
            .arg(format!("file://{}", servers.display()))
            .arg(self.database)
    }

    /// Reads the topology file, alerting instead of failing when it is
    /// missing, unreadable or lists no peers.
    async fn peers(&self, ctx: &HookContext<'_>) -> Result<Vec<String>> {
        let servers = ctx.backend.db_file("cluster.yaml");

        let contents = match ctx.files.read(&servers).await {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                alert_topology(ctx, &servers, "file not found");
                return Ok(Vec::new());
            }
            Err(CollectError::Io { source, .. }) => {
                alert_topology(ctx, &servers, &source.to_string());
                return Ok(Vec::new());
            }
            Err(other) => return Err(other),
        };

        let peers = parse_peer_addresses(&contents)?;
        if peers.is_empty() {
            alert_topology(ctx, &servers, "no peer addresses found");
        }
        Ok(peers)
    }
}

fn alert_topology(ctx: &HookContext<'_>, path: &Path, reason: &str) {
    ctx.alerts
        .alert(&CollectError::topology(path, reason).to_string());
}

#[async_trait]
impl ExtensionHook for TopologyHook {
    fn name(&self) -> &'static str {
        "microk8s-topology"
    }

    async fn custom_steps(&self, ctx: &HookContext<'_>) -> Result<Vec<CollectionStep>> {
        let backend = ctx.backend;
        let mut steps = copy_steps([
            PathBuf::from(self.credentials),
            backend.db_file("failure-domain"),
        ]);

        let shell = self.shell(ctx);
        let prefix = format!("{}_dqlite_", backend.id);

        let fixed: [(&[&str], &str); 3] = [
            (&[".cluster"], ".cluster"),
            (&[".cluster", "-f", "json"], ".cluster_json"),
            (&[".leader"], ".leader"),
        ];
        for (args, label) in fixed {
            steps.push(CollectionStep::command(
                shell.clone().args(args.iter().copied()),
                format!("{prefix}{label}"),
            ));
        }

        for peer in self.peers(ctx).await? {
            steps.push(CollectionStep::command(
                shell
                    .clone()
                    .arg(format!(".describe {peer}"))
                    .args(["-f", "json"]),
                format!("{prefix}.describe_{peer}"),
            ));
        }

        Ok(steps)
    }
}
