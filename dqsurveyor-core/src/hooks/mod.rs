//! Per-backend extension hooks.
//!
//! A hook adds what the common query plan cannot express: extra tables for
//! one backend, or an entirely custom sequence of commands and copies. Each
//! backend's registry entry names its hook through a
//! [`HookKind`](crate::registry::HookKind); the implementations are
//! stateless statics.
//!
//! # Module Structure
//! - `table`: hooks that only append extra SQL queries
//! - `topology`: the MicroK8s hook driven by the cluster topology file

use crate::collaborators::{Alerter, FileReader};
use crate::models::{CollectionStep, PlannedQuery};
use crate::registry::{BackendConfig, HookKind};
use crate::Result;
use async_trait::async_trait;

mod table;
mod topology;

pub use table::{MICROCEPH_TABLES, TableQueryHook};
pub use topology::{
    DQLITE_SHELL, MICROK8S_CREDENTIALS, PEER_ADDRESS_PATTERN, TopologyHook,
    parse_peer_addresses,
};

/// What a hook may look at while building its custom steps.
pub struct HookContext<'a> {
    pub backend: &'a BackendConfig,
    pub files: &'a dyn FileReader,
    pub alerts: &'a dyn Alerter,
}

/// Backend-specific collection beyond the common plan.
#[async_trait]
pub trait ExtensionHook: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Queries appended to the end of the backend's query plan.
    fn extra_queries(&self) -> Vec<PlannedQuery> {
        Vec::new()
    }

    /// Commands and copies outside the query plan's shape.
    ///
    /// Recoverable input problems are reported through `ctx.alerts` and
    /// yield fewer steps; only unexpected failures are returned as errors.
    async fn custom_steps(&self, _ctx: &HookContext<'_>) -> Result<Vec<CollectionStep>> {
        Ok(Vec::new())
    }
}

/// Hook for backends with nothing unique to collect.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl ExtensionHook for NoopHook {
    fn name(&self) -> &'static str {
        "noop"
    }
}

static NOOP: NoopHook = NoopHook;
static MICROCEPH: TableQueryHook = TableQueryHook::new("microceph-tables", MICROCEPH_TABLES);
static MICROK8S: TopologyHook = TopologyHook::microk8s();

/// Resolves a registry hook kind to its implementation.
pub fn hook_for(kind: HookKind) -> &'static dyn ExtensionHook {
    match kind {
        HookKind::Noop => &NOOP,
        HookKind::MicroCephTables => &MICROCEPH,
        HookKind::MicroK8sTopology => &MICROK8S,
    }
}
