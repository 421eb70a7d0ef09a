//! Backend registry: the static description of every known dqlite consumer.
//!
//! Each entry records where the backend keeps its database, how to reach its
//! control socket, which SQL wrapper it ships (if any), which tables its schema
//! defines and which extension hook adds backend-specific collection.
//!
//! The registry performs no I/O. Whether a backend is actually installed is a
//! question for a [`PackageQuery`](crate::collaborators::PackageQuery).

use crate::config::CollectionConfig;
use crate::hooks::{self, ExtensionHook};
use crate::models::BackendId;
use std::path::{Path, PathBuf};

/// Schema and protocol features a backend declares.
///
/// The query planner is a pure function of these flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// `core_token_records` and `core_cluster_members` exist
    pub supports_membership_query: bool,
    /// A `config` table exists and is worth collecting
    pub has_config_table: bool,
    /// A `services` table exists
    pub has_services_table: bool,
    /// Socket payloads must name the `local` database
    pub socket_requires_database: bool,
    /// The schema diverges so far that no SQL queries are planned at all
    pub divergent_schema: bool,
}

/// Which extension hook a backend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Nothing beyond the common plan
    Noop,
    /// Extra MicroCeph tables
    MicroCephTables,
    /// MicroK8s cluster topology and dqlite shell queries
    MicroK8sTopology,
}

/// Static configuration for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub id: BackendId,
    /// Directory holding the dqlite database
    pub db_path: PathBuf,
    /// Control socket accepting SQL over HTTP
    pub socket_path: PathBuf,
    /// Endpoint the SQL payload is POSTed to
    pub socket_endpoint: String,
    /// SQL wrapper command prefix, e.g. `microceph cluster sql`
    pub sql_cmd: Option<String>,
    pub capabilities: Capabilities,
    pub hook: HookKind,
    /// Backend-specific files copied alongside the common database files
    pub extra_copies: Vec<PathBuf>,
}

impl BackendConfig {
    /// The extension hook implementation selected for this backend.
    pub fn extension_hook(&self) -> &'static dyn ExtensionHook {
        hooks::hook_for(self.hook)
    }

    /// Path of a file inside the database directory.
    pub fn db_file(&self, name: &str) -> PathBuf {
        self.db_path.join(name)
    }

    /// Directory one level above the database directory.
    pub fn state_dir(&self) -> &Path {
        self.db_path.parent().unwrap_or(&self.db_path)
    }
}

/// Host-specific values injected at startup instead of read from globals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryContext {
    pub hostname: String,
    pub sysroot: PathBuf,
}

impl RegistryContext {
    pub fn new(hostname: impl Into<String>, sysroot: impl Into<PathBuf>) -> Self {
        Self {
            hostname: hostname.into(),
            sysroot: sysroot.into(),
        }
    }
}

impl From<&CollectionConfig> for RegistryContext {
    fn from(config: &CollectionConfig) -> Self {
        Self::new(config.hostname.clone(), config.sysroot.clone())
    }
}

/// The fixed set of known backends.
#[derive(Debug, Clone)]
pub struct Registry {
    context: RegistryContext,
    backends: Vec<BackendConfig>,
}

impl Registry {
    /// Builds the registry with one entry per [`BackendId`].
    pub fn new(context: RegistryContext) -> Self {
        let backends = BackendId::ALL.into_iter().map(builtin).collect();
        Self { context, backends }
    }

    /// Looks up a backend's configuration.
    ///
    /// Every [`BackendId`] has an entry, so `None` indicates a programming error.
    pub fn resolve(&self, id: BackendId) -> Option<&BackendConfig> {
        self.backends.iter().find(|backend| backend.id == id)
    }

    /// All entries in collection order.
    pub fn iter(&self) -> std::slice::Iter<'_, BackendConfig> {
        self.backends.iter()
    }

    pub fn hostname(&self) -> &str {
        &self.context.hostname
    }

    pub fn sysroot(&self) -> &Path {
        &self.context.sysroot
    }
}

fn builtin(id: BackendId) -> BackendConfig {
    match id {
        BackendId::MicroCeph => BackendConfig {
            id,
            db_path: "/var/snap/microceph/common/state/database".into(),
            socket_path: "/var/snap/microceph/common/state/control.socket".into(),
            socket_endpoint: "microceph/core/internal/sql".to_string(),
            sql_cmd: Some("microceph cluster sql".to_string()),
            capabilities: Capabilities {
                supports_membership_query: true,
                has_config_table: true,
                has_services_table: true,
                ..Capabilities::default()
            },
            hook: HookKind::MicroCephTables,
            extra_copies: vec!["/var/snap/microceph/current/conf/ceph.conf".into()],
        },
        BackendId::MicroOvn => BackendConfig {
            id,
            db_path: "/var/snap/microovn/common/state/database".into(),
            socket_path: "/var/snap/microovn/common/state/control.socket".into(),
            socket_endpoint: "microovn/core/internal/sql".to_string(),
            sql_cmd: Some("microovn cluster sql".to_string()),
            capabilities: Capabilities {
                supports_membership_query: true,
                has_config_table: true,
                has_services_table: true,
                ..Capabilities::default()
            },
            hook: HookKind::Noop,
            extra_copies: Vec::new(),
        },
        BackendId::MicroCloud => BackendConfig {
            id,
            db_path: "/var/snap/microcloud/common/state/database".into(),
            socket_path: "/var/snap/microcloud/common/state/control.socket".into(),
            socket_endpoint: "microcloud/core/internal/sql".to_string(),
            sql_cmd: Some("microcloud sql".to_string()),
            // The config table only holds cluster join secrets.
            capabilities: Capabilities {
                supports_membership_query: true,
                ..Capabilities::default()
            },
            hook: HookKind::Noop,
            extra_copies: Vec::new(),
        },
        BackendId::MicroK8s => BackendConfig {
            id,
            db_path: "/var/snap/microk8s/current/var/kubernetes/backend".into(),
            socket_path: "/var/snap/microk8s/current/var/kubernetes/backend/kine.sock:12379"
                .into(),
            socket_endpoint: "microk8s/core/internal/sql".to_string(),
            sql_cmd: None,
            capabilities: Capabilities {
                divergent_schema: true,
                ..Capabilities::default()
            },
            hook: HookKind::MicroK8sTopology,
            extra_copies: Vec::new(),
        },
        BackendId::Lxd => BackendConfig {
            id,
            db_path: "/var/snap/lxd/common/lxd/database/global".into(),
            socket_path: "/var/snap/lxd/common/lxd/unix.socket".into(),
            socket_endpoint: "lxd/internal/sql".to_string(),
            sql_cmd: Some("lxd sql local".to_string()),
            capabilities: Capabilities {
                has_config_table: true,
                socket_requires_database: true,
                ..Capabilities::default()
            },
            hook: HookKind::Noop,
            extra_copies: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::new(RegistryContext::new("node-1", "/"))
    }

    #[test]
    fn test_every_backend_resolves() {
        let registry = registry();
        for id in BackendId::ALL {
            let backend = registry.resolve(id).unwrap();
            assert_eq!(backend.id, id);
        }
        assert_eq!(registry.iter().count(), BackendId::ALL.len());
    }

    #[test]
    fn test_only_lxd_requires_database_in_payload() {
        let registry = registry();
        for backend in registry.iter() {
            assert_eq!(
                backend.capabilities.socket_requires_database,
                backend.id == BackendId::Lxd,
                "{}",
                backend.id
            );
        }
    }

    #[test]
    fn test_microk8s_has_no_sql_wrapper() {
        let registry = registry();
        let microk8s = registry.resolve(BackendId::MicroK8s).unwrap();
        assert!(microk8s.sql_cmd.is_none());
        assert!(microk8s.capabilities.divergent_schema);
        assert_eq!(microk8s.hook, HookKind::MicroK8sTopology);
    }

    #[test]
    fn test_state_dir_is_parent_of_database() {
        let registry = registry();
        let microceph = registry.resolve(BackendId::MicroCeph).unwrap();
        assert_eq!(
            microceph.state_dir(),
            Path::new("/var/snap/microceph/common/state")
        );
        assert_eq!(
            microceph.db_file("cluster.yaml"),
            PathBuf::from("/var/snap/microceph/common/state/database/cluster.yaml")
        );
    }

    #[test]
    fn test_context_is_injected() {
        let registry = Registry::new(RegistryContext::new("ceph-a", "/srv/sysroot"));
        assert_eq!(registry.hostname(), "ceph-a");
        assert_eq!(registry.sysroot(), Path::new("/srv/sysroot"));
    }
}
