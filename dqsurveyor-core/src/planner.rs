//! Query planning: which queries and files to collect for a backend.
//!
//! Planning is pure. The queries come from the backend's declared
//! [`Capabilities`](crate::registry::Capabilities) plus whatever its extension
//! hook adds, never from comparing package names.

use crate::models::{CollectionStep, CommandLine, PlannedQuery, QueryPlan};
use crate::registry::BackendConfig;
use crate::security::ForbiddenPaths;

/// Lists every table in the dqlite database.
pub const SCHEMA_QUERY: &str = r#"SELECT * FROM sqlite_master WHERE type="table";"#;

/// Outstanding join tokens, without the token secrets themselves.
pub const TOKEN_RECORDS_QUERY: &str = "SELECT id, name, expiry_date FROM core_token_records;";

/// Cluster membership as seen by this member.
pub const CLUSTER_MEMBERS_QUERY: &str = "SELECT id, name, address, schema_internal, \
     schema_external, heartbeat, role, api_extensions FROM core_cluster_members;";

/// Substrings of config keys whose rows are never selected.
pub const SECRET_CONFIG_KEYWORDS: &[&str] = &["keyring", "ca_cert", "ca_key"];

/// Service placement across members.
pub const SERVICES_QUERY: &str = "SELECT * FROM services;";

/// Builds the config table query, excluding secret-bearing keys in SQL.
pub fn config_query() -> String {
    let predicates = SECRET_CONFIG_KEYWORDS
        .iter()
        .map(|keyword| format!(r#"key LIKE "%{keyword}%""#))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("SELECT * FROM config WHERE NOT ({predicates});")
}

/// Builds the ordered query plan for one backend.
///
/// A backend whose database directory is missing still gets a full plan; the
/// individual queries fail at execution time instead.
pub fn plan(backend: &BackendConfig) -> QueryPlan {
    let caps = backend.capabilities;
    let mut plan = QueryPlan::default();

    if caps.divergent_schema {
        tracing::debug!(backend = %backend.id, "Schema diverges, no SQL queries planned");
        return plan;
    }

    plan.push(PlannedQuery::new(SCHEMA_QUERY, "schema"));

    if caps.supports_membership_query {
        plan.push(PlannedQuery::new(TOKEN_RECORDS_QUERY, "token_records"));
        plan.push(PlannedQuery::new(CLUSTER_MEMBERS_QUERY, "core_cluster_members"));
    }

    if caps.has_config_table {
        plan.push(PlannedQuery::new(config_query(), "config"));
    }

    if caps.has_services_table {
        plan.push(PlannedQuery::new(SERVICES_QUERY, "services"));
    }

    for query in backend.extension_hook().extra_queries() {
        plan.push(query);
    }

    plan
}

/// Steps common to every installed backend: a listing of the database
/// directory and copies of its descriptive files.
///
/// Forbidden paths are filtered out here, before any copy is attempted.
pub fn base_collection(backend: &BackendConfig) -> Vec<CollectionStep> {
    let mut steps = vec![CollectionStep::command(
        CommandLine::new("ls")
            .arg("-al")
            .arg(backend.db_path.to_string_lossy()),
        format!("ls_{}_dqlite_dir", backend.id),
    )];

    // MicroK8s has no daemon.yaml; the copy is a no-op there.
    let copies = [
        backend.db_file("info.yaml"),
        backend.db_file("cluster.yaml"),
        backend.state_dir().join("daemon.yaml"),
    ]
    .into_iter()
    .chain(backend.extra_copies.iter().cloned());

    steps.extend(copy_steps(copies));
    steps
}

/// Turns paths into copy steps, dropping forbidden ones.
pub fn copy_steps<I>(paths: I) -> Vec<CollectionStep>
where
    I: IntoIterator<Item = std::path::PathBuf>,
{
    let forbidden = ForbiddenPaths::instance();
    paths
        .into_iter()
        .filter(|path| {
            let allowed = !forbidden.is_forbidden(path);
            if !allowed {
                tracing::debug!(path = %path.display(), "Skipping forbidden path");
            }
            allowed
        })
        .map(CollectionStep::copy)
        .collect()
}
