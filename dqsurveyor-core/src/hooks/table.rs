//! Hooks that only contribute extra table queries.

use super::ExtensionHook;
use crate::models::PlannedQuery;

/// MicroCeph tables beyond the common microcluster schema, as (query, label).
pub const MICROCEPH_TABLES: &[(&str, &str)] = &[
    ("SELECT * FROM disks;", "disks"),
    ("SELECT * FROM client_config;", "client_config"),
    ("SELECT * FROM remote;", "remote"),
];

/// Appends a fixed list of queries to the backend's plan.
#[derive(Debug, Clone, Copy)]
pub struct TableQueryHook {
    name: &'static str,
    tables: &'static [(&'static str, &'static str)],
}

impl TableQueryHook {
    pub const fn new(name: &'static str, tables: &'static [(&'static str, &'static str)]) -> Self {
        Self { name, tables }
    }
}

impl ExtensionHook for TableQueryHook {
    fn name(&self) -> &'static str {
        self.name
    }

    fn extra_queries(&self) -> Vec<PlannedQuery> {
        self.tables
            .iter()
            .map(|(query, label)| PlannedQuery::new(*query, *label))
            .collect()
    }
}
