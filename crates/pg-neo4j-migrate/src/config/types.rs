//! Configuration type definitions.
//!
//! Connection parameters and migration behavior live in one explicit
//! struct that is passed into the orchestrator and threaded through to
//! every component; nothing reads process-wide state.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Relational store (PostgreSQL) connection.
    pub relational: RelationalConfig,

    /// Graph store (Neo4j) connection.
    pub graph: GraphConfig,

    /// Migration behavior.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Relational store (PostgreSQL) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationalConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Schema to migrate (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SSL mode: disable, require, verify-ca, verify-full (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,
}

/// Graph store (Neo4j) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Bolt host.
    pub host: String,

    /// Bolt port (default: 7687).
    #[serde(default = "default_bolt_port")]
    pub port: u16,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,
}

impl GraphConfig {
    /// Bolt URI for the driver.
    pub fn uri(&self) -> String {
        format!("bolt://{}:{}", self.host, self.port)
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows per write batch (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Parallel per-table workers (default: 4).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum pooled relational connections (default: 8).
    #[serde(default = "default_max_connections")]
    pub max_relational_connections: usize,

    /// Tables to include (empty = all; `*` wildcards allowed).
    #[serde(default)]
    pub include_tables: Vec<String>,

    /// Tables to exclude (`*` wildcards allowed).
    #[serde(default)]
    pub exclude_tables: Vec<String>,

    /// Tables the classifier must treat as entities regardless of shape.
    #[serde(default)]
    pub force_entity: Vec<String>,

    /// Tables the classifier must treat as associations regardless of shape.
    #[serde(default)]
    pub force_association: Vec<String>,

    /// Translate constraints to the target store (default: true).
    #[serde(default = "default_true")]
    pub create_constraints: bool,

    /// Translate unique indexes to the target store (default: true).
    #[serde(default = "default_true")]
    pub create_indexes: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            workers: default_workers(),
            max_relational_connections: default_max_connections(),
            include_tables: Vec::new(),
            exclude_tables: Vec::new(),
            force_entity: Vec::new(),
            force_association: Vec::new(),
            create_constraints: true,
            create_indexes: true,
        }
    }
}

impl MigrationConfig {
    /// Whether a table passes the include/exclude filters.
    pub fn table_included(&self, name: &str) -> bool {
        if !self.include_tables.is_empty()
            && !self.include_tables.iter().any(|p| wildcard_match(p, name))
        {
            return false;
        }
        !self.exclude_tables.iter().any(|p| wildcard_match(p, name))
    }
}

/// Minimal `*` wildcard matching for table filters.
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == name;
    }

    let mut rest = name;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(pos) => {
                // The first fragment must anchor at the start.
                if i == 0 && pos != 0 {
                    return false;
                }
                rest = &rest[pos + part.len()..];
            }
            None => return false,
        }
    }
    // The last fragment must anchor at the end.
    parts.last().map_or(true, |last| {
        last.is_empty() || name.ends_with(last) && rest.is_empty()
    })
}

// Default value functions for serde

fn default_pg_port() -> u16 {
    5432
}

fn default_bolt_port() -> u16 {
    7687
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_require() -> String {
    "require".to_string()
}

fn default_batch_size() -> usize {
    1000
}

fn default_workers() -> usize {
    4
}

fn default_max_connections() -> usize {
    8
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("person", "person"));
        assert!(!wildcard_match("person", "person2"));
        assert!(wildcard_match("tmp_*", "tmp_cache"));
        assert!(!wildcard_match("tmp_*", "person"));
        assert!(wildcard_match("*_association", "employe_service_association"));
        assert!(wildcard_match("*", "anything"));
    }

    #[test]
    fn test_table_filters() {
        let cfg = MigrationConfig {
            include_tables: vec!["person".into(), "car".into()],
            exclude_tables: vec!["car".into()],
            ..MigrationConfig::default()
        };
        assert!(cfg.table_included("person"));
        assert!(!cfg.table_included("car"));
        assert!(!cfg.table_included("service"));

        let open = MigrationConfig::default();
        assert!(open.table_included("anything"));
    }
}
