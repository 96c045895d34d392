//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.relational.host.is_empty() {
        return Err(MigrateError::Config("relational.host is required".into()));
    }
    if config.relational.database.is_empty() {
        return Err(MigrateError::Config(
            "relational.database is required".into(),
        ));
    }
    if config.relational.user.is_empty() {
        return Err(MigrateError::Config("relational.user is required".into()));
    }
    match config.relational.ssl_mode.as_str() {
        "disable" | "require" | "verify-ca" | "verify-full" => {}
        other => {
            return Err(MigrateError::Config(format!(
                "relational.ssl_mode '{}' is invalid. Valid options: disable, require, verify-ca, verify-full",
                other
            )));
        }
    }

    if config.graph.host.is_empty() {
        return Err(MigrateError::Config("graph.host is required".into()));
    }
    if config.graph.user.is_empty() {
        return Err(MigrateError::Config("graph.user is required".into()));
    }

    if config.migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    if config.migration.workers == 0 {
        return Err(MigrateError::Config(
            "migration.workers must be at least 1".into(),
        ));
    }
    if config.migration.max_relational_connections == 0 {
        return Err(MigrateError::Config(
            "migration.max_relational_connections must be at least 1".into(),
        ));
    }

    let both: Vec<&String> = config
        .migration
        .force_entity
        .iter()
        .filter(|t| config.migration.force_association.contains(t))
        .collect();
    if let Some(table) = both.first() {
        return Err(MigrateError::Config(format!(
            "table {} appears in both force_entity and force_association",
            table
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GraphConfig, MigrationConfig, RelationalConfig};

    fn valid_config() -> Config {
        Config {
            relational: RelationalConfig {
                host: "localhost".into(),
                port: 5432,
                database: "source_db".into(),
                user: "postgres".into(),
                password: "password".into(),
                schema: "public".into(),
                ssl_mode: "disable".into(),
            },
            graph: GraphConfig {
                host: "localhost".into(),
                port: 7687,
                user: "neo4j".into(),
                password: "password".into(),
            },
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_host_rejected() {
        let mut config = valid_config();
        config.relational.host = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_ssl_mode_rejected() {
        let mut config = valid_config();
        config.relational.ssl_mode = "maybe".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = valid_config();
        config.migration.batch_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_conflicting_overrides_rejected() {
        let mut config = valid_config();
        config.migration.force_entity = vec!["t".into()];
        config.migration.force_association = vec!["t".into()];
        assert!(validate(&config).is_err());
    }
}
