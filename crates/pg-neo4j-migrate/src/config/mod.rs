//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::classify::ClassifyOverrides;
use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// The classifier overrides configured for this run.
    pub fn classify_overrides(&self) -> ClassifyOverrides {
        ClassifyOverrides {
            force_entity: self.migration.force_entity.clone(),
            force_association: self.migration.force_association.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_yaml_with_defaults() {
        let yaml = r#"
relational:
  host: localhost
  database: demo
  user: postgres
  password: secret
  ssl_mode: disable
graph:
  host: localhost
  user: neo4j
  password: secret
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.relational.port, 5432);
        assert_eq!(config.relational.schema, "public");
        assert_eq!(config.graph.port, 7687);
        assert_eq!(config.graph.uri(), "bolt://localhost:7687");
        assert_eq!(config.migration.batch_size, 1000);
        assert!(config.migration.create_constraints);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(Config::from_yaml("relational: [").is_err());
    }
}
