//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to reach a store before any write happened. Always fatal.
    #[error("Connection to {store} failed: {message}")]
    Connection { store: String, message: String },

    /// Relational store query or protocol error
    #[error("Relational store error: {0}")]
    Relational(#[from] tokio_postgres::Error),

    /// Graph store query or protocol error
    #[error("Graph store error: {0}")]
    Graph(#[from] neo4rs::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Schema introspection failed for one table; the table is skipped.
    #[error("Introspection failed for table {table}: {message}")]
    Introspection { table: String, message: String },

    /// A table shape the mapping cannot express (e.g. an association table
    /// referencing more than two tables); the table is skipped.
    #[error("Unsupported shape in table {table}: {reason}")]
    UnsupportedShape { table: String, reason: String },

    /// Two label pairs (or a pair and an entity label) synthesize the same
    /// table name; merging them would silently mix data.
    #[error("Name collision on {name}: {detail}")]
    NamingCollision { name: String, detail: String },

    /// A row batch failed to write; its transaction was rolled back.
    #[error("Write failed for {scope}: {message}")]
    Write { scope: String, message: String },

    /// IO error (config file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Connection error for a named store.
    pub fn connection(store: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Connection {
            store: store.into(),
            message: message.to_string(),
        }
    }

    /// Create a Pool error with context about where it occurred.
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create an Introspection error.
    pub fn introspection(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Introspection {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create an UnsupportedShape error.
    pub fn unsupported_shape(table: impl Into<String>, reason: impl Into<String>) -> Self {
        MigrateError::UnsupportedShape {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Create a Write error for a row batch or DDL unit.
    pub fn write(scope: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Write {
            scope: scope.into(),
            message: message.to_string(),
        }
    }

    /// Whether the overall run must stop when this error surfaces at the
    /// top level. Per-table and per-batch errors are containable; losing a
    /// store connection or a broken config is not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MigrateError::Config(_) | MigrateError::Connection { .. } | MigrateError::Pool { .. }
        )
    }

    /// Process exit code for CLI shells.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 2,
            MigrateError::Connection { .. } | MigrateError::Pool { .. } => 3,
            MigrateError::Introspection { .. } | MigrateError::UnsupportedShape { .. } => 4,
            MigrateError::Write { .. } | MigrateError::NamingCollision { .. } => 5,
            _ => 1,
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
