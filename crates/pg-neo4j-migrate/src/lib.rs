//! # pg-neo4j-migrate
//!
//! Schema-inferring migration between PostgreSQL and Neo4j.
//!
//! The engine builds a reversible mapping between the two data models
//! without a hand-authored schema mapping:
//!
//! - **Introspection** reads tables, columns, keys, indexes and
//!   constraints from the relational store and resolves native types into
//!   a canonical type system.
//! - **Classification** separates entity tables from many-to-many
//!   association tables by foreign-key/primary-key shape.
//! - **Export** turns entity rows into labeled nodes (with embedded type
//!   metadata), foreign keys into directed relationships, and association
//!   rows into relationships carrying the row's extra columns.
//! - **Import** reverses the process: labels become tables, nodes become
//!   rows, and relationship direction between label pairs decides whether
//!   a foreign key or a fresh association table is synthesized.
//! - **Constraint translation** maps what the target model can express
//!   and enumerates what it cannot.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_neo4j_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run_export().await?;
//!     println!(
//!         "Exported {} nodes and {} relationships",
//!         result.report.nodes_created, result.report.relationships_created
//!     );
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod compare;
pub mod config;
pub mod constraints;
pub mod error;
pub mod export;
pub mod graph;
pub mod import;
pub mod matrix;
pub mod orchestrator;
pub mod relational;
pub mod schema;
pub mod typemap;

// Re-exports for convenient access
pub use classify::{classify, ClassifyOverrides, TableClass};
pub use compare::{CompareEngine, CompareReport};
pub use config::{Config, GraphConfig, MigrationConfig, RelationalConfig};
pub use error::{MigrateError, Result};
pub use export::{Exporter, ExportReport};
pub use graph::GraphPool;
pub use import::{Importer, ImportReport};
pub use matrix::{RelationEdge, RelationMatrix, RelationSummary};
pub use orchestrator::{ExportResult, ImportResult, Orchestrator, RelationSummaryReport};
pub use relational::RelationalPool;
pub use schema::{Column, ForeignKey, Index, Row, SqlValue, Table};
pub use typemap::CanonicalType;
