//! Migration orchestrator - main workflow coordinator.
//!
//! A thin driver over the core components: it owns the two store pools,
//! runs introspection → classification → matrix analysis, and hands the
//! result to the exporter or importer. Export and import are independent;
//! each invocation performs one full-snapshot migration.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::classify::{classify, TableClass};
use crate::compare::{CompareEngine, CompareReport};
use crate::config::{Config, RelationalConfig};
use crate::error::Result;
use crate::export::{Exporter, ExportReport};
use crate::graph::GraphPool;
use crate::import::{Importer, ImportReport};
use crate::matrix::{self, MatrixOutcome, RelationSummary, SkippedTable};
use crate::relational::RelationalPool;
use crate::schema::Table;

/// Analyzed source schema: the input both the exporter and the relation
/// summary are computed from.
#[derive(Debug, Clone)]
pub struct SchemaAnalysis {
    pub tables: Vec<Table>,
    pub classes: BTreeMap<String, TableClass>,
    pub outcome: MatrixOutcome,
    /// Tables dropped during introspection (before classification).
    pub introspection_skipped: Vec<SkippedTable>,
}

/// Relation summary handed to console/GUI shells.
#[derive(Debug, Clone, Serialize)]
pub struct RelationSummaryReport {
    pub classes: BTreeMap<String, TableClass>,
    pub relations: Vec<RelationSummary>,
    pub skipped: Vec<SkippedTable>,
}

/// Result of one export run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    #[serde(flatten)]
    pub report: ExportReport,
}

/// Result of one import run.
#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    #[serde(flatten)]
    pub report: ImportReport,
}

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    relational: Arc<RelationalPool>,
    graph: Arc<GraphPool>,
}

impl Orchestrator {
    /// Connect both stores. Connection failures are fatal and happen
    /// before any write.
    pub async fn new(config: Config) -> Result<Self> {
        let relational = RelationalPool::connect(
            &config.relational,
            config.migration.max_relational_connections,
        )
        .await?;
        let graph = GraphPool::connect(&config.graph).await?;

        Ok(Self {
            config,
            relational: Arc::new(relational),
            graph: Arc::new(graph),
        })
    }

    /// Verify both stores answer.
    pub async fn health_check(&self) -> Result<()> {
        self.relational.ping().await?;
        self.graph.ping().await?;
        info!("Both stores are reachable");
        Ok(())
    }

    /// Introspect, classify and build the relation matrix for the source
    /// schema. Tables failing introspection are skipped and reported.
    pub async fn analyze(&self) -> Result<SchemaAnalysis> {
        let names = self.relational.list_tables().await?;
        let overrides = self.config.classify_overrides();

        let mut tables = Vec::new();
        let mut introspection_skipped = Vec::new();
        for name in names {
            if !self.config.migration.table_included(&name) {
                info!("Table {} excluded by configuration", name);
                continue;
            }
            match self.relational.introspect_table(&name).await {
                Ok(table) => tables.push(table),
                Err(e) => {
                    warn!("Skipping table {}: {}", name, e);
                    introspection_skipped.push(SkippedTable {
                        table: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let classes: BTreeMap<String, TableClass> = tables
            .iter()
            .map(|t| (t.name.clone(), classify(t, &overrides)))
            .collect();
        for (table, class) in &classes {
            info!("Classified {} as {:?}", table, class);
        }

        let outcome = matrix::build(&tables, &classes);

        Ok(SchemaAnalysis {
            tables,
            classes,
            outcome,
            introspection_skipped,
        })
    }

    /// The relation matrix and per-table summaries, for display shells.
    pub async fn relation_summary(&self) -> Result<RelationSummaryReport> {
        let analysis = self.analyze().await?;
        let mut skipped = analysis.introspection_skipped;
        skipped.extend(analysis.outcome.skipped);
        Ok(RelationSummaryReport {
            classes: analysis.classes,
            relations: analysis.outcome.matrix.summaries(),
            skipped,
        })
    }

    /// Run the relational→graph export.
    pub async fn run_export(&self) -> Result<ExportResult> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!("Starting export run {}", run_id);

        let analysis = self.analyze().await?;
        let exporter = Exporter::new(
            Arc::clone(&self.relational),
            Arc::clone(&self.graph),
            self.config.migration.clone(),
        );
        let mut report = match exporter
            .run(&analysis.tables, &analysis.classes, &analysis.outcome)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                warn!("Export aborted mid-run; the target graph may require manual cleanup");
                return Err(e);
            }
        };
        let mut skipped = analysis.introspection_skipped;
        skipped.append(&mut report.skipped);
        report.skipped = skipped;

        let completed_at = Utc::now();
        Ok(ExportResult {
            run_id,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            report,
        })
    }

    /// Run the graph→relational import.
    pub async fn run_import(&self) -> Result<ImportResult> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!("Starting import run {}", run_id);

        let importer = Importer::new(
            Arc::clone(&self.relational),
            Arc::clone(&self.graph),
            self.config.migration.clone(),
        );
        let report = match importer.run().await {
            Ok(report) => report,
            Err(e) => {
                warn!("Import aborted mid-run; the target schema may require manual cleanup");
                return Err(e);
            }
        };

        let completed_at = Utc::now();
        Ok(ImportResult {
            run_id,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            report,
        })
    }

    /// Diff this orchestrator's relational store (baseline) against
    /// another relational store (candidate).
    pub async fn compare_with(&self, candidate: &RelationalConfig) -> Result<CompareReport> {
        let candidate_pool = RelationalPool::connect(
            candidate,
            self.config.migration.max_relational_connections,
        )
        .await?;
        let engine = CompareEngine::new(Arc::clone(&self.relational), Arc::new(candidate_pool));
        engine.run().await
    }
}
