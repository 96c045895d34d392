//! Relational→graph export.
//!
//! Erase-then-rebuild: the graph is wiped, then every entity table's rows
//! become nodes (in parallel across tables, bounded by the worker count),
//! and only after all nodes exist are relationships materialized from the
//! relation matrix: direct edges from foreign-key columns, mediated edges
//! from association-table rows. Constraints are translated last.
//!
//! Failures are contained per table or per edge: the failing unit is
//! logged and reported, the run continues with the next one.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::classify::TableClass;
use crate::config::MigrationConfig;
use crate::constraints::{self, UnsupportedConstraint};
use crate::error::{MigrateError, Result};
use crate::graph::values::encode_type_metadata;
use crate::graph::{GraphPool, MediatedRow};
use crate::matrix::{MatrixOutcome, SkippedTable};
use crate::relational::RelationalPool;
use crate::schema::ident::{association_rel_type, relationship_type};
use crate::schema::{SqlValue, Table};

/// Outcome of one export run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    pub tables_total: usize,
    pub entity_tables: usize,
    pub association_tables: usize,
    pub nodes_created: u64,
    pub relationships_created: u64,
    pub constraints_applied: usize,
    pub skipped: Vec<SkippedTable>,
    pub unsupported_constraints: Vec<UnsupportedConstraint>,
}

/// Relational→graph exporter.
pub struct Exporter {
    relational: Arc<RelationalPool>,
    graph: Arc<GraphPool>,
    config: MigrationConfig,
}

impl Exporter {
    pub fn new(
        relational: Arc<RelationalPool>,
        graph: Arc<GraphPool>,
        config: MigrationConfig,
    ) -> Self {
        Self {
            relational,
            graph,
            config,
        }
    }

    /// Run the export over an already-analyzed schema.
    pub async fn run(
        &self,
        tables: &[Table],
        classes: &BTreeMap<String, TableClass>,
        outcome: &MatrixOutcome,
    ) -> Result<ExportReport> {
        let mut report = ExportReport {
            tables_total: tables.len(),
            skipped: outcome.skipped.clone(),
            ..Default::default()
        };

        let entity_tables: Vec<&Table> = tables
            .iter()
            .filter(|t| classes.get(&t.name).copied() == Some(TableClass::Entity))
            .collect();
        report.entity_tables = entity_tables.len();
        report.association_tables = tables.len() - entity_tables.len();

        // The target is rebuilt from scratch; re-running against a
        // populated graph must never silently duplicate.
        info!("Phase 1: Erasing target graph");
        self.graph.erase_all().await?;

        info!(
            "Phase 2: Exporting {} entity tables as nodes",
            entity_tables.len()
        );
        let mut failed: BTreeSet<String> = BTreeSet::new();
        let mut join_set = JoinSet::new();
        let semaphore = Arc::new(Semaphore::new(self.config.workers));

        for table in &entity_tables {
            let relational = Arc::clone(&self.relational);
            let graph = Arc::clone(&self.graph);
            let table = (*table).clone();
            let batch_size = self.config.batch_size;
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            table.name.clone(),
                            Err(MigrateError::write(&table.name, "worker pool closed")),
                        )
                    }
                };
                let result = export_table_nodes(relational, graph, &table, batch_size).await;
                (table.name, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(created))) => report.nodes_created += created,
                Ok((table, Err(e))) => {
                    warn!("Node export failed for {}: {}", table, e);
                    report.skipped.push(SkippedTable {
                        table: table.clone(),
                        reason: e.to_string(),
                    });
                    failed.insert(table);
                }
                Err(e) => warn!("Export worker panicked: {}", e),
            }
        }

        info!("Phase 3: Creating relationships");
        report.relationships_created += self
            .export_direct_edges(tables, outcome, &failed, &mut report.skipped)
            .await;
        report.relationships_created += self
            .export_mediated_edges(tables, outcome, &failed, &mut report.skipped)
            .await;

        info!("Phase 4: Translating constraints");
        let mut statements = Vec::new();
        for &table in &entity_tables {
            if failed.contains(&table.name) {
                continue;
            }
            let translation = constraints::translate_table(table, self.config.create_indexes);
            statements.extend(translation.constraints);
            report.unsupported_constraints.extend(translation.unsupported);
        }
        for unsupported in &report.unsupported_constraints {
            info!(
                "Unsupported constraint on {}: {} ({})",
                unsupported.table, unsupported.kind, unsupported.detail
            );
        }
        if self.config.create_constraints {
            report.constraints_applied = self.graph.apply_constraints(&statements).await?;
        }

        info!(
            "Export complete: {} nodes, {} relationships, {} constraints",
            report.nodes_created, report.relationships_created, report.constraints_applied
        );
        Ok(report)
    }

    /// Direct edges: one relationship per non-null foreign-key value,
    /// owning node → referenced node.
    async fn export_direct_edges(
        &self,
        tables: &[Table],
        outcome: &MatrixOutcome,
        failed: &BTreeSet<String>,
        skipped: &mut Vec<SkippedTable>,
    ) -> u64 {
        let mut created = 0u64;
        for (source, target, column, ref_column) in outcome.matrix.direct_edges() {
            if failed.contains(&source) || failed.contains(&target) {
                warn!(
                    "Skipping edge {}->{}: endpoint table failed node export",
                    source, target
                );
                continue;
            }
            let Some(source_table) = tables.iter().find(|t| t.name == source) else {
                continue;
            };

            // The owning node is matched by its primary key property.
            let pk = source_table.pk_names();
            if pk.len() != 1 {
                skipped.push(SkippedTable {
                    table: source.clone(),
                    reason: "direct edges require a single-column primary key on the owning table"
                        .into(),
                });
                continue;
            }

            let multiple_to_target = source_table
                .foreign_keys
                .iter()
                .filter(|fk| !fk.is_composite() && fk.ref_table == target)
                .count()
                > 1;
            let rel_type = relationship_type(&target, &column, multiple_to_target);

            let pairs = match self
                .relational
                .read_fk_pairs(source_table, &pk[0], &column)
                .await
            {
                Ok(pairs) => pairs,
                Err(e) => {
                    warn!("Reading edge {}->{} failed: {}", source, target, e);
                    skipped.push(SkippedTable {
                        table: source.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let mut edge_failed = false;
            for chunk in pairs.chunks(self.config.batch_size) {
                match self
                    .graph
                    .create_direct_relationships(
                        &source, &pk[0], &target, &ref_column, &rel_type, chunk,
                    )
                    .await
                {
                    Ok(n) => created += n,
                    Err(e) => {
                        warn!("Relationship batch {}->{} failed: {}", source, target, e);
                        skipped.push(SkippedTable {
                            table: source.clone(),
                            reason: e.to_string(),
                        });
                        edge_failed = true;
                        break;
                    }
                }
            }
            if !edge_failed {
                info!(
                    "Created {} relationships for {} -> {} ({})",
                    pairs.len(),
                    source,
                    target,
                    rel_type
                );
            }
        }
        created
    }

    /// Mediated edges: one relationship per association-table row,
    /// processed once per association table, extra columns carried as
    /// relationship properties.
    async fn export_mediated_edges(
        &self,
        tables: &[Table],
        outcome: &MatrixOutcome,
        failed: &BTreeSet<String>,
        skipped: &mut Vec<SkippedTable>,
    ) -> u64 {
        let mut created = 0u64;
        for (assoc_name, side_a, a_col, side_b, b_col) in outcome.matrix.mediated_tables() {
            if failed.contains(&side_a) || failed.contains(&side_b) {
                warn!(
                    "Skipping association {}: endpoint table failed node export",
                    assoc_name
                );
                continue;
            }
            let Some(assoc_table) = tables.iter().find(|t| t.name == assoc_name) else {
                continue;
            };

            let a_ref = fk_ref_column(assoc_table, &a_col);
            let b_ref = fk_ref_column(assoc_table, &b_col);
            let (Some(a_ref), Some(b_ref)) = (a_ref, b_ref) else {
                skipped.push(SkippedTable {
                    table: assoc_name.clone(),
                    reason: "association foreign keys lost between classification and export"
                        .into(),
                });
                continue;
            };

            let rows = match self.relational.read_all(assoc_table).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("Reading association {} failed: {}", assoc_name, e);
                    skipped.push(SkippedTable {
                        table: assoc_name.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let rel_type = association_rel_type(&side_a, &side_b);
            let mediated: Vec<MediatedRow> = rows
                .into_iter()
                .filter_map(|row| {
                    let values = row.into_values();
                    let mut source_key = None;
                    let mut target_key = None;
                    let mut properties = Vec::new();
                    for (col, value) in assoc_table.columns.iter().zip(values) {
                        if col.name == a_col {
                            source_key = Some(value);
                        } else if col.name == b_col {
                            target_key = Some(value);
                        } else {
                            properties.push((col.name.clone(), value));
                        }
                    }
                    match (source_key, target_key) {
                        (Some(source_key), Some(target_key))
                            if !source_key.is_null() && !target_key.is_null() =>
                        {
                            Some(MediatedRow {
                                source_key,
                                target_key,
                                properties,
                            })
                        }
                        _ => None,
                    }
                })
                .collect();

            let mut edge_failed = false;
            for chunk in mediated.chunks(self.config.batch_size) {
                match self
                    .graph
                    .create_mediated_relationships(
                        &side_a, &a_ref, &side_b, &b_ref, &rel_type, chunk,
                    )
                    .await
                {
                    Ok(n) => created += n,
                    Err(e) => {
                        warn!("Association batch {} failed: {}", assoc_name, e);
                        skipped.push(SkippedTable {
                            table: assoc_name.clone(),
                            reason: e.to_string(),
                        });
                        edge_failed = true;
                        break;
                    }
                }
            }
            if !edge_failed {
                info!(
                    "Created {} relationships from association {} ({})",
                    mediated.len(),
                    assoc_name,
                    rel_type
                );
            }
        }
        created
    }
}

fn fk_ref_column(table: &Table, column: &str) -> Option<String> {
    table
        .foreign_keys
        .iter()
        .find(|fk| !fk.is_composite() && fk.column() == column)
        .map(|fk| fk.ref_column().to_string())
}

async fn export_table_nodes(
    relational: Arc<RelationalPool>,
    graph: Arc<GraphPool>,
    table: &Table,
    batch_size: usize,
) -> Result<u64> {
    let metadata = encode_type_metadata(&table.columns);
    let names: Vec<String> = table.column_names();

    let mut total = 0u64;
    let mut rx = relational.read_rows(table, batch_size);
    while let Some(batch) = rx.recv().await {
        let rows = batch?;
        let props: Vec<Vec<(String, SqlValue)>> = rows
            .into_iter()
            .map(|row| names.iter().cloned().zip(row.into_values()).collect())
            .collect();
        total += graph.create_nodes(&table.name, &metadata, &props).await?;
    }

    info!("Exported {} rows from {} as nodes", total, table.name);
    Ok(total)
}
