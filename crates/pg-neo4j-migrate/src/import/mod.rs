//! Graph→relational import.
//!
//! Labels become tables (typed from the embedded `_types` metadata, or a
//! conservative all-text fallback), nodes become rows, and relationship
//! direction between each label pair decides cardinality: a type observed
//! in one direction reconstructs a foreign key on the source table, a type
//! observed in both directions (or carrying the symmetric association
//! naming) reconstructs a two-column association table.
//!
//! The importer owns its target schema: every prior table is dropped
//! before the rebuild, all tables are created before any row is inserted,
//! and every insert or relationship batch runs in its own transaction so a
//! failing unit rolls back alone and the run continues.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::MigrationConfig;
use crate::error::{MigrateError, Result};
use crate::graph::values::parse_type_metadata;
use crate::graph::GraphPool;
use crate::matrix::SkippedTable;
use crate::relational::{ddl, RelationalPool};
use crate::schema::ident::{association_rel_type, association_table_name, fk_column_name};
use crate::schema::{Column, SqlValue, Table};
use crate::typemap::CanonicalType;

/// Outcome of one import run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub labels_total: usize,
    pub tables_created: usize,
    pub rows_inserted: u64,
    pub foreign_keys_created: usize,
    pub association_tables_created: usize,
    pub association_rows_inserted: u64,
    pub dropped_tables: Vec<String>,
    pub skipped: Vec<SkippedTable>,
}

/// Graph→relational importer.
pub struct Importer {
    relational: Arc<RelationalPool>,
    graph: Arc<GraphPool>,
    config: MigrationConfig,
}

/// One label after its table exists and its rows are loaded.
struct LoadedLabel {
    table: Table,
    /// Store-assigned node id → primary-key value.
    pk_map: HashMap<i64, SqlValue>,
    /// Primary-key value (keyed) → full row, for foreign-key inference.
    rows_by_pk: HashMap<String, Vec<SqlValue>>,
}

impl Importer {
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

    /// Run the import.
    pub async fn run(&self) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        info!("Phase 1: Enumerating labels");
        let labels: Vec<String> = self
            .graph
            .list_labels()
            .await?
            .into_iter()
            .filter(|l| self.config.table_included(l))
            .collect();
        report.labels_total = labels.len();
        info!("Found {} labels to import", labels.len());

        info!("Phase 2: Synthesizing table definitions");
        let mut definitions: Vec<(Table, bool, bool)> = Vec::new();
        for label in &labels {
            match self.synthesize(label).await {
                Ok(definition) => definitions.push(definition),
                Err(e) => {
                    warn!("Skipping label {}: {}", label, e);
                    report.skipped.push(SkippedTable {
                        table: label.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!("Phase 3: Recreating target schema (clean slate)");
        report.dropped_tables = self.relational.drop_all_tables().await?;

        // Every table exists before any row is inserted, so later
        // foreign-key materialization can reference any of them.
        let mut created: Vec<(Table, bool, bool)> = Vec::new();
        for (table, typed, synthetic_id) in definitions {
            let sql = ddl::create_table_sql(self.relational.schema(), &table);
            match self.relational.execute_ddl(&table.name, &[sql]).await {
                Ok(()) => {
                    info!("Created table {}", table.name);
                    created.push((table, typed, synthetic_id));
                }
                Err(e) => {
                    warn!("Creating table {} failed: {}", table.name, e);
                    report.skipped.push(SkippedTable {
                        table: table.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        report.tables_created = created.len();

        info!("Phase 4: Loading nodes into {} tables", created.len());
        let mut loaded: BTreeMap<String, LoadedLabel> = BTreeMap::new();
        let mut join_set = JoinSet::new();
        let semaphore = Arc::new(Semaphore::new(self.config.workers));

        for (table, typed, synthetic_id) in created {
            let relational = Arc::clone(&self.relational);
            let graph = Arc::clone(&self.graph);
            let batch_size = self.config.batch_size;
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let name = table.name.clone();
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            name.clone(),
                            Err(MigrateError::write(&name, "worker pool closed")),
                        )
                    }
                };
                let result =
                    load_label(relational, graph, table, typed, synthetic_id, batch_size).await;
                (name, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((label, Ok((inserted, loaded_label)))) => {
                    report.rows_inserted += inserted;
                    loaded.insert(label, loaded_label);
                }
                Ok((label, Err(e))) => {
                    warn!("Loading label {} failed: {}", label, e);
                    report.skipped.push(SkippedTable {
                        table: label,
                        reason: e.to_string(),
                    });
                }
                Err(e) => warn!("Import worker panicked: {}", e),
            }
        }

        info!("Phase 5: Reconstructing relationships");
        self.reconstruct_relationships(&mut loaded, &mut report)
            .await;

        info!(
            "Import complete: {} tables, {} rows, {} foreign keys, {} association tables",
            report.tables_created,
            report.rows_inserted,
            report.foreign_keys_created,
            report.association_tables_created
        );
        Ok(report)
    }

    /// Sample one node of the label and synthesize the table definition.
    async fn synthesize(&self, label: &str) -> Result<(Table, bool, bool)> {
        match self.graph.sample_metadata(label).await? {
            Some(raw) => Ok(synthesize_table(label, Some(&raw), &[])),
            None => {
                let keys = self.graph.sample_keys(label).await?;
                debug!(
                    "Label {} carries no type metadata; falling back to text columns",
                    label
                );
                Ok(synthesize_table(label, None, &keys))
            }
        }
    }

    /// Probe relationship direction for every unordered label pair and
    /// materialize foreign keys or association tables.
    async fn reconstruct_relationships(
        &self,
        loaded: &mut BTreeMap<String, LoadedLabel>,
        report: &mut ImportReport,
    ) {
        let labels: Vec<String> = loaded.keys().cloned().collect();
        let mut assoc_names: HashMap<String, (String, String)> = HashMap::new();

        for i in 0..labels.len() {
            for j in (i + 1)..labels.len() {
                let (a, b) = (&labels[i], &labels[j]);
                if let Err(e) = self
                    .reconstruct_pair(a, b, loaded, &mut assoc_names, report)
                    .await
                {
                    warn!("Relationship reconstruction {}<->{} failed: {}", a, b, e);
                    report.skipped.push(SkippedTable {
                        table: format!("{}<->{}", a, b),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    async fn reconstruct_pair(
        &self,
        a: &str,
        b: &str,
        loaded: &BTreeMap<String, LoadedLabel>,
        assoc_names: &mut HashMap<String, (String, String)>,
        report: &mut ImportReport,
    ) -> Result<()> {
        let types_ab = self.graph.relationship_types(a, b).await?;
        let types_ba = self.graph.relationship_types(b, a).await?;
        if types_ab.is_empty() && types_ba.is_empty() {
            return Ok(());
        }

        let symmetric = association_rel_type(a, b);
        let mut m2m_instances: Vec<(SqlValue, SqlValue, Vec<(String, serde_json::Value)>)> =
            Vec::new();
        let mut has_m2m = false;

        // A type is many-to-many when it appears in both directions or
        // carries the symmetric association naming; anything else is a
        // one-to-many foreign key on its source side.
        for (source, target, types, other_direction) in
            [(a, b, &types_ab, &types_ba), (b, a, &types_ba, &types_ab)]
        {
            for rel_type in types {
                let is_m2m = rel_type == &symmetric || other_direction.contains(rel_type);
                if is_m2m {
                    has_m2m = true;
                    // Collect instances normalized so the sorted-first
                    // label is always the left side.
                    let instances = self
                        .graph
                        .fetch_relationships(source, target, rel_type)
                        .await?;
                    let (first, _) = sorted_pair(a, b);
                    for (src_nid, dst_nid, props) in instances {
                        let Some(src_pk) = loaded[source].pk_map.get(&src_nid) else {
                            continue;
                        };
                        let Some(dst_pk) = loaded[target].pk_map.get(&dst_nid) else {
                            continue;
                        };
                        if source == first {
                            m2m_instances.push((src_pk.clone(), dst_pk.clone(), props));
                        } else {
                            m2m_instances.push((dst_pk.clone(), src_pk.clone(), props));
                        }
                    }
                } else {
                    self.materialize_foreign_key(source, target, rel_type, loaded, report)
                        .await?;
                }
            }
        }

        if has_m2m {
            self.materialize_association(a, b, m2m_instances, loaded, assoc_names, report)
                .await?;
        }
        Ok(())
    }

    /// One-to-many: relationships observed source→target only. Reuse the
    /// existing column whose values match the target key across every
    /// observed relationship; otherwise add and populate `<target>_id`.
    async fn materialize_foreign_key(
        &self,
        source: &str,
        target: &str,
        rel_type: &str,
        loaded: &BTreeMap<String, LoadedLabel>,
        report: &mut ImportReport,
    ) -> Result<()> {
        let instances = self.graph.fetch_relationships(source, target, rel_type).await?;
        let source_loaded = &loaded[source];
        let target_loaded = &loaded[target];

        let pairs: Vec<(SqlValue, SqlValue)> = instances
            .iter()
            .filter_map(|(src_nid, dst_nid, _)| {
                let src_pk = source_loaded.pk_map.get(src_nid)?;
                let dst_pk = target_loaded.pk_map.get(dst_nid)?;
                Some((src_pk.clone(), dst_pk.clone()))
            })
            .collect();
        if pairs.is_empty() {
            return Ok(());
        }

        info!(
            "Reconstructing one-to-many {} -> {} from {} ({} instances)",
            source,
            target,
            rel_type,
            pairs.len()
        );

        let schema = self.relational.schema();
        let source_pk = source_loaded.table.pk_names()[0].clone();
        let target_pk = target_loaded.table.pk_names()[0].clone();
        let target_pk_type = target_loaded
            .table
            .column(&target_pk)
            .map(|c| c.ty.clone())
            .unwrap_or(CanonicalType::Int64);

        let fk_column = match matching_fk_column(&source_loaded.table, &source_loaded.rows_by_pk, &pairs, target)
        {
            Some(existing) => {
                debug!(
                    "Foreign key {} -> {} maps onto existing column {}",
                    source, target, existing
                );
                existing
            }
            None => {
                let name = fk_column_name(target);
                if source_loaded.table.column(&name).is_some() {
                    report.skipped.push(SkippedTable {
                        table: source.to_string(),
                        reason: format!(
                            "cannot infer foreign-key column for {}: {} exists but does not match",
                            rel_type, name
                        ),
                    });
                    return Ok(());
                }
                self.relational
                    .execute_ddl(
                        source,
                        &[ddl::add_column_sql(schema, source, &name, &target_pk_type)],
                    )
                    .await?;
                self.relational
                    .update_fk_batch(source, &name, &source_pk, &pairs)
                    .await?;
                name
            }
        };

        let constraint = format!("{}_{}_fkey", source, fk_column);
        self.relational
            .execute_ddl(
                source,
                &[ddl::add_foreign_key_sql(
                    schema, source, &constraint, &fk_column, target, &target_pk,
                )],
            )
            .await?;
        report.foreign_keys_created += 1;
        Ok(())
    }

    /// Many-to-many: synthesize the two-column association table and one
    /// row per relationship instance.
    async fn materialize_association(
        &self,
        a: &str,
        b: &str,
        instances: Vec<(SqlValue, SqlValue, Vec<(String, serde_json::Value)>)>,
        loaded: &BTreeMap<String, LoadedLabel>,
        assoc_names: &mut HashMap<String, (String, String)>,
        report: &mut ImportReport,
    ) -> Result<()> {
        let (first, second) = sorted_pair(a, b);
        let name = association_table_name(a, b);

        // Deterministic naming can collide; merging distinct pairs or an
        // entity table under one name would silently mix data.
        if loaded.contains_key(name.as_str()) {
            return Err(MigrateError::NamingCollision {
                name,
                detail: "an entity label already uses this table name".into(),
            });
        }
        if let Some(existing_pair) = assoc_names.get(&name) {
            if existing_pair != &(first.to_string(), second.to_string()) {
                return Err(MigrateError::NamingCollision {
                    name,
                    detail: format!(
                        "label pairs ({}, {}) and ({}, {}) synthesize the same table",
                        existing_pair.0, existing_pair.1, first, second
                    ),
                });
            }
            return Ok(());
        }
        assoc_names.insert(name.clone(), (first.to_string(), second.to_string()));

        info!(
            "Reconstructing many-to-many {} <-> {} as {} ({} rows)",
            a,
            b,
            name,
            instances.len()
        );

        let schema = self.relational.schema();
        let first_loaded = &loaded[first];
        let second_loaded = &loaded[second];
        let first_pk = first_loaded.table.pk_names()[0].clone();
        let second_pk = second_loaded.table.pk_names()[0].clone();
        let first_col = fk_column_name(first);
        let second_col = fk_column_name(second);
        let first_ty = first_loaded
            .table
            .column(&first_pk)
            .map(|c| c.ty.clone())
            .unwrap_or(CanonicalType::Int64);
        let second_ty = second_loaded
            .table
            .column(&second_pk)
            .map(|c| c.ty.clone())
            .unwrap_or(CanonicalType::Int64);

        let create = ddl::create_association_table_sql(
            schema, &name, &first_col, &first_ty, first, &first_pk, &second_col, &second_ty,
            second, &second_pk,
        );
        self.relational.execute_ddl(&name, &[create]).await?;
        report.association_tables_created += 1;

        // Relationship properties become extra columns on first use.
        let mut extra: Vec<(String, CanonicalType)> = Vec::new();
        let mut typed_instances: Vec<(SqlValue, SqlValue, HashMap<String, SqlValue>)> = Vec::new();
        for (first_pk_value, second_pk_value, props) in instances {
            let mut row_props = HashMap::new();
            for (prop, json) in props {
                if prop == first_col || prop == second_col {
                    continue;
                }
                let Some((ty, value)) = crate::graph::values::relationship_property(&json) else {
                    continue;
                };
                if !extra.iter().any(|(existing, _)| existing == &prop) {
                    self.relational
                        .execute_ddl(
                            &name,
                            &[ddl::add_column_sql(schema, &name, &prop, &ty)],
                        )
                        .await?;
                    extra.push((prop.clone(), ty));
                }
                row_props.insert(prop, value);
            }
            typed_instances.push((first_pk_value, second_pk_value, row_props));
        }

        let mut cols = vec![first_col.clone(), second_col.clone()];
        cols.extend(extra.iter().map(|(name, _)| name.clone()));

        let rows: Vec<Vec<SqlValue>> = typed_instances
            .into_iter()
            .map(|(first_value, second_value, mut props)| {
                let mut row = vec![first_value, second_value];
                for (prop, ty) in &extra {
                    row.push(
                        props
                            .remove(prop)
                            .unwrap_or_else(|| SqlValue::null_for(ty)),
                    );
                }
                row
            })
            .collect();

        for chunk in rows.chunks(self.config.batch_size) {
            report.association_rows_inserted +=
                self.relational.insert_batch(&name, &cols, chunk).await?;
        }
        Ok(())
    }
}

/// Load one label's nodes, insert them as rows, and retain the key
/// mappings needed for relationship reconstruction.
async fn load_label(
    relational: Arc<RelationalPool>,
    graph: Arc<GraphPool>,
    table: Table,
    typed: bool,
    synthetic_id: bool,
    batch_size: usize,
) -> Result<(u64, LoadedLabel)> {
    // The synthesized id column is filled from the store-assigned node id,
    // so it is not read from node properties.
    let property_columns: Vec<Column> = if synthetic_id {
        table.columns[1..].to_vec()
    } else {
        table.columns.clone()
    };

    let nodes = graph.fetch_nodes(&table.name, &property_columns, typed).await?;

    let pk_idx = table
        .columns
        .iter()
        .position(|c| c.is_pk())
        .ok_or_else(|| MigrateError::write(&table.name, "synthesized table has no primary key"))?;

    let mut pk_map = HashMap::with_capacity(nodes.len());
    let mut rows_by_pk = HashMap::with_capacity(nodes.len());
    let mut rows: Vec<Vec<SqlValue>> = Vec::with_capacity(nodes.len());
    for (nid, mut values) in nodes {
        if synthetic_id {
            values.insert(0, SqlValue::I64(nid));
        }
        let pk_value = values[pk_idx].clone();
        pk_map.insert(nid, pk_value.clone());
        rows_by_pk.insert(value_key(&pk_value), values.clone());
        rows.push(values);
    }

    let cols = table.column_names();
    let mut inserted = 0u64;
    for chunk in rows.chunks(batch_size) {
        inserted += relational.insert_batch(&table.name, &cols, chunk).await?;
    }
    info!("Inserted {} rows into {}", inserted, table.name);

    Ok((
        inserted,
        LoadedLabel {
            table,
            pk_map,
            rows_by_pk,
        },
    ))
}

/// Synthesize a table definition from sampled metadata (or, without
/// metadata, from sampled property names as conservative text columns).
/// Returns (table, typed, synthetic_id).
fn synthesize_table(label: &str, metadata: Option<&str>, keys: &[String]) -> (Table, bool, bool) {
    let typed = metadata.is_some();
    let mut table = Table::new(label);

    match metadata {
        Some(raw) => {
            for (name, ty) in parse_type_metadata(raw) {
                table.columns.push(Column {
                    name,
                    ty,
                    is_nullable: true,
                    pk_ordinal: 0,
                    default: None,
                });
            }
        }
        None => {
            for key in keys {
                table.columns.push(Column {
                    name: key.clone(),
                    ty: CanonicalType::Text,
                    is_nullable: true,
                    pk_ordinal: 0,
                    default: None,
                });
            }
        }
    }

    // The row key convention: a column named `id` is the primary key; a
    // label without one gets a bigint id filled from the node id.
    let synthetic_id = match table.columns.iter_mut().find(|c| c.name == "id") {
        Some(id_col) => {
            id_col.pk_ordinal = 1;
            id_col.is_nullable = false;
            false
        }
        None => {
            table.columns.insert(
                0,
                Column {
                    name: "id".into(),
                    ty: CanonicalType::Int64,
                    is_nullable: false,
                    pk_ordinal: 1,
                    default: None,
                },
            );
            true
        }
    };

    (table, typed, synthetic_id)
}

/// Find an existing non-key column whose values equal the target key for
/// every observed relationship instance. Prefers the conventional
/// `<target>_id` name when several columns match.
fn matching_fk_column(
    table: &Table,
    rows_by_pk: &HashMap<String, Vec<SqlValue>>,
    pairs: &[(SqlValue, SqlValue)],
    target: &str,
) -> Option<String> {
    if pairs.is_empty() {
        return None;
    }

    let mut matches: Vec<String> = Vec::new();
    for (idx, col) in table.columns.iter().enumerate() {
        if col.is_pk() {
            continue;
        }
        let all_match = pairs.iter().all(|(src_pk, dst_pk)| {
            rows_by_pk
                .get(&value_key(src_pk))
                .map(|row| &row[idx] == dst_pk)
                .unwrap_or(false)
        });
        if all_match {
            matches.push(col.name.clone());
        }
    }

    let preferred = fk_column_name(target);
    if matches.iter().any(|m| m == &preferred) {
        return Some(preferred);
    }
    matches.into_iter().next()
}

/// Stable lookup key for a primary-key value.
fn value_key(value: &SqlValue) -> String {
    format!("{:?}", value)
}

fn sorted_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_table_from_metadata() {
        let (table, typed, synthetic) =
            synthesize_table("person", Some("id:BIGINT;name:VARCHAR(40)"), &[]);
        assert!(typed);
        assert!(!synthetic);
        assert_eq!(table.pk_names(), vec!["id"]);
        let id = table.column("id").unwrap();
        assert_eq!(id.ty, CanonicalType::Int64);
        assert!(!id.is_nullable);
        assert_eq!(
            table.column("name").unwrap().ty,
            CanonicalType::Varchar(40)
        );
    }

    #[test]
    fn test_synthesize_table_without_metadata_is_text() {
        let keys = vec!["name".to_string(), "score".to_string()];
        let (table, typed, synthetic) = synthesize_table("player", None, &keys);
        assert!(!typed);
        assert!(synthetic);
        assert_eq!(table.pk_names(), vec!["id"]);
        assert_eq!(table.column("id").unwrap().ty, CanonicalType::Int64);
        assert_eq!(table.column("name").unwrap().ty, CanonicalType::Text);
        assert_eq!(table.column("score").unwrap().ty, CanonicalType::Text);
    }

    #[test]
    fn test_matching_fk_column_finds_existing() {
        let (table, _, _) = synthesize_table(
            "car",
            Some("id:BIGINT;model:TEXT;owner_id:BIGINT"),
            &[],
        );
        let mut rows_by_pk = HashMap::new();
        rows_by_pk.insert(
            value_key(&SqlValue::I64(1)),
            vec![
                SqlValue::I64(1),
                SqlValue::Text("kadett".into()),
                SqlValue::I64(10),
            ],
        );
        rows_by_pk.insert(
            value_key(&SqlValue::I64(2)),
            vec![
                SqlValue::I64(2),
                SqlValue::Text("corsa".into()),
                SqlValue::I64(11),
            ],
        );

        let pairs = vec![
            (SqlValue::I64(1), SqlValue::I64(10)),
            (SqlValue::I64(2), SqlValue::I64(11)),
        ];
        assert_eq!(
            matching_fk_column(&table, &rows_by_pk, &pairs, "person"),
            Some("owner_id".into())
        );
    }

    #[test]
    fn test_matching_fk_column_rejects_partial_match() {
        let (table, _, _) = synthesize_table("car", Some("id:BIGINT;owner_id:BIGINT"), &[]);
        let mut rows_by_pk = HashMap::new();
        rows_by_pk.insert(
            value_key(&SqlValue::I64(1)),
            vec![SqlValue::I64(1), SqlValue::I64(10)],
        );
        rows_by_pk.insert(
            value_key(&SqlValue::I64(2)),
            vec![SqlValue::I64(2), SqlValue::I64(99)],
        );

        let pairs = vec![
            (SqlValue::I64(1), SqlValue::I64(10)),
            (SqlValue::I64(2), SqlValue::I64(11)),
        ];
        assert_eq!(matching_fk_column(&table, &rows_by_pk, &pairs, "person"), None);
    }

    #[test]
    fn test_matching_fk_column_prefers_conventional_name() {
        let (table, _, _) = synthesize_table(
            "car",
            Some("id:BIGINT;mirror:BIGINT;person_id:BIGINT"),
            &[],
        );
        let mut rows_by_pk = HashMap::new();
        // Both non-key columns hold identical values; the conventional
        // name wins.
        rows_by_pk.insert(
            value_key(&SqlValue::I64(1)),
            vec![SqlValue::I64(1), SqlValue::I64(10), SqlValue::I64(10)],
        );

        let pairs = vec![(SqlValue::I64(1), SqlValue::I64(10))];
        assert_eq!(
            matching_fk_column(&table, &rows_by_pk, &pairs, "person"),
            Some("person_id".into())
        );
    }

    #[test]
    fn test_empty_instances_have_no_fk_column() {
        let (table, _, _) = synthesize_table("car", Some("id:BIGINT;owner_id:BIGINT"), &[]);
        assert_eq!(
            matching_fk_column(&table, &HashMap::new(), &[], "person"),
            None
        );
    }
}
