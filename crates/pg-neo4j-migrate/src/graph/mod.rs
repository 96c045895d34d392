//! Graph store (Neo4j) access.
//!
//! Wraps the bolt driver with the operations the two migration directions
//! need: erase-then-rebuild, batched node and relationship creation inside
//! write transactions, label enumeration, metadata sampling and
//! direction-aware relationship probes.

pub mod values;

use neo4rs::{query, Graph, Node};
use tracing::{debug, info, warn};

use crate::config::GraphConfig;
use crate::constraints::GraphConstraint;
use crate::error::{MigrateError, Result};
use crate::schema::ident::cypher_ident;
use crate::schema::{Column, SqlValue};

use values::TYPES_PROPERTY;

/// One association-table row headed for the graph: the two endpoint key
/// values plus the row's extra columns as relationship properties.
#[derive(Debug, Clone)]
pub struct MediatedRow {
    pub source_key: SqlValue,
    pub target_key: SqlValue,
    pub properties: Vec<(String, SqlValue)>,
}

/// Pooled bolt connection (the driver multiplexes internally).
pub struct GraphPool {
    graph: Graph,
}

impl GraphPool {
    /// Connect and verify reachability.
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let graph = Graph::new(
            config.uri().as_str(),
            config.user.as_str(),
            config.password.as_str(),
        )
        .await
        .map_err(|e| MigrateError::connection("graph store", e))?;

        let pool = Self { graph };
        pool.ping()
            .await
            .map_err(|e| MigrateError::connection("graph store", e))?;
        info!("Connected to Neo4j: {}", config.uri());
        Ok(pool)
    }

    /// Connectivity probe.
    pub async fn ping(&self) -> Result<()> {
        let mut stream = self.graph.execute(query("RETURN 1")).await?;
        while stream.next().await?.is_some() {}
        Ok(())
    }

    /// Delete every node and relationship. Export is erase-then-rebuild;
    /// this is the erase.
    pub async fn erase_all(&self) -> Result<()> {
        self.graph.run(query("MATCH (n) DETACH DELETE n")).await?;
        info!("Graph erased");
        Ok(())
    }

    /// Create one node per row in a single write transaction. Each row is
    /// a list of (property, value); NULL values are omitted. The `_types`
    /// payload is attached to every node.
    pub async fn create_nodes(
        &self,
        label: &str,
        metadata: &str,
        rows: &[Vec<(String, SqlValue)>],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| MigrateError::write(label, e))?;

        for row in rows {
            let mut assignments = vec![format!(
                "n.{} = $__types",
                cypher_ident(TYPES_PROPERTY)
            )];
            let mut params: Vec<(String, neo4rs::BoltType)> = Vec::with_capacity(row.len());
            for (i, (name, value)) in row.iter().enumerate() {
                if let Some(bolt) = values::to_bolt(value) {
                    let key = format!("p{}", i);
                    assignments.push(format!("n.{} = ${}", cypher_ident(name), key));
                    params.push((key, bolt));
                }
            }

            let cypher = format!(
                "CREATE (n:{}) SET {}",
                cypher_ident(label),
                assignments.join(", ")
            );
            let mut q = query(&cypher).param("__types", metadata);
            for (key, bolt) in params {
                q = q.param(&key, bolt);
            }
            txn.run(q).await.map_err(|e| MigrateError::write(label, e))?;
        }

        txn.commit()
            .await
            .map_err(|e| MigrateError::write(label, e))?;
        debug!("Created {} {} nodes", rows.len(), label);
        Ok(rows.len() as u64)
    }

    /// Create one relationship per (source key, target key) pair, matching
    /// endpoint nodes by the given key properties. One transaction per
    /// batch.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_direct_relationships(
        &self,
        source_label: &str,
        source_key: &str,
        target_label: &str,
        target_key: &str,
        rel_type: &str,
        pairs: &[(SqlValue, SqlValue)],
    ) -> Result<u64> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let scope = format!("{}->{}", source_label, target_label);
        let cypher = format!(
            "MATCH (a:{}), (b:{}) WHERE a.{} = $val1 AND b.{} = $val2 CREATE (a)-[r:{}]->(b)",
            cypher_ident(source_label),
            cypher_ident(target_label),
            cypher_ident(source_key),
            cypher_ident(target_key),
            cypher_ident(rel_type),
        );

        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| MigrateError::write(&scope, e))?;
        for (source_value, target_value) in pairs {
            let (Some(v1), Some(v2)) = (values::to_bolt(source_value), values::to_bolt(target_value))
            else {
                continue;
            };
            let q = query(&cypher).param("val1", v1).param("val2", v2);
            txn.run(q).await.map_err(|e| MigrateError::write(&scope, e))?;
        }
        txn.commit()
            .await
            .map_err(|e| MigrateError::write(&scope, e))?;
        debug!("Created {} {} relationships", pairs.len(), rel_type);
        Ok(pairs.len() as u64)
    }

    /// Create one relationship per association row, carrying the row's
    /// extra columns as relationship properties.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_mediated_relationships(
        &self,
        source_label: &str,
        source_key: &str,
        target_label: &str,
        target_key: &str,
        rel_type: &str,
        rows: &[MediatedRow],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let scope = format!("{}<->{}", source_label, target_label);

        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| MigrateError::write(&scope, e))?;
        let mut created = 0u64;
        for row in rows {
            let (Some(v1), Some(v2)) =
                (values::to_bolt(&row.source_key), values::to_bolt(&row.target_key))
            else {
                continue;
            };

            let mut set_clauses = Vec::new();
            let mut params: Vec<(String, neo4rs::BoltType)> = Vec::new();
            for (i, (name, value)) in row.properties.iter().enumerate() {
                if let Some(bolt) = values::to_bolt(value) {
                    let key = format!("p{}", i);
                    set_clauses.push(format!("r.{} = ${}", cypher_ident(name), key));
                    params.push((key, bolt));
                }
            }
            let set_part = if set_clauses.is_empty() {
                String::new()
            } else {
                format!(" SET {}", set_clauses.join(", "))
            };

            let cypher = format!(
                "MATCH (a:{}), (b:{}) WHERE a.{} = $val1 AND b.{} = $val2 CREATE (a)-[r:{}]->(b){}",
                cypher_ident(source_label),
                cypher_ident(target_label),
                cypher_ident(source_key),
                cypher_ident(target_key),
                cypher_ident(rel_type),
                set_part,
            );
            let mut q = query(&cypher).param("val1", v1).param("val2", v2);
            for (key, bolt) in params {
                q = q.param(&key, bolt);
            }
            txn.run(q).await.map_err(|e| MigrateError::write(&scope, e))?;
            created += 1;
        }
        txn.commit()
            .await
            .map_err(|e| MigrateError::write(&scope, e))?;
        debug!("Created {} {} relationships", created, rel_type);
        Ok(created)
    }

    /// All labels present in the store, alphabetically.
    pub async fn list_labels(&self) -> Result<Vec<String>> {
        let mut stream = self
            .graph
            .execute(query(
                "MATCH (n) UNWIND labels(n) AS label RETURN DISTINCT label ORDER BY label",
            ))
            .await?;
        let mut labels = Vec::new();
        while let Some(row) = stream.next().await? {
            let label: String = row
                .get("label")
                .map_err(|e| MigrateError::write("label enumeration", e))?;
            labels.push(label);
        }
        Ok(labels)
    }

    /// Sample one node's embedded type metadata, if any node of the label
    /// carries it.
    pub async fn sample_metadata(&self, label: &str) -> Result<Option<String>> {
        let cypher = format!(
            "MATCH (n:{}) WHERE n.{} IS NOT NULL RETURN n.{} AS types LIMIT 1",
            cypher_ident(label),
            cypher_ident(TYPES_PROPERTY),
            cypher_ident(TYPES_PROPERTY),
        );
        let mut stream = self.graph.execute(query(&cypher)).await?;
        match stream.next().await? {
            Some(row) => {
                let types: String = row
                    .get("types")
                    .map_err(|e| MigrateError::write(label, e))?;
                Ok(Some(types))
            }
            None => Ok(None),
        }
    }

    /// Property names of one sampled node (metadata-absent fallback).
    pub async fn sample_keys(&self, label: &str) -> Result<Vec<String>> {
        let cypher = format!("MATCH (n:{}) RETURN n AS node LIMIT 1", cypher_ident(label));
        let mut stream = self.graph.execute(query(&cypher)).await?;
        match stream.next().await? {
            Some(row) => {
                let node: Node = row.get("node").map_err(|e| MigrateError::write(label, e))?;
                Ok(node
                    .keys()
                    .iter()
                    .filter(|k| **k != TYPES_PROPERTY)
                    .map(|k| k.to_string())
                    .collect())
            }
            None => Ok(Vec::new()),
        }
    }

    /// Fetch every node of a label as (store-assigned id, values aligned
    /// with `columns`). When `typed` is false the columns were synthesized
    /// without metadata and values are read leniently as text.
    pub async fn fetch_nodes(
        &self,
        label: &str,
        columns: &[Column],
        typed: bool,
    ) -> Result<Vec<(i64, Vec<SqlValue>)>> {
        let cypher = format!(
            "MATCH (n:{}) RETURN id(n) AS nid, n AS node",
            cypher_ident(label)
        );
        let mut stream = self.graph.execute(query(&cypher)).await?;

        let mut out = Vec::new();
        while let Some(row) = stream.next().await? {
            let nid: i64 = row.get("nid").map_err(|e| MigrateError::write(label, e))?;
            let node: Node = row.get("node").map_err(|e| MigrateError::write(label, e))?;

            let mut row_values = Vec::with_capacity(columns.len());
            for col in columns {
                let value = if typed {
                    values::extract_property(&node, &col.name, &col.ty, label)?
                } else {
                    values::extract_lenient(&node, &col.name)
                };
                row_values.push(value);
            }
            out.push((nid, row_values));
        }
        Ok(out)
    }

    /// Count relationships in one direction between two labels.
    pub async fn count_relationships(&self, source: &str, target: &str) -> Result<i64> {
        let cypher = format!(
            "MATCH (a:{})-[r]->(b:{}) RETURN count(r) AS c",
            cypher_ident(source),
            cypher_ident(target)
        );
        let mut stream = self.graph.execute(query(&cypher)).await?;
        match stream.next().await? {
            Some(row) => row
                .get("c")
                .map_err(|e| MigrateError::write("relationship probe", e)),
            None => Ok(0),
        }
    }

    /// Distinct relationship types observed source→target.
    pub async fn relationship_types(&self, source: &str, target: &str) -> Result<Vec<String>> {
        let cypher = format!(
            "MATCH (a:{})-[r]->(b:{}) RETURN DISTINCT type(r) AS t ORDER BY t",
            cypher_ident(source),
            cypher_ident(target)
        );
        let mut stream = self.graph.execute(query(&cypher)).await?;
        let mut types = Vec::new();
        while let Some(row) = stream.next().await? {
            types.push(
                row.get::<String>("t")
                    .map_err(|e| MigrateError::write("relationship probe", e))?,
            );
        }
        Ok(types)
    }

    /// Fetch relationship instances of one type as (source node id, target
    /// node id, relationship properties).
    pub async fn fetch_relationships(
        &self,
        source: &str,
        target: &str,
        rel_type: &str,
    ) -> Result<Vec<(i64, i64, Vec<(String, serde_json::Value)>)>> {
        let scope = format!("{}-[{}]->{}", source, rel_type, target);
        let cypher = format!(
            "MATCH (s:{})-[r:{}]->(t:{}) RETURN id(s) AS src, id(t) AS dst, properties(r) AS props",
            cypher_ident(source),
            cypher_ident(rel_type),
            cypher_ident(target)
        );
        let mut stream = self.graph.execute(query(&cypher)).await?;

        let mut out = Vec::new();
        while let Some(row) = stream.next().await? {
            let src: i64 = row.get("src").map_err(|e| MigrateError::write(&scope, e))?;
            let dst: i64 = row.get("dst").map_err(|e| MigrateError::write(&scope, e))?;
            let props: Vec<(String, serde_json::Value)> =
                match row.get::<serde_json::Value>("props") {
                    Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
                    Ok(_) => Vec::new(),
                    Err(e) => {
                        warn!("Dropping unreadable relationship properties on {}: {}", scope, e);
                        Vec::new()
                    }
                };
            out.push((src, dst, props));
        }
        Ok(out)
    }

    /// Apply translated constraints best-effort: store editions that cannot
    /// express one (composite uniqueness, existence) reject it; that is
    /// logged and the run continues.
    pub async fn apply_constraints(&self, constraints: &[GraphConstraint]) -> Result<usize> {
        let mut applied = 0;
        for constraint in constraints {
            match self.graph.run(query(&constraint.cypher)).await {
                Ok(()) => applied += 1,
                Err(e) => warn!(
                    "Constraint {} not applied (target edition may not support it): {}",
                    constraint.name, e
                ),
            }
        }
        Ok(applied)
    }
}
