//! Relation matrix construction.
//!
//! The matrix records, per ordered (source, target) table pair, how the two
//! tables connect: directly through a foreign-key column, or mediated
//! through an association table. Direct edges are recorded first; a
//! mediated edge is only added where no direct edge already occupies the
//! pair. Self-pairs are never populated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::classify::TableClass;
use crate::schema::Table;

/// How an ordered table pair connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationEdge {
    /// A literal foreign-key column on the source table.
    Direct {
        /// The foreign-key column on the source table.
        column: String,
        /// The referenced column on the target table.
        ref_column: String,
    },
    /// A row in an association table links the pair.
    Mediated {
        /// The association table's name.
        table: String,
        /// Association column referencing the source side.
        source_column: String,
        /// Association column referencing the target side.
        target_column: String,
    },
}

/// Cardinality class surfaced in per-table summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToMany,
    ManyToMany,
}

/// One line of the per-table relation summary consumed by console shells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationSummary {
    pub table: String,
    pub target: String,
    pub join_column: String,
    pub cardinality: Cardinality,
}

/// A table the builder could not map, with the reason it was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTable {
    pub table: String,
    pub reason: String,
}

/// Table × table adjacency structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationMatrix {
    edges: BTreeMap<(String, String), RelationEdge>,
}

impl RelationMatrix {
    pub fn get(&self, source: &str, target: &str) -> Option<&RelationEdge> {
        self.edges.get(&(source.to_string(), target.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), &RelationEdge)> {
        self.edges.iter()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Direct edges as (source, target, fk column, referenced column).
    pub fn direct_edges(&self) -> Vec<(String, String, String, String)> {
        self.edges
            .iter()
            .filter_map(|((s, t), e)| match e {
                RelationEdge::Direct { column, ref_column } => Some((
                    s.clone(),
                    t.clone(),
                    column.clone(),
                    ref_column.clone(),
                )),
                _ => None,
            })
            .collect()
    }

    /// Mediated edges deduplicated to one entry per association table:
    /// (association table, side A, column referencing A, side B, column
    /// referencing B), with A ≤ B. A pair may carry its mediated edge in
    /// only one orientation (the other slot can be taken by a direct
    /// edge), so both orientations normalize to the same entry.
    pub fn mediated_tables(&self) -> Vec<(String, String, String, String, String)> {
        let mut seen: BTreeMap<String, (String, String, String, String)> = BTreeMap::new();
        for ((source, target), edge) in &self.edges {
            if let RelationEdge::Mediated {
                table,
                source_column,
                target_column,
            } = edge
            {
                let entry = if source <= target {
                    (
                        source.clone(),
                        source_column.clone(),
                        target.clone(),
                        target_column.clone(),
                    )
                } else {
                    (
                        target.clone(),
                        target_column.clone(),
                        source.clone(),
                        source_column.clone(),
                    )
                };
                seen.insert(table.clone(), entry);
            }
        }
        seen.into_iter()
            .map(|(table, (a, a_col, b, b_col))| (table, a, a_col, b, b_col))
            .collect()
    }

    /// Flatten into per-table relation summaries.
    pub fn summaries(&self) -> Vec<RelationSummary> {
        self.edges
            .iter()
            .map(|((source, target), edge)| match edge {
                RelationEdge::Direct { column, .. } => RelationSummary {
                    table: source.clone(),
                    target: target.clone(),
                    join_column: column.clone(),
                    cardinality: Cardinality::OneToMany,
                },
                RelationEdge::Mediated {
                    table,
                    source_column,
                    ..
                } => RelationSummary {
                    table: source.clone(),
                    target: target.clone(),
                    join_column: format!("{}.{}", table, source_column),
                    cardinality: Cardinality::ManyToMany,
                },
            })
            .collect()
    }

    fn put_direct(&mut self, source: &str, target: &str, column: &str, ref_column: &str) {
        self.edges
            .entry((source.to_string(), target.to_string()))
            .or_insert_with(|| RelationEdge::Direct {
                column: column.to_string(),
                ref_column: ref_column.to_string(),
            });
    }

    fn put_mediated(&mut self, source: &str, target: &str, table: &str, s_col: &str, t_col: &str) {
        self.edges
            .entry((source.to_string(), target.to_string()))
            .or_insert_with(|| RelationEdge::Mediated {
                table: table.to_string(),
                source_column: s_col.to_string(),
                target_column: t_col.to_string(),
            });
    }
}

/// Result of a matrix build: the matrix plus every table that had to be
/// skipped for an unsupported shape. Skips are per-table and non-fatal.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixOutcome {
    pub matrix: RelationMatrix,
    pub skipped: Vec<SkippedTable>,
}

/// Build the relation matrix from classified tables.
///
/// Entity foreign keys become `Direct` edges. Each well-shaped association
/// table contributes two `Mediated` edges, (A, B) and (B, A). Association
/// tables referencing more or fewer than two distinct tables, referencing
/// the same table twice, or using composite foreign keys are reported in
/// `skipped` and left out of the matrix.
pub fn build(tables: &[Table], classes: &BTreeMap<String, TableClass>) -> MatrixOutcome {
    let mut matrix = RelationMatrix::default();
    let mut skipped = Vec::new();

    let entity = |name: &str| classes.get(name).copied() == Some(TableClass::Entity);

    // Direct edges first; they win ties against mediated edges.
    for table in tables {
        if !entity(&table.name) {
            continue;
        }
        for fk in &table.foreign_keys {
            if fk.is_composite() {
                warn!(
                    "Skipping composite foreign key {} on {} - not representable as a graph edge",
                    fk.name, table.name
                );
                skipped.push(SkippedTable {
                    table: table.name.clone(),
                    reason: format!("composite foreign key {}", fk.name),
                });
                continue;
            }
            if fk.ref_table == table.name {
                warn!(
                    "Skipping self-referencing foreign key {} on {} - self-pairs are not populated",
                    fk.name, table.name
                );
                continue;
            }
            if !entity(&fk.ref_table) {
                warn!(
                    "Skipping foreign key {} on {}: target {} is not an entity table",
                    fk.name, table.name, fk.ref_table
                );
                continue;
            }
            matrix.put_direct(&table.name, &fk.ref_table, fk.column(), fk.ref_column());
        }
    }

    // Mediated edges, only where a direct edge is absent.
    for table in tables {
        if classes.get(&table.name).copied() != Some(TableClass::Association) {
            continue;
        }
        match association_sides(table) {
            Ok((side_a, side_b)) => {
                let (a_table, a_col) = side_a;
                let (b_table, b_col) = side_b;
                if !entity(a_table) || !entity(b_table) {
                    skipped.push(SkippedTable {
                        table: table.name.clone(),
                        reason: "association references a non-entity table".into(),
                    });
                    continue;
                }
                matrix.put_mediated(a_table, b_table, &table.name, a_col, b_col);
                matrix.put_mediated(b_table, a_table, &table.name, b_col, a_col);
            }
            Err(reason) => {
                warn!("Skipping association table {}: {}", table.name, reason);
                skipped.push(SkippedTable {
                    table: table.name.clone(),
                    reason,
                });
            }
        }
    }

    MatrixOutcome { matrix, skipped }
}

/// Resolve the two sides of an association table, or the reason it is
/// unsupported.
fn association_sides(table: &Table) -> std::result::Result<((&str, &str), (&str, &str)), String> {
    if table.foreign_keys.iter().any(|fk| fk.is_composite()) {
        return Err("association uses composite foreign keys".into());
    }
    if table.foreign_keys.len() != 2 {
        let distinct: std::collections::BTreeSet<&str> = table
            .foreign_keys
            .iter()
            .map(|fk| fk.ref_table.as_str())
            .collect();
        return Err(format!(
            "association references {} tables through {} foreign keys; exactly two are supported",
            distinct.len(),
            table.foreign_keys.len()
        ));
    }
    let first = &table.foreign_keys[0];
    let second = &table.foreign_keys[1];
    if first.ref_table == second.ref_table {
        return Err(format!(
            "association references table {} twice without a self-relationship marker",
            first.ref_table
        ));
    }
    Ok((
        (first.ref_table.as_str(), first.column()),
        (second.ref_table.as_str(), second.column()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, ClassifyOverrides};
    use crate::schema::{Column, ForeignKey};
    use crate::typemap::CanonicalType;

    fn col(name: &str, pk: i32) -> Column {
        Column {
            name: name.into(),
            ty: CanonicalType::Int64,
            is_nullable: pk == 0,
            pk_ordinal: pk,
            default: None,
        }
    }

    fn fk(column: &str, target: &str) -> ForeignKey {
        ForeignKey {
            name: format!("{}_fkey", column),
            columns: vec![column.into()],
            ref_table: target.into(),
            ref_columns: vec!["id".into()],
            on_delete: "NO_ACTION".into(),
            on_update: "NO_ACTION".into(),
        }
    }

    fn entity(name: &str, fks: Vec<ForeignKey>) -> Table {
        let mut t = Table::new(name);
        let mut cols = vec![col("id", 1)];
        cols.extend(fks.iter().map(|f| col(f.column(), 0)));
        t.columns = cols;
        t.foreign_keys = fks;
        t
    }

    fn association(name: &str, fks: Vec<ForeignKey>) -> Table {
        let mut t = Table::new(name);
        t.columns = fks
            .iter()
            .enumerate()
            .map(|(i, f)| col(f.column(), i as i32 + 1))
            .collect();
        t.foreign_keys = fks;
        t
    }

    fn classes_for(tables: &[Table]) -> BTreeMap<String, TableClass> {
        let overrides = ClassifyOverrides::default();
        tables
            .iter()
            .map(|t| (t.name.clone(), classify(t, &overrides)))
            .collect()
    }

    #[test]
    fn test_direct_edges() {
        let tables = vec![
            entity("person", vec![]),
            entity("car", vec![fk("owner_id", "person")]),
        ];
        let classes = classes_for(&tables);
        let out = build(&tables, &classes);

        assert!(out.skipped.is_empty());
        assert_eq!(out.matrix.len(), 1);
        assert_eq!(
            out.matrix.get("car", "person"),
            Some(&RelationEdge::Direct {
                column: "owner_id".into(),
                ref_column: "id".into()
            })
        );
        assert!(out.matrix.get("person", "car").is_none());
    }

    #[test]
    fn test_mediated_edges_both_directions() {
        let tables = vec![
            entity("employe", vec![]),
            entity("service", vec![]),
            association(
                "employe_service_association",
                vec![fk("employe_id", "employe"), fk("service_id", "service")],
            ),
        ];
        let classes = classes_for(&tables);
        let out = build(&tables, &classes);

        assert!(out.skipped.is_empty());
        assert_eq!(out.matrix.len(), 2);
        assert_eq!(
            out.matrix.get("employe", "service"),
            Some(&RelationEdge::Mediated {
                table: "employe_service_association".into(),
                source_column: "employe_id".into(),
                target_column: "service_id".into(),
            })
        );
        assert_eq!(
            out.matrix.get("service", "employe"),
            Some(&RelationEdge::Mediated {
                table: "employe_service_association".into(),
                source_column: "service_id".into(),
                target_column: "employe_id".into(),
            })
        );

        let mediated = out.matrix.mediated_tables();
        assert_eq!(mediated.len(), 1);
        assert_eq!(mediated[0].0, "employe_service_association");
    }

    #[test]
    fn test_direct_wins_over_mediated() {
        let tables = vec![
            entity("a", vec![fk("b_id", "b")]),
            entity("b", vec![]),
            association("a_b_link", vec![fk("a_id", "a"), fk("b_id", "b")]),
        ];
        let classes = classes_for(&tables);
        let out = build(&tables, &classes);

        // (a, b) keeps its direct edge; (b, a) gets the mediated one.
        assert!(matches!(
            out.matrix.get("a", "b"),
            Some(RelationEdge::Direct { .. })
        ));
        assert!(matches!(
            out.matrix.get("b", "a"),
            Some(RelationEdge::Mediated { .. })
        ));

        // The association is still exported once, normalized to (a, b).
        let mediated = out.matrix.mediated_tables();
        assert_eq!(
            mediated,
            vec![(
                "a_b_link".to_string(),
                "a".to_string(),
                "a_id".to_string(),
                "b".to_string(),
                "b_id".to_string(),
            )]
        );
    }

    #[test]
    fn test_three_way_association_skipped() {
        let tables = vec![
            entity("a", vec![]),
            entity("b", vec![]),
            entity("c", vec![]),
            association(
                "triple",
                vec![fk("a_id", "a"), fk("b_id", "b"), fk("c_id", "c")],
            ),
        ];
        let classes = classes_for(&tables);
        let out = build(&tables, &classes);

        assert!(out.matrix.is_empty());
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].table, "triple");
    }

    #[test]
    fn test_doubled_target_association_skipped() {
        let tables = vec![
            entity("person", vec![]),
            association(
                "friendship",
                vec![fk("left_id", "person"), fk("right_id", "person")],
            ),
        ];
        let classes = classes_for(&tables);
        let out = build(&tables, &classes);

        assert!(out.matrix.is_empty());
        assert_eq!(out.skipped.len(), 1);
        assert!(out.skipped[0].reason.contains("twice"));
    }

    #[test]
    fn test_no_self_pairs() {
        let tables = vec![entity("employee", vec![fk("manager_id", "employee")])];
        let classes = classes_for(&tables);
        let out = build(&tables, &classes);
        assert!(out.matrix.is_empty());
    }

    #[test]
    fn test_build_is_idempotent() {
        let tables = vec![
            entity("person", vec![]),
            entity("car", vec![fk("owner_id", "person")]),
            entity("service", vec![]),
            association(
                "person_service",
                vec![fk("person_id", "person"), fk("service_id", "service")],
            ),
        ];
        let classes = classes_for(&tables);
        let first = build(&tables, &classes);
        let second = build(&tables, &classes);
        assert_eq!(first, second);
    }

    #[test]
    fn test_summaries() {
        let tables = vec![
            entity("person", vec![]),
            entity("car", vec![fk("owner_id", "person")]),
        ];
        let classes = classes_for(&tables);
        let out = build(&tables, &classes);
        let summaries = out.matrix.summaries();
        assert_eq!(
            summaries,
            vec![RelationSummary {
                table: "car".into(),
                target: "person".into(),
                join_column: "owner_id".into(),
                cardinality: Cardinality::OneToMany,
            }]
        );
    }
}
