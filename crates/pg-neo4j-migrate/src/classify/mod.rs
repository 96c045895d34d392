//! Join-table classification.
//!
//! Decides, per table, whether it represents an entity (mapped to graph
//! nodes) or a many-to-many association (mapped to relationships, never
//! nodes). The heuristic is shape-based and therefore best-effort: a table
//! with a composite business key that happens to coincide with its foreign
//! keys will look like an association. Config override lists exist for
//! exactly that case.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::schema::Table;

/// Cardinality class of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableClass {
    /// A distinct real-world object; one node per row.
    Entity,
    /// A pure link table; one relationship per row.
    Association,
}

/// Manual classification overrides, keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct ClassifyOverrides {
    pub force_entity: Vec<String>,
    pub force_association: Vec<String>,
}

/// Classify a table as entity or association.
///
/// A table is an association iff it has at least two foreign keys and its
/// primary key is composed of exactly the foreign-key columns: no extra
/// identity column, no key column outside the foreign-key set. A table
/// with two foreign keys plus its own identity column is an entity with
/// two outbound relationships.
pub fn classify(table: &Table, overrides: &ClassifyOverrides) -> TableClass {
    if overrides.force_entity.iter().any(|t| t == &table.name) {
        return TableClass::Entity;
    }
    if overrides.force_association.iter().any(|t| t == &table.name) {
        return TableClass::Association;
    }

    if table.foreign_keys.len() < 2 {
        return TableClass::Entity;
    }

    let fk_columns: BTreeSet<&str> = table
        .foreign_keys
        .iter()
        .flat_map(|fk| fk.columns.iter().map(String::as_str))
        .collect();
    let pk_columns: BTreeSet<&str> = table
        .columns
        .iter()
        .filter(|c| c.is_pk())
        .map(|c| c.name.as_str())
        .collect();

    if !pk_columns.is_empty() && pk_columns == fk_columns {
        TableClass::Association
    } else {
        TableClass::Entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ForeignKey};
    use crate::typemap::CanonicalType;

    fn col(name: &str, pk: i32) -> Column {
        Column {
            name: name.into(),
            ty: CanonicalType::Int64,
            is_nullable: false,
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

    fn no_overrides() -> ClassifyOverrides {
        ClassifyOverrides::default()
    }

    #[test]
    fn test_pure_join_table_is_association() {
        let mut t = Table::new("employe_service_association");
        t.columns = vec![col("employe_id", 1), col("service_id", 2)];
        t.foreign_keys = vec![fk("employe_id", "employe"), fk("service_id", "service")];
        assert_eq!(classify(&t, &no_overrides()), TableClass::Association);
    }

    #[test]
    fn test_two_fks_with_own_identity_is_entity() {
        // Load-bearing edge case: an independent identity column means the
        // table carries its own rows, it does not just link two others.
        let mut t = Table::new("contract");
        t.columns = vec![col("id", 1), col("employe_id", 0), col("service_id", 0)];
        t.foreign_keys = vec![fk("employe_id", "employe"), fk("service_id", "service")];
        assert_eq!(classify(&t, &no_overrides()), TableClass::Entity);
    }

    #[test]
    fn test_single_fk_is_entity() {
        let mut t = Table::new("car");
        t.columns = vec![col("id", 1), col("owner_id", 0)];
        t.foreign_keys = vec![fk("owner_id", "person")];
        assert_eq!(classify(&t, &no_overrides()), TableClass::Entity);
    }

    #[test]
    fn test_pk_superset_of_fks_is_entity() {
        // PK includes a column outside the FK set.
        let mut t = Table::new("membership");
        t.columns = vec![col("a_id", 1), col("b_id", 2), col("valid_from", 3)];
        t.foreign_keys = vec![fk("a_id", "a"), fk("b_id", "b")];
        assert_eq!(classify(&t, &no_overrides()), TableClass::Entity);
    }

    #[test]
    fn test_no_pk_is_entity() {
        let mut t = Table::new("link");
        t.columns = vec![col("a_id", 0), col("b_id", 0)];
        t.foreign_keys = vec![fk("a_id", "a"), fk("b_id", "b")];
        assert_eq!(classify(&t, &no_overrides()), TableClass::Entity);
    }

    #[test]
    fn test_three_way_join_table_classifies_as_association() {
        // Still association-shaped; the matrix builder later rejects the
        // three-target shape as unsupported.
        let mut t = Table::new("triple");
        t.columns = vec![col("a_id", 1), col("b_id", 2), col("c_id", 3)];
        t.foreign_keys = vec![fk("a_id", "a"), fk("b_id", "b"), fk("c_id", "c")];
        assert_eq!(classify(&t, &no_overrides()), TableClass::Association);
    }

    #[test]
    fn test_overrides_beat_heuristic() {
        let mut t = Table::new("employe_service_association");
        t.columns = vec![col("employe_id", 1), col("service_id", 2)];
        t.foreign_keys = vec![fk("employe_id", "employe"), fk("service_id", "service")];

        let overrides = ClassifyOverrides {
            force_entity: vec!["employe_service_association".into()],
            force_association: vec![],
        };
        assert_eq!(classify(&t, &overrides), TableClass::Entity);
    }
}
