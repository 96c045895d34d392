//! Identifier quoting and deterministic name synthesis.
//!
//! Both directions of the migration derive names mechanically: graph
//! relationship types come from the relational edge that produced them, and
//! relational table names come from the label pair that produced them. The
//! functions here are the single source of those rules so export and import
//! stay inverse to each other.

/// Quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Qualify a table name with its schema.
pub fn qualify(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Quote a Cypher identifier (label or property name).
pub fn cypher_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Uppercase a name into the character set relationship types use.
fn type_fragment(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Relationship type for a direct (foreign-key) edge.
///
/// `RELATES_TO_<TARGET>`, or `RELATES_TO_<TARGET>_VIA_<COLUMN>` when the
/// owning table holds more than one foreign key to the same target; the
/// suffix keeps each key's relationships separable on re-import.
pub fn relationship_type(target_table: &str, via_column: &str, needs_suffix: bool) -> String {
    if needs_suffix {
        format!(
            "RELATES_TO_{}_VIA_{}",
            type_fragment(target_table),
            type_fragment(via_column)
        )
    } else {
        format!("RELATES_TO_{}", type_fragment(target_table))
    }
}

/// Symmetric relationship type for a mediated (association-table) edge.
///
/// Derived from the sorted label pair, so the same name is computed from
/// either side. A type matching this scheme marks the pair as
/// many-to-many regardless of the direction its instances were stored in.
pub fn association_rel_type(label_a: &str, label_b: &str) -> String {
    let (first, second) = sort_pair(label_a, label_b);
    format!(
        "ASSOCIATED_{}_{}",
        type_fragment(first),
        type_fragment(second)
    )
}

/// Table name synthesized for a many-to-many label pair on import:
/// `<a>_<b>_association` with the labels sorted.
pub fn association_table_name(label_a: &str, label_b: &str) -> String {
    let (first, second) = sort_pair(label_a, label_b);
    format!("{}_{}_association", first, second)
}

/// Foreign-key column synthesized on import when no existing column
/// matches the relationship.
pub fn fk_column_name(target_label: &str) -> String {
    format!("{}_id", target_label)
}

fn sort_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
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
    fn test_quote_ident() {
        assert_eq!(quote_ident("person"), "\"person\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(qualify("public", "car"), "\"public\".\"car\"");
    }

    #[test]
    fn test_relationship_type() {
        assert_eq!(relationship_type("person", "owner_id", false), "RELATES_TO_PERSON");
        assert_eq!(
            relationship_type("person", "owner_id", true),
            "RELATES_TO_PERSON_VIA_OWNER_ID"
        );
    }

    #[test]
    fn test_association_names_are_order_independent() {
        assert_eq!(
            association_rel_type("service", "employe"),
            association_rel_type("employe", "service")
        );
        assert_eq!(
            association_rel_type("employe", "service"),
            "ASSOCIATED_EMPLOYE_SERVICE"
        );
        assert_eq!(
            association_table_name("service", "employe"),
            "employe_service_association"
        );
    }

    #[test]
    fn test_fk_column_name() {
        assert_eq!(fk_column_name("person"), "person_id");
    }
}
