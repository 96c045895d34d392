//! Constraint translation between the two constraint systems.
//!
//! The relational side has a richer constraint vocabulary than the graph
//! side can express. This module turns the expressible part into declarative
//! graph constraints (as Cypher statements) and enumerates everything else
//! in an explicit unsupported report; nothing is dropped without a trace.
//!
//! Translation is pure; executing the statements (and tolerating store
//! editions that reject some of them) is the exporter's job.

use serde::{Deserialize, Serialize};

use crate::schema::ident::cypher_ident;
use crate::schema::Table;

/// Kind of constraint emitted on the graph side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphConstraintKind {
    /// Property (or property tuple) must be unique per label.
    Uniqueness,
    /// Property must exist on every node of the label.
    Existence,
}

/// One translated constraint, ready to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConstraint {
    /// Constraint name on the graph side.
    pub name: String,
    pub kind: GraphConstraintKind,
    /// The statement creating it.
    pub cypher: String,
}

/// A source construct with no graph equivalent, kept for the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsupportedConstraint {
    pub table: String,
    /// Construct kind: check, default, autoincrement, nullable_foreign_key,
    /// composite_foreign_key, non_unique_index, trigger.
    pub kind: String,
    pub detail: String,
}

/// Result of translating one table's constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintTranslation {
    pub constraints: Vec<GraphConstraint>,
    pub unsupported: Vec<UnsupportedConstraint>,
}

fn uniqueness(name: String, label: &str, columns: &[&str]) -> GraphConstraint {
    let props: Vec<String> = columns
        .iter()
        .map(|c| format!("n.{}", cypher_ident(c)))
        .collect();
    let require = if props.len() == 1 {
        props[0].clone()
    } else {
        format!("({})", props.join(", "))
    };
    GraphConstraint {
        cypher: format!(
            "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE {} IS UNIQUE",
            name,
            cypher_ident(label),
            require
        ),
        name,
        kind: GraphConstraintKind::Uniqueness,
    }
}

fn existence(name: String, label: &str, column: &str) -> GraphConstraint {
    GraphConstraint {
        cypher: format!(
            "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS NOT NULL",
            name,
            cypher_ident(label),
            cypher_ident(column)
        ),
        name,
        kind: GraphConstraintKind::Existence,
    }
}

/// Translate one entity table's constraints to the graph model.
pub fn translate_table(table: &Table, create_indexes: bool) -> ConstraintTranslation {
    let mut out = ConstraintTranslation::default();
    let label = table.name.as_str();

    // Primary key: exactly one uniqueness constraint per PK.
    let pk = table.pk_names();
    if !pk.is_empty() {
        let cols: Vec<&str> = pk.iter().map(String::as_str).collect();
        out.constraints
            .push(uniqueness(format!("{}_pk", label), label, &cols));
    }

    // Foreign keys: existence on the referencing column. The graph side has
    // no referential integrity, so presence of the key value is the closest
    // expressible guarantee, and only when the source column forbids NULL.
    for fk in &table.foreign_keys {
        if fk.is_composite() {
            out.unsupported.push(UnsupportedConstraint {
                table: table.name.clone(),
                kind: "composite_foreign_key".into(),
                detail: fk.name.clone(),
            });
            continue;
        }
        let col = fk.column();
        let nullable = table.column(col).map(|c| c.is_nullable).unwrap_or(true);
        if nullable {
            out.unsupported.push(UnsupportedConstraint {
                table: table.name.clone(),
                kind: "nullable_foreign_key".into(),
                detail: format!("{} ({})", fk.name, col),
            });
        } else {
            out.constraints
                .push(existence(format!("{}_fk_{}", label, col), label, col));
        }
    }

    // Plain NOT NULL columns (PK and FK columns are already covered above).
    let fk_cols: Vec<&str> = table
        .foreign_keys
        .iter()
        .filter(|fk| !fk.is_composite())
        .map(|fk| fk.column())
        .collect();
    for col in &table.columns {
        if !col.is_nullable && !col.is_pk() && !fk_cols.contains(&col.name.as_str()) {
            out.constraints.push(existence(
                format!("{}_nn_{}", label, col.name),
                label,
                &col.name,
            ));
        }
    }

    // Indexes: unique ones become uniqueness constraints, the rest have no
    // equivalent worth carrying.
    for idx in &table.indexes {
        if idx.is_unique && create_indexes {
            let cols: Vec<&str> = idx.columns.iter().map(String::as_str).collect();
            out.constraints.push(uniqueness(
                format!("{}_uq_{}", label, idx.columns.join("_")),
                label,
                &cols,
            ));
        } else if !idx.is_unique {
            out.unsupported.push(UnsupportedConstraint {
                table: table.name.clone(),
                kind: "non_unique_index".into(),
                detail: idx.name.clone(),
            });
        }
    }

    // Everything below is detected for the report and intentionally dropped.
    for chk in &table.check_constraints {
        out.unsupported.push(UnsupportedConstraint {
            table: table.name.clone(),
            kind: "check".into(),
            detail: format!("{}: {}", chk.name, chk.definition),
        });
    }
    for col in &table.columns {
        if let Some(default) = &col.default {
            let kind = if default.contains("nextval(") {
                "autoincrement"
            } else {
                "default"
            };
            out.unsupported.push(UnsupportedConstraint {
                table: table.name.clone(),
                kind: kind.into(),
                detail: format!("{} DEFAULT {}", col.name, default),
            });
        }
    }
    for trigger in &table.triggers {
        out.unsupported.push(UnsupportedConstraint {
            table: table.name.clone(),
            kind: "trigger".into(),
            detail: trigger.clone(),
        });
    }

    out
}
