//! Schema metadata types shared by both migration directions.
//!
//! These are constructed once per introspection pass (or synthesized by the
//! importer from graph metadata) and read-only afterward.

pub mod ident;
pub mod row;
pub mod value;

pub use row::Row;
pub use value::{SqlValue, SqlNullType};

use serde::{Deserialize, Serialize};

use crate::typemap::CanonicalType;

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Canonical type (native type resolved through the type mapper).
    pub ty: CanonicalType,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Position within the primary key: 0 when not part of it, 1-based
    /// ordinal otherwise.
    pub pk_ordinal: i32,

    /// Column default expression, verbatim from the source.
    pub default: Option<String>,
}

impl Column {
    /// Whether the column participates in the primary key.
    pub fn is_pk(&self) -> bool {
        self.pk_ordinal > 0
    }
}

/// Foreign key metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,

    /// Referencing column names (in key order).
    pub columns: Vec<String>,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column names (in key order).
    pub ref_columns: Vec<String>,

    /// ON DELETE action (NO_ACTION, RESTRICT, CASCADE, SET_NULL, SET_DEFAULT).
    pub on_delete: String,

    /// ON UPDATE action.
    pub on_update: String,
}

impl ForeignKey {
    /// Whether the key spans more than one column. The graph mapping only
    /// expresses single-column keys; composite ones are reported as an
    /// unsupported shape.
    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }

    /// The referencing column (single-column keys only).
    pub fn column(&self) -> &str {
        &self.columns[0]
    }

    /// The referenced column (single-column keys only).
    pub fn ref_column(&self) -> &str {
        &self.ref_columns[0]
    }
}

/// Index metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,

    /// Indexed column names.
    pub columns: Vec<String>,

    /// Whether the index is unique.
    pub is_unique: bool,
}

/// Check constraint metadata. Detected and reported only; neither target
/// model can express the other's check expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConstraint {
    /// Constraint name.
    pub name: String,

    /// Constraint definition (SQL expression).
    pub definition: String,
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name (unique within the migrated schema).
    pub name: String,

    /// Column definitions in ordinal order.
    pub columns: Vec<Column>,

    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKey>,

    /// Indexes (primary key index excluded).
    pub indexes: Vec<Index>,

    /// Check constraints.
    pub check_constraints: Vec<CheckConstraint>,

    /// User trigger names. Detected for reporting only; the graph model
    /// cannot express them.
    pub triggers: Vec<String>,

    /// Approximate row count from source statistics.
    pub row_count: i64,
}

impl Table {
    /// Create an empty table shell to be filled by introspection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
            check_constraints: Vec::new(),
            triggers: Vec::new(),
            row_count: 0,
        }
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary key columns ordered by their key ordinal.
    pub fn primary_key(&self) -> Vec<&Column> {
        let mut pk: Vec<&Column> = self.columns.iter().filter(|c| c.is_pk()).collect();
        pk.sort_by_key(|c| c.pk_ordinal);
        pk
    }

    /// Primary key column names ordered by their key ordinal.
    pub fn pk_names(&self) -> Vec<String> {
        self.primary_key().iter().map(|c| c.name.clone()).collect()
    }

    /// Whether the table has a primary key.
    pub fn has_pk(&self) -> bool {
        self.columns.iter().any(|c| c.is_pk())
    }

    /// Column names in ordinal order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}
