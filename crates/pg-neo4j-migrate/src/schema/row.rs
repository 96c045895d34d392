//! Typed row abstraction.
//!
//! A `Row` is an ordered list of values validated against the owning
//! table's column list at construction time, replacing free-form
//! name→value dictionaries with a checked structure.

use crate::error::{MigrateError, Result};
use crate::schema::{SqlValue, Table};

/// One table row, positionally aligned with the table's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<SqlValue>,
}

impl Row {
    /// Build a row for `table`, checking arity and per-column type
    /// conformance.
    pub fn new(table: &Table, values: Vec<SqlValue>) -> Result<Self> {
        if values.len() != table.columns.len() {
            return Err(MigrateError::write(
                &table.name,
                format!(
                    "row has {} values but table has {} columns",
                    values.len(),
                    table.columns.len()
                ),
            ));
        }
        for (col, value) in table.columns.iter().zip(&values) {
            if !value.conforms_to(&col.ty) {
                return Err(MigrateError::write(
                    &table.name,
                    format!(
                        "value {:?} does not fit column {} ({})",
                        value,
                        col.name,
                        col.ty.tag()
                    ),
                ));
            }
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    /// Value of the named column, if the table has it.
    pub fn value_for<'a>(&'a self, table: &Table, column: &str) -> Option<&'a SqlValue> {
        let idx = table.columns.iter().position(|c| c.name == column)?;
        self.values.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use crate::typemap::CanonicalType;

    fn table() -> Table {
        let mut t = Table::new("person");
        t.columns = vec![
            Column {
                name: "id".into(),
                ty: CanonicalType::Int64,
                is_nullable: false,
                pk_ordinal: 1,
                default: None,
            },
            Column {
                name: "name".into(),
                ty: CanonicalType::Varchar(40),
                is_nullable: true,
                pk_ordinal: 0,
                default: None,
            },
        ];
        t
    }

    #[test]
    fn test_valid_row() {
        let t = table();
        let row = Row::new(&t, vec![SqlValue::I64(1), SqlValue::Text("ada".into())]).unwrap();
        assert_eq!(
            row.value_for(&t, "name"),
            Some(&SqlValue::Text("ada".into()))
        );
    }

    #[test]
    fn test_arity_mismatch_rejected() {
        let t = table();
        assert!(Row::new(&t, vec![SqlValue::I64(1)]).is_err());
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let t = table();
        let bad = Row::new(&t, vec![SqlValue::Bool(true), SqlValue::Text("x".into())]);
        assert!(bad.is_err());
    }
}
