//! SQL statement builders for the relational side.
//!
//! Pure string/parameter construction, kept separate from connection
//! handling so the generated SQL is unit-testable.

use tokio_postgres::types::ToSql;

use crate::schema::ident::{qualify, quote_ident};
use crate::schema::{SqlValue, Table};
use crate::typemap::CanonicalType;

/// CREATE TABLE for a synthesized table definition.
///
/// Only columns, NOT NULL markers and the primary key are rendered;
/// defaults and other source-side decorations are not reconstructible from
/// graph metadata.
pub fn create_table_sql(schema: &str, table: &Table) -> String {
    let mut parts: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let null_clause = if c.is_nullable { "" } else { " NOT NULL" };
            format!("{} {}{}", quote_ident(&c.name), c.ty.pg_type(), null_clause)
        })
        .collect();

    let pk = table.pk_names();
    if !pk.is_empty() {
        let cols: Vec<String> = pk.iter().map(|c| quote_ident(c)).collect();
        parts.push(format!("PRIMARY KEY ({})", cols.join(", ")));
    }

    format!(
        "CREATE TABLE {} (\n    {}\n)",
        qualify(schema, &table.name),
        parts.join(",\n    ")
    )
}

/// CREATE TABLE for a synthesized association table: two key columns,
/// composite primary key, cascading foreign keys to both sides.
#[allow(clippy::too_many_arguments)]
pub fn create_association_table_sql(
    schema: &str,
    name: &str,
    a_column: &str,
    a_type: &CanonicalType,
    a_table: &str,
    a_ref: &str,
    b_column: &str,
    b_type: &CanonicalType,
    b_table: &str,
    b_ref: &str,
) -> String {
    format!(
        "CREATE TABLE {} (\n    {} {} NOT NULL,\n    {} {} NOT NULL,\n    PRIMARY KEY ({}, {}),\n    FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE,\n    FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE\n)",
        qualify(schema, name),
        quote_ident(a_column),
        a_type.pg_type(),
        quote_ident(b_column),
        b_type.pg_type(),
        quote_ident(a_column),
        quote_ident(b_column),
        quote_ident(a_column),
        qualify(schema, a_table),
        quote_ident(a_ref),
        quote_ident(b_column),
        qualify(schema, b_table),
        quote_ident(b_ref),
    )
}

/// DROP TABLE IF EXISTS ... CASCADE.
pub fn drop_table_sql(schema: &str, table: &str) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE", qualify(schema, table))
}

/// ALTER TABLE ... ADD COLUMN.
pub fn add_column_sql(schema: &str, table: &str, column: &str, ty: &CanonicalType) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        qualify(schema, table),
        quote_ident(column),
        ty.pg_type()
    )
}

/// ALTER TABLE ... ADD FOREIGN KEY.
pub fn add_foreign_key_sql(
    schema: &str,
    table: &str,
    constraint: &str,
    column: &str,
    ref_table: &str,
    ref_column: &str,
) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        qualify(schema, table),
        quote_ident(constraint),
        quote_ident(column),
        qualify(schema, ref_table),
        quote_ident(ref_column),
    )
}

/// Multi-row INSERT with stringified parameters and explicit casts.
pub fn build_insert_sql(
    schema: &str,
    table: &str,
    cols: &[String],
    rows: &[Vec<SqlValue>],
) -> (String, Vec<Box<dyn ToSql + Sync + Send>>) {
    let col_list: String = cols
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut placeholders = Vec::new();
    let mut params: Vec<Box<dyn ToSql + Sync + Send>> = Vec::new();
    let mut idx = 1;

    // Column casts come from the first row; all rows share one shape.
    let col_casts: Vec<&'static str> = rows
        .first()
        .map(|first| first.iter().map(|v| v.sql_cast()).collect())
        .unwrap_or_default();

    for row in rows {
        let row_placeholders: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(col_idx, value)| {
                let p = format!("${}", idx);
                idx += 1;
                let cast = col_casts
                    .get(col_idx)
                    .copied()
                    .unwrap_or_else(|| value.sql_cast());
                format!("{}{}", p, cast)
            })
            .collect();
        placeholders.push(format!("({})", row_placeholders.join(", ")));

        for value in row {
            params.push(value.to_param());
        }
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualify(schema, table),
        col_list,
        placeholders.join(", ")
    );

    (sql, params)
}

/// Single-row UPDATE setting a foreign-key column by primary key.
pub fn update_fk_sql(
    schema: &str,
    table: &str,
    fk_column: &str,
    pk_column: &str,
    fk_value: &SqlValue,
    pk_value: &SqlValue,
) -> (String, Vec<Box<dyn ToSql + Sync + Send>>) {
    let sql = format!(
        "UPDATE {} SET {} = $1{} WHERE {} = $2{}",
        qualify(schema, table),
        quote_ident(fk_column),
        fk_value.sql_cast(),
        quote_ident(pk_column),
        pk_value.sql_cast(),
    );
    (sql, vec![fk_value.to_param(), pk_value.to_param()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    fn col(name: &str, ty: CanonicalType, pk: i32, nullable: bool) -> Column {
        Column {
            name: name.into(),
            ty,
            is_nullable: nullable,
            pk_ordinal: pk,
            default: None,
        }
    }

    #[test]
    fn test_create_table_sql() {
        let mut t = Table::new("person");
        t.columns = vec![
            col("id", CanonicalType::Int64, 1, false),
            col("name", CanonicalType::Varchar(40), 0, true),
        ];
        let sql = create_table_sql("public", &t);
        assert!(sql.starts_with("CREATE TABLE \"public\".\"person\""));
        assert!(sql.contains("\"id\" bigint NOT NULL"));
        assert!(sql.contains("\"name\" varchar(40)"));
        assert!(sql.contains("PRIMARY KEY (\"id\")"));
    }

    #[test]
    fn test_create_association_table_sql() {
        let sql = create_association_table_sql(
            "public",
            "employe_service_association",
            "employe_id",
            &CanonicalType::Int64,
            "employe",
            "id",
            "service_id",
            &CanonicalType::Int64,
            "service",
            "id",
        );
        assert!(sql.contains("PRIMARY KEY (\"employe_id\", \"service_id\")"));
        assert!(sql.contains(
            "FOREIGN KEY (\"employe_id\") REFERENCES \"public\".\"employe\" (\"id\") ON DELETE CASCADE"
        ));
        assert!(sql.contains(
            "FOREIGN KEY (\"service_id\") REFERENCES \"public\".\"service\" (\"id\") ON DELETE CASCADE"
        ));
    }

    #[test]
    fn test_insert_sql_placeholders_and_casts() {
        let rows = vec![
            vec![SqlValue::I64(1), SqlValue::Text("ada".into())],
            vec![SqlValue::I64(2), SqlValue::Text("bob".into())],
        ];
        let (sql, params) =
            build_insert_sql("public", "person", &["id".into(), "name".into()], &rows);
        assert_eq!(
            sql,
            "INSERT INTO \"public\".\"person\" (\"id\", \"name\") VALUES ($1::int8, $2), ($3::int8, $4)"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_update_fk_sql() {
        let (sql, params) = update_fk_sql(
            "public",
            "car",
            "person_id",
            "id",
            &SqlValue::I64(7),
            &SqlValue::I64(3),
        );
        assert_eq!(
            sql,
            "UPDATE \"public\".\"car\" SET \"person_id\" = $1::int8 WHERE \"id\" = $2::int8"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_drop_and_alter() {
        assert_eq!(
            drop_table_sql("public", "old"),
            "DROP TABLE IF EXISTS \"public\".\"old\" CASCADE"
        );
        assert_eq!(
            add_column_sql("public", "car", "person_id", &CanonicalType::Int64),
            "ALTER TABLE \"public\".\"car\" ADD COLUMN \"person_id\" bigint"
        );
        assert_eq!(
            add_foreign_key_sql("public", "car", "car_person_id_fkey", "person_id", "person", "id"),
            "ALTER TABLE \"public\".\"car\" ADD CONSTRAINT \"car_person_id_fkey\" FOREIGN KEY (\"person_id\") REFERENCES \"public\".\"person\" (\"id\")"
        );
    }
}
