//! Schema introspection against information_schema / pg_catalog.
//!
//! Read-only. Failures carry the table name so a single bad table can be
//! skipped without aborting the pass. Native column types go through the
//! type mapper immediately; the rest of the engine only ever sees
//! canonical types.

use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::schema::{CheckConstraint, Column, ForeignKey, Index, Table};
use crate::typemap::CanonicalType;

use super::RelationalPool;

impl RelationalPool {
    /// Base table names in the pool's schema, alphabetically.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let client = self.client().await?;
        let query = r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_type = 'BASE TABLE'
              AND table_schema = $1
            ORDER BY table_name
        "#;
        let rows = client.query(query, &[&self.schema()]).await?;
        Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
    }

    /// Introspect every table in the schema. Tables that fail to
    /// introspect are logged and skipped; the pass itself only fails when
    /// the store is unreachable.
    pub async fn extract_schema(&self) -> Result<Vec<Table>> {
        let names = self.list_tables().await?;
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            match self.introspect_table(&name).await {
                Ok(table) => tables.push(table),
                Err(e) => warn!("Skipping table {}: {}", name, e),
            }
        }
        info!(
            "Extracted {} tables from schema '{}'",
            tables.len(),
            self.schema()
        );
        Ok(tables)
    }

    /// Introspect a single table: ordered columns, primary key, foreign
    /// keys, indexes, check constraints and trigger names.
    pub async fn introspect_table(&self, name: &str) -> Result<Table> {
        let client = self.client().await?;
        let exists = client
            .query(
                "SELECT 1 FROM information_schema.tables
                 WHERE table_schema = $1 AND table_name = $2 AND table_type = 'BASE TABLE'",
                &[&self.schema(), &name],
            )
            .await
            .map_err(|e| MigrateError::introspection(name, e))?;
        if exists.is_empty() {
            return Err(MigrateError::introspection(name, "table does not exist"));
        }
        drop(client);

        let mut table = Table::new(name);
        self.load_columns(&mut table).await?;
        self.load_primary_key(&mut table).await?;
        self.load_row_estimate(&mut table).await?;
        self.load_foreign_keys(&mut table).await?;
        self.load_indexes(&mut table).await?;
        self.load_check_constraints(&mut table).await?;
        self.load_triggers(&mut table).await?;
        Ok(table)
    }

    async fn load_columns(&self, table: &mut Table) -> Result<()> {
        let client = self.client().await?;
        let query = r#"
            SELECT
                column_name,
                udt_name,
                COALESCE(character_maximum_length, 0)::int4,
                COALESCE(numeric_precision, 0)::int4,
                COALESCE(numeric_scale, 0)::int4,
                CASE WHEN is_nullable = 'YES' THEN true ELSE false END,
                column_default
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let rows = client
            .query(query, &[&self.schema(), &table.name])
            .await
            .map_err(|e| MigrateError::introspection(&table.name, e))?;

        for row in rows {
            let native: String = row.get(1);
            let col = Column {
                name: row.get::<_, String>(0),
                ty: CanonicalType::from_sql(
                    &native,
                    row.get::<_, i32>(2),
                    row.get::<_, i32>(3),
                    row.get::<_, i32>(4),
                ),
                is_nullable: row.get::<_, bool>(5),
                pk_ordinal: 0,
                default: row.get::<_, Option<String>>(6),
            };
            table.columns.push(col);
        }

        if table.columns.is_empty() {
            return Err(MigrateError::introspection(&table.name, "no columns found"));
        }
        debug!("Loaded {} columns for {}", table.columns.len(), table.name);
        Ok(())
    }

    async fn load_primary_key(&self, table: &mut Table) -> Result<()> {
        let client = self.client().await?;
        let query = r#"
            SELECT a.attname, array_position(c.conkey, a.attnum)::int4
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'p'
              AND a.attnum = ANY(c.conkey)
            ORDER BY array_position(c.conkey, a.attnum)
        "#;

        let rows = client
            .query(query, &[&self.schema(), &table.name])
            .await
            .map_err(|e| MigrateError::introspection(&table.name, e))?;

        for row in rows {
            let col_name: String = row.get(0);
            let ordinal: i32 = row.get(1);
            if let Some(col) = table.columns.iter_mut().find(|c| c.name == col_name) {
                col.pk_ordinal = ordinal;
            }
        }
        debug!("Primary key for {}: {:?}", table.name, table.pk_names());
        Ok(())
    }

    async fn load_row_estimate(&self, table: &mut Table) -> Result<()> {
        let client = self.client().await?;
        let query = r#"
            SELECT COALESCE(c.reltuples, 0)::int8
            FROM pg_catalog.pg_class c
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1 AND c.relname = $2
        "#;
        let row = client
            .query_one(query, &[&self.schema(), &table.name])
            .await
            .map_err(|e| MigrateError::introspection(&table.name, e))?;
        table.row_count = row.get::<_, i64>(0);
        Ok(())
    }

    async fn load_foreign_keys(&self, table: &mut Table) -> Result<()> {
        let client = self.client().await?;
        let query = r#"
            SELECT
                c.conname AS fk_name,
                array_agg(a.attname ORDER BY array_position(c.conkey, a.attnum)) AS columns,
                rt.relname AS ref_table,
                array_agg(ra.attname ORDER BY array_position(c.confkey, ra.attnum)) AS ref_columns,
                CASE c.confdeltype
                    WHEN 'a' THEN 'NO_ACTION'
                    WHEN 'r' THEN 'RESTRICT'
                    WHEN 'c' THEN 'CASCADE'
                    WHEN 'n' THEN 'SET_NULL'
                    WHEN 'd' THEN 'SET_DEFAULT'
                    ELSE 'NO_ACTION'
                END AS on_delete,
                CASE c.confupdtype
                    WHEN 'a' THEN 'NO_ACTION'
                    WHEN 'r' THEN 'RESTRICT'
                    WHEN 'c' THEN 'CASCADE'
                    WHEN 'n' THEN 'SET_NULL'
                    WHEN 'd' THEN 'SET_DEFAULT'
                    ELSE 'NO_ACTION'
                END AS on_update
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_class rt ON rt.oid = c.confrelid
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(c.conkey)
            JOIN pg_catalog.pg_attribute ra ON ra.attrelid = rt.oid AND ra.attnum = ANY(c.confkey)
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'f'
            GROUP BY c.conname, rt.relname, c.confdeltype, c.confupdtype
            ORDER BY c.conname
        "#;

        let rows = client
            .query(query, &[&self.schema(), &table.name])
            .await
            .map_err(|e| MigrateError::introspection(&table.name, e))?;

        for row in rows {
            table.foreign_keys.push(ForeignKey {
                name: row.get(0),
                columns: row.get(1),
                ref_table: row.get(2),
                ref_columns: row.get(3),
                on_delete: row.get(4),
                on_update: row.get(5),
            });
        }
        debug!(
            "Loaded {} foreign keys for {}",
            table.foreign_keys.len(),
            table.name
        );
        Ok(())
    }

    async fn load_indexes(&self, table: &mut Table) -> Result<()> {
        let client = self.client().await?;
        let query = r#"
            SELECT
                i.relname AS index_name,
                ix.indisunique,
                array_agg(a.attname ORDER BY array_position(ix.indkey, a.attnum)) AS columns
            FROM pg_catalog.pg_index ix
            JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
            JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
            WHERE n.nspname = $1
              AND t.relname = $2
              AND NOT ix.indisprimary
            GROUP BY i.relname, ix.indisunique
            ORDER BY i.relname
        "#;

        let rows = client
            .query(query, &[&self.schema(), &table.name])
            .await
            .map_err(|e| MigrateError::introspection(&table.name, e))?;

        for row in rows {
            table.indexes.push(Index {
                name: row.get(0),
                is_unique: row.get(1),
                columns: row.get(2),
            });
        }
        Ok(())
    }

    async fn load_check_constraints(&self, table: &mut Table) -> Result<()> {
        let client = self.client().await?;
        let query = r#"
            SELECT c.conname, pg_get_constraintdef(c.oid)
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            WHERE n.nspname = $1 AND t.relname = $2 AND c.contype = 'c'
            ORDER BY c.conname
        "#;

        let rows = client
            .query(query, &[&self.schema(), &table.name])
            .await
            .map_err(|e| MigrateError::introspection(&table.name, e))?;

        for row in rows {
            table.check_constraints.push(CheckConstraint {
                name: row.get(0),
                definition: row.get(1),
            });
        }
        Ok(())
    }

    async fn load_triggers(&self, table: &mut Table) -> Result<()> {
        let client = self.client().await?;
        let query = r#"
            SELECT t.tgname
            FROM pg_catalog.pg_trigger t
            JOIN pg_catalog.pg_class c ON c.oid = t.tgrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1 AND c.relname = $2 AND NOT t.tgisinternal
            ORDER BY t.tgname
        "#;

        let rows = client
            .query(query, &[&self.schema(), &table.name])
            .await
            .map_err(|e| MigrateError::introspection(&table.name, e))?;

        for row in rows {
            table.triggers.push(row.get::<_, String>(0));
        }
        Ok(())
    }
}
