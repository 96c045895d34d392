//! Relational store (PostgreSQL) access.
//!
//! One pooled connection set serves introspection, streamed reads, batched
//! writes and transactional DDL. All reads are plain queries; every write
//! path runs inside an explicit transaction scoped to its table or batch,
//! so a failing batch rolls back without touching committed work.

pub mod ddl;
mod introspect;
mod tls;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_postgres::types::ToSql;
use tokio_postgres::Config as PgConfig;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, info, warn};

use crate::config::RelationalConfig;
use crate::error::{MigrateError, Result};
use crate::schema::ident::{qualify, quote_ident};
use crate::schema::{Column, Row, SqlValue, Table};
use crate::typemap::CanonicalType;

/// Pooled PostgreSQL access with schema scoping.
pub struct RelationalPool {
    pool: Pool,
    schema: String,
}

impl RelationalPool {
    /// Create a pool and verify connectivity.
    pub async fn connect(config: &RelationalConfig, max_conns: usize) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pool = match config.ssl_mode.as_str() {
            "disable" => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(max_conns)
                    .build()
                    .map_err(|e| MigrateError::pool(e, "creating PostgreSQL pool"))?
            }
            mode => {
                let tls_config = tls::build_tls_config(mode)?;
                let tls_connector = MakeRustlsConnect::new(tls_config);
                let mgr = Manager::from_config(pg_config, tls_connector, mgr_config);
                Pool::builder(mgr)
                    .max_size(max_conns)
                    .build()
                    .map_err(|e| MigrateError::pool(e, "creating PostgreSQL pool"))?
            }
        };

        let probe = Self {
            pool,
            schema: config.schema.clone(),
        };
        probe
            .ping()
            .await
            .map_err(|e| MigrateError::connection("relational store", e))?;

        info!(
            "Connected to PostgreSQL: {}:{}/{} (schema {})",
            config.host, config.port, config.database, config.schema
        );
        Ok(probe)
    }

    /// The schema this pool operates in.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Connectivity probe.
    pub async fn ping(&self) -> Result<()> {
        let client = self.client().await?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    pub(crate) async fn client(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting PostgreSQL connection"))
    }

    /// Stream a table's rows in bounded batches, ordered by primary key
    /// when one exists. The receiver yields batches until exhaustion; a
    /// read failure is delivered in-band and ends the stream.
    pub fn read_rows(&self, table: &Table, batch_size: usize) -> mpsc::Receiver<Result<Vec<Row>>> {
        let (batch_tx, batch_rx) = mpsc::channel(16);
        let pool = self.pool.clone();
        let schema = self.schema.clone();
        let table = table.clone();

        tokio::spawn(async move {
            if let Err(e) = stream_rows(pool, schema, &table, batch_size, batch_tx.clone()).await {
                let _ = batch_tx.send(Err(e)).await;
            }
        });

        batch_rx
    }

    /// Read an entire table into memory, ordered by primary key.
    pub async fn read_all(&self, table: &Table) -> Result<Vec<Row>> {
        let client = self.client().await?;
        let sql = select_sql(&self.schema, table);
        let rows = client.query(sql.as_str(), &[]).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(Row::new(table, decode_row(row, &table.columns)?)?);
        }
        Ok(out)
    }

    /// Read (key, foreign-key) value pairs for a direct edge, skipping rows
    /// whose foreign-key column is NULL.
    pub async fn read_fk_pairs(
        &self,
        table: &Table,
        key_column: &str,
        fk_column: &str,
    ) -> Result<Vec<(SqlValue, SqlValue)>> {
        let key_col = table
            .column(key_column)
            .ok_or_else(|| MigrateError::introspection(&table.name, "missing key column"))?;
        let fk_col = table
            .column(fk_column)
            .ok_or_else(|| MigrateError::introspection(&table.name, "missing fk column"))?;

        let sql = format!(
            "SELECT {}, {} FROM {} WHERE {} IS NOT NULL",
            quote_ident(key_column),
            quote_ident(fk_column),
            qualify(&self.schema, &table.name),
            quote_ident(fk_column),
        );

        let client = self.client().await?;
        let rows = client.query(sql.as_str(), &[]).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let key = decode_value(row, 0, &key_col.ty)?;
            let fk = decode_value(row, 1, &fk_col.ty)?;
            out.push((key, fk));
        }
        Ok(out)
    }

    /// Insert one batch of rows inside its own transaction. A failure rolls
    /// the batch back and surfaces as a `Write` error for the table.
    pub async fn insert_batch(
        &self,
        table: &str,
        cols: &[String],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut client = self.client().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| MigrateError::write(table, e))?;

        let (sql, params) = ddl::build_insert_sql(&self.schema, table, cols, rows);
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let n = tx
            .execute(sql.as_str(), &refs)
            .await
            .map_err(|e| MigrateError::write(table, e))?;
        tx.commit().await.map_err(|e| MigrateError::write(table, e))?;

        debug!("Inserted {} rows into {}", n, table);
        Ok(n)
    }

    /// Populate a foreign-key column from (pk, fk) value pairs in one
    /// transaction.
    pub async fn update_fk_batch(
        &self,
        table: &str,
        fk_column: &str,
        pk_column: &str,
        pairs: &[(SqlValue, SqlValue)],
    ) -> Result<u64> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let mut client = self.client().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| MigrateError::write(table, e))?;

        let mut updated = 0u64;
        for (pk_value, fk_value) in pairs {
            let (sql, params) =
                ddl::update_fk_sql(&self.schema, table, fk_column, pk_column, fk_value, pk_value);
            let refs: Vec<&(dyn ToSql + Sync)> = params
                .iter()
                .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                .collect();
            updated += tx
                .execute(sql.as_str(), &refs)
                .await
                .map_err(|e| MigrateError::write(table, e))?;
        }
        tx.commit().await.map_err(|e| MigrateError::write(table, e))?;
        Ok(updated)
    }

    /// Execute DDL statements in one transaction scoped to `scope`.
    pub async fn execute_ddl(&self, scope: &str, statements: &[String]) -> Result<()> {
        let mut client = self.client().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| MigrateError::write(scope, e))?;
        for statement in statements {
            tx.batch_execute(statement)
                .await
                .map_err(|e| MigrateError::write(scope, format!("{}: {}", statement, e)))?;
        }
        tx.commit().await.map_err(|e| MigrateError::write(scope, e))?;
        Ok(())
    }

    /// Drop every table in the pool's schema. The importer owns its target
    /// schema, so this is its clean-slate step before recreating tables.
    pub async fn drop_all_tables(&self) -> Result<Vec<String>> {
        let tables = self.list_tables().await?;
        if tables.is_empty() {
            return Ok(tables);
        }
        let statements: Vec<String> = tables
            .iter()
            .map(|t| ddl::drop_table_sql(&self.schema, t))
            .collect();
        self.execute_ddl("clean slate", &statements).await?;
        info!("Dropped {} prior tables from {}", tables.len(), self.schema);
        Ok(tables)
    }

    /// Exact row count (the introspected count is an estimate).
    pub async fn exact_row_count(&self, table: &str) -> Result<i64> {
        let client = self.client().await?;
        let sql = format!("SELECT COUNT(*) FROM {}", qualify(&self.schema, table));
        let row = client.query_one(sql.as_str(), &[]).await?;
        Ok(row.get::<_, i64>(0))
    }
}

fn select_sql(schema: &str, table: &Table) -> String {
    let cols: Vec<String> = table.columns.iter().map(|c| quote_ident(&c.name)).collect();
    let pk = table.pk_names();
    let order = if pk.is_empty() {
        String::new()
    } else {
        let cols: Vec<String> = pk.iter().map(|c| quote_ident(c)).collect();
        format!(" ORDER BY {}", cols.join(", "))
    };
    format!(
        "SELECT {} FROM {}{}",
        cols.join(", "),
        qualify(schema, &table.name),
        order
    )
}

async fn stream_rows(
    pool: Pool,
    schema: String,
    table: &Table,
    batch_size: usize,
    batch_tx: mpsc::Sender<Result<Vec<Row>>>,
) -> Result<()> {
    let client = pool
        .get()
        .await
        .map_err(|e| MigrateError::pool(e, "getting connection for row stream"))?;

    let sql = select_sql(&schema, table);
    let params: Vec<&(dyn ToSql + Sync)> = Vec::new();
    let stream = client
        .query_raw(sql.as_str(), params)
        .await
        .map_err(|e| MigrateError::introspection(&table.name, e))?;
    tokio::pin!(stream);

    let mut batch = Vec::with_capacity(batch_size);
    while let Some(item) = stream.next().await {
        let pg_row = item.map_err(|e| MigrateError::write(&table.name, e))?;
        batch.push(Row::new(table, decode_row(&pg_row, &table.columns)?)?);
        if batch.len() >= batch_size {
            if batch_tx.send(Ok(std::mem::take(&mut batch))).await.is_err() {
                return Ok(());
            }
            batch = Vec::with_capacity(batch_size);
        }
    }

    if !batch.is_empty() {
        let _ = batch_tx.send(Ok(batch)).await;
    }
    Ok(())
}

/// Decode one wire row into values, driven by the canonical column types.
pub(crate) fn decode_row(row: &tokio_postgres::Row, columns: &[Column]) -> Result<Vec<SqlValue>> {
    let mut out = Vec::with_capacity(columns.len());
    for (idx, col) in columns.iter().enumerate() {
        out.push(decode_value(row, idx, &col.ty)?);
    }
    Ok(out)
}

fn decode_value(row: &tokio_postgres::Row, idx: usize, ty: &CanonicalType) -> Result<SqlValue> {
    let value = match ty {
        CanonicalType::Boolean => row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::Bool),
        CanonicalType::Int16 => row.try_get::<_, Option<i16>>(idx)?.map(SqlValue::I16),
        CanonicalType::Int32 => row.try_get::<_, Option<i32>>(idx)?.map(SqlValue::I32),
        CanonicalType::Int64 => row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::I64),
        CanonicalType::Float32 => row.try_get::<_, Option<f32>>(idx)?.map(SqlValue::F32),
        CanonicalType::Float64 => row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::F64),
        CanonicalType::Decimal { .. } => row
            .try_get::<_, Option<rust_decimal::Decimal>>(idx)?
            .map(SqlValue::Decimal),
        CanonicalType::Char(_) | CanonicalType::Varchar(_) | CanonicalType::Text => {
            row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text)
        }
        CanonicalType::Date => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)?
            .map(SqlValue::Date),
        CanonicalType::Time => row
            .try_get::<_, Option<chrono::NaiveTime>>(idx)?
            .map(SqlValue::Time),
        CanonicalType::DateTime => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)?
            .map(SqlValue::DateTime),
        CanonicalType::DateTimeTz => row
            .try_get::<_, Option<chrono::DateTime<chrono::FixedOffset>>>(idx)?
            .map(SqlValue::DateTimeTz),
        CanonicalType::Blob => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(SqlValue::Bytes),
        CanonicalType::Uuid => row.try_get::<_, Option<uuid::Uuid>>(idx)?.map(SqlValue::Uuid),
        CanonicalType::Json => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(SqlValue::Json),
    };
    Ok(value.unwrap_or_else(|| SqlValue::null_for(ty)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_sql_orders_by_pk() {
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
                ty: CanonicalType::Text,
                is_nullable: true,
                pk_ordinal: 0,
                default: None,
            },
        ];
        assert_eq!(
            select_sql("public", &t),
            "SELECT \"id\", \"name\" FROM \"public\".\"person\" ORDER BY \"id\""
        );
    }

    #[test]
    fn test_select_sql_without_pk() {
        let mut t = Table::new("log");
        t.columns = vec![Column {
            name: "line".into(),
            ty: CanonicalType::Text,
            is_nullable: true,
            pk_ordinal: 0,
            default: None,
        }];
        assert_eq!(select_sql("public", &t), "SELECT \"line\" FROM \"public\".\"log\"");
    }
}
