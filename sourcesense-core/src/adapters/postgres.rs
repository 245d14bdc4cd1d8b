//! PostgreSQL catalog adapter.
//!
//! Reads `pg_catalog` directly rather than `information_schema`, which hides
//! objects the login role does not own and renders types less precisely.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use super::CatalogAdapter;
use super::helpers::{RowExt, non_negative};
use crate::Result;
use crate::error::SourceSenseError;
use crate::models::{ColumnInfo, ConnectionDescriptor, DatabaseKind, ForeignKeyInfo, IndexInfo};

/// PostgreSQL adapter holding a single-connection pool.
pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    /// Connects using the descriptor's host, port, database and credentials.
    ///
    /// Every session is forced read-only.
    ///
    /// # Errors
    /// Returns a connection error if the server is unreachable or rejects the
    /// login.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        let mut options = PgConnectOptions::new()
            .host(&descriptor.host)
            .database(&descriptor.database)
            .application_name("sourcesense");
        if let Some(port) = descriptor.effective_port() {
            options = options.port(port);
        }
        if !descriptor.username.is_empty() {
            options = options.username(&descriptor.username);
        }
        if descriptor.has_password() {
            options = options.password(descriptor.password());
        }

        Self::connect_with(options).await
    }

    /// Opens a pool from explicit connect options.
    pub async fn connect_with(options: PgConnectOptions) -> Result<Self> {
        use sqlx::Executor;

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET default_transaction_read_only = on").await?;
                    conn.execute("SET lock_timeout = '30s'").await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await
            .map_err(SourceSenseError::connection_failed)?;

        tracing::debug!("Opened PostgreSQL connection");
        Ok(Self { pool })
    }

    async fn fetch_rows(
        &self,
        sql: &str,
        schema: &str,
        table: &str,
        facet: &str,
    ) -> Result<Vec<sqlx::postgres::PgRow>> {
        sqlx::query(sql)
            .bind(schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                SourceSenseError::introspection_failed(
                    format!("Failed to collect {} for table '{}.{}'", facet, schema, table),
                    e,
                )
            })
    }
}

#[async_trait]
impl CatalogAdapter for PostgresAdapter {
    fn database_kind(&self) -> DatabaseKind {
        DatabaseKind::PostgreSql
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(SourceSenseError::connection_failed)?;
        Ok(())
    }

    async fn schema_names(&self) -> Result<Vec<String>> {
        let query = r#"
            SELECT nspname::text AS schema_name
            FROM pg_catalog.pg_namespace
            WHERE nspname NOT LIKE 'pg\_%'
            AND nspname <> 'information_schema'
            ORDER BY nspname
        "#;

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SourceSenseError::introspection_failed("Failed to enumerate schemas", e))?;

        rows.iter()
            .map(|row| row.get_field("schema_name", None))
            .collect()
    }

    async fn table_names(&self, schema: &str) -> Result<Vec<String>> {
        let query = r#"
            SELECT c.relname::text AS table_name
            FROM pg_catalog.pg_class c
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1
            AND c.relkind IN ('r', 'p')
            AND NOT c.relispartition
            ORDER BY c.relname
        "#;

        let rows = sqlx::query(query)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                SourceSenseError::introspection_failed(
                    format!("Failed to enumerate tables in schema '{}'", schema),
                    e,
                )
            })?;

        rows.iter()
            .map(|row| row.get_field("table_name", None))
            .collect()
    }

    async fn columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        let query = r#"
            SELECT
                a.attname::text AS column_name,
                pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
                NOT a.attnotnull AS nullable,
                pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS column_default,
                pg_catalog.col_description(a.attrelid, a.attnum) AS column_comment
            FROM pg_catalog.pg_attribute a
            JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            LEFT JOIN pg_catalog.pg_attrdef d
                ON d.adrelid = a.attrelid AND d.adnum = a.attnum
            WHERE n.nspname = $1
            AND c.relname = $2
            AND a.attnum > 0
            AND NOT a.attisdropped
            ORDER BY a.attnum
        "#;

        let context = format!("{}.{}", schema, table);
        let rows = self.fetch_rows(query, schema, table, "columns").await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            columns.push(ColumnInfo {
                column_name: row.get_field("column_name", Some(&context))?,
                data_type: row.get_field("data_type", Some(&context))?,
                nullable: row.get_field("nullable", Some(&context))?,
                default: row.get_field("column_default", Some(&context))?,
                comment: row.get_field("column_comment", Some(&context))?,
            });
        }
        Ok(columns)
    }

    async fn primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let query = r#"
            SELECT a.attname::text AS column_name
            FROM pg_catalog.pg_constraint con
            JOIN pg_catalog.pg_class c ON c.oid = con.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            CROSS JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
            JOIN pg_catalog.pg_attribute a
                ON a.attrelid = con.conrelid AND a.attnum = k.attnum
            WHERE con.contype = 'p'
            AND n.nspname = $1
            AND c.relname = $2
            ORDER BY k.ord
        "#;

        let context = format!("{}.{}", schema, table);
        let rows = self.fetch_rows(query, schema, table, "primary key").await?;

        rows.iter()
            .map(|row| row.get_field("column_name", Some(&context)))
            .collect()
    }

    async fn foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let query = r#"
            SELECT
                con.conname::text AS constraint_name,
                a.attname::text AS column_name,
                fns.nspname::text AS referred_schema,
                fcl.relname::text AS referred_table,
                fa.attname::text AS referred_column
            FROM pg_catalog.pg_constraint con
            JOIN pg_catalog.pg_class cl ON con.conrelid = cl.oid
            JOIN pg_catalog.pg_namespace ns ON cl.relnamespace = ns.oid
            JOIN pg_catalog.pg_class fcl ON con.confrelid = fcl.oid
            JOIN pg_catalog.pg_namespace fns ON fcl.relnamespace = fns.oid
            CROSS JOIN LATERAL unnest(con.conkey, con.confkey)
                WITH ORDINALITY AS k(attnum, fattnum, ord)
            JOIN pg_catalog.pg_attribute a
                ON a.attrelid = con.conrelid AND a.attnum = k.attnum
            JOIN pg_catalog.pg_attribute fa
                ON fa.attrelid = con.confrelid AND fa.attnum = k.fattnum
            WHERE con.contype = 'f'
            AND ns.nspname = $1
            AND cl.relname = $2
            ORDER BY con.conname, k.ord
        "#;

        let context = format!("{}.{}", schema, table);
        let rows = self.fetch_rows(query, schema, table, "foreign keys").await?;

        // Rows arrive grouped by constraint name
        let mut foreign_keys: Vec<ForeignKeyInfo> = Vec::new();
        for row in &rows {
            let name: String = row.get_field("constraint_name", Some(&context))?;
            let column: String = row.get_field("column_name", Some(&context))?;
            let referred_column: String = row.get_field("referred_column", Some(&context))?;

            match foreign_keys.last_mut() {
                Some(fk) if fk.name.as_deref() == Some(name.as_str()) => {
                    fk.constrained_columns.push(column);
                    fk.referred_columns.push(referred_column);
                }
                _ => foreign_keys.push(ForeignKeyInfo {
                    name: Some(name),
                    constrained_columns: vec![column],
                    referred_schema: row.get_field("referred_schema", Some(&context))?,
                    referred_table: row.get_field("referred_table", Some(&context))?,
                    referred_columns: vec![referred_column],
                }),
            }
        }
        Ok(foreign_keys)
    }

    async fn indexes(&self, schema: &str, table: &str) -> Result<Vec<IndexInfo>> {
        let query = r#"
            SELECT
                i.relname::text AS index_name,
                ix.indisunique AS is_unique,
                array_agg(a.attname::text ORDER BY array_position(ix.indkey::int2[], a.attnum)) AS columns
            FROM pg_catalog.pg_index ix
            JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
            JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a
                ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
            WHERE n.nspname = $1
            AND t.relname = $2
            AND NOT ix.indisprimary
            GROUP BY i.relname, ix.indisunique
            ORDER BY i.relname
        "#;

        let context = format!("{}.{}", schema, table);
        let rows = self.fetch_rows(query, schema, table, "indexes").await?;

        let mut indexes = Vec::with_capacity(rows.len());
        for row in &rows {
            indexes.push(IndexInfo {
                name: row.get_field("index_name", Some(&context))?,
                column_names: row.get_field("columns", Some(&context))?,
                unique: row.get_field("is_unique", Some(&context))?,
            });
        }
        Ok(indexes)
    }

    async fn fetch_count(&self, sql: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SourceSenseError::query_failed(sql.to_string(), e))?;
        non_negative(count, sql)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
