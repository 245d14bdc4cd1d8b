//! MySQL catalog adapter.
//!
//! Each MySQL database is reported as one schema. Catalog text columns are
//! cast to `CHAR` because some server versions return them as binary strings.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::MySqlPool;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlRow};

use super::CatalogAdapter;
use super::helpers::{RowExt, non_negative};
use crate::Result;
use crate::error::SourceSenseError;
use crate::models::{ColumnInfo, ConnectionDescriptor, DatabaseKind, ForeignKeyInfo, IndexInfo};

/// MySQL adapter holding a single-connection pool.
pub struct MySqlAdapter {
    pool: MySqlPool,
}

impl MySqlAdapter {
    /// Connects using the descriptor's host, port, database and credentials.
    ///
    /// # Errors
    /// Returns a connection error if the server is unreachable or rejects the
    /// login.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(&descriptor.host)
            .database(&descriptor.database);
        if let Some(port) = descriptor.effective_port() {
            options = options.port(port);
        }
        if !descriptor.username.is_empty() {
            options = options.username(&descriptor.username);
        }
        if descriptor.has_password() {
            options = options.password(descriptor.password());
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(SourceSenseError::connection_failed)?;

        tracing::debug!("Opened MySQL connection");
        Ok(Self { pool })
    }

    async fn fetch_rows(
        &self,
        sql: &str,
        schema: &str,
        table: &str,
        facet: &str,
    ) -> Result<Vec<MySqlRow>> {
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
impl CatalogAdapter for MySqlAdapter {
    fn database_kind(&self) -> DatabaseKind {
        DatabaseKind::MySql
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(SourceSenseError::connection_failed)?;
        Ok(())
    }

    async fn schema_names(&self) -> Result<Vec<String>> {
        let query = r#"
            SELECT CAST(SCHEMA_NAME AS CHAR) AS SCHEMA_NAME
            FROM INFORMATION_SCHEMA.SCHEMATA
            WHERE SCHEMA_NAME NOT IN ('information_schema', 'mysql', 'performance_schema', 'sys')
            ORDER BY SCHEMA_NAME
        "#;

        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SourceSenseError::introspection_failed("Failed to enumerate schemas", e))?;

        rows.iter()
            .map(|row| row.get_field("SCHEMA_NAME", None))
            .collect()
    }

    async fn table_names(&self, schema: &str) -> Result<Vec<String>> {
        let query = r#"
            SELECT CAST(TABLE_NAME AS CHAR) AS TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ?
            AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
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
            .map(|row| row.get_field("TABLE_NAME", None))
            .collect()
    }

    async fn columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        let query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR) AS COLUMN_NAME,
                CAST(COLUMN_TYPE AS CHAR) AS COLUMN_TYPE,
                CAST(IS_NULLABLE AS CHAR) AS IS_NULLABLE,
                CAST(COLUMN_DEFAULT AS CHAR) AS COLUMN_DEFAULT,
                CAST(COLUMN_COMMENT AS CHAR) AS COLUMN_COMMENT
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ?
            AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let context = format!("{}.{}", schema, table);
        let rows = self.fetch_rows(query, schema, table, "columns").await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let is_nullable: String = row.get_field("IS_NULLABLE", Some(&context))?;
            let comment: Option<String> = row.get_field("COLUMN_COMMENT", Some(&context))?;
            columns.push(ColumnInfo {
                column_name: row.get_field("COLUMN_NAME", Some(&context))?,
                data_type: row.get_field("COLUMN_TYPE", Some(&context))?,
                nullable: is_nullable.eq_ignore_ascii_case("YES"),
                default: row.get_field("COLUMN_DEFAULT", Some(&context))?,
                // MySQL reports a missing comment as an empty string
                comment: comment.filter(|c| !c.is_empty()),
            });
        }
        Ok(columns)
    }

    async fn primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let query = r#"
            SELECT CAST(COLUMN_NAME AS CHAR) AS COLUMN_NAME
            FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = ?
            AND TABLE_NAME = ?
            AND CONSTRAINT_NAME = 'PRIMARY'
            ORDER BY ORDINAL_POSITION
        "#;

        let context = format!("{}.{}", schema, table);
        let rows = self.fetch_rows(query, schema, table, "primary key").await?;

        rows.iter()
            .map(|row| row.get_field("COLUMN_NAME", Some(&context)))
            .collect()
    }

    async fn foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let query = r#"
            SELECT
                CAST(CONSTRAINT_NAME AS CHAR) AS CONSTRAINT_NAME,
                CAST(COLUMN_NAME AS CHAR) AS COLUMN_NAME,
                CAST(REFERENCED_TABLE_SCHEMA AS CHAR) AS REFERENCED_TABLE_SCHEMA,
                CAST(REFERENCED_TABLE_NAME AS CHAR) AS REFERENCED_TABLE_NAME,
                CAST(REFERENCED_COLUMN_NAME AS CHAR) AS REFERENCED_COLUMN_NAME
            FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = ?
            AND TABLE_NAME = ?
            AND REFERENCED_TABLE_NAME IS NOT NULL
            ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION
        "#;

        let context = format!("{}.{}", schema, table);
        let rows = self.fetch_rows(query, schema, table, "foreign keys").await?;

        let mut foreign_keys: Vec<ForeignKeyInfo> = Vec::new();
        for row in &rows {
            let name: String = row.get_field("CONSTRAINT_NAME", Some(&context))?;
            let column: String = row.get_field("COLUMN_NAME", Some(&context))?;
            let referred_column: String =
                row.get_field("REFERENCED_COLUMN_NAME", Some(&context))?;

            match foreign_keys.last_mut() {
                Some(fk) if fk.name.as_deref() == Some(name.as_str()) => {
                    fk.constrained_columns.push(column);
                    fk.referred_columns.push(referred_column);
                }
                _ => foreign_keys.push(ForeignKeyInfo {
                    name: Some(name),
                    constrained_columns: vec![column],
                    referred_schema: row.get_field("REFERENCED_TABLE_SCHEMA", Some(&context))?,
                    referred_table: row.get_field("REFERENCED_TABLE_NAME", Some(&context))?,
                    referred_columns: vec![referred_column],
                }),
            }
        }
        Ok(foreign_keys)
    }

    async fn indexes(&self, schema: &str, table: &str) -> Result<Vec<IndexInfo>> {
        let query = r#"
            SELECT
                CAST(INDEX_NAME AS CHAR) AS INDEX_NAME,
                CAST(COLUMN_NAME AS CHAR) AS COLUMN_NAME,
                CAST(NON_UNIQUE AS SIGNED) AS NON_UNIQUE
            FROM INFORMATION_SCHEMA.STATISTICS
            WHERE TABLE_SCHEMA = ?
            AND TABLE_NAME = ?
            AND INDEX_NAME <> 'PRIMARY'
            ORDER BY INDEX_NAME, SEQ_IN_INDEX
        "#;

        let context = format!("{}.{}", schema, table);
        let rows = self.fetch_rows(query, schema, table, "indexes").await?;

        let mut indexes: Vec<IndexInfo> = Vec::new();
        for row in &rows {
            let name: String = row.get_field("INDEX_NAME", Some(&context))?;
            // Functional key parts have no column name
            let column: Option<String> = row.get_field("COLUMN_NAME", Some(&context))?;

            match indexes.last_mut() {
                Some(index) if index.name == name => index.column_names.extend(column),
                _ => {
                    let non_unique: i64 = row.get_field("NON_UNIQUE", Some(&context))?;
                    indexes.push(IndexInfo {
                        name,
                        column_names: column.into_iter().collect(),
                        unique: non_unique == 0,
                    });
                }
            }
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
