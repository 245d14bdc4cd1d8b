//! SQLite catalog adapter.
//!
//! # Catalog Sources
//! - `PRAGMA database_list`: attached databases, reported as schemas
//! - `sqlite_master`: tables per attached database
//! - `PRAGMA table_info()`: columns and primary key positions
//! - `PRAGMA foreign_key_list()`: foreign keys, one row per column pair
//! - `PRAGMA index_list()` / `PRAGMA index_info()`: indexes and their columns
//!
//! # Security Features
//! - File databases are opened read-only and never created
//! - No network access required

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::CatalogAdapter;
use super::helpers::{RowExt, non_negative};
use crate::Result;
use crate::error::SourceSenseError;
use crate::models::{ColumnInfo, ConnectionDescriptor, DatabaseKind, ForeignKeyInfo, IndexInfo};

const IN_MEMORY: &str = ":memory:";

/// SQLite adapter holding a single-connection pool.
pub struct SqliteAdapter {
    pool: SqlitePool,
}

impl SqliteAdapter {
    /// Opens the database file named by `descriptor.database` read-only.
    ///
    /// `:memory:` opens a fresh in-memory database.
    ///
    /// # Errors
    /// Returns error if the file does not exist or cannot be opened.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        let options = if descriptor.database == IN_MEMORY {
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
                SourceSenseError::configuration(format!("Invalid SQLite target: {}", e))
            })?
        } else {
            SqliteConnectOptions::new()
                .filename(&descriptor.database)
                .read_only(true)
                .create_if_missing(false)
        };

        Self::connect_with(options).await
    }

    /// Opens a pool from explicit connect options.
    pub async fn connect_with(options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(SourceSenseError::connection_failed)?;

        tracing::debug!("Opened SQLite database");
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    ///
    /// The pool should be capped at one connection like the ones opened here.
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn pragma(schema: &str, pragma: &str, argument: &str) -> String {
        format!(
            "PRAGMA {}.{}('{}')",
            DatabaseKind::Sqlite.quote_identifier(schema),
            pragma,
            argument.replace('\'', "''")
        )
    }
}

#[async_trait]
impl CatalogAdapter for SqliteAdapter {
    fn database_kind(&self) -> DatabaseKind {
        DatabaseKind::Sqlite
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(SourceSenseError::connection_failed)?;
        Ok(())
    }

    async fn schema_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("PRAGMA database_list")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SourceSenseError::introspection_failed("Failed to list databases", e))?;

        let mut schemas = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.get_field("name", None)?;
            if name != "temp" {
                schemas.push(name);
            }
        }
        Ok(schemas)
    }

    async fn table_names(&self, schema: &str) -> Result<Vec<String>> {
        let query = format!(
            "SELECT name FROM {}.sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
            DatabaseKind::Sqlite.quote_identifier(schema)
        );

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                SourceSenseError::introspection_failed(
                    format!("Failed to list tables in '{}'", schema),
                    e,
                )
            })?;

        rows.iter().map(|row| row.get_field("name", None)).collect()
    }

    async fn columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        let context = format!("{}.{}", schema, table);
        let rows = sqlx::query(&Self::pragma(schema, "table_info", table))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                SourceSenseError::introspection_failed(
                    format!("Failed to read columns of '{}'", context),
                    e,
                )
            })?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let notnull: i64 = row.get_field("notnull", Some(&context))?;
            let pk: i64 = row.get_field("pk", Some(&context))?;
            columns.push(ColumnInfo {
                column_name: row.get_field("name", Some(&context))?,
                data_type: row.get_field("type", Some(&context))?,
                // PRIMARY KEY columns are NOT NULL even when the pragma says otherwise
                nullable: notnull == 0 && pk == 0,
                default: row.get_field("dflt_value", Some(&context))?,
                comment: None,
            });
        }
        Ok(columns)
    }

    async fn primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let context = format!("{}.{}", schema, table);
        let rows = sqlx::query(&Self::pragma(schema, "table_info", table))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                SourceSenseError::introspection_failed(
                    format!("Failed to read primary key of '{}'", context),
                    e,
                )
            })?;

        let mut key_columns = Vec::new();
        for row in &rows {
            let position: i64 = row.get_field("pk", Some(&context))?;
            if position > 0 {
                let name: String = row.get_field("name", Some(&context))?;
                key_columns.push((position, name));
            }
        }
        key_columns.sort_by_key(|(position, _)| *position);
        Ok(key_columns.into_iter().map(|(_, name)| name).collect())
    }

    async fn foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let context = format!("{}.{}", schema, table);
        let rows = sqlx::query(&Self::pragma(schema, "foreign_key_list", table))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                SourceSenseError::introspection_failed(
                    format!("Failed to read foreign keys of '{}'", context),
                    e,
                )
            })?;

        // One row per column pair; rows sharing an id form one constraint
        let mut by_id: BTreeMap<i64, ForeignKeyInfo> = BTreeMap::new();
        for row in &rows {
            let id: i64 = row.get_field("id", Some(&context))?;
            let referred_table: String = row.get_field("table", Some(&context))?;
            let from: String = row.get_field("from", Some(&context))?;
            // NULL when the reference targets the parent's primary key implicitly
            let to: Option<String> = row.get_field("to", Some(&context))?;

            let fk = by_id.entry(id).or_insert_with(|| ForeignKeyInfo {
                name: None,
                constrained_columns: Vec::new(),
                referred_schema: None,
                referred_table,
                referred_columns: Vec::new(),
            });
            fk.constrained_columns.push(from);
            if let Some(to) = to {
                fk.referred_columns.push(to);
            }
        }

        Ok(by_id.into_values().collect())
    }

    async fn indexes(&self, schema: &str, table: &str) -> Result<Vec<IndexInfo>> {
        let context = format!("{}.{}", schema, table);
        let rows = sqlx::query(&Self::pragma(schema, "index_list", table))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                SourceSenseError::introspection_failed(
                    format!("Failed to read indexes of '{}'", context),
                    e,
                )
            })?;

        let mut indexes = Vec::new();
        for row in &rows {
            let name: String = row.get_field("name", Some(&context))?;
            let origin: String = row.get_field("origin", Some(&context))?;
            if origin == "pk" || name.starts_with("sqlite_autoindex") {
                continue;
            }
            let unique: i64 = row.get_field("unique", Some(&context))?;

            let column_rows = sqlx::query(&Self::pragma(schema, "index_info", &name))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    SourceSenseError::introspection_failed(
                        format!("Failed to read columns of index '{}'", name),
                        e,
                    )
                })?;

            let mut column_names = Vec::with_capacity(column_rows.len());
            for column_row in &column_rows {
                // Expression index entries have no column name
                let column: Option<String> = column_row.get_field("name", Some(&context))?;
                column_names.extend(column);
            }

            indexes.push(IndexInfo {
                name,
                column_names,
                unique: unique != 0,
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

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_adapter() -> SqliteAdapter {
        // One connection, so every statement sees the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let adapter = SqliteAdapter::from_pool(pool);
        sqlx::query(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                nickname TEXT DEFAULT 'anon'
            )",
        )
        .execute(&adapter.pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE posts (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                title TEXT
            )",
        )
        .execute(&adapter.pool)
        .await
        .unwrap();
        sqlx::query("CREATE INDEX idx_posts_title ON posts(title)")
            .execute(&adapter.pool)
            .await
            .unwrap();
        adapter
    }

    #[tokio::test]
    async fn test_schema_and_table_enumeration() {
        let adapter = memory_adapter().await;

        assert_eq!(adapter.schema_names().await.unwrap(), vec!["main"]);
        assert_eq!(
            adapter.table_names("main").await.unwrap(),
            vec!["posts", "users"]
        );
        adapter.close().await;
    }

    #[tokio::test]
    async fn test_column_facets() {
        let adapter = memory_adapter().await;
        let columns = adapter.columns("main", "users").await.unwrap();

        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].column_name, "id");
        assert!(!columns[0].nullable);
        assert_eq!(columns[1].data_type, "TEXT");
        assert!(!columns[1].nullable);
        assert!(columns[2].nullable);
        assert_eq!(columns[2].default.as_deref(), Some("'anon'"));

        assert_eq!(adapter.primary_key("main", "users").await.unwrap(), vec!["id"]);
    }

    #[tokio::test]
    async fn test_foreign_keys_and_indexes() {
        let adapter = memory_adapter().await;

        let fks = adapter.foreign_keys("main", "posts").await.unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].constrained_columns, vec!["user_id"]);
        assert_eq!(fks[0].referred_table, "users");
        assert_eq!(fks[0].referred_columns, vec!["id"]);

        let indexes = adapter.indexes("main", "posts").await.unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name, "idx_posts_title");
        assert_eq!(indexes[0].column_names, vec!["title"]);
        assert!(!indexes[0].unique);

        // UNIQUE constraint indexes are internal autoindexes
        assert!(adapter.indexes("main", "users").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counts() {
        let adapter = memory_adapter().await;
        sqlx::query("INSERT INTO users (email, nickname) VALUES ('a@x', NULL), ('b@x', 'b'), ('c@x', 'b')")
            .execute(&adapter.pool)
            .await
            .unwrap();

        assert_eq!(adapter.count_rows("main", "users").await.unwrap(), 3);
        assert_eq!(adapter.count_nulls("main", "users", "nickname").await.unwrap(), 1);
        assert_eq!(adapter.count_distinct("main", "users", "nickname").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");
        let descriptor =
            ConnectionDescriptor::new(DatabaseKind::Sqlite, path.to_string_lossy().to_string());

        let result = SqliteAdapter::connect(&descriptor).await;
        assert!(matches!(result, Err(SourceSenseError::Connection { .. })));
    }
}
