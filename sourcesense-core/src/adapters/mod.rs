//! Catalog adapters: the seam between the pipeline and a database driver.
//!
//! Each adapter holds exactly one connection and answers catalog questions
//! one facet at a time. The introspector and quality analyzer only talk to
//! [`CatalogAdapter`], so supporting a new engine means adding one module
//! here and one arm in [`connect`].
//!
//! # Module Structure
//! - `helpers`: row decoding shared by the sqlx-backed adapters
//! - Database-specific modules (postgres, mysql, sqlite, mssql), each behind
//!   its cargo feature

use async_trait::async_trait;

use crate::Result;
use crate::error::SourceSenseError;
use crate::models::{ColumnInfo, ConnectionDescriptor, DatabaseKind, ForeignKeyInfo, IndexInfo};

#[cfg(any(feature = "postgresql", feature = "mysql", feature = "sqlite"))]
pub(crate) mod helpers;

#[cfg(feature = "postgresql")]
pub mod postgres;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "mssql")]
pub mod mssql;

/// Read-only catalog access for one database connection.
///
/// # Security Guarantees
/// - Only catalog queries and aggregate counts are issued
/// - Credentials are never stored outside the driver or logged
///
/// # Object Safety
/// This trait is object-safe, allowing for dynamic dispatch through
/// `Box<dyn CatalogAdapter>`.
#[async_trait]
pub trait CatalogAdapter: Send + Sync {
    /// Database kind this adapter speaks to.
    fn database_kind(&self) -> DatabaseKind;

    /// Runs `SELECT 1` and fetches the single row.
    async fn ping(&self) -> Result<()>;

    /// User-visible schema names in catalog order, system schemas excluded.
    async fn schema_names(&self) -> Result<Vec<String>>;

    /// Base table names within `schema`, in catalog order.
    async fn table_names(&self, schema: &str) -> Result<Vec<String>>;

    /// Columns of `schema.table` in ordinal order.
    async fn columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Primary key column names in key order.
    ///
    /// # Default Implementation
    /// Reports the facet as unsupported.
    async fn primary_key(&self, _schema: &str, _table: &str) -> Result<Vec<String>> {
        Err(self.unsupported("primary key introspection"))
    }

    /// Foreign keys declared on `schema.table`.
    ///
    /// # Default Implementation
    /// Reports the facet as unsupported.
    async fn foreign_keys(&self, _schema: &str, _table: &str) -> Result<Vec<ForeignKeyInfo>> {
        Err(self.unsupported("foreign key introspection"))
    }

    /// Secondary indexes on `schema.table`.
    ///
    /// # Default Implementation
    /// Reports the facet as unsupported.
    async fn indexes(&self, _schema: &str, _table: &str) -> Result<Vec<IndexInfo>> {
        Err(self.unsupported("index introspection"))
    }

    /// Executes a query returning a single integer and returns it.
    async fn fetch_count(&self, sql: &str) -> Result<u64>;

    /// Releases the connection. Safe to call more than once.
    async fn close(&self);

    /// `SELECT COUNT(*)` over the whole table.
    async fn count_rows(&self, schema: &str, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.qualified(schema, table));
        self.fetch_count(&sql).await
    }

    /// Number of rows where `column` is NULL.
    async fn count_nulls(&self, schema: &str, table: &str, column: &str) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} IS NULL",
            self.qualified(schema, table),
            self.database_kind().quote_identifier(column)
        );
        self.fetch_count(&sql).await
    }

    /// Number of distinct non-NULL values in `column`.
    async fn count_distinct(&self, schema: &str, table: &str, column: &str) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(DISTINCT {}) FROM {}",
            self.database_kind().quote_identifier(column),
            self.qualified(schema, table)
        );
        self.fetch_count(&sql).await
    }

    /// Quoted `schema.table` reference for query text.
    fn qualified(&self, schema: &str, table: &str) -> String {
        let kind = self.database_kind();
        format!(
            "{}.{}",
            kind.quote_identifier(schema),
            kind.quote_identifier(table)
        )
    }

    /// Error for a catalog facet this adapter does not expose.
    fn unsupported(&self, feature: &str) -> SourceSenseError {
        SourceSenseError::unsupported_feature(feature, self.database_kind().to_string())
    }
}

/// Opens an adapter for the descriptor's database kind.
///
/// # Security
/// - The descriptor is validated before any network access
/// - Driver errors are wrapped without the connection target
///
/// # Errors
/// Returns error if:
/// - The descriptor is invalid
/// - The kind's driver feature is not compiled in
/// - The connection cannot be established
pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Box<dyn CatalogAdapter>> {
    descriptor.validate()?;

    match descriptor.database_kind {
        #[cfg(feature = "postgresql")]
        DatabaseKind::PostgreSql => {
            let adapter = postgres::PostgresAdapter::connect(descriptor).await?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "postgresql"))]
        DatabaseKind::PostgreSql => Err(feature_missing("postgresql")),
        #[cfg(feature = "mysql")]
        DatabaseKind::MySql => {
            let adapter = mysql::MySqlAdapter::connect(descriptor).await?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "mysql"))]
        DatabaseKind::MySql => Err(feature_missing("mysql")),
        #[cfg(feature = "sqlite")]
        DatabaseKind::Sqlite => {
            let adapter = sqlite::SqliteAdapter::connect(descriptor).await?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "sqlite"))]
        DatabaseKind::Sqlite => Err(feature_missing("sqlite")),
        #[cfg(feature = "mssql")]
        DatabaseKind::MsSql => {
            let adapter = mssql::SqlServerAdapter::connect(descriptor).await?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "mssql"))]
        DatabaseKind::MsSql => Err(feature_missing("mssql")),
    }
}

#[cfg(not(all(
    feature = "postgresql",
    feature = "mysql",
    feature = "sqlite",
    feature = "mssql"
)))]
fn feature_missing(feature: &str) -> SourceSenseError {
    SourceSenseError::configuration(format!(
        "{} support is not compiled in; rebuild with --features {}",
        feature, feature
    ))
}

/// Whether the driver for `kind` is compiled into this build.
pub const fn is_compiled_in(kind: DatabaseKind) -> bool {
    match kind {
        DatabaseKind::PostgreSql => cfg!(feature = "postgresql"),
        DatabaseKind::MySql => cfg!(feature = "mysql"),
        DatabaseKind::Sqlite => cfg!(feature = "sqlite"),
        DatabaseKind::MsSql => cfg!(feature = "mssql"),
    }
}
