//! SQL Server catalog adapter built on tiberius.
//!
//! Unlike the sqlx adapters there is no pool: the adapter owns one TDS client
//! behind an async mutex and drops it in [`CatalogAdapter::close`].

use async_trait::async_trait;
use tiberius::{AuthMethod, Client, Config, Row, ToSql};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::CatalogAdapter;
use crate::Result;
use crate::error::SourceSenseError;
use crate::models::{ColumnInfo, ConnectionDescriptor, DatabaseKind, ForeignKeyInfo, IndexInfo};

type TdsClient = Client<Compat<TcpStream>>;

/// SQL Server adapter holding a single TDS connection.
pub struct SqlServerAdapter {
    client: Mutex<Option<TdsClient>>,
}

impl SqlServerAdapter {
    /// Connects using SQL Server authentication.
    ///
    /// # Errors
    /// Returns a connection error if the TCP connect or TDS login fails.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        let mut config = Config::new();
        config.host(&descriptor.host);
        config.port(descriptor.effective_port().unwrap_or(1433));
        config.authentication(AuthMethod::sql_server(
            &descriptor.username,
            descriptor.password(),
        ));
        config.database(&descriptor.database);
        config.application_name("sourcesense");
        config.trust_cert();

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(SourceSenseError::connection_failed)?;
        tcp.set_nodelay(true)
            .map_err(SourceSenseError::connection_failed)?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(SourceSenseError::connection_failed)?;

        tracing::debug!("Opened SQL Server connection");
        Ok(Self {
            client: Mutex::new(Some(client)),
        })
    }

    async fn query_rows(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> std::result::Result<Vec<Row>, tiberius::error::Error> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or_else(|| {
            tiberius::error::Error::Io {
                kind: std::io::ErrorKind::NotConnected,
                message: "connection already closed".to_string(),
            }
        })?;
        client.query(sql, params).await?.into_first_result().await
    }

    async fn catalog_rows(
        &self,
        sql: &str,
        schema: &str,
        table: &str,
        facet: &str,
    ) -> Result<Vec<Row>> {
        self.query_rows(sql, &[&schema, &table]).await.map_err(|e| {
            SourceSenseError::introspection_failed(
                format!("Failed to collect {} for table '{}.{}'", facet, schema, table),
                e,
            )
        })
    }
}

fn text(row: &Row, index: usize, context: &str) -> Result<Option<String>> {
    row.try_get::<&str, _>(index)
        .map(|value| value.map(str::to_string))
        .map_err(|e| SourceSenseError::parse_field(&index.to_string(), Some(context), e))
}

fn required_text(row: &Row, index: usize, context: &str) -> Result<String> {
    text(row, index, context)?.ok_or_else(|| {
        SourceSenseError::invariant(format!(
            "catalog returned NULL in column {} for '{}'",
            index, context
        ))
    })
}

fn int(row: &Row, index: usize, context: &str) -> Result<Option<i32>> {
    row.try_get::<i32, _>(index)
        .map_err(|e| SourceSenseError::parse_field(&index.to_string(), Some(context), e))
}

/// Renders an `INFORMATION_SCHEMA.COLUMNS` type the way SSMS shows it.
fn render_type(
    data_type: &str,
    max_length: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> String {
    match data_type {
        "char" | "varchar" | "nchar" | "nvarchar" | "binary" | "varbinary" => match max_length {
            Some(-1) => format!("{}(max)", data_type),
            Some(length) => format!("{}({})", data_type, length),
            None => data_type.to_string(),
        },
        "decimal" | "numeric" => match (precision, scale) {
            (Some(p), Some(s)) => format!("{}({},{})", data_type, p, s),
            _ => data_type.to_string(),
        },
        _ => data_type.to_string(),
    }
}

#[async_trait]
impl CatalogAdapter for SqlServerAdapter {
    fn database_kind(&self) -> DatabaseKind {
        DatabaseKind::MsSql
    }

    async fn ping(&self) -> Result<()> {
        let rows = self
            .query_rows("SELECT 1", &[])
            .await
            .map_err(SourceSenseError::connection_failed)?;
        if rows.is_empty() {
            return Err(SourceSenseError::invariant("SELECT 1 returned no rows"));
        }
        Ok(())
    }

    async fn schema_names(&self) -> Result<Vec<String>> {
        let query = "SELECT SCHEMA_NAME \
             FROM INFORMATION_SCHEMA.SCHEMATA \
             WHERE SCHEMA_NAME NOT IN ('db_owner', 'db_accessadmin', 'db_securityadmin', \
                                       'db_ddladmin', 'db_backupoperator', 'db_datareader', \
                                       'db_datawriter', 'db_denydatareader', 'db_denydatawriter', \
                                       'sys', 'INFORMATION_SCHEMA', 'guest') \
             ORDER BY SCHEMA_NAME";

        let rows = self
            .query_rows(query, &[])
            .await
            .map_err(|e| SourceSenseError::introspection_failed("Failed to enumerate schemas", e))?;

        rows.iter()
            .map(|row| required_text(row, 0, "INFORMATION_SCHEMA.SCHEMATA"))
            .collect()
    }

    async fn table_names(&self, schema: &str) -> Result<Vec<String>> {
        let query = "SELECT TABLE_NAME \
             FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = @P1 AND TABLE_TYPE = 'BASE TABLE' \
             ORDER BY TABLE_NAME";

        let rows = self.query_rows(query, &[&schema]).await.map_err(|e| {
            SourceSenseError::introspection_failed(
                format!("Failed to enumerate tables in schema '{}'", schema),
                e,
            )
        })?;

        rows.iter()
            .map(|row| required_text(row, 0, schema))
            .collect()
    }

    async fn columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        let query = "SELECT \
                 c.COLUMN_NAME, \
                 c.DATA_TYPE, \
                 CAST(c.CHARACTER_MAXIMUM_LENGTH AS INT), \
                 CAST(c.NUMERIC_PRECISION AS INT), \
                 CAST(c.NUMERIC_SCALE AS INT), \
                 c.IS_NULLABLE, \
                 c.COLUMN_DEFAULT, \
                 CAST(ep.value AS NVARCHAR(4000)) \
             FROM INFORMATION_SCHEMA.COLUMNS c \
             LEFT JOIN sys.extended_properties ep \
                 ON ep.class = 1 \
                 AND ep.name = 'MS_Description' \
                 AND ep.major_id = OBJECT_ID(QUOTENAME(c.TABLE_SCHEMA) + '.' + QUOTENAME(c.TABLE_NAME)) \
                 AND ep.minor_id = COLUMNPROPERTY(ep.major_id, c.COLUMN_NAME, 'ColumnId') \
             WHERE c.TABLE_SCHEMA = @P1 AND c.TABLE_NAME = @P2 \
             ORDER BY c.ORDINAL_POSITION";

        let context = format!("{}.{}", schema, table);
        let rows = self.catalog_rows(query, schema, table, "columns").await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let data_type = required_text(row, 1, &context)?;
            let is_nullable = required_text(row, 5, &context)?;
            columns.push(ColumnInfo {
                column_name: required_text(row, 0, &context)?,
                data_type: render_type(
                    &data_type,
                    int(row, 2, &context)?,
                    int(row, 3, &context)?,
                    int(row, 4, &context)?,
                ),
                nullable: is_nullable.eq_ignore_ascii_case("YES"),
                default: text(row, 6, &context)?,
                comment: text(row, 7, &context)?,
            });
        }
        Ok(columns)
    }

    async fn primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let query = "SELECT kcu.COLUMN_NAME \
             FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
             JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu \
                 ON tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
                 AND tc.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA \
             WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY' \
             AND tc.TABLE_SCHEMA = @P1 AND tc.TABLE_NAME = @P2 \
             ORDER BY kcu.ORDINAL_POSITION";

        let context = format!("{}.{}", schema, table);
        let rows = self.catalog_rows(query, schema, table, "primary key").await?;

        rows.iter()
            .map(|row| required_text(row, 0, &context))
            .collect()
    }

    async fn foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let query = "SELECT \
                 fk.name, \
                 COL_NAME(fkc.parent_object_id, fkc.parent_column_id), \
                 OBJECT_SCHEMA_NAME(fk.referenced_object_id), \
                 OBJECT_NAME(fk.referenced_object_id), \
                 COL_NAME(fkc.referenced_object_id, fkc.referenced_column_id) \
             FROM sys.foreign_keys fk \
             JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id \
             WHERE OBJECT_SCHEMA_NAME(fk.parent_object_id) = @P1 \
             AND OBJECT_NAME(fk.parent_object_id) = @P2 \
             ORDER BY fk.name, fkc.constraint_column_id";

        let context = format!("{}.{}", schema, table);
        let rows = self.catalog_rows(query, schema, table, "foreign keys").await?;

        let mut foreign_keys: Vec<ForeignKeyInfo> = Vec::new();
        for row in &rows {
            let name = required_text(row, 0, &context)?;
            let column = required_text(row, 1, &context)?;
            let referred_column = required_text(row, 4, &context)?;

            match foreign_keys.last_mut() {
                Some(fk) if fk.name.as_deref() == Some(name.as_str()) => {
                    fk.constrained_columns.push(column);
                    fk.referred_columns.push(referred_column);
                }
                _ => foreign_keys.push(ForeignKeyInfo {
                    name: Some(name),
                    constrained_columns: vec![column],
                    referred_schema: text(row, 2, &context)?,
                    referred_table: required_text(row, 3, &context)?,
                    referred_columns: vec![referred_column],
                }),
            }
        }
        Ok(foreign_keys)
    }

    async fn indexes(&self, schema: &str, table: &str) -> Result<Vec<IndexInfo>> {
        let query = "SELECT i.name, c.name, i.is_unique \
             FROM sys.indexes i \
             JOIN sys.index_columns ic \
                 ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
             JOIN sys.columns c \
                 ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
             WHERE OBJECT_SCHEMA_NAME(i.object_id) = @P1 \
             AND OBJECT_NAME(i.object_id) = @P2 \
             AND i.is_primary_key = 0 \
             AND i.type > 0 \
             AND ic.is_included_column = 0 \
             ORDER BY i.name, ic.key_ordinal";

        let context = format!("{}.{}", schema, table);
        let rows = self.catalog_rows(query, schema, table, "indexes").await?;

        let mut indexes: Vec<IndexInfo> = Vec::new();
        for row in &rows {
            let name = required_text(row, 0, &context)?;
            let column = required_text(row, 1, &context)?;

            match indexes.last_mut() {
                Some(index) if index.name == name => index.column_names.push(column),
                _ => {
                    let unique = row
                        .try_get::<bool, _>(2)
                        .map_err(|e| SourceSenseError::parse_field("is_unique", Some(&context), e))?
                        .unwrap_or(false);
                    indexes.push(IndexInfo {
                        name,
                        column_names: vec![column],
                        unique,
                    });
                }
            }
        }
        Ok(indexes)
    }

    async fn fetch_count(&self, sql: &str) -> Result<u64> {
        let rows = self
            .query_rows(sql, &[])
            .await
            .map_err(|e| SourceSenseError::query_failed(sql.to_string(), e))?;

        let row = rows
            .first()
            .ok_or_else(|| SourceSenseError::invariant(format!("no row returned by {}", sql)))?;

        // COUNT yields INT, COUNT_BIG yields BIGINT
        let count = match row.try_get::<i32, _>(0) {
            Ok(value) => value.map(i64::from),
            Err(_) => row
                .try_get::<i64, _>(0)
                .map_err(|e| SourceSenseError::query_failed(sql.to_string(), e))?,
        }
        .unwrap_or(0);

        u64::try_from(count).map_err(|e| {
            SourceSenseError::query_failed(format!("negative count returned by {}", sql), e)
        })
    }

    async fn close(&self) {
        if let Some(client) = self.client.lock().await.take()
            && let Err(e) = client.close().await
        {
            tracing::debug!("Error while closing SQL Server connection: {}", e);
        }
    }
}
