//! Core data models for connection descriptors and schema metadata.
//!
//! The metadata tree is the normalized shape every catalog adapter produces.
//! Column types are kept as the source database's own type string since the
//! supported engines do not share a type system.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::Result;
use crate::error::SourceSenseError;

/// Supported database kinds.
///
/// Parsing is case-insensitive and accepts a few common aliases. Anything
/// else is rejected with [`SourceSenseError::UnsupportedDatabaseKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum DatabaseKind {
    /// PostgreSQL
    PostgreSql,
    /// MySQL and MariaDB
    MySql,
    /// SQLite database file
    Sqlite,
    /// Microsoft SQL Server
    MsSql,
}

impl DatabaseKind {
    /// All supported kinds, in display order.
    pub const ALL: [Self; 4] = [Self::PostgreSql, Self::MySql, Self::Sqlite, Self::MsSql];

    /// Canonical lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PostgreSql => "postgresql",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
            Self::MsSql => "mssql",
        }
    }

    /// Port used when a descriptor leaves it unset. SQLite has none.
    pub const fn default_port(self) -> Option<u16> {
        match self {
            Self::PostgreSql => Some(5432),
            Self::MySql => Some(3306),
            Self::Sqlite => None,
            Self::MsSql => Some(1433),
        }
    }

    /// Whether the kind connects over the network (and therefore needs a host).
    pub const fn is_networked(self) -> bool {
        !matches!(self, Self::Sqlite)
    }

    /// Quotes an identifier for interpolation into query text.
    ///
    /// Embedded closing delimiters are doubled. Identifiers passed here must
    /// come from catalog introspection, never from user input.
    pub fn quote_identifier(self, identifier: &str) -> String {
        match self {
            Self::PostgreSql | Self::Sqlite => format!("\"{}\"", identifier.replace('"', "\"\"")),
            Self::MySql => format!("`{}`", identifier.replace('`', "``")),
            Self::MsSql => format!("[{}]", identifier.replace(']', "]]")),
        }
    }
}

impl std::fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = SourceSenseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(Self::PostgreSql),
            "mysql" => Ok(Self::MySql),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "mssql" | "sqlserver" => Ok(Self::MsSql),
            _ => Err(SourceSenseError::unsupported_kind(s)),
        }
    }
}

impl TryFrom<String> for DatabaseKind {
    type Error = SourceSenseError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

/// Everything needed to reach one database.
///
/// # Security
/// The password is held in a [`Zeroizing`] buffer, is never serialized, and
/// is omitted from `Debug` and `Display` output.
///
/// # Example
/// ```rust
/// use sourcesense_core::models::{ConnectionDescriptor, DatabaseKind};
///
/// let descriptor = ConnectionDescriptor::new(DatabaseKind::PostgreSql, "testdb")
///     .with_host("db.internal")
///     .with_username("reader")
///     .with_password("secret");
///
/// assert!(descriptor.validate().is_ok());
/// assert!(!format!("{:?}", descriptor).contains("secret"));
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Database engine
    pub database_kind: DatabaseKind,
    /// Host name or address
    #[serde(default = "default_host")]
    pub host: String,
    /// Port; the kind's default port is used when unset
    #[serde(default)]
    pub port: Option<u16>,
    /// Database name, or the file path for SQLite
    #[serde(alias = "database_name")]
    pub database: String,
    /// Login name
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    password: Zeroizing<String>,
}

impl ConnectionDescriptor {
    /// Creates a descriptor for `database` with default host, port and no
    /// credentials.
    pub fn new(database_kind: DatabaseKind, database: impl Into<String>) -> Self {
        Self {
            database_kind,
            host: default_host(),
            port: None,
            database: database.into(),
            username: String::new(),
            password: Zeroizing::default(),
        }
    }

    /// Builder method to set host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Builder method to set port.
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builder method to set username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Builder method to set password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Zeroizing::new(password.into());
        self
    }

    /// Password, exposed only to the connection layer.
    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// Whether a password was provided.
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    /// Port to connect to, falling back to the kind's default.
    pub fn effective_port(&self) -> Option<u16> {
        self.port.or_else(|| self.database_kind.default_port())
    }

    /// Validates the descriptor.
    ///
    /// # Errors
    /// Returns a configuration error for an empty database name, an empty
    /// host on a networked kind, or port 0.
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(SourceSenseError::configuration(
                "database name cannot be empty",
            ));
        }

        if self.database_kind.is_networked() && self.host.trim().is_empty() {
            return Err(SourceSenseError::configuration("host cannot be empty"));
        }

        if self.port == Some(0) {
            return Err(SourceSenseError::configuration(
                "port must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("database_kind", &self.database_kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &if self.has_password() { "****" } else { "" })
            .finish()
    }
}

impl std::fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.database_kind {
            DatabaseKind::Sqlite => write!(f, "sqlite({})", self.database),
            kind => write!(
                f,
                "{}({}{}/{})",
                kind,
                self.host,
                self.effective_port()
                    .map_or_else(String::new, |p| format!(":{}", p)),
                self.database
            ),
        }
        // Credentials are never rendered
    }
}

/// Identifies the database a metadata tree was extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    /// Engine the tree was read from
    pub database_kind: DatabaseKind,
    /// Database (or file) name from the descriptor
    pub database_name: String,
    /// When extraction started
    pub extraction_timestamp: DateTime<Utc>,
}

impl DatabaseInfo {
    /// Creates database info stamped with the current time.
    pub fn new(database_kind: DatabaseKind, database_name: impl Into<String>) -> Self {
        Self {
            database_kind,
            database_name: database_name.into(),
            extraction_timestamp: Utc::now(),
        }
    }
}

/// One column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub column_name: String,
    /// Source type rendered as text, e.g. `character varying(255)`
    pub data_type: String,
    /// Whether the column accepts NULL
    pub nullable: bool,
    /// Default expression as the catalog reports it
    #[serde(default)]
    pub default: Option<String>,
    /// Column comment, where the database stores one
    #[serde(default)]
    pub comment: Option<String>,
}

impl ColumnInfo {
    /// Creates a nullable column without default or comment.
    pub fn new(column_name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            comment: None,
        }
    }

    /// Builder method to set nullability.
    pub const fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    /// Constraint name; SQLite does not name foreign keys
    pub name: Option<String>,
    /// Referencing columns in this table
    pub constrained_columns: Vec<String>,
    /// Schema of the referenced table, when the catalog reports it
    pub referred_schema: Option<String>,
    /// Referenced table
    pub referred_table: String,
    /// Referenced columns, paired by position with `constrained_columns`
    pub referred_columns: Vec<String>,
}

/// Secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Index name
    pub name: String,
    /// Indexed columns in key order
    pub column_names: Vec<String>,
    /// Whether the index enforces uniqueness
    pub unique: bool,
}

/// One table with its four catalog facets merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Owning schema
    pub schema_name: String,
    /// Table name
    pub table_name: String,
    /// Columns in ordinal order
    pub columns: Vec<ColumnInfo>,
    /// Primary key column names in key order; empty when none or unavailable
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Outgoing foreign keys
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyInfo>,
    /// Indexes defined on the table
    #[serde(default)]
    pub indexes: Vec<IndexInfo>,
}

impl TableInfo {
    /// Creates a table with no columns or constraints.
    pub fn new(schema_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Builder method to append a column.
    pub fn with_column(mut self, column: ColumnInfo) -> Self {
        self.columns.push(column);
        self
    }

    /// `schema.table`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }
}

/// One schema and its tables in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    /// Schema name (`main` and attached names for SQLite)
    pub schema_name: String,
    /// Tables in discovery order
    pub tables: Vec<TableInfo>,
}

impl SchemaInfo {
    /// Creates an empty schema.
    pub fn new(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            tables: Vec::new(),
        }
    }

    /// Builder method to append a table.
    pub fn with_table(mut self, table: TableInfo) -> Self {
        self.tables.push(table);
        self
    }
}

/// Object counts for a metadata tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    /// Number of schemas in the tree
    pub total_schemas: usize,
    /// Number of tables across all schemas
    pub total_tables: usize,
    /// Number of columns across all tables
    pub total_columns: usize,
}

impl Statistics {
    /// Counts the objects actually present in `schemas`.
    pub fn from_schemas(schemas: &[SchemaInfo]) -> Self {
        schemas.iter().fold(Self::default(), |mut stats, schema| {
            stats.record_schema(schema);
            stats
        })
    }

    fn record_schema(&mut self, schema: &SchemaInfo) {
        self.total_schemas = self.total_schemas.saturating_add(1);
        for table in &schema.tables {
            self.total_tables = self.total_tables.saturating_add(1);
            self.total_columns = self.total_columns.saturating_add(table.columns.len());
        }
    }
}

/// Root of the extracted metadata tree.
///
/// Schemas can only be added through [`SchemaMetadata::push_schema`], which
/// keeps [`Statistics`] in step with the tree. Deserialization recomputes the
/// counts from the schemas it reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SchemaMetadataRepr")]
pub struct SchemaMetadata {
    /// Source database and extraction time
    pub database_info: DatabaseInfo,
    schemas: Vec<SchemaInfo>,
    statistics: Statistics,
    /// Catalog facets that were unavailable and left empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Deserialize)]
struct SchemaMetadataRepr {
    database_info: DatabaseInfo,
    #[serde(default)]
    schemas: Vec<SchemaInfo>,
    #[serde(default)]
    warnings: Vec<String>,
}

impl From<SchemaMetadataRepr> for SchemaMetadata {
    fn from(repr: SchemaMetadataRepr) -> Self {
        let statistics = Statistics::from_schemas(&repr.schemas);
        Self {
            database_info: repr.database_info,
            schemas: repr.schemas,
            statistics,
            warnings: repr.warnings,
        }
    }
}

impl SchemaMetadata {
    /// Creates an empty tree.
    pub fn new(database_info: DatabaseInfo) -> Self {
        Self {
            database_info,
            schemas: Vec::new(),
            statistics: Statistics::default(),
            warnings: Vec::new(),
        }
    }

    /// Appends a schema and updates the running counts.
    pub fn push_schema(&mut self, schema: SchemaInfo) {
        self.statistics.record_schema(&schema);
        self.schemas.push(schema);
    }

    /// Builder form of [`SchemaMetadata::push_schema`].
    pub fn with_schema(mut self, schema: SchemaInfo) -> Self {
        self.push_schema(schema);
        self
    }

    /// Schemas in discovery order.
    pub fn schemas(&self) -> &[SchemaInfo] {
        &self.schemas
    }

    /// Object counts for the tree.
    pub const fn statistics(&self) -> Statistics {
        self.statistics
    }

    /// Every table across all schemas, in discovery order.
    pub fn tables(&self) -> impl Iterator<Item = &TableInfo> {
        self.schemas.iter().flat_map(|schema| schema.tables.iter())
    }

    /// Checks the stored counts against the tree.
    ///
    /// # Errors
    /// Returns [`SourceSenseError::InvariantViolation`] when they differ,
    /// which indicates a defect rather than a user-facing condition.
    pub fn verify_statistics(&self) -> Result<()> {
        let actual = Statistics::from_schemas(&self.schemas);
        if actual == self.statistics {
            Ok(())
        } else {
            Err(SourceSenseError::invariant(format!(
                "statistics {:?} do not match tree contents {:?}",
                self.statistics, actual
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> SchemaMetadata {
        SchemaMetadata::new(DatabaseInfo::new(DatabaseKind::PostgreSql, "testdb"))
            .with_schema(
                SchemaInfo::new("public")
                    .with_table(
                        TableInfo::new("public", "users")
                            .with_column(ColumnInfo::new("id", "integer").with_nullable(false))
                            .with_column(ColumnInfo::new("email", "text")),
                    )
                    .with_table(
                        TableInfo::new("public", "orders")
                            .with_column(ColumnInfo::new("id", "integer")),
                    ),
            )
            .with_schema(SchemaInfo::new("audit"))
    }

    #[test]
    fn test_database_kind_parsing() {
        assert_eq!("postgresql".parse::<DatabaseKind>().unwrap(), DatabaseKind::PostgreSql);
        assert_eq!("PostgreSQL".parse::<DatabaseKind>().unwrap(), DatabaseKind::PostgreSql);
        assert_eq!("postgres".parse::<DatabaseKind>().unwrap(), DatabaseKind::PostgreSql);
        assert_eq!("MySQL".parse::<DatabaseKind>().unwrap(), DatabaseKind::MySql);
        assert_eq!("sqlite".parse::<DatabaseKind>().unwrap(), DatabaseKind::Sqlite);
        assert_eq!("mssql".parse::<DatabaseKind>().unwrap(), DatabaseKind::MsSql);

        let err = "oracle".parse::<DatabaseKind>().unwrap_err();
        assert!(matches!(err, SourceSenseError::UnsupportedDatabaseKind { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_database_kind_serde() {
        assert_eq!(
            serde_json::to_string(&DatabaseKind::MsSql).unwrap(),
            "\"mssql\""
        );
        let kind: DatabaseKind = serde_json::from_str("\"MySQL\"").unwrap();
        assert_eq!(kind, DatabaseKind::MySql);
        assert!(serde_json::from_str::<DatabaseKind>("\"mongodb\"").is_err());
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(DatabaseKind::PostgreSql.default_port(), Some(5432));
        assert_eq!(DatabaseKind::MySql.default_port(), Some(3306));
        assert_eq!(DatabaseKind::Sqlite.default_port(), None);
        assert_eq!(DatabaseKind::MsSql.default_port(), Some(1433));
    }

    #[test]
    fn test_quote_identifier_doubles_delimiters() {
        assert_eq!(DatabaseKind::PostgreSql.quote_identifier("user"), "\"user\"");
        assert_eq!(DatabaseKind::Sqlite.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(DatabaseKind::MySql.quote_identifier("a`b"), "`a``b`");
        assert_eq!(DatabaseKind::MsSql.quote_identifier("a]b"), "[a]]b]");
    }

    #[test]
    fn test_descriptor_validation() {
        let descriptor = ConnectionDescriptor::new(DatabaseKind::PostgreSql, "testdb");
        assert!(descriptor.validate().is_ok());

        let descriptor = ConnectionDescriptor::new(DatabaseKind::PostgreSql, "");
        assert!(descriptor.validate().is_err());

        let descriptor = ConnectionDescriptor::new(DatabaseKind::MySql, "app").with_host("");
        assert!(descriptor.validate().is_err());

        let descriptor = ConnectionDescriptor::new(DatabaseKind::MySql, "app").with_port(0);
        assert!(descriptor.validate().is_err());

        // SQLite does not need a host
        let descriptor = ConnectionDescriptor::new(DatabaseKind::Sqlite, "/tmp/app.db").with_host("");
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn test_descriptor_never_exposes_password() {
        let descriptor = ConnectionDescriptor::new(DatabaseKind::PostgreSql, "testdb")
            .with_username("admin")
            .with_password("hunter2");

        assert!(descriptor.has_password());
        assert!(!format!("{:?}", descriptor).contains("hunter2"));
        assert!(!descriptor.to_string().contains("hunter2"));
        assert!(!descriptor.to_string().contains("admin"));

        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn test_descriptor_deserialization_defaults() {
        let descriptor: ConnectionDescriptor = serde_json::from_str(
            r#"{"database_kind": "postgresql", "database_name": "testdb", "username": "u", "password": "p"}"#,
        )
        .unwrap();

        assert_eq!(descriptor.host, "localhost");
        assert_eq!(descriptor.port, None);
        assert_eq!(descriptor.effective_port(), Some(5432));
        assert_eq!(descriptor.database, "testdb");
        assert_eq!(descriptor.password(), "p");
    }

    #[test]
    fn test_statistics_track_pushes() {
        let metadata = sample_metadata();
        let stats = metadata.statistics();

        assert_eq!(stats.total_schemas, 2);
        assert_eq!(stats.total_tables, 2);
        assert_eq!(stats.total_columns, 3);
        assert!(metadata.verify_statistics().is_ok());
        assert_eq!(metadata.tables().count(), 2);
    }

    #[test]
    fn test_deserialization_recomputes_statistics() {
        let mut value = serde_json::to_value(sample_metadata()).unwrap();
        value["statistics"]["total_tables"] = serde_json::json!(99);

        let metadata: SchemaMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(metadata.statistics().total_tables, 2);
        assert!(metadata.verify_statistics().is_ok());
    }

    #[test]
    fn test_qualified_name() {
        let table = TableInfo::new("sales", "orders");
        assert_eq!(table.qualified_name(), "sales.orders");
    }
}
