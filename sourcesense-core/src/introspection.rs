//! Schema introspection: walks the catalog into a [`SchemaMetadata`] tree.
//!
//! Each table is assembled from four independent facets. Columns are
//! required; a primary key, foreign key or index facet the adapter does not
//! support is left empty and noted in [`SchemaMetadata::warnings`]. Any other
//! failure aborts the whole extraction.

use crate::Result;
use crate::adapters::{self, CatalogAdapter};
use crate::error::SourceSenseError;
use crate::models::{ConnectionDescriptor, DatabaseInfo, SchemaInfo, SchemaMetadata, TableInfo};

/// Builds the metadata tree over an open adapter.
///
/// # Errors
/// Returns the first catalog error. No partial tree is returned.
pub async fn extract_schema_metadata(
    adapter: &dyn CatalogAdapter,
    descriptor: &ConnectionDescriptor,
) -> Result<SchemaMetadata> {
    let mut metadata = SchemaMetadata::new(DatabaseInfo::new(
        adapter.database_kind(),
        descriptor.database.clone(),
    ));

    let schema_names = adapter.schema_names().await?;
    tracing::info!("Found {} schemas", schema_names.len());

    for schema_name in schema_names {
        let table_names = adapter.table_names(&schema_name).await?;
        tracing::debug!(
            "Schema '{}' has {} tables",
            schema_name,
            table_names.len()
        );

        let mut schema = SchemaInfo::new(schema_name.as_str());
        for table_name in table_names {
            let table =
                introspect_table(adapter, &schema_name, &table_name, &mut metadata.warnings)
                    .await?;
            schema.tables.push(table);
        }
        metadata.push_schema(schema);
    }

    metadata.verify_statistics()?;

    let stats = metadata.statistics();
    tracing::info!(
        "Extracted {} schemas, {} tables, {} columns",
        stats.total_schemas,
        stats.total_tables,
        stats.total_columns
    );
    Ok(metadata)
}

/// Opens an adapter, extracts the tree, and closes the adapter on every
/// exit path.
pub async fn introspect(descriptor: &ConnectionDescriptor) -> Result<SchemaMetadata> {
    let adapter = adapters::connect(descriptor).await?;
    let outcome = extract_schema_metadata(adapter.as_ref(), descriptor).await;
    adapter.close().await;
    outcome
}

async fn introspect_table(
    adapter: &dyn CatalogAdapter,
    schema: &str,
    table: &str,
    warnings: &mut Vec<String>,
) -> Result<TableInfo> {
    tracing::debug!("Introspecting table {}.{}", schema, table);

    let columns = adapter.columns(schema, table).await?;
    let primary_key = optional_facet(adapter.primary_key(schema, table).await, warnings)?;
    let foreign_keys = optional_facet(adapter.foreign_keys(schema, table).await, warnings)?;
    let indexes = optional_facet(adapter.indexes(schema, table).await, warnings)?;

    Ok(TableInfo {
        schema_name: schema.to_string(),
        table_name: table.to_string(),
        columns,
        primary_key,
        foreign_keys,
        indexes,
    })
}

/// Turns an unsupported facet into an empty one, recording a warning once.
fn optional_facet<T>(result: Result<Vec<T>>, warnings: &mut Vec<String>) -> Result<Vec<T>> {
    match result {
        Ok(values) => Ok(values),
        Err(error @ SourceSenseError::UnsupportedFeature { .. }) => {
            let warning = format!("{}; facet left empty", error);
            if !warnings.contains(&warning) {
                tracing::warn!("{}", warning);
                warnings.push(warning);
            }
            Ok(Vec::new())
        }
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnInfo, DatabaseKind, IndexInfo};
    use async_trait::async_trait;

    /// Two schemas, `public` with two tables and `empty` with none. Indexes
    /// are unsupported; `fail_on` makes the columns facet fail for one table.
    struct StaticCatalog {
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl CatalogAdapter for StaticCatalog {
        fn database_kind(&self) -> DatabaseKind {
            DatabaseKind::MySql
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        async fn schema_names(&self) -> Result<Vec<String>> {
            Ok(vec!["public".to_string(), "empty".to_string()])
        }

        async fn table_names(&self, schema: &str) -> Result<Vec<String>> {
            Ok(match schema {
                "public" => vec!["users".to_string(), "orders".to_string()],
                _ => Vec::new(),
            })
        }

        async fn columns(&self, _schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
            if self.fail_on == Some(table) {
                return Err(SourceSenseError::introspection_failed(
                    "columns",
                    std::io::Error::other("connection reset"),
                ));
            }
            Ok(vec![
                ColumnInfo::new("id", "int").with_nullable(false),
                ColumnInfo::new("email", "varchar(255)"),
            ])
        }

        async fn primary_key(&self, _schema: &str, _table: &str) -> Result<Vec<String>> {
            Ok(vec!["id".to_string()])
        }

        async fn foreign_keys(
            &self,
            _schema: &str,
            _table: &str,
        ) -> Result<Vec<crate::models::ForeignKeyInfo>> {
            Ok(Vec::new())
        }

        async fn fetch_count(&self, _sql: &str) -> Result<u64> {
            Ok(0)
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn test_extracts_tree_with_statistics() {
        let descriptor = ConnectionDescriptor::new(DatabaseKind::MySql, "shop");
        let metadata = extract_schema_metadata(&StaticCatalog { fail_on: None }, &descriptor)
            .await
            .unwrap();

        let stats = metadata.statistics();
        assert_eq!(stats.total_schemas, 2);
        assert_eq!(stats.total_tables, 2);
        assert_eq!(stats.total_columns, 4);
        assert_eq!(metadata.database_info.database_name, "shop");
        assert_eq!(metadata.database_info.database_kind, DatabaseKind::MySql);

        let users = &metadata.schemas()[0].tables[0];
        assert_eq!(users.table_name, "users");
        assert_eq!(users.primary_key, vec!["id"]);
        assert_eq!(users.indexes, Vec::<IndexInfo>::new());
    }

    #[tokio::test]
    async fn test_unsupported_facet_becomes_single_warning() {
        let descriptor = ConnectionDescriptor::new(DatabaseKind::MySql, "shop");
        let metadata = extract_schema_metadata(&StaticCatalog { fail_on: None }, &descriptor)
            .await
            .unwrap();

        assert_eq!(metadata.warnings.len(), 1);
        assert!(metadata.warnings[0].contains("index introspection"));
    }

    #[tokio::test]
    async fn test_table_failure_fails_extraction() {
        let descriptor = ConnectionDescriptor::new(DatabaseKind::MySql, "shop");
        let result = extract_schema_metadata(
            &StaticCatalog {
                fail_on: Some("orders"),
            },
            &descriptor,
        )
        .await;

        assert!(matches!(result, Err(SourceSenseError::Introspection { .. })));
    }
}
