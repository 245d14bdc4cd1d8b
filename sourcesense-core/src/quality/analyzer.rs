//! Per-table quality analysis.
//!
//! One `COUNT(*)` per table plus a null count and a distinct count per
//! column. The round trips are not batched, so callers bound how many tables
//! they analyze.

use crate::Result;
use crate::adapters::{self, CatalogAdapter};
use crate::models::{ConnectionDescriptor, TableInfo};

use super::models::{ColumnQualityMetrics, QualityMetrics};

/// Computes quality metrics for `table` over an open adapter.
///
/// Table and column identifiers come from `table`, which must originate from
/// catalog introspection. They are quoted by the adapter, not validated.
///
/// # Errors
/// Returns the first query error; no partial metrics are produced.
pub async fn analyze_table(adapter: &dyn CatalogAdapter, table: &TableInfo) -> Result<QualityMetrics> {
    let schema = table.schema_name.as_str();
    let name = table.table_name.as_str();

    let total_rows = adapter.count_rows(schema, name).await?;
    tracing::debug!("Table {}.{} has {} rows", schema, name, total_rows);

    let mut columns = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        let null_count = adapter
            .count_nulls(schema, name, &column.column_name)
            .await?;
        let unique_count = adapter
            .count_distinct(schema, name, &column.column_name)
            .await?;

        tracing::trace!(
            "Column {}.{}.{}: {} nulls, {} distinct",
            schema,
            name,
            column.column_name,
            null_count,
            unique_count
        );

        columns.push(ColumnQualityMetrics::new(
            &column.column_name,
            &column.data_type,
            null_count,
            unique_count,
            total_rows,
        ));
    }

    Ok(QualityMetrics::new(table.qualified_name(), total_rows, columns))
}

/// Opens one connection, analyzes `table`, and closes the connection on
/// every exit path.
pub async fn analyze_table_quality(
    descriptor: &ConnectionDescriptor,
    table: &TableInfo,
) -> Result<QualityMetrics> {
    tracing::info!("Analyzing data quality for {}", table.qualified_name());

    let adapter = adapters::connect(descriptor).await?;
    let outcome = analyze_table(adapter.as_ref(), table).await;
    adapter.close().await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceSenseError;
    use crate::models::{ColumnInfo, DatabaseKind};
    use async_trait::async_trait;

    /// Answers counts from a fixed table: 4 rows, `email` has 1 null and 3
    /// distinct values, `broken` always fails.
    struct FixedCounts;

    #[async_trait]
    impl CatalogAdapter for FixedCounts {
        fn database_kind(&self) -> DatabaseKind {
            DatabaseKind::PostgreSql
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        async fn schema_names(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn table_names(&self, _schema: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn columns(&self, _schema: &str, _table: &str) -> Result<Vec<ColumnInfo>> {
            Ok(Vec::new())
        }

        async fn fetch_count(&self, sql: &str) -> Result<u64> {
            if sql.contains("\"broken\"") {
                return Err(SourceSenseError::query_failed(
                    sql.to_string(),
                    std::io::Error::other("column does not exist"),
                ));
            }
            Ok(match (sql.contains("IS NULL"), sql.contains("DISTINCT")) {
                (true, _) => 1,
                (_, true) => 3,
                _ => 4,
            })
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn test_analyze_table() {
        let table = TableInfo::new("public", "users")
            .with_column(ColumnInfo::new("email", "text"));

        let metrics = analyze_table(&FixedCounts, &table).await.unwrap();

        assert_eq!(metrics.table_name, "public.users");
        assert_eq!(metrics.total_rows, 4);
        let email = metrics.column("email").unwrap();
        assert_eq!(email.null_count, 1);
        assert!((email.null_percentage - 25.0).abs() < f64::EPSILON);
        assert_eq!(email.unique_count, 3);
        assert!((email.uniqueness_ratio - 0.75).abs() < f64::EPSILON);
        assert_eq!(email.data_type, "text");
    }

    #[tokio::test]
    async fn test_column_failure_fails_table() {
        let table = TableInfo::new("public", "users")
            .with_column(ColumnInfo::new("email", "text"))
            .with_column(ColumnInfo::new("broken", "text"));

        let err = analyze_table(&FixedCounts, &table).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::PartialAnalysis);
    }
}
