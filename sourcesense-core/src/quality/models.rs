//! Data quality metrics models.
//!
//! Metrics contain only counts and ratios, never actual data values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Null and uniqueness statistics for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnQualityMetrics {
    /// Column name
    pub column_name: String,
    /// Rows where the column is NULL
    pub null_count: u64,
    /// `null_count / total_rows * 100`, or 0 for an empty table
    pub null_percentage: f64,
    /// Distinct non-NULL values
    pub unique_count: u64,
    /// `unique_count / total_rows`, or 0 for an empty table
    pub uniqueness_ratio: f64,
    /// Source type copied from the catalog
    pub data_type: String,
}

impl ColumnQualityMetrics {
    /// Creates column metrics, deriving both ratios from `total_rows`.
    pub fn new(
        column_name: impl Into<String>,
        data_type: impl Into<String>,
        null_count: u64,
        unique_count: u64,
        total_rows: u64,
    ) -> Self {
        let column_name = column_name.into();

        if null_count > total_rows || unique_count > total_rows {
            tracing::warn!(
                "Quality metrics anomaly: null_count ({}) or unique_count ({}) exceeds total ({}) for column '{}'",
                null_count,
                unique_count,
                total_rows,
                column_name
            );
        }

        let (null_percentage, uniqueness_ratio) = if total_rows == 0 {
            (0.0, 0.0)
        } else {
            let total = total_rows as f64;
            (
                null_count as f64 / total * 100.0,
                unique_count as f64 / total,
            )
        };

        Self {
            column_name,
            null_count,
            null_percentage,
            unique_count,
            uniqueness_ratio,
            data_type: data_type.into(),
        }
    }
}

/// Quality metrics for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Schema-qualified table name
    pub table_name: String,
    /// When the table was analyzed
    pub analysis_timestamp: DateTime<Utc>,
    /// `COUNT(*)` at analysis time
    pub total_rows: u64,
    /// Per-column metrics in table column order
    pub columns: Vec<ColumnQualityMetrics>,
}

impl QualityMetrics {
    /// Creates table metrics stamped with the current time.
    pub fn new(
        table_name: impl Into<String>,
        total_rows: u64,
        columns: Vec<ColumnQualityMetrics>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            analysis_timestamp: Utc::now(),
            total_rows,
            columns,
        }
    }

    /// Looks up a column's metrics by name.
    pub fn column(&self, column_name: &str) -> Option<&ColumnQualityMetrics> {
        self.columns
            .iter()
            .find(|column| column.column_name == column_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratios() {
        let metrics = ColumnQualityMetrics::new("email", "text", 25, 50, 100);
        assert!((metrics.null_percentage - 25.0).abs() < f64::EPSILON);
        assert!((metrics.uniqueness_ratio - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_table_ratios_are_zero() {
        let metrics = ColumnQualityMetrics::new("email", "text", 0, 0, 0);
        assert_eq!(metrics.null_percentage, 0.0);
        assert_eq!(metrics.uniqueness_ratio, 0.0);
    }

    #[test]
    fn test_column_lookup() {
        let metrics = QualityMetrics::new(
            "public.users",
            10,
            vec![ColumnQualityMetrics::new("id", "integer", 0, 10, 10)],
        );
        assert_eq!(metrics.column("id").unwrap().unique_count, 10);
        assert!(metrics.column("missing").is_none());
    }
}
