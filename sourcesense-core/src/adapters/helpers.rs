//! Helper utilities shared by the sqlx-backed adapters.

use sqlx::Row;

use crate::Result;
use crate::error::SourceSenseError;

/// Extension trait for extracting typed values from catalog rows
/// with consistent error handling.
///
/// # Example
/// ```rust,ignore
/// let name: String = row.get_field("column_name", Some("public.users"))?;
/// let comment: Option<String> = row.get_field("comment", None)?;
/// ```
pub(crate) trait RowExt {
    /// Database the row belongs to.
    type Db: sqlx::Database;

    /// Extracts a typed field from the row with proper error context.
    fn get_field<'r, T>(&'r self, field_name: &str, table_context: Option<&str>) -> Result<T>
    where
        T: sqlx::Decode<'r, Self::Db> + sqlx::Type<Self::Db>;
}

impl<R> RowExt for R
where
    R: Row,
    for<'a> &'a str: sqlx::ColumnIndex<R>,
{
    type Db = R::Database;

    fn get_field<'r, T>(&'r self, field_name: &str, table_context: Option<&str>) -> Result<T>
    where
        T: sqlx::Decode<'r, Self::Db> + sqlx::Type<Self::Db>,
    {
        self.try_get(field_name)
            .map_err(|e| SourceSenseError::parse_field(field_name, table_context, e))
    }
}

/// Converts a driver count into `u64`, rejecting negatives.
pub(crate) fn non_negative(count: i64, context: &str) -> Result<u64> {
    u64::try_from(count).map_err(|e| {
        SourceSenseError::query_failed(format!("negative count returned by {}", context), e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_negative() {
        assert_eq!(non_negative(42, "COUNT(*)").unwrap(), 42);
        assert!(non_negative(-1, "COUNT(*)").is_err());
    }
}
