//! Bounded fan-out: which tables get quality analysis.

use crate::models::{SchemaMetadata, TableInfo};

/// Picks up to `max_tables` tables from the first `max_schemas` schemas.
///
/// Schemas and tables are taken in discovery order and selection stops as
/// soon as `max_tables` is reached. Either bound being 0 selects nothing.
pub fn select_tables_for_quality(
    metadata: &SchemaMetadata,
    max_tables: usize,
    max_schemas: usize,
) -> Vec<&TableInfo> {
    metadata
        .schemas()
        .iter()
        .take(max_schemas)
        .flat_map(|schema| schema.tables.iter())
        .take(max_tables)
        .collect()
}
