//! Property tests for the pure parts of the pipeline.

use proptest::prelude::*;
use sourcesense_core::models::{
    ColumnInfo, ConnectionDescriptor, DatabaseInfo, DatabaseKind, SchemaInfo, SchemaMetadata,
    TableInfo,
};
use sourcesense_core::probe::connection_target;
use sourcesense_core::quality::{ColumnQualityMetrics, select_tables_for_quality};
use sourcesense_core::{SensitiveCategory, SensitiveDataClassifier};

fn identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}"
}

/// Schema layout as lists of tables, each a list of column names.
fn layout() -> impl Strategy<Value = Vec<Vec<Vec<String>>>> {
    prop::collection::vec(
        prop::collection::vec(prop::collection::vec(identifier(), 0..6), 0..5),
        0..4,
    )
}

fn build_metadata(layout: &[Vec<Vec<String>>]) -> SchemaMetadata {
    let mut metadata = SchemaMetadata::new(DatabaseInfo::new(DatabaseKind::PostgreSql, "db"));
    for (schema_index, tables) in layout.iter().enumerate() {
        let schema_name = format!("s{}", schema_index);
        let mut schema = SchemaInfo::new(schema_name.clone());
        for (table_index, columns) in tables.iter().enumerate() {
            let mut table = TableInfo::new(schema_name.clone(), format!("t{}", table_index));
            for column in columns {
                table = table.with_column(ColumnInfo::new(column.clone(), "text"));
            }
            schema = schema.with_table(table);
        }
        metadata.push_schema(schema);
    }
    metadata
}

fn kind() -> impl Strategy<Value = DatabaseKind> {
    prop::sample::select(DatabaseKind::ALL.to_vec())
}

proptest! {
    #[test]
    fn statistics_match_tree(layout in layout()) {
        let metadata = build_metadata(&layout);
        let stats = metadata.statistics();

        prop_assert_eq!(stats.total_schemas, layout.len());
        prop_assert_eq!(stats.total_tables, layout.iter().map(Vec::len).sum::<usize>());
        prop_assert_eq!(
            stats.total_columns,
            layout.iter().flatten().map(Vec::len).sum::<usize>()
        );
        prop_assert!(metadata.verify_statistics().is_ok());

        let json = serde_json::to_string(&metadata).unwrap();
        let restored: SchemaMetadata = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(restored.statistics(), stats);
    }

    #[test]
    fn classification_is_deterministic(layout in layout()) {
        let metadata = build_metadata(&layout);
        let classifier = SensitiveDataClassifier::default();

        let first = classifier.classify(&metadata);
        let second = classifier.classify(&metadata);

        prop_assert_eq!(&first.sensitive_columns, &second.sensitive_columns);
        prop_assert_eq!(&first.summary, &second.summary);
        prop_assert_eq!(first.summary.values().sum::<usize>(), first.sensitive_columns.len());
        for category in [
            SensitiveCategory::Pii,
            SensitiveCategory::Financial,
            SensitiveCategory::Health,
            SensitiveCategory::Authentication,
        ] {
            prop_assert!(first.summary.contains_key(&category));
        }
        for finding in &first.sensitive_columns {
            prop_assert!(finding.column_name.to_lowercase().contains(&finding.pattern_matched));
        }
    }

    #[test]
    fn quality_selection_respects_bounds(
        layout in layout(),
        max_tables in 0usize..8,
        max_schemas in 0usize..4,
    ) {
        let metadata = build_metadata(&layout);
        let selected = select_tables_for_quality(&metadata, max_tables, max_schemas);

        let available: usize = layout.iter().take(max_schemas).map(Vec::len).sum();
        prop_assert_eq!(selected.len(), available.min(max_tables));
        for table in &selected {
            let index: usize = table.schema_name[1..].parse().unwrap();
            prop_assert!(index < max_schemas);
        }
    }

    #[test]
    fn connection_target_is_deterministic(
        kind in kind(),
        host in "[a-z]{1,10}",
        port in prop::option::of(1u16..),
        database in identifier(),
        username in identifier(),
        password in "[A-Za-z0-9]{0,12}",
    ) {
        let mut descriptor = ConnectionDescriptor::new(kind, database.clone())
            .with_host(host)
            .with_username(username)
            .with_password(password);
        if let Some(port) = port {
            descriptor = descriptor.with_port(port);
        }

        let first = connection_target(&descriptor).unwrap();
        prop_assert_eq!(&first, &connection_target(&descriptor.clone()).unwrap());
        prop_assert!(first.contains(&database));
    }

    #[test]
    fn quality_ratios_stay_in_range(total in 0u64..10_000, nulls in 0u64..10_000, uniques in 0u64..10_000) {
        let nulls = nulls.min(total);
        let uniques = uniques.min(total);
        let metrics = ColumnQualityMetrics::new("c", "text", nulls, uniques, total);

        prop_assert!((0.0..=100.0).contains(&metrics.null_percentage));
        prop_assert!((0.0..=1.0).contains(&metrics.uniqueness_ratio));
        if total == 0 {
            prop_assert_eq!(metrics.null_percentage, 0.0);
            prop_assert_eq!(metrics.uniqueness_ratio, 0.0);
        }
    }
}
