//! Data quality assessment module.
//!
//! Computes row counts and per-column null and distinct counts for a bounded
//! set of tables.
//!
//! # Security Guarantees
//! - Only aggregate `COUNT` queries are issued; no row values are read
//! - Metrics expose counts and ratios only
//!
//! # Example
//! ```rust,ignore
//! use sourcesense_core::quality::{analyze_table_quality, select_tables_for_quality};
//!
//! for table in select_tables_for_quality(&metadata, 5, 2) {
//!     let metrics = analyze_table_quality(&descriptor, table).await?;
//!     println!("{}: {} rows", metrics.table_name, metrics.total_rows);
//! }
//! ```

mod analyzer;
mod models;
mod selection;

pub use analyzer::{analyze_table, analyze_table_quality};
pub use models::{ColumnQualityMetrics, QualityMetrics};
pub use selection::select_tables_for_quality;
