//! Core library for SourceSense.
//!
//! This crate connects to a relational database, extracts its schema tree,
//! flags columns whose names suggest sensitive content, and computes
//! aggregate data quality metrics for a bounded set of tables. The
//! [`workflow`] module sequences these steps into a single report.
//!
//! # Security Guarantees
//! - Only catalog queries and `COUNT` aggregates are executed, never row reads
//! - Passwords are zeroed on drop and never logged or serialized
//! - Connection strings are redacted before they reach logs or errors
//!
//! # Architecture
//! - [`adapters`]: one catalog adapter per database kind behind a trait
//! - [`introspection`], [`classifier`], [`quality`]: the analysis steps
//! - [`workflow`]: the orchestrator state machine and its report

pub mod adapters;
pub mod classifier;
pub mod error;
pub mod introspection;
pub mod logging;
pub mod models;
pub mod probe;
pub mod quality;
pub mod workflow;

// Re-export commonly used types
pub use adapters::{CatalogAdapter, connect};
pub use classifier::{
    Confidence, PatternSet, SensitiveCategory, SensitiveDataClassifier, SensitiveDataReport,
    SensitiveFinding,
};
pub use error::{ErrorKind, Result, SourceSenseError};
pub use models::{
    ColumnInfo, ConnectionDescriptor, DatabaseInfo, DatabaseKind, ForeignKeyInfo, IndexInfo,
    SchemaInfo, SchemaMetadata, Statistics, TableInfo,
};
pub use probe::{ConnectionTestResult, probe_connection};
pub use quality::{ColumnQualityMetrics, QualityMetrics};
pub use workflow::{
    AnalysisOptions, DatabaseActivities, Orchestrator, WorkflowActivities, WorkflowReport,
    WorkflowRequest, WorkflowStatus,
};
