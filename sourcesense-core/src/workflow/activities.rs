//! The step boundary: what the orchestrator invokes, one call per step.

use async_trait::async_trait;

use crate::classifier::{SensitiveDataClassifier, SensitiveDataReport};
use crate::introspection;
use crate::models::{ConnectionDescriptor, SchemaMetadata, TableInfo};
use crate::probe::{self, ConnectionTestResult};
use crate::quality::{self, QualityMetrics};

use super::step::StepResult;

/// Steps exposed to the orchestrator.
///
/// Every method takes plain data and returns a tagged result; nothing is
/// raised across this boundary. Implementations must be safe to call
/// concurrently for quality analysis.
#[async_trait]
pub trait WorkflowActivities: Send + Sync {
    /// Probes connectivity.
    async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> ConnectionTestResult;

    /// Introspects the full schema tree.
    async fn extract_schema_metadata(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> StepResult<SchemaMetadata>;

    /// Classifies columns in an extracted tree.
    async fn detect_sensitive_data(
        &self,
        metadata: &SchemaMetadata,
    ) -> StepResult<SensitiveDataReport>;

    /// Computes quality metrics for one table.
    async fn analyze_data_quality(
        &self,
        descriptor: &ConnectionDescriptor,
        table: &TableInfo,
    ) -> StepResult<QualityMetrics>;
}

/// Activities backed by real database connections.
#[derive(Debug, Clone, Default)]
pub struct DatabaseActivities {
    classifier: SensitiveDataClassifier,
}

impl DatabaseActivities {
    /// Creates activities using the given classifier.
    pub const fn new(classifier: SensitiveDataClassifier) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl WorkflowActivities for DatabaseActivities {
    async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> ConnectionTestResult {
        probe::probe_connection(descriptor).await
    }

    async fn extract_schema_metadata(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> StepResult<SchemaMetadata> {
        introspection::introspect(descriptor).await.map_err(|e| {
            tracing::error!("Schema metadata extraction failed: {}", e);
            e.into()
        })
    }

    async fn detect_sensitive_data(
        &self,
        metadata: &SchemaMetadata,
    ) -> StepResult<SensitiveDataReport> {
        Ok(self.classifier.classify(metadata))
    }

    async fn analyze_data_quality(
        &self,
        descriptor: &ConnectionDescriptor,
        table: &TableInfo,
    ) -> StepResult<QualityMetrics> {
        quality::analyze_table_quality(descriptor, table)
            .await
            .map_err(Into::into)
    }
}
