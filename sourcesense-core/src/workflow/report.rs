//! Workflow output document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classifier::{SensitiveCategory, SensitiveDataReport};
use crate::models::SchemaMetadata;
use crate::probe::ConnectionTestResult;
use crate::quality::QualityMetrics;

use super::step::WorkflowStep;

/// Lifecycle status of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

/// Roll-up of a finished run. Unset fields are omitted from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_successful: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_status: Option<WorkflowStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_schemas: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tables: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_columns: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitive_columns_found: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitive_categories: Option<BTreeMap<SensitiveCategory, usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables_analyzed_for_quality: Option<usize>,
}

impl ExecutionSummary {
    /// Summary for a successful connection-test-only run.
    pub fn test_only() -> Self {
        Self {
            test_only: Some(true),
            connection_successful: Some(true),
            ..Self::default()
        }
    }
}

/// The single output of a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReport {
    /// Identifier from the request
    pub workflow_id: String,
    /// `running` until the pipeline exits
    pub status: WorkflowStatus,
    /// Steps that ran, in execution order
    pub steps_completed: Vec<WorkflowStep>,
    /// Probe outcome
    pub connection_test: Option<ConnectionTestResult>,
    /// Extracted metadata tree
    pub schema_metadata: Option<SchemaMetadata>,
    /// Per-table metrics in selection order
    pub data_quality: Option<Vec<QualityMetrics>>,
    /// Classifier output
    pub sensitive_data: Option<SensitiveDataReport>,
    /// Counts recorded when the run finishes
    pub execution_summary: ExecutionSummary,
    /// Why the run failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Tables skipped during quality analysis
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl WorkflowReport {
    /// A fresh report in the `running` state.
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            status: WorkflowStatus::Running,
            steps_completed: Vec::new(),
            connection_test: None,
            schema_metadata: None,
            data_quality: None,
            sensitive_data: None,
            execution_summary: ExecutionSummary::default(),
            error: None,
            warnings: Vec::new(),
        }
    }

    /// Whether the run finished successfully.
    pub fn is_completed(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    /// Builds the full summary from the report's current contents.
    pub fn summarize(&self, completion_status: WorkflowStatus) -> ExecutionSummary {
        let mut summary = ExecutionSummary {
            total_steps: Some(self.steps_completed.len()),
            completion_status: Some(completion_status),
            ..ExecutionSummary::default()
        };

        if let Some(metadata) = &self.schema_metadata {
            let stats = metadata.statistics();
            summary.total_schemas = Some(stats.total_schemas);
            summary.total_tables = Some(stats.total_tables);
            summary.total_columns = Some(stats.total_columns);
        }

        if let Some(sensitive) = &self.sensitive_data {
            summary.sensitive_columns_found = Some(sensitive.sensitive_columns.len());
            summary.sensitive_categories = Some(sensitive.summary.clone());
        }

        if let Some(quality) = &self.data_quality {
            summary.tables_analyzed_for_quality = Some(quality.len());
        }

        summary
    }
}
