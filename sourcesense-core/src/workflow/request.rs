//! Workflow input document.

use serde::{Deserialize, Serialize};

use crate::models::ConnectionDescriptor;

fn generate_workflow_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

const fn default_max_tables() -> usize {
    5
}

const fn default_quality_concurrency() -> usize {
    1
}

/// What a workflow run should do beyond the connection test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Stop after a successful connection test
    #[serde(default)]
    pub test_only: bool,
    #[serde(default)]
    pub analyze_data_quality: bool,
    #[serde(default = "default_max_tables")]
    pub max_tables_for_quality_analysis: usize,
    /// Number of tables analyzed concurrently
    #[serde(default = "default_quality_concurrency")]
    pub quality_concurrency: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            test_only: false,
            analyze_data_quality: false,
            max_tables_for_quality_analysis: default_max_tables(),
            quality_concurrency: default_quality_concurrency(),
        }
    }
}

impl AnalysisOptions {
    /// Options for a connection test only.
    pub fn test_only() -> Self {
        Self {
            test_only: true,
            ..Self::default()
        }
    }

    /// Builder method to enable quality analysis over at most `max_tables`.
    pub const fn with_quality_analysis(mut self, max_tables: usize) -> Self {
        self.analyze_data_quality = true;
        self.max_tables_for_quality_analysis = max_tables;
        self
    }

    /// Builder method to set quality analysis concurrency.
    pub const fn with_quality_concurrency(mut self, concurrency: usize) -> Self {
        self.quality_concurrency = concurrency;
        self
    }

    /// Concurrency actually used for `selected` tables, at least 1.
    pub fn effective_concurrency(&self, selected: usize) -> usize {
        self.quality_concurrency.clamp(1, selected.max(1))
    }
}

/// One workflow invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRequest {
    /// Random UUID when omitted
    #[serde(default = "generate_workflow_id")]
    pub workflow_id: String,
    /// Target database
    pub connection_config: ConnectionDescriptor,
    #[serde(default)]
    pub analysis_options: AnalysisOptions,
}

impl WorkflowRequest {
    /// Creates a request with a fresh workflow id and default options.
    pub fn new(connection_config: ConnectionDescriptor) -> Self {
        Self {
            workflow_id: generate_workflow_id(),
            connection_config,
            analysis_options: AnalysisOptions::default(),
        }
    }

    /// Builder method to set the workflow id.
    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = workflow_id.into();
        self
    }

    /// Builder method to set analysis options.
    pub const fn with_options(mut self, analysis_options: AnalysisOptions) -> Self {
        self.analysis_options = analysis_options;
        self
    }
}
