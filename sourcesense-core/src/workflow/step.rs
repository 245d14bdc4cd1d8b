//! Step names and the tagged result shape every step returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, SourceSenseError};

/// Success/error tag carried by step results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Error,
}

/// The discrete steps of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    ConnectionTest,
    SchemaExtraction,
    SensitiveDataDetection,
    DataQualityAnalysis,
}

impl WorkflowStep {
    /// Name recorded in `steps_completed`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionTest => "connection_test",
            Self::SchemaExtraction => "schema_extraction",
            Self::SensitiveDataDetection => "sensitive_data_detection",
            Self::DataQualityAnalysis => "data_quality_analysis",
        }
    }
}

impl std::fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plain-data error returned across the step boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct StepError {
    /// Failure category
    pub kind: ErrorKind,
    /// Human-readable error text
    pub message: String,
    /// When the step failed
    pub timestamp: DateTime<Utc>,
}

impl StepError {
    /// Creates a step error stamped with the current time.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

impl From<SourceSenseError> for StepError {
    fn from(error: SourceSenseError) -> Self {
        Self::new(error.kind(), error.detailed_message())
    }
}

/// Result of one step invocation.
pub type StepResult<T> = std::result::Result<T, StepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_names() {
        assert_eq!(WorkflowStep::ConnectionTest.as_str(), "connection_test");
        assert_eq!(
            serde_json::to_string(&WorkflowStep::SensitiveDataDetection).unwrap(),
            "\"sensitive_data_detection\""
        );
        assert_eq!(
            WorkflowStep::DataQualityAnalysis.to_string(),
            "data_quality_analysis"
        );
    }

    #[test]
    fn test_step_error_from_source_error() {
        let error: StepError = SourceSenseError::invariant("count mismatch").into();
        assert_eq!(error.kind, ErrorKind::InvariantViolation);
        assert_eq!(error.message, "Invariant violated: count mismatch");
        assert_eq!(error.to_string(), error.message);
    }
}
