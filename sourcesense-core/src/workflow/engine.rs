//! Per-step deadlines.
//!
//! Steps are invoked through [`run_step`], which stands in for the deadline
//! an external execution engine would apply around each step.

use std::future::Future;
use std::time::Duration;

use crate::Result;
use crate::error::SourceSenseError;

use super::step::WorkflowStep;

/// Deadline budget for each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTimeouts {
    /// Connection probe deadline
    pub connection_test: Duration,
    /// Full catalog walk deadline
    pub schema_extraction: Duration,
    /// Classifier deadline
    pub sensitive_data_detection: Duration,
    /// Applied to each table separately
    pub data_quality_analysis: Duration,
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            connection_test: Duration::from_secs(30),
            schema_extraction: Duration::from_secs(600),
            sensitive_data_detection: Duration::from_secs(300),
            data_quality_analysis: Duration::from_secs(180),
        }
    }
}

impl StepTimeouts {
    /// Builder method to set the connection test deadline.
    pub const fn with_connection_test(mut self, deadline: Duration) -> Self {
        self.connection_test = deadline;
        self
    }

    /// Builder method to set the schema extraction deadline.
    pub const fn with_schema_extraction(mut self, deadline: Duration) -> Self {
        self.schema_extraction = deadline;
        self
    }

    /// Builder method to set the sensitive data detection deadline.
    pub const fn with_sensitive_data_detection(mut self, deadline: Duration) -> Self {
        self.sensitive_data_detection = deadline;
        self
    }

    /// Builder method to set the per-table quality analysis deadline.
    pub const fn with_data_quality_analysis(mut self, deadline: Duration) -> Self {
        self.data_quality_analysis = deadline;
        self
    }

    /// Deadline for `step`.
    pub const fn for_step(&self, step: WorkflowStep) -> Duration {
        match step {
            WorkflowStep::ConnectionTest => self.connection_test,
            WorkflowStep::SchemaExtraction => self.schema_extraction,
            WorkflowStep::SensitiveDataDetection => self.sensitive_data_detection,
            WorkflowStep::DataQualityAnalysis => self.data_quality_analysis,
        }
    }

    /// Validates that every deadline is non-zero.
    ///
    /// # Errors
    /// Returns a configuration error naming the first zero deadline.
    pub fn validate(&self) -> Result<()> {
        for step in [
            WorkflowStep::ConnectionTest,
            WorkflowStep::SchemaExtraction,
            WorkflowStep::SensitiveDataDetection,
            WorkflowStep::DataQualityAnalysis,
        ] {
            if self.for_step(step).is_zero() {
                return Err(SourceSenseError::configuration(format!(
                    "{} deadline must be greater than 0",
                    step
                )));
            }
        }
        Ok(())
    }
}

/// Runs `future` under `deadline`.
///
/// # Errors
/// Returns [`SourceSenseError::Timeout`] if the deadline elapses first; the
/// future is dropped, which releases any connection it holds.
pub async fn run_step<F>(step: WorkflowStep, deadline: Duration, future: F) -> Result<F::Output>
where
    F: Future,
{
    tokio::time::timeout(deadline, future).await.map_err(|_| {
        tracing::warn!("Step '{}' timed out after {:?}", step, deadline);
        SourceSenseError::Timeout {
            step: step.to_string(),
            seconds: deadline.as_secs(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = StepTimeouts::default();
        assert_eq!(timeouts.connection_test, Duration::from_secs(30));
        assert_eq!(timeouts.schema_extraction, Duration::from_secs(600));
        assert_eq!(timeouts.sensitive_data_detection, Duration::from_secs(300));
        assert_eq!(timeouts.data_quality_analysis, Duration::from_secs(180));
        assert!(timeouts.validate().is_ok());
    }

    #[test]
    fn test_zero_deadline_rejected() {
        let timeouts = StepTimeouts::default().with_schema_extraction(Duration::ZERO);
        let err = timeouts.validate().unwrap_err();
        assert!(err.to_string().contains("schema_extraction"));
    }

    #[tokio::test]
    async fn test_run_step_completes_within_deadline() {
        let value = run_step(WorkflowStep::ConnectionTest, Duration::from_secs(1), async { 42 })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_step_times_out() {
        let result = run_step(
            WorkflowStep::SchemaExtraction,
            Duration::from_secs(5),
            tokio::time::sleep(Duration::from_secs(60)),
        )
        .await;

        match result {
            Err(SourceSenseError::Timeout { step, seconds }) => {
                assert_eq!(step, "schema_extraction");
                assert_eq!(seconds, 5);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
