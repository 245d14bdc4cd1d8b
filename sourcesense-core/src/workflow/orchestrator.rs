//! Pipeline orchestration as an explicit state machine.
//!
//! ```text
//! Started -> ConnectionTested -> SchemaExtracted -> SensitiveScanned
//!         -> QualityAnalyzed -> Completed
//! ```
//!
//! Every state has one transition function. A fatal step result moves to
//! `Failed`; a successful test-only probe moves straight to `Completed`.
//! Transitions only go forward and nothing is retried here.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt, stream};

use crate::models::TableInfo;
use crate::probe::ConnectionTestResult;
use crate::quality::{QualityMetrics, select_tables_for_quality};

use super::activities::{DatabaseActivities, WorkflowActivities};
use super::engine::{StepTimeouts, run_step};
use super::report::{ExecutionSummary, WorkflowReport, WorkflowStatus};
use super::request::WorkflowRequest;
use super::step::{StepError, StepResult, WorkflowStep};

/// Quality analysis only draws tables from this many leading schemas.
pub const MAX_QUALITY_SCHEMAS: usize = 2;

/// Position of a run in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    Started,
    ConnectionTested,
    SchemaExtracted,
    SensitiveScanned,
    QualityAnalyzed,
    Completed,
    Failed(String),
}

/// Sequences the workflow steps for one request at a time.
///
/// # Example
/// ```rust,no_run
/// use sourcesense_core::models::{ConnectionDescriptor, DatabaseKind};
/// use sourcesense_core::workflow::{Orchestrator, WorkflowRequest};
///
/// # async fn run() {
/// let request = WorkflowRequest::new(ConnectionDescriptor::new(DatabaseKind::Sqlite, "app.db"));
/// let report = Orchestrator::default().run(request).await;
/// println!("{}", report.status);
/// # }
/// ```
pub struct Orchestrator {
    activities: Arc<dyn WorkflowActivities>,
    timeouts: StepTimeouts,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(Arc::new(DatabaseActivities::default()))
    }
}

impl Orchestrator {
    /// Creates an orchestrator over the given step implementations.
    pub fn new(activities: Arc<dyn WorkflowActivities>) -> Self {
        Self {
            activities,
            timeouts: StepTimeouts::default(),
        }
    }

    /// Builder method to set step deadlines.
    pub const fn with_timeouts(mut self, timeouts: StepTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Runs the workflow to completion.
    ///
    /// Never fails: errors and panics inside steps become a `failed` report
    /// that keeps whatever the earlier steps produced.
    pub async fn run(&self, request: WorkflowRequest) -> WorkflowReport {
        tracing::info!(
            workflow_id = %request.workflow_id,
            "Starting workflow for {}",
            request.connection_config
        );

        let mut report = WorkflowReport::new(request.workflow_id.clone());
        let outcome = AssertUnwindSafe(self.drive(&request, &mut report))
            .catch_unwind()
            .await;

        if let Err(payload) = outcome {
            let message = panic_message(payload.as_ref());
            tracing::error!(workflow_id = %request.workflow_id, "Workflow execution failed: {}", message);
            report.status = WorkflowStatus::Failed;
            report.error = Some(message);
        }

        report
    }

    async fn drive(&self, request: &WorkflowRequest, report: &mut WorkflowReport) {
        let mut state = WorkflowState::Started;
        loop {
            state = match state {
                WorkflowState::Started => self.test_connection(request, report).await,
                WorkflowState::ConnectionTested => self.extract_schema(request, report).await,
                WorkflowState::SchemaExtracted => self.detect_sensitive_data(report).await,
                WorkflowState::SensitiveScanned => self.analyze_quality(request, report).await,
                WorkflowState::QualityAnalyzed => Self::summarize(report),
                WorkflowState::Completed => {
                    report.status = WorkflowStatus::Completed;
                    tracing::info!(workflow_id = %request.workflow_id, "Workflow completed successfully");
                    return;
                }
                WorkflowState::Failed(message) => {
                    tracing::error!(workflow_id = %request.workflow_id, "Workflow failed: {}", message);
                    report.status = WorkflowStatus::Failed;
                    report.error = Some(message);
                    return;
                }
            };
        }
    }

    async fn test_connection(
        &self,
        request: &WorkflowRequest,
        report: &mut WorkflowReport,
    ) -> WorkflowState {
        tracing::info!("Step 1: Testing database connection");

        let step = WorkflowStep::ConnectionTest;
        let result = run_step(
            step,
            self.timeouts.for_step(step),
            self.activities.test_connection(&request.connection_config),
        )
        .await
        .unwrap_or_else(|e| ConnectionTestResult::failure(&e));

        let successful = result.is_success();
        report.connection_test = Some(result);
        report.steps_completed.push(step);

        if !successful {
            return WorkflowState::Failed("Database connection failed".to_string());
        }

        if request.analysis_options.test_only {
            tracing::info!("Connection test completed successfully, test-only mode");
            report.execution_summary = ExecutionSummary::test_only();
            return WorkflowState::Completed;
        }

        WorkflowState::ConnectionTested
    }

    async fn extract_schema(
        &self,
        request: &WorkflowRequest,
        report: &mut WorkflowReport,
    ) -> WorkflowState {
        tracing::info!("Step 2: Extracting schema metadata");

        let step = WorkflowStep::SchemaExtraction;
        let result = self
            .bounded(
                step,
                self.activities
                    .extract_schema_metadata(&request.connection_config),
            )
            .await;
        report.steps_completed.push(step);

        match result {
            Ok(metadata) => {
                report.schema_metadata = Some(metadata);
                WorkflowState::SchemaExtracted
            }
            Err(e) => WorkflowState::Failed(format!(
                "Schema metadata extraction failed: {}",
                e.message
            )),
        }
    }

    async fn detect_sensitive_data(&self, report: &mut WorkflowReport) -> WorkflowState {
        tracing::info!("Step 3: Detecting sensitive data");

        let Some(metadata) = report.schema_metadata.as_ref() else {
            return WorkflowState::Failed(
                "Sensitive data detection requires extracted schema metadata".to_string(),
            );
        };

        let step = WorkflowStep::SensitiveDataDetection;
        let result = self
            .bounded(step, self.activities.detect_sensitive_data(metadata))
            .await;
        match result {
            Ok(sensitive) => {
                report.sensitive_data = Some(sensitive);
                report.steps_completed.push(step);
                WorkflowState::SensitiveScanned
            }
            Err(e) => WorkflowState::Failed(e.message),
        }
    }

    async fn analyze_quality(
        &self,
        request: &WorkflowRequest,
        report: &mut WorkflowReport,
    ) -> WorkflowState {
        let options = &request.analysis_options;
        if !options.analyze_data_quality {
            return WorkflowState::QualityAnalyzed;
        }
        let Some(metadata) = report.schema_metadata.as_ref() else {
            return WorkflowState::Failed(
                "Data quality analysis requires extracted schema metadata".to_string(),
            );
        };

        tracing::info!("Step 4: Analyzing data quality");

        let selected = select_tables_for_quality(
            metadata,
            options.max_tables_for_quality_analysis,
            MAX_QUALITY_SCHEMAS,
        );
        let concurrency = options.effective_concurrency(selected.len());
        tracing::debug!(
            "Selected {} tables for quality analysis, {} at a time",
            selected.len(),
            concurrency
        );

        let outcomes: Vec<(String, StepResult<QualityMetrics>)> = stream::iter(selected)
            .map(move |table| self.analyze_one(request, table))
            .buffered(concurrency)
            .collect()
            .await;

        let mut analyses = Vec::with_capacity(outcomes.len());
        let mut warnings = Vec::new();
        for (table_name, outcome) in outcomes {
            match outcome {
                Ok(metrics) => analyses.push(metrics),
                Err(e) => {
                    let warning =
                        format!("Quality analysis failed for table {}: {}", table_name, e.message);
                    tracing::warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        report.data_quality = Some(analyses);
        report.warnings.extend(warnings);
        report.steps_completed.push(WorkflowStep::DataQualityAnalysis);
        WorkflowState::QualityAnalyzed
    }

    async fn analyze_one(
        &self,
        request: &WorkflowRequest,
        table: &TableInfo,
    ) -> (String, StepResult<QualityMetrics>) {
        let outcome = self
            .bounded(
                WorkflowStep::DataQualityAnalysis,
                self.activities
                    .analyze_data_quality(&request.connection_config, table),
            )
            .await;
        (table.qualified_name(), outcome)
    }

    fn summarize(report: &mut WorkflowReport) -> WorkflowState {
        report.execution_summary = report.summarize(WorkflowStatus::Completed);
        WorkflowState::Completed
    }

    /// Applies the step deadline and flattens a timeout into a step error.
    async fn bounded<T, F>(&self, step: WorkflowStep, future: F) -> StepResult<T>
    where
        F: Future<Output = StepResult<T>>,
    {
        match run_step(step, self.timeouts.for_step(step), future).await {
            Ok(result) => result,
            Err(e) => Err(StepError::from(e)),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("Workflow execution failed: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(
            panic_message(payload.as_ref()),
            "Workflow execution failed: boom"
        );

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(
            panic_message(payload.as_ref()),
            "Workflow execution failed: owned"
        );
    }
}
