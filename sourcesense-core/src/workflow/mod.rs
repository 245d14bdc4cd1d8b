//! Workflow orchestration.
//!
//! A run probes the connection, extracts the schema tree, classifies
//! sensitive columns, optionally analyzes data quality for a bounded set of
//! tables, and returns a single [`WorkflowReport`].
//!
//! # Module Structure
//! - `step`: step names and the tagged step result
//! - `engine`: per-step deadlines
//! - `activities`: the step boundary and its database-backed implementation
//! - `request` / `report`: input and output documents
//! - `orchestrator`: the state machine

mod activities;
mod engine;
mod orchestrator;
mod report;
mod request;
mod step;

pub use activities::{DatabaseActivities, WorkflowActivities};
pub use engine::{StepTimeouts, run_step};
pub use orchestrator::{MAX_QUALITY_SCHEMAS, Orchestrator, WorkflowState};
pub use report::{ExecutionSummary, WorkflowReport, WorkflowStatus};
pub use request::{AnalysisOptions, WorkflowRequest};
pub use step::{StepError, StepResult, StepStatus, WorkflowStep};
