//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use sourcesense_core::logging::LogFormat;
use sourcesense_core::models::{ConnectionDescriptor, DatabaseKind};
use sourcesense_core::workflow::{AnalysisOptions, StepTimeouts, WorkflowRequest};

#[derive(Parser)]
#[command(name = "sourcesense")]
#[command(about = "Database metadata extraction and sensitivity analysis tool")]
#[command(version)]
#[command(long_about = "
SourceSense - database metadata, sensitivity and quality analysis

Each run tests the connection, extracts the schema tree, flags columns whose
names suggest sensitive content, and optionally computes null and uniqueness
statistics for a bounded number of tables. The result is one JSON report.

SECURITY FEATURES:
- Catalog queries and COUNT aggregates only, no row reads
- Passwords are never logged or written to the report
- Read-only sessions where the database supports them

EXAMPLES:
  sourcesense test --kind postgresql --database app --username reader --prompt-password
  sourcesense analyze --kind sqlite --database ./app.db --analyze-quality
  sourcesense run --request request.json --output report.json
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a workflow described by a JSON request file
    Run(RunArgs),
    /// Run a workflow built from command-line flags
    Analyze(AnalyzeArgs),
    /// Test the database connection only
    Test(TestArgs),
    /// List supported database kinds
    List,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[derive(Args)]
pub struct RunArgs {
    /// Workflow request document
    #[arg(long, help = "Path to a JSON workflow request")]
    pub request: PathBuf,

    #[command(flatten)]
    pub deadlines: DeadlineArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub analysis: AnalysisArgs,

    #[command(flatten)]
    pub deadlines: DeadlineArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl AnalyzeArgs {
    /// Builds the workflow request, prompting for a password if asked to.
    pub fn request(&self) -> anyhow::Result<WorkflowRequest> {
        let descriptor = self.connection.descriptor()?;
        Ok(self.analysis.apply(WorkflowRequest::new(descriptor)))
    }
}

#[derive(Args)]
pub struct TestArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Workflow identifier
    #[arg(long, help = "Workflow id recorded in the report (random if omitted)")]
    pub workflow_id: Option<String>,

    #[command(flatten)]
    pub deadlines: DeadlineArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl TestArgs {
    /// Builds a test-only workflow request.
    pub fn request(&self) -> anyhow::Result<WorkflowRequest> {
        let descriptor = self.connection.descriptor()?;
        let mut request =
            WorkflowRequest::new(descriptor).with_options(AnalysisOptions::test_only());
        if let Some(id) = &self.workflow_id {
            request = request.with_workflow_id(id.clone());
        }
        Ok(request)
    }
}

#[derive(Args)]
pub struct ConnectionArgs {
    /// Database kind
    #[arg(
        long,
        env = "SOURCESENSE_KIND",
        help = "Database kind (postgresql, mysql, sqlite, mssql)"
    )]
    pub kind: DatabaseKind,

    /// Database host
    #[arg(long, env = "SOURCESENSE_HOST", default_value = "localhost")]
    pub host: String,

    /// Database port
    #[arg(long, env = "SOURCESENSE_PORT", help = "Port (defaults per database kind)")]
    pub port: Option<u16>,

    /// Database name
    #[arg(
        long,
        env = "SOURCESENSE_DATABASE",
        help = "Database name, or file path for SQLite"
    )]
    pub database: String,

    /// Database user
    #[arg(long, env = "SOURCESENSE_USERNAME", default_value = "")]
    pub username: String,

    /// Database password
    #[arg(
        long,
        env = "SOURCESENSE_PASSWORD",
        hide_env_values = true,
        conflicts_with = "prompt_password",
        help = "Password (prefer the environment variable or --prompt-password)"
    )]
    pub password: Option<String>,

    /// Prompt for the password
    #[arg(long, help = "Read the password from the terminal without echo")]
    pub prompt_password: bool,
}

impl ConnectionArgs {
    /// Builds and validates the descriptor.
    pub fn descriptor(&self) -> anyhow::Result<ConnectionDescriptor> {
        let password = if self.prompt_password {
            let password = rpassword::prompt_password("Database password: ")
                .context("Failed to read password")?;
            Some(password)
        } else {
            self.password.clone()
        };
        self.descriptor_with_password(password)
    }

    fn descriptor_with_password(
        &self,
        password: Option<String>,
    ) -> anyhow::Result<ConnectionDescriptor> {
        let mut descriptor = ConnectionDescriptor::new(self.kind, self.database.clone())
            .with_host(self.host.clone())
            .with_username(self.username.clone());
        if let Some(port) = self.port {
            descriptor = descriptor.with_port(port);
        }
        if let Some(password) = password {
            descriptor = descriptor.with_password(password);
        }

        descriptor
            .validate()
            .context("Invalid connection settings")?;
        Ok(descriptor)
    }
}

#[derive(Args)]
pub struct AnalysisArgs {
    /// Stop after the connection test
    #[arg(long, help = "Only test the connection")]
    pub test_only: bool,

    /// Run data quality analysis
    #[arg(long, help = "Compute null and uniqueness statistics per column")]
    pub analyze_quality: bool,

    /// Quality analysis table limit
    #[arg(long, default_value_t = 5, help = "Maximum tables for quality analysis")]
    pub max_tables: usize,

    /// Quality analysis concurrency
    #[arg(long, default_value_t = 1, help = "Tables analyzed concurrently")]
    pub quality_concurrency: usize,

    /// Workflow identifier
    #[arg(long, help = "Workflow id recorded in the report (random if omitted)")]
    pub workflow_id: Option<String>,
}

impl AnalysisArgs {
    fn apply(&self, request: WorkflowRequest) -> WorkflowRequest {
        let options = AnalysisOptions {
            test_only: self.test_only,
            analyze_data_quality: self.analyze_quality,
            max_tables_for_quality_analysis: self.max_tables,
            quality_concurrency: self.quality_concurrency,
        };
        let request = request.with_options(options);
        match &self.workflow_id {
            Some(id) => request.with_workflow_id(id.clone()),
            None => request,
        }
    }
}

#[derive(Args)]
pub struct DeadlineArgs {
    /// Connection test deadline
    #[arg(long, value_name = "SECS", help = "Connection test deadline in seconds")]
    pub connection_timeout: Option<u64>,

    /// Schema extraction deadline
    #[arg(long, value_name = "SECS", help = "Schema extraction deadline in seconds")]
    pub schema_timeout: Option<u64>,

    /// Sensitive data detection deadline
    #[arg(long, value_name = "SECS", help = "Sensitive data detection deadline in seconds")]
    pub detection_timeout: Option<u64>,

    /// Per-table quality analysis deadline
    #[arg(long, value_name = "SECS", help = "Per-table quality analysis deadline in seconds")]
    pub quality_timeout: Option<u64>,
}

impl DeadlineArgs {
    /// Default deadlines with any overrides applied.
    pub fn timeouts(&self) -> anyhow::Result<StepTimeouts> {
        let mut timeouts = StepTimeouts::default();
        if let Some(secs) = self.connection_timeout {
            timeouts = timeouts.with_connection_test(Duration::from_secs(secs));
        }
        if let Some(secs) = self.schema_timeout {
            timeouts = timeouts.with_schema_extraction(Duration::from_secs(secs));
        }
        if let Some(secs) = self.detection_timeout {
            timeouts = timeouts.with_sensitive_data_detection(Duration::from_secs(secs));
        }
        if let Some(secs) = self.quality_timeout {
            timeouts = timeouts.with_data_quality_analysis(Duration::from_secs(secs));
        }
        timeouts.validate().context("Invalid step deadline")?;
        Ok(timeouts)
    }
}

#[derive(Args)]
pub struct OutputArgs {
    /// Report destination
    #[arg(short, long, help = "Write the JSON report to this file instead of stdout")]
    pub output: Option<PathBuf>,
}
