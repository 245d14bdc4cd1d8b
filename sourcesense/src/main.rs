//! SourceSense command-line front end.
//!
//! Builds a workflow request from flags or a JSON document, runs the
//! orchestrator, and writes the report as JSON.
//!
//! # Security Guarantees
//! - Catalog queries and COUNT aggregates only
//! - Passwords are never logged or written to the report
//!
//! # Exit Status
//! 0 when the report is `completed`, 1 when it is `failed` or arguments are
//! invalid.

mod cli;
mod output;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use sourcesense_core::adapters;
use sourcesense_core::logging::init_logging;
use sourcesense_core::models::{ConnectionDescriptor, DatabaseKind};
use sourcesense_core::probe::redacted_connection_target;
use sourcesense_core::workflow::{Orchestrator, StepTimeouts, WorkflowRequest};
use tracing::{error, info};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(
        cli.global.verbose,
        cli.global.quiet,
        cli.global.log_format.into(),
    )?;

    match &cli.command {
        Command::Run(args) => {
            let request = output::read_request(&args.request).await?;
            let timeouts = args.deadlines.timeouts()?;
            execute(request, timeouts, args.output.output.as_deref()).await
        }
        Command::Analyze(args) => {
            let request = args.request()?;
            let timeouts = args.deadlines.timeouts()?;
            execute(request, timeouts, args.output.output.as_deref()).await
        }
        Command::Test(args) => {
            let request = args.request()?;
            let timeouts = args.deadlines.timeouts()?;
            execute(request, timeouts, args.output.output.as_deref()).await
        }
        Command::List => {
            list_supported_databases();
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Runs one workflow and writes its report.
async fn execute(
    request: WorkflowRequest,
    timeouts: StepTimeouts,
    output_path: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    info!("Workflow {}", request.workflow_id);
    info!(
        "Target: {}",
        redacted_connection_target(&request.connection_config)
    );

    let report = Orchestrator::default()
        .with_timeouts(timeouts)
        .run(request)
        .await;

    output::write_report(&report, output_path).await?;

    if report.is_completed() {
        info!(
            "Workflow completed with {} steps",
            report.steps_completed.len()
        );
        Ok(ExitCode::SUCCESS)
    } else {
        error!(
            "Workflow failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
        Ok(ExitCode::FAILURE)
    }
}

/// Lists supported database kinds and their connection target forms
fn list_supported_databases() {
    println!("Supported Database Kinds:");
    println!();

    for kind in DatabaseKind::ALL {
        let status = if adapters::is_compiled_in(kind) {
            "available"
        } else {
            "not compiled in"
        };
        let example = ConnectionDescriptor::new(kind, "database")
            .with_username("user")
            .with_password("password");

        println!("{} ({}):", kind, status);
        match kind.default_port() {
            Some(port) => println!("  Default port: {}", port),
            None => println!("  Default port: none (file database)"),
        }
        println!("  Target:       {}", redacted_connection_target(&example));
        println!();
    }

    println!("Security Features:");
    println!("  • Catalog queries and COUNT aggregates only");
    println!("  • Credential redaction in logs");
    println!("  • Passwords never written to reports");
}
