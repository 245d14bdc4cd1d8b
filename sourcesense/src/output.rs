//! Reading workflow requests and writing workflow reports.

use std::path::Path;

use anyhow::Context;
use sourcesense_core::workflow::{WorkflowReport, WorkflowRequest};
use tokio::io::AsyncWriteExt;

/// Loads a workflow request document.
pub async fn read_request(path: &Path) -> anyhow::Result<WorkflowRequest> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read request file {}", path.display()))?;
    parse_request(&contents).with_context(|| format!("Invalid request in {}", path.display()))
}

fn parse_request(contents: &str) -> anyhow::Result<WorkflowRequest> {
    let request: WorkflowRequest = serde_json::from_str(contents)?;
    request.connection_config.validate()?;
    Ok(request)
}

/// Writes the report as pretty JSON to `path`, or to stdout.
pub async fn write_report(report: &WorkflowReport, path: Option<&Path>) -> anyhow::Result<()> {
    let mut json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    json.push('\n');

    match path {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            tracing::info!("Report saved to {}", path.display());
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(json.as_bytes())
                .await
                .context("Failed to write report to stdout")?;
            stdout.flush().await.context("Failed to flush stdout")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcesense_core::workflow::WorkflowStatus;

    #[test]
    fn test_parse_request_with_defaults() {
        let request = parse_request(
            r#"{
                "workflow_id": "wf-file",
                "connection_config": {
                    "database_kind": "postgresql",
                    "host": "db",
                    "database_name": "app",
                    "username": "reader",
                    "password": "secret"
                },
                "analysis_options": {"analyze_data_quality": true}
            }"#,
        )
        .unwrap();

        assert_eq!(request.workflow_id, "wf-file");
        assert!(request.connection_config.has_password());
        assert!(request.analysis_options.analyze_data_quality);
        assert_eq!(request.analysis_options.max_tables_for_quality_analysis, 5);
    }

    #[test]
    fn test_parse_request_rejects_invalid_descriptor() {
        let result = parse_request(
            r#"{"connection_config": {"database_kind": "postgresql", "host": "", "database": "app"}}"#,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_read_missing_request_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_request(&dir.path().join("absent.json")).await;
        assert!(result.unwrap_err().to_string().contains("absent.json"));
    }

    #[tokio::test]
    async fn test_write_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let mut report = WorkflowReport::new("wf-out");
        report.status = WorkflowStatus::Failed;
        report.error = Some("Database connection failed".to_string());
        write_report(&report, Some(&path)).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["workflow_id"], "wf-out");
        assert_eq!(written["status"], "failed");
        assert_eq!(written["error"], "Database connection failed");
    }
}
