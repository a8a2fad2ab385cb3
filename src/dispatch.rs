//! # Report Collaborator Boundaries
//!
//! Notification delivery and report persistence are collaborators the core
//! hands finished data to; the traits here are that boundary. The shipped
//! implementations are deliberately thin: structured-log notification and a
//! local JSON artifact. Anything heavier (message buses, object storage)
//! implements the same traits out of tree.

use crate::error::{Result, SentinelError};
use crate::evaluator::Severity;
use crate::report::{RunResult, TestReport};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Receives the finished report and emits it through whatever channel is
/// configured.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, report: &TestReport) -> Result<()>;
}

/// Dispatcher that renders the notification body into the structured log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, report: &TestReport) -> Result<()> {
        let critical = report
            .alerts
            .iter()
            .filter(|a| a.severity == Severity::Critical)
            .count();

        match report.overall {
            RunResult::Passed => info!(
                run_id = %report.run_id,
                health_score = report.health_score.value(),
                summary = %report.summary_text(),
                "backup validation run passed"
            ),
            RunResult::Failed => warn!(
                run_id = %report.run_id,
                health_score = report.health_score.value(),
                failed = report.counts.failed,
                critical_alerts = critical,
                summary = %report.summary_text(),
                "backup validation run failed"
            ),
        }
        Ok(())
    }
}

/// Persists the report artifact as structured data.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn persist(&self, report: &TestReport) -> Result<PathBuf>;
}

/// Writes `backup-test-report-<run_id>.json` under a local directory.
#[derive(Debug, Clone)]
pub struct FileReportSink {
    dir: PathBuf,
}

impl FileReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn artifact_path(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("backup-test-report-{run_id}.json"))
    }
}

#[async_trait]
impl ReportSink for FileReportSink {
    async fn persist(&self, report: &TestReport) -> Result<PathBuf> {
        let body = serde_json::to_vec_pretty(report)
            .map_err(|e| SentinelError::Persistence(e.to_string()))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| persistence_error(&self.dir, e))?;

        let path = self.artifact_path(&report.run_id);
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| persistence_error(&path, e))?;

        info!(path = %path.display(), run_id = %report.run_id, "report persisted");
        Ok(path)
    }
}

fn persistence_error(path: &Path, err: std::io::Error) -> SentinelError {
    SentinelError::Persistence(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{RpoRtoAnalysis, RunCounts};
    use crate::scoring::HealthScore;
    use chrono::{TimeZone, Utc};

    fn report() -> TestReport {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        TestReport {
            run_id: TestReport::run_id_for(at),
            project_name: "labelmintit".to_string(),
            environment: "production".to_string(),
            started_at: at,
            finished_at: at,
            resources: Vec::new(),
            health_score: HealthScore::new(100.0),
            alerts: Vec::new(),
            counts: RunCounts::default(),
            overall: RunResult::Passed,
            analysis: RpoRtoAnalysis::default(),
            error: None,
        }
    }

    #[tokio::test]
    async fn file_sink_writes_json_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileReportSink::new(dir.path());

        let path = sink.persist(&report()).await.unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "backup-test-report-20250601-120000.json"
        );

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: TestReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, report());
    }

    #[tokio::test]
    async fn log_dispatcher_accepts_any_report() {
        LogDispatcher.dispatch(&report()).await.unwrap();
    }
}
