//! # Test Report
//!
//! The aggregate artifact of one validation run: per-resource outcomes with
//! their metrics and sub-check results, the weighted health score, the alert
//! set, and pass/fail/skip counts. Every field is JSON-serializable; the
//! report is handed as structured data to persistence and notification
//! collaborators.

use crate::evaluator::Alert;
use crate::metrics::{DurationMinutes, MetricSet};
use crate::probe::SubCheck;
use crate::scoring::HealthScore;
use crate::snapshot::ResourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Terminal result for one resource.
///
/// An explicit tagged result instead of a boolean and-of-checks: `Failed`
/// keeps every failing facet, and `Skipped` is distinguishable from failure
/// in both the report and the exit code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceOutcome {
    Passed,
    Failed { reasons: Vec<String> },
    Skipped { reason: String },
    #[serde(rename = "TIMEOUT")]
    TimedOut,
}

impl ResourceOutcome {
    /// Timeouts count as failures for the overall run result.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::TimedOut)
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed { .. } => "FAILED",
            Self::Skipped { .. } => "SKIPPED",
            Self::TimedOut => "TIMEOUT",
        }
    }
}

/// Validation result for one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceReport {
    pub kind: ResourceKind,
    pub outcome: ResourceOutcome,
    pub metrics: Option<MetricSet>,
    /// Per-resource health score contribution, when metrics were computed
    pub score: Option<f64>,
    pub sub_checks: Vec<SubCheck>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Recovered error text (probe failure, timeout) for post-hoc diagnosis
    pub error: Option<String>,
}

impl ResourceReport {
    pub fn skipped(
        kind: ResourceKind,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            outcome: ResourceOutcome::Skipped {
                reason: reason.into(),
            },
            metrics: None,
            score: None,
            sub_checks: Vec::new(),
            started_at: at,
            finished_at: at,
            error: None,
        }
    }

    /// Probe failure or aborted task. The resource carries an unobservable
    /// metric set so it still reaches scoring and threshold evaluation.
    pub fn failed(
        kind: ResourceKind,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let error = error.into();
        Self {
            kind,
            outcome: ResourceOutcome::Failed {
                reasons: vec![error.clone()],
            },
            metrics: Some(
                MetricSet::unobservable(kind)
                    .with_elapsed(DurationMinutes::from_delta(finished_at - started_at)),
            ),
            score: None,
            sub_checks: Vec::new(),
            started_at,
            finished_at,
            error: Some(error),
        }
    }

    pub fn timed_out(
        kind: ResourceKind,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        ceiling_seconds: u64,
    ) -> Self {
        Self {
            kind,
            outcome: ResourceOutcome::TimedOut,
            metrics: Some(
                MetricSet::unobservable(kind)
                    .with_elapsed(DurationMinutes::from_delta(finished_at - started_at)),
            ),
            score: None,
            sub_checks: Vec::new(),
            started_at,
            finished_at,
            error: Some(format!(
                "validation did not finish within the {ceiling_seconds}s deadline"
            )),
        }
    }
}

/// Overall result of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunResult {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunCounts {
    pub fn tally(resources: &[ResourceReport]) -> Self {
        let mut counts = Self {
            total: resources.len(),
            ..Self::default()
        };
        for resource in resources {
            if resource.outcome.is_passed() {
                counts.passed += 1;
            } else if resource.outcome.is_skipped() {
                counts.skipped += 1;
            } else {
                counts.failed += 1;
            }
        }
        counts
    }
}

/// Max/average RPO and RTO over resources that produced bounded values.
/// Unbounded measurements are excluded rather than poisoning the averages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpoRtoAnalysis {
    pub max_rpo_minutes: Option<f64>,
    pub avg_rpo_minutes: Option<f64>,
    pub max_rto_minutes: Option<f64>,
    pub avg_rto_minutes: Option<f64>,
}

impl RpoRtoAnalysis {
    pub fn from_resources(resources: &[ResourceReport]) -> Self {
        let rpo: Vec<f64> = resources
            .iter()
            .filter_map(|r| r.metrics.as_ref().and_then(|m| m.rpo.minutes()))
            .collect();
        let rto: Vec<f64> = resources
            .iter()
            .filter_map(|r| r.metrics.as_ref().and_then(|m| m.test_elapsed.minutes()))
            .collect();

        let stats = |values: &[f64]| -> (Option<f64>, Option<f64>) {
            if values.is_empty() {
                (None, None)
            } else {
                let max = values.iter().cloned().fold(f64::MIN, f64::max);
                let avg = values.iter().sum::<f64>() / values.len() as f64;
                (Some(max), Some(avg))
            }
        };

        let (max_rpo_minutes, avg_rpo_minutes) = stats(&rpo);
        let (max_rto_minutes, avg_rto_minutes) = stats(&rto);
        Self {
            max_rpo_minutes,
            avg_rpo_minutes,
            max_rto_minutes,
            avg_rto_minutes,
        }
    }
}

/// Aggregate report for one validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub run_id: String,
    pub project_name: String,
    pub environment: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub resources: Vec<ResourceReport>,
    pub health_score: HealthScore,
    pub alerts: Vec<Alert>,
    pub counts: RunCounts,
    pub overall: RunResult,
    pub analysis: RpoRtoAnalysis,
    /// Recorded aggregation error when scoring/evaluation itself failed
    pub error: Option<String>,
}

impl TestReport {
    /// Timestamp-based run identifier, matching the report artifact naming.
    pub fn run_id_for(started_at: DateTime<Utc>) -> String {
        started_at.format("%Y%m%d-%H%M%S").to_string()
    }

    /// Process exit semantics: 0 when everything passed or was skipped,
    /// 1 when any resource failed.
    pub fn exit_code(&self) -> i32 {
        match self.overall {
            RunResult::Passed => 0,
            RunResult::Failed => 1,
        }
    }

    /// Human-readable summary for notification channels.
    pub fn summary_text(&self) -> String {
        let mut out = String::new();
        let headline = match self.overall {
            RunResult::Passed => "All backup and DR validations passed",
            RunResult::Failed => "BACKUP/DR VALIDATION FAILURES DETECTED",
        };
        let _ = writeln!(out, "{headline}");
        let _ = writeln!(out);
        let _ = writeln!(out, "Project: {}", self.project_name);
        let _ = writeln!(out, "Environment: {}", self.environment);
        let _ = writeln!(out, "Run: {}", self.run_id);
        let _ = writeln!(
            out,
            "Results: {} passed, {} failed, {} skipped (of {})",
            self.counts.passed, self.counts.failed, self.counts.skipped, self.counts.total
        );
        let _ = writeln!(out, "Health score: {}", self.health_score);

        for resource in &self.resources {
            let _ = writeln!(out, "- {}: {}", resource.kind, resource.outcome.label());
            if let ResourceOutcome::Failed { reasons } = &resource.outcome {
                for reason in reasons {
                    let _ = writeln!(out, "    {reason}");
                }
            }
        }

        if !self.alerts.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Alerts:");
            for alert in &self.alerts {
                let _ = writeln!(out, "- [{}] {}", alert.severity, alert.message);
            }
        }

        if let Some(error) = &self.error {
            let _ = writeln!(out);
            let _ = writeln!(out, "Run error: {error}");
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn counts_distinguish_skipped_from_failed() {
        let resources = vec![
            ResourceReport {
                kind: ResourceKind::Database,
                outcome: ResourceOutcome::Passed,
                metrics: None,
                score: None,
                sub_checks: Vec::new(),
                started_at: at(),
                finished_at: at(),
                error: None,
            },
            ResourceReport::skipped(ResourceKind::DrReplica, "not production", at()),
            ResourceReport::failed(ResourceKind::Cache, "probe failure", at(), at()),
            ResourceReport::timed_out(ResourceKind::ObjectStore, at(), at(), 1800),
        ];

        let counts = RunCounts::tally(&resources);
        assert_eq!(counts.total, 4);
        assert_eq!(counts.passed, 1);
        assert_eq!(counts.skipped, 1);
        // Timeout tallies as failed.
        assert_eq!(counts.failed, 2);
    }

    #[test]
    fn outcome_serializes_with_original_status_labels() {
        let labels: Vec<String> = [
            ResourceOutcome::Passed,
            ResourceOutcome::Failed {
                reasons: vec!["x".into()],
            },
            ResourceOutcome::Skipped {
                reason: "n/a".into(),
            },
            ResourceOutcome::TimedOut,
        ]
        .iter()
        .map(|o| {
            serde_json::to_value(o).unwrap()["status"]
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect();
        assert_eq!(labels, ["PASSED", "FAILED", "SKIPPED", "TIMEOUT"]);
    }

    #[test]
    fn run_id_is_timestamp_based() {
        assert_eq!(TestReport::run_id_for(at()), "20250601-120000");
    }

    #[test]
    fn unobserved_resources_still_carry_hard_failure_metrics() {
        use crate::snapshot::ReplicationHealth;

        let failed = ResourceReport::failed(ResourceKind::Database, "boom", at(), at());
        assert!(failed.metrics.as_ref().unwrap().rpo.is_unbounded());

        let timed = ResourceReport::timed_out(ResourceKind::DrReplica, at(), at(), 60);
        assert_eq!(
            timed.metrics.as_ref().unwrap().replication,
            Some(ReplicationHealth::Error)
        );

        // Skipped is not a failure; it carries no metrics at all.
        let skipped = ResourceReport::skipped(ResourceKind::Cache, "n/a", at());
        assert!(skipped.metrics.is_none());
    }

    #[test]
    fn analysis_skips_unbounded_measurements() {
        let bounded = MetricSet {
            rpo: DurationMinutes::Bounded(30.0),
            test_elapsed: DurationMinutes::Bounded(5.0),
            replication_lag: None,
            replication: None,
            clock_anomaly: false,
        };
        let unbounded = MetricSet {
            rpo: DurationMinutes::Unbounded,
            test_elapsed: DurationMinutes::Bounded(15.0),
            replication_lag: None,
            replication: None,
            clock_anomaly: false,
        };

        let mut first = ResourceReport::failed(ResourceKind::Database, "x", at(), at());
        first.metrics = Some(bounded);
        let mut second = ResourceReport::failed(ResourceKind::Cache, "y", at(), at());
        second.metrics = Some(unbounded);

        let analysis = RpoRtoAnalysis::from_resources(&[first, second]);
        // Only the bounded RPO participates; both elapsed values do.
        assert_eq!(analysis.max_rpo_minutes, Some(30.0));
        assert_eq!(analysis.avg_rpo_minutes, Some(30.0));
        assert_eq!(analysis.max_rto_minutes, Some(15.0));
        assert_eq!(analysis.avg_rto_minutes, Some(10.0));
    }
}
