//! # Threshold Evaluation
//!
//! Compares a full metric set and the overall health score against configured
//! thresholds and produces one [`Alert`] per breached condition. Conditions
//! are never coalesced, and evaluation is idempotent: the same inputs always
//! yield the same alerts in the same (resource-kind) order.
//!
//! Severity policy: hard failures (missing backups, missing DR environment)
//! are CRITICAL outright. Threshold overruns start at WARNING and escalate to
//! CRITICAL only when explicit prior-run history shows the same condition
//! breached across enough consecutive runs; with no history available the
//! evaluator never guesses and stays at WARNING.

use crate::metrics::{DurationMinutes, MetricSet};
use crate::scoring::{HealthScore, Thresholds};
use crate::snapshot::ResourceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A single breached condition, readable standalone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    pub subject: String,
    pub message: String,
    pub resource_kind: Option<ResourceKind>,
    /// Stable machine key for the breached condition, used for matching the
    /// same condition across runs when tracking escalation
    pub condition: String,
}

/// Consecutive-breach counts carried forward from prior runs.
///
/// This is an explicit, optional input: the orchestrator's caller owns
/// persistence and passes it back in. Absent history means no escalation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunHistory {
    pub consecutive_breaches: BTreeMap<String, u32>,
}

impl RunHistory {
    /// Fold this run's alerts into the history: conditions present are
    /// incremented, conditions that cleared are dropped.
    pub fn observe(&mut self, alerts: &[Alert]) {
        let mut next = BTreeMap::new();
        for alert in alerts {
            let prior = self
                .consecutive_breaches
                .get(&alert.condition)
                .copied()
                .unwrap_or(0);
            next.insert(alert.condition.clone(), prior + 1);
        }
        self.consecutive_breaches = next;
    }
}

/// Threshold evaluator producing the run's alert set.
#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    /// Consecutive breached runs (including the current one) required before
    /// a threshold overrun escalates to CRITICAL
    escalation_runs: u32,
}

impl ThresholdEvaluator {
    pub fn new(escalation_runs: u32) -> Self {
        Self { escalation_runs }
    }

    pub fn evaluate(
        &self,
        metrics: &BTreeMap<ResourceKind, MetricSet>,
        score: HealthScore,
        thresholds: &Thresholds,
        history: Option<&RunHistory>,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        // BTreeMap iteration gives the stable lexicographic kind order.
        for (kind, m) in metrics {
            match kind {
                ResourceKind::DrReplica => {
                    self.evaluate_replication(*kind, m, thresholds, history, &mut alerts);
                }
                _ => self.evaluate_rpo(*kind, m, thresholds, history, &mut alerts),
            }
            self.evaluate_elapsed(*kind, m, thresholds, history, &mut alerts);
        }

        if score.is_below(thresholds.health_score_floor) {
            let condition = "health_score".to_string();
            alerts.push(Alert {
                severity: self.overrun_severity(&condition, history),
                subject: "Health score below floor".to_string(),
                message: format!(
                    "Low backup health score: {score} (floor: {floor})",
                    floor = thresholds.health_score_floor
                ),
                resource_kind: None,
                condition,
            });
        }

        alerts
    }

    fn evaluate_rpo(
        &self,
        kind: ResourceKind,
        metrics: &MetricSet,
        thresholds: &Thresholds,
        history: Option<&RunHistory>,
        alerts: &mut Vec<Alert>,
    ) {
        let threshold = thresholds.rpo_threshold_for(kind);
        match metrics.rpo {
            DurationMinutes::Unbounded => alerts.push(Alert {
                severity: Severity::Critical,
                subject: format!("Missing backup - {kind}"),
                message: format!("No recoverable {kind} backup found"),
                resource_kind: Some(kind),
                condition: format!("missing_backup:{kind}"),
            }),
            DurationMinutes::Bounded(minutes) if metrics.rpo.exceeds(threshold) => {
                let condition = format!("rpo:{kind}");
                alerts.push(Alert {
                    severity: self.overrun_severity(&condition, history),
                    subject: format!("RPO breach - {kind}"),
                    message: format!(
                        "{kind} RPO exceeded: {minutes:.2} minutes (threshold: {threshold} minutes)"
                    ),
                    resource_kind: Some(kind),
                    condition,
                });
            }
            DurationMinutes::Bounded(_) => {}
        }
    }

    fn evaluate_elapsed(
        &self,
        kind: ResourceKind,
        metrics: &MetricSet,
        thresholds: &Thresholds,
        history: Option<&RunHistory>,
        alerts: &mut Vec<Alert>,
    ) {
        let threshold = thresholds.rto_threshold_minutes;
        match metrics.test_elapsed {
            DurationMinutes::Unbounded => {
                let condition = format!("rto:{kind}");
                alerts.push(Alert {
                    severity: self.overrun_severity(&condition, history),
                    subject: format!("RTO overrun - {kind}"),
                    message: format!(
                        "{kind} validation never completed (RTO threshold: {threshold} minutes)"
                    ),
                    resource_kind: Some(kind),
                    condition,
                });
            }
            DurationMinutes::Bounded(minutes) if metrics.test_elapsed.exceeds(threshold) => {
                let condition = format!("rto:{kind}");
                alerts.push(Alert {
                    severity: self.overrun_severity(&condition, history),
                    subject: format!("RTO overrun - {kind}"),
                    message: format!(
                        "{kind} validation took {minutes:.2} minutes (RTO threshold: {threshold} minutes)"
                    ),
                    resource_kind: Some(kind),
                    condition,
                });
            }
            DurationMinutes::Bounded(_) => {}
        }
    }

    fn evaluate_replication(
        &self,
        kind: ResourceKind,
        metrics: &MetricSet,
        thresholds: &Thresholds,
        history: Option<&RunHistory>,
        alerts: &mut Vec<Alert>,
    ) {
        let Some(health) = metrics.replication else {
            return;
        };

        if health.is_hard_failure() {
            alerts.push(Alert {
                severity: Severity::Critical,
                subject: "Replication failure".to_string(),
                message: format!("Cross-region replication issue: {health}"),
                resource_kind: Some(kind),
                condition: format!("replication:{kind}"),
            });
            return;
        }

        if let Some(DurationMinutes::Bounded(lag)) = metrics.replication_lag {
            if lag > f64::from(thresholds.replication_alert_minutes) {
                let condition = format!("replication_lag:{kind}");
                alerts.push(Alert {
                    severity: self.overrun_severity(&condition, history),
                    subject: "Replication lag".to_string(),
                    message: format!(
                        "High cross-region replication lag: {lag:.2} minutes (alert threshold: {} minutes)",
                        thresholds.replication_alert_minutes
                    ),
                    resource_kind: Some(kind),
                    condition,
                });
            }
        }
    }

    fn overrun_severity(&self, condition: &str, history: Option<&RunHistory>) -> Severity {
        match history {
            Some(history) => {
                let prior = history
                    .consecutive_breaches
                    .get(condition)
                    .copied()
                    .unwrap_or(0);
                if prior + 1 >= self.escalation_runs {
                    Severity::Critical
                } else {
                    Severity::Warning
                }
            }
            // No history: never guess escalation.
            None => Severity::Warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricComputer;
    use crate::snapshot::BackupSnapshot;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn db_metrics(rpo_minutes: i64) -> BTreeMap<ResourceKind, MetricSet> {
        let snapshot = BackupSnapshot::complete(
            ResourceKind::Database,
            now() - Duration::minutes(rpo_minutes),
            1024,
        );
        let mut map = BTreeMap::new();
        map.insert(ResourceKind::Database, MetricComputer::compute(&snapshot, now()));
        map
    }

    fn evaluator() -> ThresholdEvaluator {
        ThresholdEvaluator::new(3)
    }

    #[test]
    fn rpo_breach_emits_exactly_one_warning_without_history() {
        let alerts = evaluator().evaluate(
            &db_metrics(90),
            HealthScore::new(100.0),
            &Thresholds::default(),
            None,
        );
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert_eq!(alerts[0].condition, "rpo:database");
        assert_eq!(alerts[0].resource_kind, Some(ResourceKind::Database));
        assert!(alerts[0].message.contains("90.00 minutes"));
        assert!(alerts[0].message.contains("threshold: 60"));
    }

    #[test]
    fn rpo_within_threshold_stays_silent() {
        let alerts = evaluator().evaluate(
            &db_metrics(30),
            HealthScore::new(100.0),
            &Thresholds::default(),
            None,
        );
        assert!(alerts.is_empty());
    }

    #[test]
    fn missing_backup_is_critical_regardless_of_history() {
        let mut metrics = BTreeMap::new();
        metrics.insert(
            ResourceKind::Database,
            MetricComputer::compute(&BackupSnapshot::missing(ResourceKind::Database), now()),
        );
        let alerts = evaluator().evaluate(
            &metrics,
            HealthScore::new(100.0),
            &Thresholds::default(),
            None,
        );
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[0].condition, "missing_backup:database");
    }

    #[test]
    fn replication_hard_failure_is_critical() {
        let mut metrics = BTreeMap::new();
        metrics.insert(
            ResourceKind::DrReplica,
            MetricComputer::compute_pair(
                &BackupSnapshot::complete(ResourceKind::DrReplica, now(), 1024),
                &BackupSnapshot::missing(ResourceKind::DrReplica),
                now(),
                60,
            ),
        );
        let alerts = evaluator().evaluate(
            &metrics,
            HealthScore::new(100.0),
            &Thresholds::default(),
            None,
        );
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert!(alerts[0].message.contains("NO_DR_BACKUPS"));
    }

    #[test]
    fn lag_alerts_only_past_the_alert_threshold() {
        let thresholds = Thresholds::default();
        let pair = |lag: i64| {
            let mut map = BTreeMap::new();
            map.insert(
                ResourceKind::DrReplica,
                MetricComputer::compute_pair(
                    &BackupSnapshot::complete(ResourceKind::DrReplica, now(), 1024),
                    &BackupSnapshot::complete(
                        ResourceKind::DrReplica,
                        now() + Duration::minutes(lag),
                        1024,
                    ),
                    now(),
                    thresholds.replication_healthy_minutes,
                ),
            );
            map
        };

        // Lagging but below the alert bound: degraded score, no alert.
        let quiet = evaluator().evaluate(&pair(90), HealthScore::new(100.0), &thresholds, None);
        assert!(quiet.is_empty());

        let loud = evaluator().evaluate(&pair(130), HealthScore::new(100.0), &thresholds, None);
        assert_eq!(loud.len(), 1);
        assert_eq!(loud[0].condition, "replication_lag:dr_replica");
        assert_eq!(loud[0].severity, Severity::Warning);
    }

    #[test]
    fn low_score_emits_floor_alert() {
        let alerts = evaluator().evaluate(
            &BTreeMap::new(),
            HealthScore::new(55.0),
            &Thresholds::default(),
            None,
        );
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].condition, "health_score");
        assert!(alerts[0].message.contains("55.00/100"));
    }

    #[test]
    fn unbounded_elapsed_still_raises_an_rto_alert() {
        let snapshot = BackupSnapshot::complete(ResourceKind::Database, now(), 1024);
        let mut metrics = MetricComputer::compute(&snapshot, now());
        metrics.test_elapsed = DurationMinutes::Unbounded;

        let mut map = BTreeMap::new();
        map.insert(ResourceKind::Database, metrics);

        let alerts = evaluator().evaluate(
            &map,
            HealthScore::new(100.0),
            &Thresholds::default(),
            None,
        );
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].condition, "rto:database");
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert!(alerts[0].message.contains("never completed"));
    }

    #[test]
    fn history_escalates_persistent_breaches_to_critical() {
        let metrics = db_metrics(90);
        let thresholds = Thresholds::default();
        let evaluator = ThresholdEvaluator::new(3);

        // Breached in the two prior runs; this run is the third consecutive.
        let mut history = RunHistory::default();
        history
            .consecutive_breaches
            .insert("rpo:database".to_string(), 2);

        let alerts =
            evaluator.evaluate(&metrics, HealthScore::new(100.0), &thresholds, Some(&history));
        assert_eq!(alerts[0].severity, Severity::Critical);

        // One prior breach only: still warning.
        let mut short_history = RunHistory::default();
        short_history
            .consecutive_breaches
            .insert("rpo:database".to_string(), 1);
        let alerts = evaluator.evaluate(
            &metrics,
            HealthScore::new(100.0),
            &thresholds,
            Some(&short_history),
        );
        assert_eq!(alerts[0].severity, Severity::Warning);
    }

    #[test]
    fn history_observe_increments_and_clears() {
        let mut history = RunHistory::default();
        let alerts = evaluator().evaluate(
            &db_metrics(90),
            HealthScore::new(100.0),
            &Thresholds::default(),
            None,
        );

        history.observe(&alerts);
        assert_eq!(history.consecutive_breaches.get("rpo:database"), Some(&1));
        history.observe(&alerts);
        assert_eq!(history.consecutive_breaches.get("rpo:database"), Some(&2));

        // Breach cleared: counter drops out entirely.
        history.observe(&[]);
        assert!(history.consecutive_breaches.is_empty());
    }

    #[test]
    fn evaluation_is_idempotent() {
        let metrics = db_metrics(90);
        let thresholds = Thresholds::default();
        let first = evaluator().evaluate(&metrics, HealthScore::new(10.0), &thresholds, None);
        let second = evaluator().evaluate(&metrics, HealthScore::new(10.0), &thresholds, None);
        assert_eq!(first, second);
    }
}
