//! # Test Orchestrator
//!
//! Runs one bounded validation pass over all configured resource probes.
//! Probes are independent and dispatched concurrently; every resource is
//! carried to a terminal outcome (one failure never aborts the rest), all
//! results are collected before scoring begins, and the whole run observes a
//! hard deadline — a resource still probing when it expires resolves to
//! TIMEOUT instead of hanging the run.

use crate::clock::Clock;
use crate::config::SentinelConfig;
use crate::error::Result;
use crate::evaluator::{Alert, RunHistory, ThresholdEvaluator};
use crate::metrics::{DurationMinutes, MetricComputer, MetricSet};
use crate::orchestration::state::ValidationState;
use crate::probe::{Observation, ResourceProbe};
use crate::report::{
    ResourceOutcome, ResourceReport, RpoRtoAnalysis, RunCounts, RunResult, TestReport,
};
use crate::scoring::{HealthScore, HealthScorer, Thresholds};
use crate::snapshot::ResourceKind;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

pub struct TestOrchestrator {
    config: Arc<SentinelConfig>,
    clock: Arc<dyn Clock>,
    probes: Vec<Arc<dyn ResourceProbe>>,
}

impl TestOrchestrator {
    /// Build an orchestrator, failing fast on invalid configuration before
    /// any probe can run.
    pub fn new(
        config: SentinelConfig,
        clock: Arc<dyn Clock>,
        probes: Vec<Arc<dyn ResourceProbe>>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            clock,
            probes,
        })
    }

    /// Execute one validation run. Always yields a complete report, even
    /// when every resource fails; `history` enables WARNING→CRITICAL
    /// escalation for persistent breaches.
    pub async fn run(&self, history: Option<&RunHistory>) -> TestReport {
        let started_at = self.clock.now();
        let run_id = TestReport::run_id_for(started_at);
        let deadline = self.config.run_deadline();
        info!(
            run_id = %run_id,
            environment = %self.config.environment,
            resources = self.probes.len(),
            deadline_seconds = deadline.as_secs(),
            "starting backup validation run"
        );

        let mut handles = Vec::with_capacity(self.probes.len());
        for probe in &self.probes {
            let kind = probe.kind();
            let probe = Arc::clone(probe);
            let config = Arc::clone(&self.config);
            let clock = Arc::clone(&self.clock);
            let handle = tokio::spawn(async move {
                let task_started = clock.now();
                match timeout(deadline, validate_resource(probe, config, Arc::clone(&clock))).await
                {
                    Ok(report) => report,
                    Err(_) => {
                        warn!(resource = %kind, "resource validation hit the run deadline");
                        ResourceReport::timed_out(
                            kind,
                            task_started,
                            clock.now(),
                            deadline.as_secs(),
                        )
                    }
                }
            });
            handles.push((kind, handle));
        }

        // Collect every resource before scoring; no partial score is ever
        // computed.
        let mut resources = Vec::with_capacity(handles.len());
        for (kind, handle) in handles {
            match handle.await {
                Ok(report) => resources.push(report),
                Err(join_error) => {
                    error!(
                        resource = %kind,
                        error = %join_error,
                        "resource validation task aborted"
                    );
                    let now = self.clock.now();
                    resources.push(ResourceReport::failed(
                        kind,
                        format!("validation task aborted: {join_error}"),
                        now,
                        now,
                    ));
                }
            }
        }
        resources.sort_by_key(|r| r.kind);

        let thresholds = self.config.thresholds();
        debug!(run_id = %run_id, state = %ValidationState::Scoring, "scoring complete metric set");

        for resource in &mut resources {
            if let Some(metrics) = &resource.metrics {
                resource.score = Some(HealthScorer::resource_score(
                    resource.kind,
                    metrics,
                    &thresholds,
                ));
            }
        }

        let metric_map: BTreeMap<ResourceKind, MetricSet> = resources
            .iter()
            .filter_map(|r| r.metrics.clone().map(|m| (r.kind, m)))
            .collect();

        let (health_score, alerts, aggregation_error) =
            match self.aggregate(&metric_map, &thresholds, history) {
                Ok((score, alerts)) => (score, alerts, None),
                Err(err) => {
                    // Scoring/evaluation failure is downgraded to a failed
                    // run with the raw error recorded, never a crash.
                    error!(run_id = %run_id, error = %err, "aggregation failed");
                    (HealthScore::new(0.0), Vec::new(), Some(err.to_string()))
                }
            };
        debug!(run_id = %run_id, state = %ValidationState::Evaluated, "threshold evaluation finished");

        let counts = RunCounts::tally(&resources);
        let any_failed = resources.iter().any(|r| r.outcome.is_failed());
        let overall = if any_failed || aggregation_error.is_some() {
            RunResult::Failed
        } else {
            RunResult::Passed
        };

        let finished_at = self.clock.now();
        info!(
            run_id = %run_id,
            passed = counts.passed,
            failed = counts.failed,
            skipped = counts.skipped,
            health_score = health_score.value(),
            alerts = alerts.len(),
            overall = ?overall,
            "backup validation run finished"
        );

        TestReport {
            run_id,
            project_name: self.config.project_name.clone(),
            environment: self.config.environment.clone(),
            started_at,
            finished_at,
            analysis: RpoRtoAnalysis::from_resources(&resources),
            resources,
            health_score,
            alerts,
            counts,
            overall,
            error: aggregation_error,
        }
    }

    fn aggregate(
        &self,
        metrics: &BTreeMap<ResourceKind, MetricSet>,
        thresholds: &Thresholds,
        history: Option<&RunHistory>,
    ) -> Result<(HealthScore, Vec<Alert>)> {
        let score = HealthScorer::score(metrics, thresholds, &self.config.resource_weights)?;
        let evaluator = ThresholdEvaluator::new(self.config.escalation_runs);
        let alerts = evaluator.evaluate(metrics, score, thresholds, history);
        Ok((score, alerts))
    }
}

/// Carry one resource from PENDING to its terminal outcome. Probe errors are
/// recovered here; nothing escapes this function.
async fn validate_resource(
    probe: Arc<dyn ResourceProbe>,
    config: Arc<SentinelConfig>,
    clock: Arc<dyn Clock>,
) -> ResourceReport {
    let kind = probe.kind();
    let started_at = clock.now();
    let mut state = ValidationState::Pending;

    if !probe.applicable(&config.environment) {
        info!(
            resource = %kind,
            environment = %config.environment,
            "resource not applicable, skipping"
        );
        return ResourceReport::skipped(
            kind,
            format!("not applicable in the {} environment", config.environment),
            started_at,
        );
    }

    transition(&mut state, ValidationState::Probing, kind);
    let observation = match probe.observe(&config.primary_region).await {
        Ok(observation) => observation,
        Err(err) => {
            error!(resource = %kind, error = %err, "probe failed");
            return ResourceReport::failed(kind, err.to_string(), started_at, clock.now());
        }
    };

    transition(&mut state, ValidationState::Computing, kind);
    let now = clock.now();
    let metrics = match &observation {
        Observation::Single(snapshot) => MetricComputer::compute(snapshot, now),
        Observation::Pair { primary, dr } => MetricComputer::compute_pair(
            primary,
            dr,
            now,
            config.replication_healthy_minutes,
        ),
    };
    if metrics.clock_anomaly {
        warn!(resource = %kind, "DR snapshot timestamped before its primary; clocks disagree");
    }

    // Every facet is evaluated and reported; no short-circuit on the first
    // failure.
    let sub_checks = probe.sub_checks(&observation, &config, now);
    let reasons: Vec<String> = sub_checks
        .iter()
        .filter(|check| !check.passed)
        .map(|check| match &check.detail {
            Some(detail) => format!("{}: {detail}", check.name),
            None => check.name.clone(),
        })
        .collect();

    let finished_at = clock.now();
    let metrics = metrics.with_elapsed(DurationMinutes::from_delta(finished_at - started_at));

    let outcome = if reasons.is_empty() {
        ResourceOutcome::Passed
    } else {
        ResourceOutcome::Failed { reasons }
    };
    info!(resource = %kind, outcome = outcome.label(), "resource validation finished");

    ResourceReport {
        kind,
        outcome,
        metrics: Some(metrics),
        score: None,
        sub_checks,
        started_at,
        finished_at,
        error: None,
    }
}

fn transition(state: &mut ValidationState, next: ValidationState, kind: ResourceKind) {
    if state.can_transition_to(next) {
        debug!(resource = %kind, from = %state, to = %next, "state transition");
        *state = next;
    } else {
        warn!(resource = %kind, from = %state, to = %next, "illegal state transition ignored");
    }
}
