//! # Health Scoring
//!
//! Folds per-resource metrics into a single weighted 0–100 health score.
//! Scoring is a pure function of (metrics, thresholds, weights): no clock
//! reads, no hidden state, and identical inputs always produce the identical
//! score regardless of resource iteration order.

use crate::error::{Result, SentinelError};
use crate::metrics::{DurationMinutes, MetricSet};
use crate::snapshot::{ReplicationHealth, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tolerance when checking that resource weights sum to 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Threshold bundle shared by scoring and evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub rpo_threshold_minutes: u32,
    /// Cache snapshots are typically daily; they get a wider RPO allowance
    pub cache_rpo_threshold_minutes: u32,
    pub rto_threshold_minutes: u32,
    /// Replication lag at or below this is HEALTHY (closed bound)
    pub replication_healthy_minutes: u32,
    /// Replication lag above this raises a lag alert
    pub replication_alert_minutes: u32,
    pub health_score_floor: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            rpo_threshold_minutes: 60,
            cache_rpo_threshold_minutes: 24 * 60,
            rto_threshold_minutes: 240,
            replication_healthy_minutes: 60,
            replication_alert_minutes: 120,
            health_score_floor: 80.0,
        }
    }
}

impl Thresholds {
    /// RPO threshold applicable to a resource kind.
    pub fn rpo_threshold_for(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Cache => self.cache_rpo_threshold_minutes,
            _ => self.rpo_threshold_minutes,
        }
    }
}

/// Overall backup health, clamped to [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct HealthScore(f64);

impl HealthScore {
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 100.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_below(&self, floor: f64) -> bool {
        self.0 < floor
    }
}

impl fmt::Display for HealthScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}/100", self.0)
    }
}

/// Weighted health scoring over the full per-resource metric set.
pub struct HealthScorer;

impl HealthScorer {
    /// Score one resource on a 0–100 scale.
    ///
    /// RPO-bearing resources degrade linearly as backup age approaches the
    /// threshold and score exactly zero for an unbounded RPO. The DR replica
    /// pairing is scored on replication posture instead.
    pub fn resource_score(kind: ResourceKind, metrics: &MetricSet, thresholds: &Thresholds) -> f64 {
        match kind {
            ResourceKind::DrReplica => Self::replication_score(metrics, thresholds),
            _ => Self::rpo_score(metrics.rpo, thresholds.rpo_threshold_for(kind)),
        }
    }

    fn rpo_score(rpo: DurationMinutes, threshold_minutes: u32) -> f64 {
        match rpo.minutes() {
            Some(minutes) => {
                (100.0 - (minutes / f64::from(threshold_minutes)) * 100.0).clamp(0.0, 100.0)
            }
            None => 0.0,
        }
    }

    /// 100 while HEALTHY, linear decay from the healthy bound reaching zero
    /// one healthy-window beyond it, zero for any hard failure state.
    fn replication_score(metrics: &MetricSet, thresholds: &Thresholds) -> f64 {
        let healthy = f64::from(thresholds.replication_healthy_minutes);
        match metrics.replication {
            Some(ReplicationHealth::Healthy) => 100.0,
            Some(ReplicationHealth::Lagging) => match metrics.replication_lag {
                Some(DurationMinutes::Bounded(lag)) => {
                    (100.0 - ((lag - healthy) / healthy) * 100.0).clamp(0.0, 100.0)
                }
                _ => 0.0,
            },
            _ => 0.0,
        }
    }

    /// Weighted overall score.
    ///
    /// A kind absent from the metric map was never validated (skipped as
    /// inapplicable); its weight is excluded and the remaining weights are
    /// renormalized, so a legitimate skip cannot drag the score below the
    /// floor. Failed and timed-out resources still carry an unobservable
    /// metric set and contribute zero at full weight.
    ///
    /// Weights are validated at configuration time; the sum check here is
    /// the defensive aggregation boundary.
    pub fn score(
        metrics: &BTreeMap<ResourceKind, MetricSet>,
        thresholds: &Thresholds,
        weights: &BTreeMap<ResourceKind, f64>,
    ) -> Result<HealthScore> {
        let sum: f64 = weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(SentinelError::Aggregation(format!(
                "resource weights sum to {sum:.6}, expected 1.0"
            )));
        }

        let observed: f64 = weights
            .iter()
            .filter(|(kind, _)| metrics.contains_key(kind))
            .map(|(_, weight)| weight)
            .sum();
        if observed <= WEIGHT_SUM_TOLERANCE {
            // Every weighted kind was skipped; nothing observed is unhealthy.
            return Ok(HealthScore::new(100.0));
        }

        let total = metrics
            .iter()
            .map(|(kind, m)| {
                let weight = weights.get(kind).copied().unwrap_or(0.0);
                (weight / observed) * Self::resource_score(*kind, m, thresholds)
            })
            .sum();

        Ok(HealthScore::new(total))
    }
}
