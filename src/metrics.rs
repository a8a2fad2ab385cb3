//! # Metric Computation
//!
//! Converts normalized [`BackupSnapshot`] records into RPO / elapsed-time /
//! replication-lag measurements. All durations are minutes internally, with
//! "no measurable value" carried as an explicit [`DurationMinutes::Unbounded`]
//! variant rather than an IEEE infinity sentinel, so it can never poison a
//! sum by accident.
//!
//! Nothing in this module can fail: a missing or garbled snapshot always
//! yields a defined (unbounded) measurement.

use crate::snapshot::{BackupSnapshot, ReplicationHealth, ResourceKind};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A duration in minutes that is either measurable or unbounded.
///
/// `Unbounded` models "worse than any finite threshold": it compares greater
/// than every bounded value and fails every upper-bound check, but is
/// excluded from averages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "bound", content = "minutes", rename_all = "snake_case")]
pub enum DurationMinutes {
    Bounded(f64),
    Unbounded,
}

impl DurationMinutes {
    pub const ZERO: DurationMinutes = DurationMinutes::Bounded(0.0);

    /// Convert a signed time delta to minutes. Negative deltas are preserved;
    /// callers that care (replication lag) clamp and flag them.
    pub fn from_delta(delta: TimeDelta) -> Self {
        Self::Bounded(delta.num_milliseconds() as f64 / 60_000.0)
    }

    pub fn minutes(&self) -> Option<f64> {
        match self {
            Self::Bounded(m) => Some(*m),
            Self::Unbounded => None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }

    /// Upper-bound check against an integer-minute threshold. Unbounded
    /// exceeds every threshold.
    pub fn exceeds(&self, threshold_minutes: u32) -> bool {
        match self {
            Self::Bounded(m) => *m > f64::from(threshold_minutes),
            Self::Unbounded => true,
        }
    }
}

impl PartialOrd for DurationMinutes {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Unbounded, Self::Unbounded) => Some(Ordering::Equal),
            (Self::Unbounded, Self::Bounded(_)) => Some(Ordering::Greater),
            (Self::Bounded(_), Self::Unbounded) => Some(Ordering::Less),
            (Self::Bounded(a), Self::Bounded(b)) => a.partial_cmp(b),
        }
    }
}

impl fmt::Display for DurationMinutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(m) => write!(f, "{m:.2} minutes"),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Computed measurements for one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    /// Age of the most recent recoverable backup
    pub rpo: DurationMinutes,
    /// Elapsed wall time of the resource's own validation pass. This is a
    /// proxy carried under the original report's `rto_minutes` name, not a
    /// measured recovery time.
    #[serde(rename = "rto_minutes")]
    pub test_elapsed: DurationMinutes,
    /// DR snapshot age relative to the primary snapshot; only present for
    /// primary/DR pair measurements
    pub replication_lag: Option<DurationMinutes>,
    pub replication: Option<ReplicationHealth>,
    /// Set when the DR copy was timestamped before the primary backup it
    /// replicates (clocks disagree); the lag is clamped to zero in that case
    pub clock_anomaly: bool,
}

impl MetricSet {
    fn new(rpo: DurationMinutes) -> Self {
        Self {
            rpo,
            test_elapsed: DurationMinutes::ZERO,
            replication_lag: None,
            replication: None,
            clock_anomaly: false,
        }
    }

    pub fn with_elapsed(mut self, elapsed: DurationMinutes) -> Self {
        self.test_elapsed = elapsed;
        self
    }

    /// Metric set for a resource that could not be observed at all (probe
    /// failure, deadline expiry). RPO is unbounded, and the DR replica
    /// pairing additionally reports replication state `ERROR`, so threshold
    /// evaluation raises the hard-failure alerts instead of going silent.
    pub fn unobservable(kind: ResourceKind) -> Self {
        let mut metrics = Self::new(DurationMinutes::Unbounded);
        if kind == ResourceKind::DrReplica {
            metrics.replication_lag = Some(DurationMinutes::Unbounded);
            metrics.replication = Some(ReplicationHealth::Error);
        }
        metrics
    }
}

/// Pure computation from snapshots (plus an injected `now`) to metrics.
pub struct MetricComputer;

impl MetricComputer {
    /// RPO for a single resource: `now - created_at` when the snapshot is
    /// complete, unbounded for anything else (missing, in progress, failed).
    pub fn compute(snapshot: &BackupSnapshot, now: DateTime<Utc>) -> MetricSet {
        let rpo = match (snapshot.status.is_complete(), snapshot.created_at) {
            (true, Some(created_at)) => DurationMinutes::from_delta(now - created_at),
            _ => DurationMinutes::Unbounded,
        };
        MetricSet::new(rpo)
    }

    /// Replication measurements for a primary/DR snapshot pair. The primary
    /// snapshot also supplies the RPO.
    ///
    /// Lag boundary is closed: lag of exactly `healthy_lag_minutes` is still
    /// HEALTHY; anything above is LAGGING.
    pub fn compute_pair(
        primary: &BackupSnapshot,
        dr: &BackupSnapshot,
        now: DateTime<Utc>,
        healthy_lag_minutes: u32,
    ) -> MetricSet {
        let mut metrics = Self::compute(primary, now);

        let primary_at = match (primary.status.is_complete(), primary.created_at) {
            (true, Some(at)) => Some(at),
            _ => None,
        };
        let dr_at = match (dr.status.is_complete(), dr.created_at) {
            (true, Some(at)) => Some(at),
            _ => None,
        };

        match (primary_at, dr_at) {
            (None, _) => {
                metrics.replication_lag = Some(DurationMinutes::Unbounded);
                metrics.replication = Some(ReplicationHealth::NoPrimaryBackups);
            }
            (_, None) => {
                metrics.replication_lag = Some(DurationMinutes::Unbounded);
                metrics.replication = Some(ReplicationHealth::NoDrBackups);
            }
            (Some(primary_at), Some(dr_at)) => {
                let mut lag_minutes =
                    (dr_at - primary_at).num_milliseconds() as f64 / 60_000.0;
                if lag_minutes < 0.0 {
                    // Negative lag can only mean disagreeing clocks.
                    metrics.clock_anomaly = true;
                    lag_minutes = 0.0;
                }
                let health = if lag_minutes <= f64::from(healthy_lag_minutes) {
                    ReplicationHealth::Healthy
                } else {
                    ReplicationHealth::Lagging
                };
                metrics.replication_lag = Some(DurationMinutes::Bounded(lag_minutes));
                metrics.replication = Some(health);
            }
        }

        metrics
    }
}
