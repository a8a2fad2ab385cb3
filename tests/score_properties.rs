//! Property-based invariants for metric computation and health scoring.

use chrono::{DateTime, Duration, TimeZone, Utc};
use drsentinel::metrics::{DurationMinutes, MetricComputer, MetricSet};
use drsentinel::scoring::{HealthScorer, Thresholds};
use drsentinel::snapshot::{BackupSnapshot, ResourceKind};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn metrics_with_rpo(minutes: i64) -> MetricSet {
    let snapshot = BackupSnapshot::complete(
        ResourceKind::Database,
        base_time() - Duration::minutes(minutes),
        1024,
    );
    MetricComputer::compute(&snapshot, base_time())
}

proptest! {
    #[test]
    fn resource_score_stays_within_bounds(rpo_minutes in 0i64..100_000, threshold in 1u32..10_000) {
        let mut thresholds = Thresholds::default();
        thresholds.rpo_threshold_minutes = threshold;

        let score = HealthScorer::resource_score(
            ResourceKind::Database,
            &metrics_with_rpo(rpo_minutes),
            &thresholds,
        );
        prop_assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn unbounded_rpo_scores_zero_for_any_threshold(threshold in 1u32..10_000) {
        let mut thresholds = Thresholds::default();
        thresholds.rpo_threshold_minutes = threshold;

        let metrics = MetricComputer::compute(
            &BackupSnapshot::missing(ResourceKind::Database),
            base_time(),
        );
        prop_assert_eq!(
            HealthScorer::resource_score(ResourceKind::Database, &metrics, &thresholds),
            0.0
        );
    }

    #[test]
    fn overall_score_is_independent_of_insertion_order(
        rpo_a in 0i64..5_000,
        rpo_b in 0i64..5_000,
        rpo_c in 0i64..5_000,
    ) {
        let thresholds = Thresholds::default();
        let mut weights = BTreeMap::new();
        weights.insert(ResourceKind::Database, 0.4);
        weights.insert(ResourceKind::Cache, 0.3);
        weights.insert(ResourceKind::ObjectStore, 0.3);

        let entries = vec![
            (ResourceKind::Database, metrics_with_rpo(rpo_a)),
            (ResourceKind::Cache, metrics_with_rpo(rpo_b)),
            (ResourceKind::ObjectStore, metrics_with_rpo(rpo_c)),
        ];

        let forward: BTreeMap<_, _> = entries.iter().cloned().collect();
        let reverse: BTreeMap<_, _> = entries.iter().rev().cloned().collect();

        let first = HealthScorer::score(&forward, &thresholds, &weights).unwrap();
        let second = HealthScorer::score(&reverse, &thresholds, &weights).unwrap();
        prop_assert_eq!(first.value(), second.value());
    }

    #[test]
    fn overall_score_stays_within_bounds(
        rpo_a in 0i64..100_000,
        rpo_b in 0i64..100_000,
        weight_split in 0.0f64..=1.0,
    ) {
        let thresholds = Thresholds::default();
        let mut weights = BTreeMap::new();
        weights.insert(ResourceKind::Database, weight_split);
        weights.insert(ResourceKind::Cache, 1.0 - weight_split);

        let mut metrics = BTreeMap::new();
        metrics.insert(ResourceKind::Database, metrics_with_rpo(rpo_a));
        metrics.insert(ResourceKind::Cache, metrics_with_rpo(rpo_b));

        let score = HealthScorer::score(&metrics, &thresholds, &weights).unwrap();
        prop_assert!((0.0..=100.0).contains(&score.value()));
    }

    #[test]
    fn exceeds_agrees_with_ordering(minutes in 0.0f64..100_000.0, threshold in 1u32..10_000) {
        let duration = DurationMinutes::Bounded(minutes);
        let boundary = DurationMinutes::Bounded(f64::from(threshold));
        prop_assert_eq!(duration.exceeds(threshold), duration > boundary);
    }
}
