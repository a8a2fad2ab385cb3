//! # Resource Probes
//!
//! The collaborator boundary between the scoring core and external services.
//! A probe queries one resource kind (database recovery points, cache
//! snapshots, object-store replication, DR pairing) and returns a normalized
//! [`Observation`]; provider API mechanics stay behind this trait.
//!
//! Also home to the shared wait-loop ([`await_ready`]) probes use when they
//! trigger asynchronous provider jobs, and the scoped-cleanup guard
//! ([`RestoreGuard`]) for probes that provision scratch restore targets.

use crate::clock::Clock;
use crate::config::SentinelConfig;
use crate::error::{ProbeError, Result, SentinelError};
use crate::metrics::MetricComputer;
use crate::snapshot::{BackupSnapshot, ReplicationHealth, ResourceKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// What a probe saw: a single snapshot, or a primary/DR pair for
/// cross-region replication measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Observation {
    Single(BackupSnapshot),
    Pair {
        primary: BackupSnapshot,
        dr: BackupSnapshot,
    },
}

impl Observation {
    /// The snapshot that carries the resource's RPO.
    pub fn primary_snapshot(&self) -> &BackupSnapshot {
        match self {
            Self::Single(snapshot) => snapshot,
            Self::Pair { primary, .. } => primary,
        }
    }
}

/// One named facet of a resource's validation (integrity, freshness,
/// replication, ...). All facets are evaluated and reported; a failing facet
/// never short-circuits the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubCheck {
    pub name: String,
    pub passed: bool,
    pub detail: Option<String>,
}

impl SubCheck {
    pub fn pass(name: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            detail: None,
        }
    }

    pub fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            detail: Some(detail.into()),
        }
    }
}

/// Probe for one resource kind.
#[async_trait]
pub trait ResourceProbe: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Whether this probe applies in the given operating environment.
    /// Cross-region/DR validation is skipped outside production.
    fn applicable(&self, environment: &str) -> bool {
        let _ = environment;
        true
    }

    /// Fetch the current backup/replication observation for `region`.
    ///
    /// Connectivity/auth/API failures are `ProbeError`s; "no backups found"
    /// is a normal `Missing` snapshot, never an error.
    async fn observe(&self, region: &str) -> std::result::Result<Observation, ProbeError>;

    /// Per-facet validation of an observation. The default derives the
    /// standard facet set from the normalized snapshot data; probes with
    /// provider-specific facets (restore exercises, DNS failover records)
    /// extend it.
    fn sub_checks(
        &self,
        observation: &Observation,
        config: &SentinelConfig,
        now: DateTime<Utc>,
    ) -> Vec<SubCheck> {
        standard_sub_checks(observation, config, now)
    }
}

/// Standard validation facets derivable from normalized snapshot data.
pub fn standard_sub_checks(
    observation: &Observation,
    config: &SentinelConfig,
    now: DateTime<Utc>,
) -> Vec<SubCheck> {
    match observation {
        Observation::Single(snapshot) => single_sub_checks(snapshot, config, now),
        Observation::Pair { primary, dr } => pair_sub_checks(primary, dr, config, now),
    }
}

fn single_sub_checks(
    snapshot: &BackupSnapshot,
    config: &SentinelConfig,
    now: DateTime<Utc>,
) -> Vec<SubCheck> {
    let kind = snapshot.resource_kind;
    let mut checks = Vec::with_capacity(4);

    checks.push(if snapshot.status.is_missing() {
        SubCheck::fail("backup_present", format!("no {kind} backup found"))
    } else {
        SubCheck::pass("backup_present")
    });

    checks.push(if snapshot.is_recoverable() {
        SubCheck::pass("backup_complete")
    } else {
        SubCheck::fail(
            "backup_complete",
            format!("latest backup status is {}", snapshot.status),
        )
    });

    let threshold = config.thresholds().rpo_threshold_for(kind);
    let rpo = MetricComputer::compute(snapshot, now).rpo;
    checks.push(if rpo.exceeds(threshold) {
        SubCheck::fail(
            "backup_fresh",
            format!("backup age {rpo} exceeds RPO threshold of {threshold} minutes"),
        )
    } else {
        SubCheck::pass("backup_fresh")
    });

    checks.push(if snapshot.has_integrity() {
        SubCheck::pass("backup_integrity")
    } else {
        SubCheck::fail("backup_integrity", "backup size is zero or unknown")
    });

    checks.push(match snapshot.retention_days {
        Some(days) if days >= config.backup_retention_days => SubCheck::pass("retention_policy"),
        Some(days) => SubCheck::fail(
            "retention_policy",
            format!(
                "observed retention {days} days is below the required {} days",
                config.backup_retention_days
            ),
        ),
        None => SubCheck::fail("retention_policy", "no retention policy observed"),
    });

    checks
}

fn pair_sub_checks(
    primary: &BackupSnapshot,
    dr: &BackupSnapshot,
    config: &SentinelConfig,
    now: DateTime<Utc>,
) -> Vec<SubCheck> {
    let mut checks = Vec::with_capacity(3);

    checks.push(if primary.is_recoverable() {
        SubCheck::pass("primary_backup_present")
    } else {
        SubCheck::fail(
            "primary_backup_present",
            "no recoverable backup in the primary region",
        )
    });

    checks.push(if dr.is_recoverable() {
        SubCheck::pass("dr_backup_present")
    } else {
        SubCheck::fail(
            "dr_backup_present",
            "no recoverable backup in the DR region",
        )
    });

    let metrics =
        MetricComputer::compute_pair(primary, dr, now, config.replication_healthy_minutes);
    checks.push(match metrics.replication {
        Some(ReplicationHealth::Healthy) => SubCheck::pass("replication_current"),
        Some(health) => SubCheck::fail(
            "replication_current",
            format!("replication status is {health}"),
        ),
        None => SubCheck::fail("replication_current", "replication state unknown"),
    });

    checks
}

/// Poll `poll` at a fixed interval until it reports ready, failing with a
/// timeout once the hard ceiling is exceeded.
///
/// Elapsed time is measured through the injected clock, so tests drive this
/// with a [`crate::clock::ManualClock`] and a zero interval instead of
/// wall-clock sleeps.
pub async fn await_ready<F, Fut>(
    clock: &dyn Clock,
    ceiling: Duration,
    interval: Duration,
    mut poll: F,
) -> Result<()>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = std::result::Result<bool, ProbeError>> + Send,
{
    let started = clock.now();
    let ceiling_chrono =
        chrono::Duration::from_std(ceiling).unwrap_or(chrono::Duration::MAX);

    loop {
        if poll().await? {
            return Ok(());
        }

        let waited = clock.now() - started;
        if waited >= ceiling_chrono {
            return Err(SentinelError::Timeout {
                waited_seconds: waited.num_seconds().max(0) as u64,
                ceiling_seconds: ceiling.as_secs(),
            });
        }

        tokio::time::sleep(interval).await;
    }
}

/// Scoped cleanup for temporary restore infrastructure.
///
/// Probes that provision a scratch restore target register its teardown
/// here. `release().await` runs the teardown on orderly paths; if the guard
/// is dropped without release (failure, timeout, cancellation), the teardown
/// is spawned onto the current runtime, or run to completion on a dedicated
/// thread when no runtime is available, so cleanup happens on every exit
/// path.
pub struct RestoreGuard {
    resource: String,
    cleanup: Option<Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>>,
}

impl RestoreGuard {
    pub fn new<F>(resource: impl Into<String>, cleanup: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'static, ()> + Send + 'static,
    {
        Self {
            resource: resource.into(),
            cleanup: Some(Box::new(cleanup)),
        }
    }

    /// Run the teardown now.
    pub async fn release(mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup().await;
        }
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            warn!(
                resource = %self.resource,
                "restore guard dropped without release; running teardown"
            );
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(cleanup());
                }
                Err(_) => {
                    // No runtime on this thread (panic unwind, non-async
                    // teardown path); run the teardown on a dedicated one.
                    let resource = self.resource.clone();
                    let spawned = std::thread::Builder::new()
                        .name("restore-teardown".to_string())
                        .spawn(move || {
                            match tokio::runtime::Builder::new_current_thread()
                                .enable_all()
                                .build()
                            {
                                Ok(runtime) => runtime.block_on(cleanup()),
                                Err(err) => error!(
                                    resource = %resource,
                                    error = %err,
                                    "restore teardown could not start a runtime"
                                ),
                            }
                        });
                    if let Err(err) = spawned {
                        error!(
                            resource = %self.resource,
                            error = %err,
                            "restore teardown thread could not be spawned"
                        );
                    }
                }
            }
        }
    }
}

pub mod fixture {
    //! Fixture-backed probes: observations loaded from a JSON document.
    //!
    //! Real provider probes live behind the [`ResourceProbe`] boundary in
    //! deployment-specific crates; the fixture probe lets the harness (and
    //! its CLI) exercise the full pipeline against recorded or synthesized
    //! observations.

    use super::*;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Arc;

    /// JSON document mapping resource kinds to recorded observations.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct FixtureDocument {
        #[serde(default)]
        pub observations: BTreeMap<ResourceKind, Observation>,
        /// Kinds to report as inapplicable (SKIPPED) in this environment
        #[serde(default)]
        pub inapplicable: Vec<ResourceKind>,
    }

    impl FixtureDocument {
        pub fn from_path(path: &Path) -> Result<Self> {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                SentinelError::Configuration(format!(
                    "cannot read fixture {}: {e}",
                    path.display()
                ))
            })?;
            serde_json::from_str(&raw).map_err(|e| {
                SentinelError::Configuration(format!(
                    "invalid fixture {}: {e}",
                    path.display()
                ))
            })
        }

        /// One probe per resource kind; kinds absent from the document
        /// observe a missing snapshot.
        pub fn probes(&self) -> Vec<Arc<dyn ResourceProbe>> {
            ResourceKind::ALL
                .into_iter()
                .map(|kind| {
                    Arc::new(FixtureProbe {
                        kind,
                        observation: self.observations.get(&kind).cloned(),
                        applicable: !self.inapplicable.contains(&kind),
                    }) as Arc<dyn ResourceProbe>
                })
                .collect()
        }
    }

    /// Probe serving a pre-recorded observation.
    #[derive(Debug, Clone)]
    pub struct FixtureProbe {
        kind: ResourceKind,
        observation: Option<Observation>,
        applicable: bool,
    }

    impl FixtureProbe {
        pub fn new(kind: ResourceKind, observation: Observation) -> Self {
            Self {
                kind,
                observation: Some(observation),
                applicable: true,
            }
        }

        pub fn inapplicable(mut self) -> Self {
            self.applicable = false;
            self
        }
    }

    #[async_trait]
    impl ResourceProbe for FixtureProbe {
        fn kind(&self) -> ResourceKind {
            self.kind
        }

        fn applicable(&self, _environment: &str) -> bool {
            self.applicable
        }

        async fn observe(
            &self,
            _region: &str,
        ) -> std::result::Result<Observation, ProbeError> {
            Ok(self
                .observation
                .clone()
                .unwrap_or_else(|| Observation::Single(BackupSnapshot::missing(self.kind))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn missing_snapshot_fails_every_facet_without_short_circuit() {
        let config = SentinelConfig::default();
        let observation = Observation::Single(BackupSnapshot::missing(ResourceKind::Database));
        let checks = standard_sub_checks(&observation, &config, now());

        // All facets are reported, not just the first failure.
        assert_eq!(checks.len(), 5);
        assert!(checks.iter().all(|c| !c.passed));
    }

    #[test]
    fn healthy_snapshot_passes_all_facets() {
        let config = SentinelConfig::default();
        let snapshot = BackupSnapshot::complete(ResourceKind::Database, now(), 4096)
            .with_retention(90);
        let checks = standard_sub_checks(&Observation::Single(snapshot), &config, now());
        assert!(checks.iter().all(|c| c.passed), "failing: {checks:?}");
    }

    #[test]
    fn short_retention_fails_only_the_retention_facet() {
        let config = SentinelConfig::default();
        let snapshot = BackupSnapshot::complete(ResourceKind::Database, now(), 4096)
            .with_retention(7);
        let checks = standard_sub_checks(&Observation::Single(snapshot), &config, now());
        let failing: Vec<_> = checks.iter().filter(|c| !c.passed).collect();
        assert_eq!(failing.len(), 1);
        assert_eq!(failing[0].name, "retention_policy");
    }

    #[tokio::test]
    async fn await_ready_returns_once_poll_reports_ready() {
        let clock = ManualClock::new(now());
        let polls = AtomicU32::new(0);

        let result = await_ready(&clock, Duration::from_secs(1800), Duration::ZERO, || {
            let ready = polls.fetch_add(1, Ordering::SeqCst) >= 2;
            async move { Ok(ready) }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn await_ready_times_out_at_the_ceiling() {
        let clock = Arc::new(ManualClock::new(now()));
        let poll_clock = Arc::clone(&clock);

        let result = await_ready(
            clock.as_ref(),
            Duration::from_secs(1800),
            Duration::ZERO,
            move || {
                // Each poll costs ten simulated minutes; never becomes ready.
                poll_clock.advance(chrono::Duration::minutes(10));
                async { Ok(false) }
            },
        )
        .await;

        match result {
            Err(SentinelError::Timeout {
                waited_seconds,
                ceiling_seconds,
            }) => {
                assert_eq!(ceiling_seconds, 1800);
                assert!(waited_seconds >= 1800);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn await_ready_propagates_probe_errors() {
        let clock = ManualClock::new(now());
        let result = await_ready(&clock, Duration::from_secs(60), Duration::ZERO, || async {
            Err(ProbeError::api("restore job rejected"))
        })
        .await;
        assert!(matches!(result, Err(SentinelError::Probe(_))));
    }

    #[tokio::test]
    async fn restore_guard_releases_on_the_orderly_path() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cleaned);
        let guard = RestoreGuard::new("db-restore-test", move || {
            Box::pin(async move {
                flag.store(true, Ordering::SeqCst);
            })
        });

        guard.release().await;
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[test]
    fn restore_guard_runs_teardown_without_a_runtime() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cleaned);
        drop(RestoreGuard::new("db-restore-test", move || {
            Box::pin(async move {
                flag.store(true, Ordering::SeqCst);
            })
        }));

        // Teardown runs on a dedicated thread; give it a moment.
        for _ in 0..100 {
            if cleaned.load(Ordering::SeqCst) {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("teardown never ran");
    }

    #[tokio::test]
    async fn restore_guard_spawns_teardown_when_dropped() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cleaned);
        {
            let _guard = RestoreGuard::new("db-restore-test", move || {
                Box::pin(async move {
                    flag.store(true, Ordering::SeqCst);
                })
            });
            // Dropped without release: failure/cancellation path.
        }
        tokio::task::yield_now().await;
        assert!(cleaned.load(Ordering::SeqCst));
    }
}
