//! # Configuration
//!
//! Layered configuration: compiled defaults, then an optional JSON/TOML file,
//! then `DRSENTINEL_`-prefixed environment variables. Validation runs before
//! any probe is dispatched — a mis-summed weight table or a nonsensical
//! threshold is a fatal configuration error, never a silent miscalculation.

use crate::error::{Result, SentinelError};
use crate::scoring::{Thresholds, WEIGHT_SUM_TOLERANCE};
use crate::snapshot::ResourceKind;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub project_name: String,
    pub environment: String,
    pub primary_region: String,
    pub dr_region: String,

    pub rpo_threshold_minutes: u32,
    pub cache_rpo_threshold_minutes: u32,
    pub rto_threshold_minutes: u32,
    pub replication_healthy_minutes: u32,
    pub replication_alert_minutes: u32,
    pub health_score_floor: f64,

    /// Fixed weighting of per-resource scores; must sum to 1.0
    pub resource_weights: BTreeMap<ResourceKind, f64>,
    /// Consecutive breached runs before a threshold overrun escalates
    pub escalation_runs: u32,

    /// Hard ceiling for any single probe wait-loop
    pub max_probe_wait_seconds: u64,
    pub poll_interval_seconds: u64,
    /// Overall deadline for the whole run
    pub run_deadline_seconds: u64,

    /// Retention the backup policy is expected to observe, in days
    pub backup_retention_days: u32,
    pub report_dir: PathBuf,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        let mut resource_weights = BTreeMap::new();
        resource_weights.insert(ResourceKind::Database, 0.4);
        resource_weights.insert(ResourceKind::Cache, 0.3);
        resource_weights.insert(ResourceKind::DrReplica, 0.3);
        resource_weights.insert(ResourceKind::ObjectStore, 0.0);

        Self {
            project_name: "labelmintit".to_string(),
            environment: "production".to_string(),
            primary_region: "us-east-1".to_string(),
            dr_region: "us-west-2".to_string(),
            rpo_threshold_minutes: 60,
            cache_rpo_threshold_minutes: 24 * 60,
            rto_threshold_minutes: 240,
            replication_healthy_minutes: 60,
            replication_alert_minutes: 120,
            health_score_floor: 80.0,
            resource_weights,
            escalation_runs: 3,
            max_probe_wait_seconds: 1800,
            poll_interval_seconds: 30,
            run_deadline_seconds: 4 * 60 * 60,
            backup_retention_days: 90,
            report_dir: PathBuf::from("reports"),
        }
    }
}

impl SentinelConfig {
    /// Load and validate configuration: defaults -> optional file -> env.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&Self::default())
                .map_err(|e| SentinelError::Configuration(format!("invalid defaults: {e}")))?,
        );

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let raw = builder
            .add_source(Environment::with_prefix("DRSENTINEL").separator("__"))
            .build()
            .map_err(|e| SentinelError::Configuration(e.to_string()))?;

        let config: Self = raw
            .try_deserialize()
            .map_err(|e| SentinelError::Configuration(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from defaults and environment only.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    pub fn validate(&self) -> Result<()> {
        let weight_sum: f64 = self.resource_weights.values().sum();
        if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(SentinelError::Configuration(format!(
                "resource_weights must sum to 1.0, got {weight_sum:.6}"
            )));
        }
        for (kind, weight) in &self.resource_weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(SentinelError::Configuration(format!(
                    "resource_weights[{kind}] must be a non-negative finite number, got {weight}"
                )));
            }
        }

        for (name, value) in [
            ("rpo_threshold_minutes", self.rpo_threshold_minutes),
            (
                "cache_rpo_threshold_minutes",
                self.cache_rpo_threshold_minutes,
            ),
            ("rto_threshold_minutes", self.rto_threshold_minutes),
            (
                "replication_healthy_minutes",
                self.replication_healthy_minutes,
            ),
            ("replication_alert_minutes", self.replication_alert_minutes),
            ("escalation_runs", self.escalation_runs),
        ] {
            if value == 0 {
                return Err(SentinelError::Configuration(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        if !(0.0..=100.0).contains(&self.health_score_floor) {
            return Err(SentinelError::Configuration(format!(
                "health_score_floor must be within [0, 100], got {}",
                self.health_score_floor
            )));
        }

        if self.max_probe_wait_seconds == 0 || self.run_deadline_seconds == 0 {
            return Err(SentinelError::Configuration(
                "wait ceiling and run deadline must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_seconds >= self.max_probe_wait_seconds {
            return Err(SentinelError::Configuration(format!(
                "poll_interval_seconds ({}) must be below max_probe_wait_seconds ({})",
                self.poll_interval_seconds, self.max_probe_wait_seconds
            )));
        }

        Ok(())
    }

    /// Threshold bundle consumed by scoring and evaluation.
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            rpo_threshold_minutes: self.rpo_threshold_minutes,
            cache_rpo_threshold_minutes: self.cache_rpo_threshold_minutes,
            rto_threshold_minutes: self.rto_threshold_minutes,
            replication_healthy_minutes: self.replication_healthy_minutes,
            replication_alert_minutes: self.replication_alert_minutes,
            health_score_floor: self.health_score_floor,
        }
    }

    pub fn probe_wait_ceiling(&self) -> Duration {
        Duration::from_secs(self.max_probe_wait_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_seconds)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
