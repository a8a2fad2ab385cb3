#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # drsentinel
//!
//! Disaster-recovery validation harness. One bounded orchestration pass
//! probes the backup, restore, and failover posture of a multi-region stack
//! (relational database, in-memory cache, object storage, cross-region DR
//! pairing), computes RPO / elapsed-time / replication-lag measurements,
//! folds them into a weighted 0–100 health score, and evaluates configured
//! thresholds into alerts and a pass/fail report.
//!
//! ## Architecture
//!
//! Provider API mechanics, notification delivery, and report persistence are
//! collaborators behind narrow traits ([`probe::ResourceProbe`],
//! [`dispatch::NotificationDispatcher`], [`dispatch::ReportSink`]); the core
//! is pure computation over normalized snapshot data plus an injected clock,
//! so every decision path is deterministic under test.
//!
//! ## Module Organization
//!
//! - [`snapshot`] - Normalized backup/replication domain types
//! - [`metrics`] - RPO / elapsed / replication-lag computation
//! - [`scoring`] - Weighted health scoring
//! - [`evaluator`] - Threshold evaluation and alert escalation
//! - [`orchestration`] - The run state machine and concurrent orchestrator
//! - [`probe`] - Resource probe boundary, wait-loops, scoped restore cleanup
//! - [`report`] - The run's aggregate report artifact
//! - [`dispatch`] - Notification and persistence boundaries
//! - [`config`] - Layered configuration with fail-fast validation
//! - [`clock`] - Injected time source
//! - [`error`] - Error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drsentinel::clock::SystemClock;
//! use drsentinel::config::SentinelConfig;
//! use drsentinel::orchestration::TestOrchestrator;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SentinelConfig::from_env()?;
//! let probes = vec![]; // deployment-specific ResourceProbe implementations
//! let orchestrator = TestOrchestrator::new(config, Arc::new(SystemClock), probes)?;
//! let report = orchestrator.run(None).await;
//! std::process::exit(report.exit_code());
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod evaluator;
pub mod logging;
pub mod metrics;
pub mod orchestration;
pub mod probe;
pub mod report;
pub mod scoring;
pub mod snapshot;

pub use clock::{Clock, SystemClock};
pub use config::SentinelConfig;
pub use error::{ProbeError, Result, SentinelError};
pub use evaluator::{Alert, RunHistory, Severity, ThresholdEvaluator};
pub use metrics::{DurationMinutes, MetricComputer, MetricSet};
pub use orchestration::TestOrchestrator;
pub use report::{ResourceOutcome, RunResult, TestReport};
pub use scoring::{HealthScore, HealthScorer, Thresholds};
pub use snapshot::{BackupSnapshot, ReplicationHealth, ResourceKind, SnapshotStatus};
