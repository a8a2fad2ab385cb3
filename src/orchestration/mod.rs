//! # Test Orchestration
//!
//! Drives one bounded validation pass: concurrent per-resource probing with
//! an overall deadline, metric computation, scoring over the complete metric
//! set, threshold evaluation, and report assembly.

pub mod runner;
pub mod state;

pub use runner::TestOrchestrator;
pub use state::ValidationState;
