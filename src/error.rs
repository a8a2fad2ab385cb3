//! # Error Taxonomy
//!
//! Errors are scoped tightly: a failed probe or an expired wait-loop is
//! recovered locally and recorded on the affected resource's report, while
//! configuration problems are fatal and surface before any probing starts.

use std::fmt;

/// Classification of probe failures against an external resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailureKind {
    /// Could not reach the resource endpoint
    Connectivity,
    /// Reached the endpoint but authentication/authorization failed
    Auth,
    /// The resource API returned an error response
    Api,
}

impl fmt::Display for ProbeFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity => write!(f, "connectivity"),
            Self::Auth => write!(f, "auth"),
            Self::Api => write!(f, "api"),
        }
    }
}

/// Failure reaching an external resource.
///
/// "No backups found" is not a probe error; probes report that as a
/// `Missing` snapshot, which is a normal outcome.
#[derive(Debug, Clone, thiserror::Error)]
#[error("probe failure ({kind}): {message}")]
pub struct ProbeError {
    pub kind: ProbeFailureKind,
    pub message: String,
}

impl ProbeError {
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self {
            kind: ProbeFailureKind::Connectivity,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self {
            kind: ProbeFailureKind::Auth,
            message: message.into(),
        }
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self {
            kind: ProbeFailureKind::Api,
            message: message.into(),
        }
    }
}

/// Top-level error type for the validation harness.
#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    /// Transient or permanent failure reaching an external resource;
    /// recovered locally by failing that resource, never the whole run.
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// A wait-loop exceeded its hard ceiling.
    #[error("timed out after {waited_seconds}s (ceiling {ceiling_seconds}s)")]
    Timeout {
        waited_seconds: u64,
        ceiling_seconds: u64,
    },

    /// Invalid configuration; fatal, surfaced before any probing starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Scoring/evaluation itself failed; downgraded to a failed run with
    /// the raw error recorded, never a silent crash.
    #[error("aggregation error: {0}")]
    Aggregation(String),

    /// Could not persist or render the report artifact.
    #[error("report persistence error: {0}")]
    Persistence(String),
}

impl SentinelError {
    /// Whether this error must abort the run before probing (exit code 2
    /// territory) rather than being recorded on a resource.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, SentinelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_error_display_includes_kind() {
        let err = ProbeError::auth("token expired");
        assert_eq!(err.to_string(), "probe failure (auth): token expired");
    }

    #[test]
    fn only_configuration_errors_are_fatal() {
        assert!(SentinelError::Configuration("bad weights".into()).is_fatal());
        assert!(!SentinelError::Timeout {
            waited_seconds: 1801,
            ceiling_seconds: 1800
        }
        .is_fatal());
        assert!(!SentinelError::from(ProbeError::api("throttled")).is_fatal());
    }
}
