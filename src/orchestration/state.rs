//! Per-resource validation state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress states for one resource within a run.
///
/// `Evaluated` is the last in-run state; the terminal disposition lives in
/// [`crate::report::ResourceOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    /// Queued, probe not yet dispatched
    Pending,
    /// Probe is querying the external resource
    Probing,
    /// Metrics being derived from the observation
    Computing,
    /// Participating in scoring over the full metric set
    Scoring,
    /// Threshold evaluation finished
    Evaluated,
}

impl ValidationState {
    /// Legal forward transitions; states never move backwards within a run.
    pub fn can_transition_to(&self, next: ValidationState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Probing)
                | (Self::Probing, Self::Computing)
                | (Self::Computing, Self::Scoring)
                | (Self::Scoring, Self::Evaluated)
        )
    }

    /// Whether the resource is still doing work an overall deadline can
    /// interrupt.
    pub fn is_interruptible(&self) -> bool {
        matches!(self, Self::Probing | Self::Computing)
    }
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Probing => write!(f, "probing"),
            Self::Computing => write!(f, "computing"),
            Self::Scoring => write!(f, "scoring"),
            Self::Evaluated => write!(f, "evaluated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_move_forward() {
        use ValidationState::*;
        assert!(Pending.can_transition_to(Probing));
        assert!(Probing.can_transition_to(Computing));
        assert!(Computing.can_transition_to(Scoring));
        assert!(Scoring.can_transition_to(Evaluated));

        assert!(!Probing.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Scoring));
        assert!(!Evaluated.can_transition_to(Probing));
    }

    #[test]
    fn deadline_interrupts_only_active_work() {
        use ValidationState::*;
        assert!(Probing.is_interruptible());
        assert!(Computing.is_interruptible());
        assert!(!Pending.is_interruptible());
        assert!(!Evaluated.is_interruptible());
    }
}
