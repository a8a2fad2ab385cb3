//! Injected clock abstraction.
//!
//! All core components receive time through [`Clock`] instead of reading
//! `Utc::now()` directly, so metric computation, scoring, and wait-loops are
//! deterministic under test.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Timezone-aware time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually-driven clock for deterministic tests.
///
/// Interior mutability lets shared `Arc<ManualClock>` handles advance time
/// from inside probe closures while the orchestrator observes it.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.current.lock().unwrap() = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap();
        *current += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap()
    }
}
