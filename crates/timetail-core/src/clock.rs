//! Wall-clock source used to compute the scan cutoff.
//!
//! The clock is read exactly once per invocation, when the cutoff is
//! attached to the registry. Nothing in the scanner queries it again.

use chrono::{DateTime, Utc};

/// Supplies the "current time" snapshot.
pub trait Clock {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a fixed instant; deterministic cutoffs for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
