//! Clock adapters: the real system clock and a clock frozen at one instant.

use chrono::{DateTime, Utc};

use crate::ports::clock::Clock;

/// Reads the system clock. Only passthrough runs and `FreezeTime::Live` use
/// it; nothing it produces is compared.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveClock;

impl Clock for LiveClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Returns the same instant on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinnedClock {
    at: DateTime<Utc>,
}

impl PinnedClock {
    /// Freezes time at `at`.
    #[must_use]
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }

    /// The frozen instant.
    #[must_use]
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

impl Clock for PinnedClock {
    fn now(&self) -> DateTime<Utc> {
        self.at
    }

    fn is_pinned(&self) -> bool {
        true
    }
}
