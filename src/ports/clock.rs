//! Clock port: the single time source handed to the component.

use chrono::{DateTime, Utc};

/// Provides the current time to the component under test.
///
/// Record and replay both hand the component a pinned implementation so any
/// timestamp it writes into requests, logs or output files is reproducible.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time as seen by the component.
    fn now(&self) -> DateTime<Utc>;

    /// Returns `true` when the clock is frozen at a fixed instant.
    fn is_pinned(&self) -> bool {
        false
    }
}
