//! Injected dependencies shared by the engine services.

use chrono::{DateTime, Utc};

/// Clock trait - abstracts time operations for testability
///
/// Every timestamp the engine writes (ledger dates, message times,
/// `last_update`) comes from the injected clock.
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
