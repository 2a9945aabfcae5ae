//! # Client Portal Testing
//!
//! Testing utilities for the client portal engine.
//!
//! This crate provides:
//! - [`FixedClock`]: deterministic time
//! - [`InMemoryPortalStore`]: transactional in-memory storage
//! - [`StaticActorResolver`]: token table for HTTP tests
//! - [`fixtures`]: ready-made clients, offerings and actors
//!
//! ## Example
//!
//! ```ignore
//! use client_portal_testing::{fixtures, test_clock, InMemoryPortalStore};
//! use client_portal_core::PortalEngine;
//! use std::sync::Arc;
//!
//! #[tokio::test]
//! async fn test_open_ticket() {
//!     let store = Arc::new(InMemoryPortalStore::new());
//!     let client = store.insert_client(fixtures::client_with_balance(3));
//!     let engine = PortalEngine::new(store.clone(), Arc::new(test_clock()));
//!     // ...
//! }
//! ```

use chrono::{DateTime, Utc};
use client_portal_core::environment::Clock;

pub mod fixtures;
mod memory_store;

pub use memory_store::{InMemoryPortalStore, StaticActorResolver};

/// Mock implementations of injected dependencies.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use client_portal_testing::mocks::FixedClock;
    /// use client_portal_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(fixed_instant())
    }

    /// 2025-01-01 00:00:00 UTC
    #[must_use]
    pub fn fixed_instant() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, fixed_instant, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }
}
