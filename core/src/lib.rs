//! # Client Portal Core
//!
//! Entitlement ledger and support-ticket workflow engine.
//!
//! Clients hold a balance of entitlement tickets. Opening a support case,
//! registering for an online seminar and registering for an online event
//! each consume one ticket; every debit is recorded in an append-only
//! consumption ledger.
//!
//! ## Layout
//!
//! - [`types`]: identifiers, wire enumerations and entities
//! - [`access`]: pure role-based visibility and permission rules
//! - [`ledger`]: the Entitlement Accountant, sole writer of balances
//! - [`tickets`]: support-case workflow (thread, status, assignment)
//! - [`offerings`]: seminar and event registration
//! - [`store`]: storage traits implemented by the postgres and testing crates
//! - [`engine`]: facade wiring the services together
//!
//! ## Architecture
//!
//! Rules are pure functions over values (functional core); services load
//! state through [`store::PortalStore`], apply the rules and write every
//! effect of one operation through a single [`store::PortalTransaction`]
//! (imperative shell).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod actor;
pub mod engine;
pub mod environment;
pub mod error;
pub mod ledger;
pub mod offerings;
pub mod store;
pub mod tickets;
pub mod types;

pub use actor::{Actor, ActorResolver};
pub use engine::{Balance, PortalEngine};
pub use environment::{Clock, SystemClock};
pub use error::{PortalError, Result, StoreError};

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
