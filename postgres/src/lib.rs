//! `PostgreSQL` storage for the client portal engine.
//!
//! This crate implements the storage traits of `client-portal-core`:
//!
//! - [`PostgresPortalStore`]: reads and transactions over a connection pool
//! - [`PostgresActorResolver`]: bearer-token lookup
//!
//! Ticket debits use a single conditional `UPDATE ... WHERE remaining_tickets
//! >= $amount`, so concurrent debits for one client can never overdraw it.
//! Registrations lock the offering row (`SELECT ... FOR UPDATE`) for the
//! duration of the transaction so capacity checks do not race.
//!
//! # Example
//!
//! ```ignore
//! use client_portal_postgres::PostgresPortalStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresPortalStore::connect("postgres://localhost/portal", 10).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod resolver;
mod rows;
mod store;

pub use resolver::{token_digest, PostgresActorResolver};
pub use store::PostgresPortalStore;
