//! HTTP request handlers, organized by resource.

pub mod clients;
pub mod health;
pub mod offerings;
pub mod tickets;

pub use health::{health_check, readiness_check};
