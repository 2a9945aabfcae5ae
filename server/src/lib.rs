//! Wiring for the client portal HTTP server: configuration and metrics.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod metrics;

pub use config::Config;
