//! REST surface of the client portal engine.
//!
//! Handlers are thin adapters: they resolve the bearer token into an
//! [`Actor`](client_portal_core::Actor), call one engine operation and wrap
//! the result in the `{success, data?, error?, message?}` envelope.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← HTTP, JSON, bearer tokens
//! │  - Extractors / envelope / AppError     │  ← Tracing, correlation ids
//! ├─────────────────────────────────────────┤
//! │         Engine (client-portal-core)     │
//! │  - Access rules, ledger, workflow       │  ← One transaction per call
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use client_portal_web::{AppState, build_router};
//!
//! let app = build_router(AppState::new(engine, resolver));
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{ApiJson, ApiPath, ApiQuery, Authenticated, BearerToken, CorrelationId};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
pub use response::ApiResponse;
pub use routes::build_router;
pub use state::AppState;

