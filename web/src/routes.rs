//! Router configuration.

use crate::handlers::{clients, health, offerings, tickets};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Health endpoints are public; every other route requires a bearer token
/// resolved through [`AppState::resolver`].
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health checks (no authentication)
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Support tickets
        .route("/tickets", post(tickets::create_ticket).get(tickets::list_tickets))
        .route("/tickets/:id", get(tickets::get_ticket))
        .route(
            "/tickets/:id/messages",
            get(tickets::list_messages).post(tickets::post_message),
        )
        .route("/tickets/:id/status", put(tickets::change_status))
        .route("/tickets/:id/assign", put(tickets::assign_ticket))
        .route("/tickets/:id/read", post(tickets::mark_read))
        // Registration
        .route("/seminars/apply", post(offerings::apply_seminar))
        .route("/events/apply", post(offerings::apply_event))
        .route("/applications", get(offerings::list_applications))
        // Clients
        .route("/clients/:id/balance", get(clients::get_balance))
        .route("/clients/:id/consumption", get(clients::list_consumption))
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
