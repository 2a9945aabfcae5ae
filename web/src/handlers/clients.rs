//! Client balance and consumption history.

use crate::error::AppError;
use crate::extractors::{ApiPath, Authenticated};
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{Json, extract::State};
use client_portal_core::Balance;
use client_portal_core::types::{ClientId, ConsumptionLogEntry};

/// Remaining tickets of a client.
///
/// ```bash
/// curl http://localhost:8080/clients/<id>/balance -H "Authorization: Bearer <token>"
/// # {"success":true,"data":{"clientId":"...","remainingTickets":3,"status":"active"}}
/// ```
///
/// # Errors
///
/// - 404 if the client does not exist
/// - 403 if the client is outside the actor's scope
pub async fn get_balance(
    State(state): State<AppState>,
    Authenticated(actor): Authenticated,
    ApiPath(client_id): ApiPath<ClientId>,
) -> Result<Json<ApiResponse<Balance>>, AppError> {
    let balance = state.engine.balance(&actor, client_id).await?;
    Ok(Json(ApiResponse::ok(balance)))
}

/// Consumption ledger of a client, oldest first. Admin only.
///
/// # Errors
///
/// - 403 unless the actor is ADMIN or SUPERADMIN
/// - 404 if the client does not exist
pub async fn list_consumption(
    State(state): State<AppState>,
    Authenticated(actor): Authenticated,
    ApiPath(client_id): ApiPath<ClientId>,
) -> Result<Json<ApiResponse<Vec<ConsumptionLogEntry>>>, AppError> {
    let entries = state.engine.consumption(&actor, client_id).await?;
    Ok(Json(ApiResponse::ok(entries)))
}
