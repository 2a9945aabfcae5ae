//! Seminar and event registration.
//!
//! - `POST /seminars/apply`
//! - `POST /events/apply`
//! - `GET /applications?offeringId=`
//!
//! Online offerings consume one ticket; in-person ones are free.

use crate::error::AppError;
use crate::extractors::{ApiJson, ApiQuery, Authenticated};
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use client_portal_core::Actor;
use client_portal_core::offerings::ApplicationRequest;
use client_portal_core::types::{Application, ConsumptionLogEntry, OfferingId, OfferingKind};
use serde::{Deserialize, Serialize};

/// Registration form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    /// Seminar or event id
    pub offering_id: OfferingId,
    /// Attendee name
    pub user_name: String,
    /// Attendee e-mail
    pub user_email: String,
    /// Free-form notes
    #[serde(default)]
    pub notes: String,
}

/// Response after a successful registration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResponse {
    /// The stored application
    pub application: Application,
    /// Whether a ticket was consumed
    pub ticket_consumed: bool,
    /// Ledger entry, for online offerings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumption: Option<ConsumptionLogEntry>,
    /// Balance after the debit, for online offerings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_tickets: Option<u32>,
}

/// Application listing filter.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationListParams {
    /// Only applications to this offering
    pub offering_id: Option<OfferingId>,
}

async fn apply(
    state: &AppState,
    actor: &Actor,
    kind: OfferingKind,
    request: ApplyRequest,
) -> Result<(StatusCode, Json<ApiResponse<ApplyResponse>>), AppError> {
    let receipt = state
        .engine
        .offerings()
        .apply(
            actor,
            kind,
            ApplicationRequest {
                offering_id: request.offering_id,
                user_name: request.user_name,
                user_email: request.user_email,
                notes: request.notes,
            },
        )
        .await?;

    let message = if receipt.consumed.is_some() {
        "Application accepted; one ticket consumed"
    } else {
        "Application accepted"
    };

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            ApplyResponse {
                application: receipt.application,
                ticket_consumed: receipt.consumed.is_some(),
                consumption: receipt.consumed,
                remaining_tickets: receipt.remaining_tickets,
            },
            message,
        )),
    ))
}

/// Register for a seminar.
///
/// ```bash
/// curl -X POST http://localhost:8080/seminars/apply \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"offeringId":"<uuid>","userName":"Sato","userEmail":"sato@example.com","notes":""}'
/// ```
///
/// # Errors
///
/// - 400 `INSUFFICIENT_BALANCE` for an online seminar and an empty balance
/// - 409 `CAPACITY_EXCEEDED` / `DUPLICATE_APPLICATION`
/// - 404 if the id is not a seminar
pub async fn apply_seminar(
    State(state): State<AppState>,
    Authenticated(actor): Authenticated,
    ApiJson(request): ApiJson<ApplyRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ApplyResponse>>), AppError> {
    apply(&state, &actor, OfferingKind::Seminar, request).await
}

/// Register for an event.
///
/// # Errors
///
/// Same as [`apply_seminar`], with 404 if the id is not an event.
pub async fn apply_event(
    State(state): State<AppState>,
    Authenticated(actor): Authenticated,
    ApiJson(request): ApiJson<ApplyRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ApplyResponse>>), AppError> {
    apply(&state, &actor, OfferingKind::Event, request).await
}

/// Applications visible to the actor, newest first.
///
/// # Errors
///
/// 403 for actors without any scope.
pub async fn list_applications(
    State(state): State<AppState>,
    Authenticated(actor): Authenticated,
    ApiQuery(params): ApiQuery<ApplicationListParams>,
) -> Result<Json<ApiResponse<Vec<Application>>>, AppError> {
    let applications = state
        .engine
        .offerings()
        .list(&actor, params.offering_id)
        .await?;
    Ok(Json(ApiResponse::ok(applications)))
}
