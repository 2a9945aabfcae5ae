//! Support ticket endpoints.
//!
//! - `POST /tickets` - Open a case (consumes one ticket)
//! - `GET /tickets` - List tickets in the actor's scope
//! - `GET /tickets/:id` - Ticket with its thread
//! - `GET /tickets/:id/messages` - Thread only
//! - `POST /tickets/:id/messages` - Reply
//! - `PUT /tickets/:id/status` - Change status (staff/admin)
//! - `PUT /tickets/:id/assign` - Change assignee (admin)
//! - `POST /tickets/:id/read` - Mark the thread as read

use crate::error::AppError;
use crate::extractors::{ApiJson, ApiPath, ApiQuery, Authenticated};
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use client_portal_core::tickets::{NewTicket, TicketFilter};
use client_portal_core::types::{
    ConsumptionLogEntry, Message, Priority, StaffId, SupportTicket, TicketId, TicketStatus,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to open a support case.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    /// Subject line
    pub subject: String,
    /// Free-text category
    pub category: String,
    /// `高`, `中` or `低`
    pub priority: Priority,
    /// First message of the thread
    pub message: String,
}

/// Response after opening a case.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTicketResponse {
    /// The new ticket
    pub ticket: SupportTicket,
    /// Its first message
    pub first_message: Message,
    /// Ledger entry written for the case
    pub consumption: ConsumptionLogEntry,
    /// Client balance after the debit
    pub remaining_tickets: u32,
}

/// Listing filters, both optional.
#[derive(Debug, Default, Deserialize)]
pub struct TicketListParams {
    /// Wire form of a ticket status
    pub status: Option<String>,
    /// Wire form of a priority
    pub priority: Option<String>,
}

impl TicketListParams {
    fn into_filter(self) -> Result<TicketFilter, AppError> {
        Ok(TicketFilter {
            status: parse_param(self.status)?,
            priority: parse_param(self.priority)?,
        })
    }
}

fn parse_param<T>(raw: Option<String>) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.filter(|value| !value.is_empty())
        .map(|value| value.parse::<T>())
        .transpose()
        .map_err(|e| AppError::validation(e.to_string()))
}

/// A ticket with its thread.
#[derive(Debug, Serialize)]
pub struct TicketDetailResponse {
    /// The ticket
    pub ticket: SupportTicket,
    /// Messages in timestamp order
    pub messages: Vec<Message>,
}

/// Request to post a reply.
#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    /// Message body
    pub text: String,
}

/// Request to change the status.
#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    /// `受付中`, `対応中` or `完了`
    pub status: TicketStatus,
}

/// Request to change the assignee. `null` clears it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    /// Staff member, or `null`
    #[serde(default)]
    pub assignee_id: Option<StaffId>,
}

/// Outcome of marking a thread as read.
#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    /// Messages newly marked as read
    pub marked: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Open a support case.
///
/// Debits one ticket (`新規相談`) from the actor's client.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/tickets \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"subject":"Invoice question","category":"billing","priority":"中","message":"..."}'
/// ```
///
/// # Errors
///
/// - 400 `INSUFFICIENT_BALANCE` when the client has no ticket left
/// - 400 `VALIDATION_ERROR` for malformed input
/// - 403 for non-client actors
pub async fn create_ticket(
    State(state): State<AppState>,
    Authenticated(actor): Authenticated,
    ApiJson(request): ApiJson<CreateTicketRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedTicketResponse>>), AppError> {
    let opened = state
        .engine
        .tickets()
        .open(
            &actor,
            NewTicket {
                subject: request.subject,
                category: request.category,
                priority: request.priority,
                message: request.message,
            },
        )
        .await?;

    let message = format!("Ticket {} created", opened.ticket.human_id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            CreatedTicketResponse {
                ticket: opened.ticket,
                first_message: opened.first_message,
                consumption: opened.consumption,
                remaining_tickets: opened.remaining_tickets,
            },
            message,
        )),
    ))
}

/// List tickets visible to the actor, most recently updated first.
///
/// ```bash
/// curl "http://localhost:8080/tickets?status=対応中&priority=高" \
///   -H "Authorization: Bearer <token>"
/// ```
///
/// # Errors
///
/// - 400 for an unknown status or priority
/// - 403 for actors without any ticket scope
pub async fn list_tickets(
    State(state): State<AppState>,
    Authenticated(actor): Authenticated,
    ApiQuery(params): ApiQuery<TicketListParams>,
) -> Result<Json<ApiResponse<Vec<SupportTicket>>>, AppError> {
    let tickets = state
        .engine
        .tickets()
        .list(&actor, params.into_filter()?)
        .await?;
    Ok(Json(ApiResponse::ok(tickets)))
}

/// Ticket with its full thread.
///
/// # Errors
///
/// - 404 if the ticket does not exist
/// - 403 if it is outside the actor's scope
pub async fn get_ticket(
    State(state): State<AppState>,
    Authenticated(actor): Authenticated,
    ApiPath(id): ApiPath<TicketId>,
) -> Result<Json<ApiResponse<TicketDetailResponse>>, AppError> {
    let thread = state.engine.tickets().get(&actor, id).await?;
    Ok(Json(ApiResponse::ok(TicketDetailResponse {
        ticket: thread.ticket,
        messages: thread.messages,
    })))
}

/// Thread of a ticket.
///
/// # Errors
///
/// Same as [`get_ticket`].
pub async fn list_messages(
    State(state): State<AppState>,
    Authenticated(actor): Authenticated,
    ApiPath(id): ApiPath<TicketId>,
) -> Result<Json<ApiResponse<Vec<Message>>>, AppError> {
    let messages = state.engine.tickets().messages(&actor, id).await?;
    Ok(Json(ApiResponse::ok(messages)))
}

/// Append a reply to the thread.
///
/// ```bash
/// curl -X POST http://localhost:8080/tickets/<id>/messages \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"text":"Thanks, that solved it."}'
/// ```
///
/// # Errors
///
/// - 400 for an empty or oversized text
/// - 403 / 404 as for [`get_ticket`]
pub async fn post_message(
    State(state): State<AppState>,
    Authenticated(actor): Authenticated,
    ApiPath(id): ApiPath<TicketId>,
    ApiJson(request): ApiJson<PostMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Message>>), AppError> {
    let message = state
        .engine
        .tickets()
        .post_message(&actor, id, request.text)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(message))))
}

/// Change the ticket status.
///
/// # Errors
///
/// - 403 for client-side actors and unassigned staff
/// - 404 if the ticket does not exist
pub async fn change_status(
    State(state): State<AppState>,
    Authenticated(actor): Authenticated,
    ApiPath(id): ApiPath<TicketId>,
    ApiJson(request): ApiJson<ChangeStatusRequest>,
) -> Result<Json<ApiResponse<SupportTicket>>, AppError> {
    let ticket = state
        .engine
        .tickets()
        .change_status(&actor, id, request.status)
        .await?;
    Ok(Json(ApiResponse::ok(ticket)))
}

/// Change or clear the assignee.
///
/// ```bash
/// curl -X PUT http://localhost:8080/tickets/<id>/assign \
///   -H "Authorization: Bearer <admin-token>" \
///   -H "Content-Type: application/json" \
///   -d '{"assigneeId":null}'
/// ```
///
/// # Errors
///
/// - 403 unless the actor is ADMIN or SUPERADMIN
/// - 404 if the ticket does not exist
pub async fn assign_ticket(
    State(state): State<AppState>,
    Authenticated(actor): Authenticated,
    ApiPath(id): ApiPath<TicketId>,
    ApiJson(request): ApiJson<AssignRequest>,
) -> Result<Json<ApiResponse<SupportTicket>>, AppError> {
    let ticket = state
        .engine
        .tickets()
        .assign(&actor, id, request.assignee_id)
        .await?;
    Ok(Json(ApiResponse::ok(ticket)))
}

/// Mark every message of the thread as read by the actor.
///
/// # Errors
///
/// Same as [`get_ticket`].
pub async fn mark_read(
    State(state): State<AppState>,
    Authenticated(actor): Authenticated,
    ApiPath(id): ApiPath<TicketId>,
) -> Result<Json<ApiResponse<MarkReadResponse>>, AppError> {
    let marked = state.engine.tickets().mark_read(&actor, id).await?;
    Ok(Json(ApiResponse::ok(MarkReadResponse { marked })))
}
