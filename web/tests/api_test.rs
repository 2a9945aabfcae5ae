//! HTTP API integration tests.
//!
//! Drives the full router (extractors, envelope, error mapping) over the
//! in-memory store.

#![allow(clippy::unwrap_used)] // Test code
#![allow(clippy::expect_used)] // Test code

use axum::http::{HeaderName, HeaderValue, StatusCode, header::AUTHORIZATION};
use axum_test::{TestRequest, TestServer};
use client_portal_core::PortalEngine;
use client_portal_core::types::{ClientId, StaffId};
use client_portal_testing::{InMemoryPortalStore, StaticActorResolver, fixtures, test_clock};
use client_portal_web::{AppState, CORRELATION_ID_HEADER, build_router};
use serde_json::{Value, json};
use std::sync::Arc;

const CLIENT_TOKEN: &str = "client-token";
const OTHER_CLIENT_TOKEN: &str = "other-client-token";
const STAFF_TOKEN: &str = "staff-token";
const STRANGER_STAFF_TOKEN: &str = "stranger-staff-token";
const ADMIN_TOKEN: &str = "admin-token";
const AFFILIATE_TOKEN: &str = "affiliate-token";

struct Harness {
    server: TestServer,
    store: Arc<InMemoryPortalStore>,
    client_id: ClientId,
    staff_id: StaffId,
}

fn harness(tickets: u32) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store = Arc::new(InMemoryPortalStore::new());
    let staff_id = StaffId::new();
    let client = store.insert_client(fixtures::client_assigned_to(tickets, staff_id));
    let other = store.insert_client(fixtures::client_with_balance(5));

    let resolver = StaticActorResolver::new()
        .with_token(CLIENT_TOKEN, fixtures::client_user(client.id))
        .with_token(OTHER_CLIENT_TOKEN, fixtures::client_user(other.id))
        .with_token(STAFF_TOKEN, fixtures::staff(staff_id))
        .with_token(STRANGER_STAFF_TOKEN, fixtures::staff(StaffId::new()))
        .with_token(ADMIN_TOKEN, fixtures::admin())
        .with_token(AFFILIATE_TOKEN, fixtures::affiliate());

    let engine = PortalEngine::new(store.clone(), Arc::new(test_clock()));
    let app = build_router(AppState::new(engine, Arc::new(resolver)));

    Harness {
        server: TestServer::new(app).expect("Failed to create test server"),
        store,
        client_id: client.id,
        staff_id,
    }
}

fn bearer(request: TestRequest, token: &str) -> TestRequest {
    request.add_header(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

fn ticket_body(subject: &str) -> Value {
    json!({
        "subject": subject,
        "category": "billing",
        "priority": "中",
        "message": "Please check last month's invoice."
    })
}

async fn open_ticket(h: &Harness, subject: &str) -> Value {
    let response = bearer(h.server.post("/tickets"), CLIENT_TOKEN)
        .json(&ticket_body(subject))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Value>()
}

fn assert_error(body: &Value, code: &str) {
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], code);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_health_and_readiness() {
    let h = harness(0);

    let response = h.server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["data"]["status"], "ok");

    let response = h.server.get("/ready").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    h.store.set_unavailable(true);
    let response = h.server.get("/ready").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_error(&response.json::<Value>(), "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_missing_or_unknown_token_is_unauthorized() {
    let h = harness(1);

    let response = h.server.get("/tickets").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_error(&response.json::<Value>(), "UNAUTHORIZED");

    let response = bearer(h.server.get("/tickets"), "revoked").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = h
        .server
        .get("/tickets")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Basic abc"))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_ticket_consumes_and_second_is_refused() {
    let h = harness(1);

    let body = open_ticket(&h, "X").await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["ticket"]["humanId"], "T-0001");
    assert_eq!(body["data"]["ticket"]["status"], "受付中");
    assert_eq!(body["data"]["remainingTickets"], 0);
    assert_eq!(body["data"]["consumption"]["type"], "新規相談");
    assert_eq!(body["data"]["consumption"]["ticketCost"], 1);
    assert_eq!(body["data"]["firstMessage"]["senderType"], "user");

    let response = bearer(h.server.post("/tickets"), CLIENT_TOKEN)
        .json(&ticket_body("Y"))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_error(&response.json::<Value>(), "INSUFFICIENT_BALANCE");

    assert_eq!(h.store.remaining_tickets(h.client_id), 0);
    assert_eq!(h.store.consumption(h.client_id).len(), 1);
    assert_eq!(h.store.tickets().len(), 1);
}

#[tokio::test]
async fn test_malformed_body_is_a_validation_error() {
    let h = harness(1);

    let response = bearer(h.server.post("/tickets"), CLIENT_TOKEN)
        .json(&json!({ "subject": "X", "category": "billing", "priority": "urgent", "message": "Y" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_error(&response.json::<Value>(), "VALIDATION_ERROR");

    let response = bearer(h.server.post("/tickets"), CLIENT_TOKEN)
        .json(&json!({ "subject": "  ", "category": "billing", "priority": "高", "message": "Y" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_error(&response.json::<Value>(), "VALIDATION_ERROR");

    assert_eq!(h.store.remaining_tickets(h.client_id), 1);
}

#[tokio::test]
async fn test_ticket_listing_is_scoped() {
    let h = harness(3);
    open_ticket(&h, "First").await;
    open_ticket(&h, "Second").await;

    let response = bearer(h.server.get("/tickets"), CLIENT_TOKEN).await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 2);

    let response = bearer(h.server.get("/tickets"), OTHER_CLIENT_TOKEN).await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 0);

    let response = bearer(h.server.get("/tickets"), STAFF_TOKEN).await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 2);

    let response = bearer(h.server.get("/tickets"), STRANGER_STAFF_TOKEN).await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 0);

    let response = bearer(h.server.get("/tickets"), AFFILIATE_TOKEN).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert_error(&response.json::<Value>(), "FORBIDDEN");
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let h = harness(2);
    let first = open_ticket(&h, "First").await;
    open_ticket(&h, "Second").await;
    let id = first["data"]["ticket"]["id"].as_str().unwrap();

    let response = bearer(h.server.put(&format!("/tickets/{id}/status")), ADMIN_TOKEN)
        .json(&json!({ "status": "対応中" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = bearer(h.server.get("/tickets"), ADMIN_TOKEN)
        .add_query_param("status", "対応中")
        .await;
    let data = response.json::<Value>()["data"].clone();
    assert_eq!(data.as_array().unwrap().len(), 1);
    assert_eq!(data[0]["id"], id);

    let response = bearer(h.server.get("/tickets"), ADMIN_TOKEN)
        .add_query_param("status", "closed")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unassigned_staff_cannot_read_ticket() {
    let h = harness(1);
    let opened = open_ticket(&h, "X").await;
    let id = opened["data"]["ticket"]["id"].as_str().unwrap();

    let response = bearer(h.server.get(&format!("/tickets/{id}")), STRANGER_STAFF_TOKEN).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = bearer(h.server.get(&format!("/tickets/{id}")), STAFF_TOKEN).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    assert_eq!(body["data"]["ticket"]["subject"], "X");
    assert_eq!(body["data"]["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_and_malformed_ticket_ids() {
    let h = harness(0);

    let id = uuid::Uuid::new_v4();
    let response = bearer(h.server.get(&format!("/tickets/{id}")), ADMIN_TOKEN).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_error(&response.json::<Value>(), "NOT_FOUND");

    let response = bearer(h.server.get("/tickets/T-0001"), ADMIN_TOKEN).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_error(&response.json::<Value>(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_reply_status_and_assignment_flow() {
    let h = harness(1);
    let opened = open_ticket(&h, "X").await;
    let id = opened["data"]["ticket"]["id"].as_str().unwrap();

    let response = bearer(h.server.post(&format!("/tickets/{id}/messages")), STAFF_TOKEN)
        .json(&json!({ "text": "Looking into it." }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(response.json::<Value>()["data"]["senderType"], "support");

    let response = bearer(h.server.put(&format!("/tickets/{id}/status")), CLIENT_TOKEN)
        .json(&json!({ "status": "完了" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = bearer(h.server.put(&format!("/tickets/{id}/status")), STAFF_TOKEN)
        .json(&json!({ "status": "完了" }))
        .await;
    assert_eq!(response.json::<Value>()["data"]["status"], "完了");

    let response = bearer(h.server.put(&format!("/tickets/{id}/assign")), STAFF_TOKEN)
        .json(&json!({ "assigneeId": h.staff_id }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = bearer(h.server.put(&format!("/tickets/{id}/assign")), ADMIN_TOKEN)
        .json(&json!({ "assigneeId": h.staff_id }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>()["data"]["assigneeId"],
        json!(h.staff_id)
    );

    let response = bearer(h.server.put(&format!("/tickets/{id}/assign")), ADMIN_TOKEN)
        .json(&json!({ "assigneeId": null }))
        .await;
    assert_eq!(response.json::<Value>()["data"]["assigneeId"], Value::Null);

    let response = bearer(h.server.get(&format!("/tickets/{id}/messages")), CLIENT_TOKEN).await;
    let messages = response.json::<Value>()["data"].clone();
    let senders: Vec<&str> = messages
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["senderType"].as_str().unwrap())
        .collect();
    assert_eq!(senders, ["user", "support", "system", "system", "system"]);
}

#[tokio::test]
async fn test_mark_read_reports_newly_marked() {
    let h = harness(1);
    let opened = open_ticket(&h, "X").await;
    let id = opened["data"]["ticket"]["id"].as_str().unwrap();

    bearer(h.server.post(&format!("/tickets/{id}/messages")), STAFF_TOKEN)
        .json(&json!({ "text": "Reply" }))
        .await;

    let response = bearer(h.server.post(&format!("/tickets/{id}/read")), CLIENT_TOKEN).await;
    assert_eq!(response.json::<Value>()["data"]["marked"], 1);

    let response = bearer(h.server.post(&format!("/tickets/{id}/read")), CLIENT_TOKEN).await;
    assert_eq!(response.json::<Value>()["data"]["marked"], 0);
}

#[tokio::test]
async fn test_online_seminar_application_consumes_a_ticket() {
    let h = harness(1);
    let seminar = h.store.insert_offering(fixtures::online_seminar(10));
    let form = json!({
        "offeringId": seminar.id,
        "userName": "Sato",
        "userEmail": "sato@example.com",
        "notes": ""
    });

    let response = bearer(h.server.post("/seminars/apply"), CLIENT_TOKEN)
        .json(&form)
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["data"]["ticketConsumed"], true);
    assert_eq!(body["data"]["remainingTickets"], 0);
    assert_eq!(body["data"]["consumption"]["type"], "セミナー参加");

    let response = bearer(h.server.post("/seminars/apply"), CLIENT_TOKEN)
        .json(&form)
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_error(&response.json::<Value>(), "DUPLICATE_APPLICATION");
}

#[tokio::test]
async fn test_venue_seminar_is_free_and_full_seminar_is_refused() {
    let h = harness(0);
    let venue = h.store.insert_offering(fixtures::venue_seminar(1));

    let response = bearer(h.server.post("/seminars/apply"), CLIENT_TOKEN)
        .json(&json!({ "offeringId": venue.id, "userName": "Sato", "userEmail": "sato@example.com" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["data"]["ticketConsumed"], false);
    assert!(body["data"].get("remainingTickets").is_none());

    let response = bearer(h.server.post("/seminars/apply"), OTHER_CLIENT_TOKEN)
        .json(&json!({ "offeringId": venue.id, "userName": "Ito", "userEmail": "ito@example.com" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_error(&response.json::<Value>(), "CAPACITY_EXCEEDED");
}

#[tokio::test]
async fn test_event_endpoint_rejects_seminar_ids() {
    let h = harness(2);
    let seminar = h.store.insert_offering(fixtures::online_seminar(10));
    let event = h.store.insert_offering(fixtures::online_event(10));

    let response = bearer(h.server.post("/events/apply"), CLIENT_TOKEN)
        .json(&json!({ "offeringId": seminar.id, "userName": "Sato", "userEmail": "sato@example.com" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = bearer(h.server.post("/events/apply"), CLIENT_TOKEN)
        .json(&json!({ "offeringId": event.id, "userName": "Sato", "userEmail": "sato@example.com" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(
        response.json::<Value>()["data"]["consumption"]["type"],
        "オンラインイベント参加"
    );

    let response = bearer(h.server.get("/applications"), ADMIN_TOKEN)
        .add_query_param("offeringId", event.id)
        .await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_balance_and_consumption_visibility() {
    let h = harness(2);
    open_ticket(&h, "X").await;
    let client_id = h.client_id;

    let response = bearer(h.server.get(&format!("/clients/{client_id}/balance")), CLIENT_TOKEN).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["data"]["remainingTickets"], 1);

    let response =
        bearer(h.server.get(&format!("/clients/{client_id}/balance")), OTHER_CLIENT_TOKEN).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response =
        bearer(h.server.get(&format!("/clients/{client_id}/consumption")), CLIENT_TOKEN).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response =
        bearer(h.server.get(&format!("/clients/{client_id}/consumption")), ADMIN_TOKEN).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let entries = response.json::<Value>()["data"].clone();
    assert_eq!(entries.as_array().unwrap().len(), 1);
    assert_eq!(entries[0]["relatedId"], "T-0001");

    let unknown = ClientId::new();
    let response = bearer(h.server.get(&format!("/clients/{unknown}/consumption")), ADMIN_TOKEN).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = bearer(h.server.get(&format!("/clients/{unknown}/balance")), CLIENT_TOKEN).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert_error(&response.json::<Value>(), "FORBIDDEN");

    let response = bearer(h.server.get(&format!("/clients/{unknown}/balance")), ADMIN_TOKEN).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_offering_filter_is_a_validation_error() {
    let h = harness(1);

    let response = bearer(h.server.get("/applications"), CLIENT_TOKEN)
        .add_query_param("offeringId", "not-a-uuid")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_error(&response.json::<Value>(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_correlation_id_is_echoed() {
    let h = harness(0);
    let id = uuid::Uuid::new_v4();

    let response = h
        .server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-correlation-id"),
            HeaderValue::from_str(&id.to_string()).unwrap(),
        )
        .await;

    let echoed = response
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    assert_eq!(echoed, Some(id.to_string()));
}
