//! Support-ticket workflow against the in-memory store.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use client_portal_core::tickets::{NewTicket, TicketFilter};
use client_portal_core::types::{
    consumption_type, Priority, SenderType, StaffId, TicketId, TicketStatus,
};
use client_portal_core::{Actor, PortalEngine, PortalError};
use chrono::{DateTime, Duration, Utc};
use client_portal_testing::{fixed_instant, fixtures, test_clock, FixedClock, InMemoryPortalStore};
use std::sync::Arc;

fn engine(store: &Arc<InMemoryPortalStore>) -> PortalEngine {
    PortalEngine::new(store.clone(), Arc::new(test_clock()))
}

fn engine_at(store: &Arc<InMemoryPortalStore>, at: DateTime<Utc>) -> PortalEngine {
    PortalEngine::new(store.clone(), Arc::new(FixedClock::new(at)))
}

fn new_ticket(subject: &str) -> NewTicket {
    NewTicket {
        subject: subject.to_string(),
        category: "general".to_string(),
        priority: Priority::Medium,
        message: "Y".to_string(),
    }
}

#[tokio::test]
async fn test_opening_a_ticket_consumes_exactly_one() {
    let store = Arc::new(InMemoryPortalStore::new());
    let client = store.insert_client(fixtures::client_with_balance(1));
    let engine = engine(&store);
    let actor = fixtures::client_user(client.id);

    let opened = engine.tickets().open(&actor, new_ticket("X")).await.unwrap();

    assert_eq!(opened.remaining_tickets, 0);
    assert_eq!(opened.ticket.status, TicketStatus::Received);
    assert_eq!(opened.ticket.human_id.as_str(), "T-0001");
    assert_eq!(opened.first_message.text, "Y");
    assert_eq!(opened.first_message.sender_type, SenderType::User);

    let ledger = store.consumption(client.id);
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].entry_type, consumption_type::NEW_CONSULTATION);
    assert_eq!(ledger[0].ticket_cost, 1);
    assert_eq!(ledger[0].description, "X");
    assert_eq!(ledger[0].related_id, "T-0001");

    let err = engine.tickets().open(&actor, new_ticket("X again")).await.unwrap_err();
    assert!(matches!(err, PortalError::InsufficientBalance { remaining: 0, .. }));
    assert_eq!(store.remaining_tickets(client.id), 0);
    assert_eq!(store.tickets().len(), 1);
    assert_eq!(store.consumption(client.id).len(), 1);
}

#[tokio::test]
async fn test_failed_ledger_append_creates_no_ticket() {
    let store = Arc::new(InMemoryPortalStore::new());
    let client = store.insert_client(fixtures::client_with_balance(1));
    store.fail_consumption_appends(true);

    let err = engine(&store)
        .tickets()
        .open(&fixtures::client_user(client.id), new_ticket("X"))
        .await
        .unwrap_err();

    assert!(matches!(err, PortalError::Storage(_)));
    assert_eq!(store.remaining_tickets(client.id), 1);
    assert!(store.tickets().is_empty());
}

#[tokio::test]
async fn test_only_client_users_open_tickets() {
    let store = Arc::new(InMemoryPortalStore::new());
    store.insert_client(fixtures::client_with_balance(1));
    let engine = engine(&store);

    for actor in [fixtures::admin(), fixtures::staff(StaffId::new()), fixtures::affiliate()] {
        let err = engine.tickets().open(&actor, new_ticket("X")).await.unwrap_err();
        assert!(matches!(err, PortalError::Forbidden(_)));
    }
}

#[tokio::test]
async fn test_validation_happens_before_the_debit() {
    let store = Arc::new(InMemoryPortalStore::new());
    let client = store.insert_client(fixtures::client_with_balance(1));

    let err = engine(&store)
        .tickets()
        .open(&fixtures::client_user(client.id), new_ticket(""))
        .await
        .unwrap_err();

    assert!(matches!(err, PortalError::Validation(_)));
    assert_eq!(store.remaining_tickets(client.id), 1);
}

#[tokio::test]
async fn test_client_listing_only_shows_own_tickets() {
    let store = Arc::new(InMemoryPortalStore::new());
    let mine = store.insert_client(fixtures::client_with_balance(2));
    let other = store.insert_client(fixtures::client_with_balance(5));
    let engine = engine(&store);
    let me = fixtures::client_user(mine.id);

    engine.tickets().open(&me, new_ticket("mine")).await.unwrap();
    for i in 0..5 {
        engine
            .tickets()
            .open(&fixtures::client_user(other.id), new_ticket(&format!("other {i}")))
            .await
            .unwrap();
    }

    let listed = engine.tickets().list(&me, TicketFilter::default()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed.iter().all(|t| t.client_id == mine.id));

    let everything = engine
        .tickets()
        .list(&fixtures::admin(), TicketFilter::default())
        .await
        .unwrap();
    assert_eq!(everything.len(), 6);

    let err = engine
        .tickets()
        .list(&fixtures::affiliate(), TicketFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::Forbidden(_)));
}

#[tokio::test]
async fn test_listing_filters_by_status_and_priority() {
    let store = Arc::new(InMemoryPortalStore::new());
    let client = store.insert_client(fixtures::client_with_balance(2));
    let engine = engine(&store);
    let actor = fixtures::client_user(client.id);
    let admin = fixtures::admin();

    let urgent = engine
        .tickets()
        .open(
            &actor,
            NewTicket {
                priority: Priority::High,
                ..new_ticket("urgent")
            },
        )
        .await
        .unwrap();
    engine.tickets().open(&actor, new_ticket("routine")).await.unwrap();
    engine
        .tickets()
        .change_status(&admin, urgent.ticket.id, TicketStatus::InProgress)
        .await
        .unwrap();

    let in_progress = engine
        .tickets()
        .list(
            &actor,
            TicketFilter {
                status: Some(TicketStatus::InProgress),
                priority: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(in_progress.len(), 1);
    assert_eq!(in_progress[0].id, urgent.ticket.id);

    let low = engine
        .tickets()
        .list(
            &actor,
            TicketFilter {
                status: None,
                priority: Some(Priority::Low),
            },
        )
        .await
        .unwrap();
    assert!(low.is_empty());
}

#[tokio::test]
async fn test_unassigned_staff_is_forbidden() {
    let store = Arc::new(InMemoryPortalStore::new());
    let assigned = StaffId::new();
    let client = store.insert_client(fixtures::client_assigned_to(1, assigned));
    let engine = engine(&store);

    let opened = engine
        .tickets()
        .open(&fixtures::client_user(client.id), new_ticket("X"))
        .await
        .unwrap();

    let stranger = fixtures::staff(StaffId::new());
    let err = engine.tickets().get(&stranger, opened.ticket.id).await.unwrap_err();
    assert!(matches!(err, PortalError::Forbidden(_)));

    let err = engine
        .tickets()
        .change_status(&stranger, opened.ticket.id, TicketStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::Forbidden(_)));

    let thread = engine
        .tickets()
        .get(&fixtures::staff(assigned), opened.ticket.id)
        .await
        .unwrap();
    assert_eq!(thread.messages.len(), 1);
}

#[tokio::test]
async fn test_unknown_ticket_is_not_found() {
    let store = Arc::new(InMemoryPortalStore::new());
    let err = engine(&store)
        .tickets()
        .get(&fixtures::admin(), TicketId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::NotFound { resource: "Ticket", .. }));
}

#[tokio::test]
async fn test_status_can_return_from_completed() {
    let store = Arc::new(InMemoryPortalStore::new());
    let staff_id = StaffId::new();
    let client = store.insert_client(fixtures::client_assigned_to(1, staff_id));
    let engine = engine(&store);
    let staff = fixtures::staff(staff_id);

    let opened = engine
        .tickets()
        .open(&fixtures::client_user(client.id), new_ticket("X"))
        .await
        .unwrap();
    let id = opened.ticket.id;

    let completed = engine
        .tickets()
        .change_status(&staff, id, TicketStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.status, TicketStatus::Completed);

    let reopened = engine
        .tickets()
        .change_status(&staff, id, TicketStatus::InProgress)
        .await
        .unwrap();
    assert_eq!(reopened.status, TicketStatus::InProgress);

    // Repeating the same status is a no-op.
    engine
        .tickets()
        .change_status(&staff, id, TicketStatus::InProgress)
        .await
        .unwrap();

    let notices: Vec<_> = store
        .messages(id)
        .into_iter()
        .filter(|m| m.sender_type == SenderType::System)
        .map(|m| m.text)
        .collect();
    assert_eq!(
        notices,
        vec![
            "ステータスが「完了」に変更されました",
            "ステータスが「対応中」に変更されました",
        ]
    );
}

#[tokio::test]
async fn test_clients_cannot_change_status() {
    let store = Arc::new(InMemoryPortalStore::new());
    let client = store.insert_client(fixtures::client_with_balance(1));
    let engine = engine(&store);
    let actor = fixtures::client_user(client.id);

    let opened = engine.tickets().open(&actor, new_ticket("X")).await.unwrap();
    let err = engine
        .tickets()
        .change_status(&actor, opened.ticket.id, TicketStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::Forbidden(_)));
}

#[tokio::test]
async fn test_messages_are_accepted_on_completed_tickets() {
    let store = Arc::new(InMemoryPortalStore::new());
    let staff_id = StaffId::new();
    let client = store.insert_client(fixtures::client_assigned_to(1, staff_id));
    let engine = engine(&store);
    let actor = fixtures::client_user(client.id);

    let opened = engine.tickets().open(&actor, new_ticket("X")).await.unwrap();
    engine
        .tickets()
        .change_status(&fixtures::admin(), opened.ticket.id, TicketStatus::Completed)
        .await
        .unwrap();

    let reply = engine
        .tickets()
        .post_message(&fixtures::staff(staff_id), opened.ticket.id, "Done?".to_string())
        .await
        .unwrap();
    assert_eq!(reply.sender_type, SenderType::Support);

    let followup = engine
        .tickets()
        .post_message(&actor, opened.ticket.id, "Thanks".to_string())
        .await
        .unwrap();
    assert_eq!(followup.sender_type, SenderType::User);

    let thread = engine.tickets().messages(&actor, opened.ticket.id).await.unwrap();
    assert_eq!(thread.len(), 4);
    assert_eq!(thread.last().map(|m| m.text.as_str()), Some("Thanks"));
    assert_eq!(store.tickets()[0].status, TicketStatus::Completed);
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let store = Arc::new(InMemoryPortalStore::new());
    let client = store.insert_client(fixtures::client_with_balance(1));
    let engine = engine(&store);
    let actor = fixtures::client_user(client.id);

    let opened = engine.tickets().open(&actor, new_ticket("X")).await.unwrap();
    let err = engine
        .tickets()
        .post_message(&actor, opened.ticket.id, "  ".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::Validation(_)));
    assert_eq!(store.messages(opened.ticket.id).len(), 1);
}

#[tokio::test]
async fn test_assignment_is_admin_only() {
    let store = Arc::new(InMemoryPortalStore::new());
    let staff_id = StaffId::new();
    let client = store.insert_client(fixtures::client_assigned_to(1, staff_id));
    let engine = engine(&store);

    let opened = engine
        .tickets()
        .open(&fixtures::client_user(client.id), new_ticket("X"))
        .await
        .unwrap();
    let id = opened.ticket.id;

    let err = engine
        .tickets()
        .assign(&fixtures::staff(staff_id), id, Some(staff_id))
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::Forbidden(_)));

    // Any staff member may be assigned, not only the client's main/sub pair.
    let outsider = StaffId::new();
    let assigned = engine
        .tickets()
        .assign(&fixtures::admin(), id, Some(outsider))
        .await
        .unwrap();
    assert_eq!(assigned.assignee_id, Some(outsider));

    let cleared = engine.tickets().assign(&fixtures::admin(), id, None).await.unwrap();
    assert_eq!(cleared.assignee_id, None);

    let notices = store
        .messages(id)
        .into_iter()
        .filter(|m| m.text == "担当者が変更されました")
        .count();
    assert_eq!(notices, 2);
}

#[tokio::test]
async fn test_mark_read_counts_newly_read_messages() {
    let store = Arc::new(InMemoryPortalStore::new());
    let client = store.insert_client(fixtures::client_with_balance(1));
    let engine = engine(&store);
    let actor = fixtures::client_user(client.id);
    let admin: Actor = fixtures::admin();

    let opened = engine.tickets().open(&actor, new_ticket("X")).await.unwrap();
    engine
        .tickets()
        .post_message(&admin, opened.ticket.id, "Hello".to_string())
        .await
        .unwrap();

    // The author has read their own message already.
    assert_eq!(engine.tickets().mark_read(&actor, opened.ticket.id).await.unwrap(), 1);
    assert_eq!(engine.tickets().mark_read(&actor, opened.ticket.id).await.unwrap(), 0);
    assert!(
        store
            .messages(opened.ticket.id)
            .iter()
            .all(|m| m.read_by.contains(&actor.id))
    );
}

#[tokio::test]
async fn test_replies_move_last_update_and_reads_do_not() {
    let store = Arc::new(InMemoryPortalStore::new());
    let client = store.insert_client(fixtures::client_with_balance(2));
    let actor = fixtures::client_user(client.id);
    let t0 = fixed_instant();
    let (t1, t2, t3) = (
        t0 + Duration::minutes(5),
        t0 + Duration::hours(1),
        t0 + Duration::hours(2),
    );

    let older = engine_at(&store, t0)
        .tickets()
        .open(&actor, new_ticket("older"))
        .await
        .unwrap()
        .ticket;
    let newer = engine_at(&store, t1)
        .tickets()
        .open(&actor, new_ticket("newer"))
        .await
        .unwrap()
        .ticket;

    let listed = engine_at(&store, t1)
        .tickets()
        .list(&actor, TicketFilter::default())
        .await
        .unwrap();
    let order: Vec<TicketId> = listed.iter().map(|t| t.id).collect();
    assert_eq!(order, vec![newer.id, older.id]);

    let reply = engine_at(&store, t2)
        .tickets()
        .post_message(&actor, older.id, "any update?".to_string())
        .await
        .unwrap();
    assert_eq!(reply.timestamp, t2);

    let later = engine_at(&store, t3);
    let thread = later.tickets().get(&actor, older.id).await.unwrap();
    assert_eq!(thread.ticket.last_update, t2);
    assert_eq!(thread.ticket.created_at, t0);

    let listed = later.tickets().list(&actor, TicketFilter::default()).await.unwrap();
    let order: Vec<TicketId> = listed.iter().map(|t| t.id).collect();
    assert_eq!(order, vec![older.id, newer.id]);

    let marked = later
        .tickets()
        .mark_read(&fixtures::admin(), older.id)
        .await
        .unwrap();
    assert_eq!(marked, 2);

    let thread = later.tickets().get(&actor, older.id).await.unwrap();
    assert_eq!(thread.ticket.last_update, t2);
    let listed = later.tickets().list(&actor, TicketFilter::default()).await.unwrap();
    assert_eq!(listed[0].id, older.id);
}
