//! Ticket Workflow: support-case creation, message thread, status and
//! assignment.
//!
//! # State Machine
//!
//! ```text
//! 受付中 (Received) ⇄ 対応中 (InProgress) ⇄ 完了 (Completed)
//! ```
//!
//! Every state can be set to every other by an actor allowed to change the
//! status; only membership in the enum is enforced. Posting a message never
//! changes the status but always moves `last_update`. Messages are accepted
//! on completed tickets too; the UI decides whether to offer a composer.

use crate::access;
use crate::actor::Actor;
use crate::environment::Clock;
use crate::error::{PortalError, Result};
use crate::ledger::{DebitRequest, EntitlementAccountant};
use crate::store::{PortalStore, TicketQuery};
use crate::types::{
    consumption_type, ClientAssignees, ConsumptionLogEntry, HumanTicketId, Message, MessageId,
    Priority, SenderType, StaffId, SupportTicket, TicketId, TicketStatus,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

const MAX_SUBJECT_CHARS: usize = 200;
const MAX_CATEGORY_CHARS: usize = 50;
const MAX_MESSAGE_CHARS: usize = 10_000;

/// Input for opening a support case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTicket {
    /// Subject line
    pub subject: String,
    /// Free-text category
    pub category: String,
    /// Priority
    pub priority: Priority,
    /// Body of the first message
    pub message: String,
}

impl NewTicket {
    fn validate(&self) -> Result<()> {
        bounded("subject", &self.subject, MAX_SUBJECT_CHARS)?;
        bounded("category", &self.category, MAX_CATEGORY_CHARS)?;
        bounded("message", &self.message, MAX_MESSAGE_CHARS)
    }
}

fn bounded(field: &str, value: &str, max_chars: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PortalError::validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > max_chars {
        return Err(PortalError::validation(format!(
            "{field} must be at most {max_chars} characters"
        )));
    }
    Ok(())
}

/// Listing filters applied inside the actor's scope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TicketFilter {
    /// Only tickets in this status
    pub status: Option<TicketStatus>,
    /// Only tickets with this priority
    pub priority: Option<Priority>,
}

/// A ticket together with its thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketThread {
    /// The ticket
    pub ticket: SupportTicket,
    /// Messages in timestamp order
    pub messages: Vec<Message>,
}

/// Everything written when a case is opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenedTicket {
    /// The new ticket
    pub ticket: SupportTicket,
    /// Its first message
    pub first_message: Message,
    /// The ledger entry for the consumed ticket
    pub consumption: ConsumptionLogEntry,
    /// Client balance after the debit
    pub remaining_tickets: u32,
}

/// Sets the status; returns the previous status when it actually changed.
fn transition(ticket: &mut SupportTicket, status: TicketStatus, at: DateTime<Utc>) -> Option<TicketStatus> {
    if ticket.status == status {
        return None;
    }
    let previous = ticket.status;
    ticket.status = status;
    ticket.last_update = at;
    Some(previous)
}

/// Sets the assignee; returns whether it actually changed.
fn reassign(ticket: &mut SupportTicket, assignee: Option<StaffId>, at: DateTime<Utc>) -> bool {
    if ticket.assignee_id == assignee {
        return false;
    }
    ticket.assignee_id = assignee;
    ticket.last_update = at;
    true
}

/// Notice appended to the thread by the engine itself.
fn system_message(actor: &Actor, ticket_id: TicketId, text: String, at: DateTime<Utc>) -> Message {
    Message {
        id: MessageId::new(),
        ticket_id,
        sender_user_id: actor.id,
        sender_type: SenderType::System,
        text,
        timestamp: at,
        read_by: BTreeSet::new(),
    }
}

type TicketPredicate = fn(&Actor, &SupportTicket, ClientAssignees) -> bool;

/// Owns the lifecycle of support tickets.
#[derive(Clone)]
pub struct TicketWorkflow {
    store: Arc<dyn PortalStore>,
    accountant: EntitlementAccountant,
    clock: Arc<dyn Clock>,
}

impl TicketWorkflow {
    /// Create a workflow over `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn PortalStore>,
        accountant: EntitlementAccountant,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            accountant,
            clock,
        }
    }

    /// Open a support case for the actor's client.
    ///
    /// Every case costs exactly one ticket. The debit, the ticket row and
    /// the first message are committed together.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the actor is a client-side user bound to a client
    /// - `Validation` for empty or oversized fields
    /// - `InsufficientBalance` if the client holds no ticket
    /// - `Storage` if the store fails
    pub async fn open(&self, actor: &Actor, input: NewTicket) -> Result<OpenedTicket> {
        let client_id = access::consuming_client(actor)
            .ok_or_else(|| PortalError::forbidden("Only client users can open support tickets"))?;
        input.validate()?;

        let mut tx = self.store.begin().await?;

        let human_id = HumanTicketId::from_sequence(tx.next_ticket_sequence().await?);
        let debit = self
            .accountant
            .debit_in(
                tx.as_mut(),
                DebitRequest::single(
                    client_id,
                    consumption_type::NEW_CONSULTATION,
                    input.subject.clone(),
                    human_id.as_str(),
                ),
            )
            .await?;

        let now = self.clock.now();
        let ticket = SupportTicket {
            id: TicketId::new(),
            human_id,
            client_id,
            subject: input.subject,
            category: input.category,
            priority: input.priority,
            status: TicketStatus::Received,
            assignee_id: None,
            created_by_user_id: actor.id,
            created_at: now,
            last_update: now,
        };
        let first_message = Message {
            id: MessageId::new(),
            ticket_id: ticket.id,
            sender_user_id: actor.id,
            sender_type: actor.sender_type(),
            text: input.message,
            timestamp: now,
            read_by: BTreeSet::from([actor.id]),
        };

        tx.insert_ticket(ticket.clone()).await?;
        tx.insert_message(first_message.clone()).await?;
        tx.commit().await?;

        info!(
            ticket_id = %ticket.id,
            human_id = %ticket.human_id,
            client_id = %client_id,
            remaining_tickets = debit.remaining,
            "Support ticket opened"
        );
        metrics::counter!("portal_support_tickets_created_total").increment(1);

        Ok(OpenedTicket {
            ticket,
            first_message,
            consumption: debit.entry,
            remaining_tickets: debit.remaining,
        })
    }

    /// Tickets the actor may see, filtered, most recently updated first.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if the actor's scope is empty (e.g. AFFILIATE)
    /// - `Storage` if the store fails
    pub async fn list(&self, actor: &Actor, filter: TicketFilter) -> Result<Vec<SupportTicket>> {
        let scope = access::scope(actor);
        if scope == access::Scope::Nothing {
            return Err(PortalError::forbidden("No access to support tickets"));
        }

        let query = TicketQuery {
            scope,
            status: filter.status,
            priority: filter.priority,
        };
        Ok(self.store.list_tickets(query).await?)
    }

    /// A ticket and its thread.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the ticket does not exist
    /// - `Forbidden` if the actor may not view it
    /// - `Storage` if the store fails
    pub async fn get(&self, actor: &Actor, id: TicketId) -> Result<TicketThread> {
        let ticket = self.authorize(actor, id, access::can_view, "view").await?;
        let messages = self.store.list_messages(id).await?;
        Ok(TicketThread { ticket, messages })
    }

    /// The thread of a ticket.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub async fn messages(&self, actor: &Actor, id: TicketId) -> Result<Vec<Message>> {
        self.authorize(actor, id, access::can_view, "view").await?;
        Ok(self.store.list_messages(id).await?)
    }

    /// Append a message and bump `last_update`.
    ///
    /// # Errors
    ///
    /// - `Validation` for empty or oversized text
    /// - `NotFound` if the ticket does not exist
    /// - `Forbidden` if the actor may not reply
    /// - `Storage` if the store fails
    pub async fn post_message(&self, actor: &Actor, id: TicketId, text: String) -> Result<Message> {
        bounded("text", &text, MAX_MESSAGE_CHARS)?;
        self.authorize(actor, id, access::can_reply, "reply to").await?;

        let mut tx = self.store.begin().await?;
        let mut ticket = tx
            .lock_ticket(id)
            .await?
            .ok_or_else(|| PortalError::not_found("Ticket", id))?;

        let now = self.clock.now();
        let message = Message {
            id: MessageId::new(),
            ticket_id: id,
            sender_user_id: actor.id,
            sender_type: actor.sender_type(),
            text,
            timestamp: now,
            read_by: BTreeSet::from([actor.id]),
        };
        ticket.last_update = now;

        tx.insert_message(message.clone()).await?;
        tx.update_ticket(ticket).await?;
        tx.commit().await?;

        info!(
            ticket_id = %id,
            message_id = %message.id,
            sender_type = %message.sender_type,
            "Message posted"
        );
        Ok(message)
    }

    /// Set the ticket's status. Setting the current status is a no-op.
    ///
    /// A real change appends a `system` message announcing it.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the ticket does not exist
    /// - `Forbidden` if the actor may not change the status
    /// - `Storage` if the store fails
    pub async fn change_status(
        &self,
        actor: &Actor,
        id: TicketId,
        status: TicketStatus,
    ) -> Result<SupportTicket> {
        self.authorize(actor, id, access::can_mutate_status, "change the status of")
            .await?;

        let mut tx = self.store.begin().await?;
        let mut ticket = tx
            .lock_ticket(id)
            .await?
            .ok_or_else(|| PortalError::not_found("Ticket", id))?;

        let now = self.clock.now();
        let Some(previous) = transition(&mut ticket, status, now) else {
            return Ok(ticket);
        };

        tx.update_ticket(ticket.clone()).await?;
        tx.insert_message(system_message(
            actor,
            id,
            format!("ステータスが「{status}」に変更されました"),
            now,
        ))
        .await?;
        tx.commit().await?;

        info!(
            ticket_id = %id,
            from = %previous,
            to = %status,
            actor_id = %actor.id,
            "Ticket status changed"
        );
        metrics::counter!("portal_ticket_status_changes_total", "status" => status.as_str())
            .increment(1);

        Ok(ticket)
    }

    /// Set or clear the ticket's assignee.
    ///
    /// No check ties the assignee to the client's main/sub pair.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the ticket does not exist
    /// - `Forbidden` unless the actor is ADMIN or SUPERADMIN
    /// - `Storage` if the store fails
    pub async fn assign(
        &self,
        actor: &Actor,
        id: TicketId,
        assignee: Option<StaffId>,
    ) -> Result<SupportTicket> {
        self.authorize(
            actor,
            id,
            |actor, ticket, _| access::can_assign(actor, ticket),
            "assign",
        )
        .await?;

        let mut tx = self.store.begin().await?;
        let mut ticket = tx
            .lock_ticket(id)
            .await?
            .ok_or_else(|| PortalError::not_found("Ticket", id))?;

        let now = self.clock.now();
        if !reassign(&mut ticket, assignee, now) {
            return Ok(ticket);
        }

        tx.update_ticket(ticket.clone()).await?;
        tx.insert_message(system_message(actor, id, "担当者が変更されました".to_string(), now))
            .await?;
        tx.commit().await?;

        info!(
            ticket_id = %id,
            assignee_id = ?assignee,
            actor_id = %actor.id,
            "Ticket assignee changed"
        );
        Ok(ticket)
    }

    /// Mark the whole thread as read by the actor.
    ///
    /// Returns how many messages were newly marked. `last_update` is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub async fn mark_read(&self, actor: &Actor, id: TicketId) -> Result<u64> {
        self.authorize(actor, id, access::can_view, "view").await?;

        let mut tx = self.store.begin().await?;
        let marked = tx.mark_messages_read(id, actor.id).await?;
        tx.commit().await?;
        Ok(marked)
    }

    async fn authorize(
        &self,
        actor: &Actor,
        id: TicketId,
        allowed: TicketPredicate,
        action: &str,
    ) -> Result<SupportTicket> {
        let ticket = self
            .store
            .find_ticket(id)
            .await?
            .ok_or_else(|| PortalError::not_found("Ticket", id))?;
        let assignees = self
            .store
            .find_client(ticket.client_id)
            .await?
            .map(|client| client.assignees())
            .unwrap_or_default();

        if allowed(actor, &ticket, assignees) {
            Ok(ticket)
        } else {
            Err(PortalError::forbidden(format!(
                "Not allowed to {action} ticket {}",
                ticket.human_id
            )))
        }
    }
}
