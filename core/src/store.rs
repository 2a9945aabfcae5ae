//! Storage abstraction consumed by the engine.
//!
//! [`PortalStore`] serves reads and opens [`PortalTransaction`]s. Every
//! write of one logical operation goes through a single transaction; a
//! transaction dropped without [`PortalTransaction::commit`] leaves no
//! trace.
//!
//! # Dyn Compatibility
//!
//! Methods return boxed futures instead of using `async fn` so services can
//! hold `Arc<dyn PortalStore>`.
//!
//! # Implementations
//!
//! - `PostgresPortalStore` (in `client-portal-postgres`): production
//! - `InMemoryPortalStore` (in `client-portal-testing`): fast, deterministic tests

use crate::access::Scope;
use crate::error::StoreError;
use crate::types::{
    Application, Client, ClientAssignees, ClientId, ConsumptionLogEntry, Message, Offering,
    OfferingId, Priority, SupportTicket, TicketId, TicketStatus, UserId,
};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Result of the atomic conditional balance update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebitOutcome {
    /// The balance covered the amount and was decremented.
    Debited {
        /// Balance after the debit
        remaining: u32,
    },
    /// The balance was too low; nothing was written.
    Insufficient {
        /// Balance at the time of the attempt
        remaining: u32,
    },
    /// No client with that id.
    UnknownClient,
}

/// Filter for ticket listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TicketQuery {
    /// Clients whose tickets may be returned
    pub scope: Scope,
    /// Only tickets in this status
    pub status: Option<TicketStatus>,
    /// Only tickets with this priority
    pub priority: Option<Priority>,
}

impl TicketQuery {
    /// Whether `ticket`, owned by a client with `assignees`, matches.
    #[must_use]
    pub fn matches(&self, ticket: &SupportTicket, assignees: ClientAssignees) -> bool {
        self.scope.admits(ticket.client_id, assignees)
            && self.status.is_none_or(|status| ticket.status == status)
            && self.priority.is_none_or(|priority| ticket.priority == priority)
    }
}

/// Filter for application listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplicationQuery {
    /// Clients whose applications may be returned
    pub scope: Scope,
    /// Only applications to this offering
    pub offering_id: Option<OfferingId>,
}

impl ApplicationQuery {
    /// Whether `application`, owned by a client with `assignees`, matches.
    #[must_use]
    pub fn matches(&self, application: &Application, assignees: ClientAssignees) -> bool {
        self.scope.admits(application.client_id, assignees)
            && self
                .offering_id
                .is_none_or(|offering_id| application.offering_id == offering_id)
    }
}

/// Read access and transaction factory.
pub trait PortalStore: Send + Sync {
    /// Open a unit of work.
    fn begin(&self) -> StoreFuture<'_, Box<dyn PortalTransaction>>;

    /// Load a client.
    fn find_client(&self, id: ClientId) -> StoreFuture<'_, Option<Client>>;

    /// Load a ticket.
    fn find_ticket(&self, id: TicketId) -> StoreFuture<'_, Option<SupportTicket>>;

    /// Tickets matching `query`, most recently updated first.
    fn list_tickets(&self, query: TicketQuery) -> StoreFuture<'_, Vec<SupportTicket>>;

    /// A ticket's thread in timestamp order.
    fn list_messages(&self, ticket_id: TicketId) -> StoreFuture<'_, Vec<Message>>;

    /// A client's ledger, oldest entry first.
    fn list_consumption(&self, client_id: ClientId) -> StoreFuture<'_, Vec<ConsumptionLogEntry>>;

    /// Load an offering.
    fn find_offering(&self, id: OfferingId) -> StoreFuture<'_, Option<Offering>>;

    /// Applications matching `query`, newest first.
    fn list_applications(&self, query: ApplicationQuery) -> StoreFuture<'_, Vec<Application>>;

    /// Cheap round trip used by readiness checks.
    fn ping(&self) -> StoreFuture<'_, ()>;
}

/// One unit of work. Effects become visible only on `commit`.
pub trait PortalTransaction: Send {
    /// Decrement the client's balance by `amount` if, and only if, the
    /// balance covers it. Check and decrement are one atomic step.
    fn debit_balance(&mut self, client_id: ClientId, amount: u32) -> StoreFuture<'_, DebitOutcome>;

    /// Append a ledger entry.
    fn append_consumption(&mut self, entry: ConsumptionLogEntry) -> StoreFuture<'_, ()>;

    /// Allocate the next value of the human ticket number sequence.
    fn next_ticket_sequence(&mut self) -> StoreFuture<'_, u64>;

    /// Insert a new ticket.
    fn insert_ticket(&mut self, ticket: SupportTicket) -> StoreFuture<'_, ()>;

    /// Load a ticket and lock it until the transaction ends.
    fn lock_ticket(&mut self, id: TicketId) -> StoreFuture<'_, Option<SupportTicket>>;

    /// Persist status, assignee and `last_update` of an existing ticket.
    fn update_ticket(&mut self, ticket: SupportTicket) -> StoreFuture<'_, ()>;

    /// Append a message to a thread.
    fn insert_message(&mut self, message: Message) -> StoreFuture<'_, ()>;

    /// Add `user_id` to `read_by` of every message of the ticket; returns
    /// how many messages were newly marked.
    fn mark_messages_read(&mut self, ticket_id: TicketId, user_id: UserId) -> StoreFuture<'_, u64>;

    /// Load an offering and lock it until the transaction ends.
    fn lock_offering(&mut self, id: OfferingId) -> StoreFuture<'_, Option<Offering>>;

    /// Number of applications to an offering.
    fn count_applications(&mut self, offering_id: OfferingId) -> StoreFuture<'_, u32>;

    /// Whether the client already applied to the offering.
    fn application_exists(
        &mut self,
        offering_id: OfferingId,
        client_id: ClientId,
    ) -> StoreFuture<'_, bool>;

    /// Insert an application.
    ///
    /// Fails with [`StoreError::UniqueViolation`] when the client already
    /// applied to the offering.
    fn insert_application(&mut self, application: Application) -> StoreFuture<'_, ()>;

    /// Make every effect of the transaction durable.
    fn commit(self: Box<Self>) -> StoreFuture<'static, ()>;
}
