//! In-memory implementation of the portal storage traits.
//!
//! Transactions are serialized by a writer lock held for the whole
//! transaction. Each one works on a private copy of the committed state and
//! publishes it on commit, so a dropped transaction leaves no trace and
//! reads never observe half-finished work.

use client_portal_core::actor::{Actor, ActorResolver};
use client_portal_core::error::StoreError;
use client_portal_core::store::{
    ApplicationQuery, DebitOutcome, PortalStore, PortalTransaction, StoreFuture, TicketQuery,
};
use client_portal_core::types::{
    Application, Client, ClientAssignees, ClientId, ConsumptionLogEntry, Message, Offering,
    OfferingId, SupportTicket, TicketId, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Debug, Default)]
struct PortalState {
    clients: HashMap<ClientId, Client>,
    consumption: Vec<ConsumptionLogEntry>,
    tickets: Vec<SupportTicket>,
    messages: Vec<Message>,
    offerings: HashMap<OfferingId, Offering>,
    applications: Vec<Application>,
    ticket_sequence: u64,
}

impl PortalState {
    fn assignees(&self, client_id: ClientId) -> ClientAssignees {
        self.clients
            .get(&client_id)
            .map(Client::assignees)
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_consumption_appends: AtomicBool,
    fail_commits: AtomicBool,
    unavailable: AtomicBool,
}

impl Faults {
    fn check(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Database(format!("injected failure: {what}")))
        } else {
            Ok(())
        }
    }
}

/// In-memory portal store for fast, deterministic tests.
///
/// Seed it with [`Self::insert_client`] and [`Self::insert_offering`],
/// inspect it with the snapshot accessors, and make it fail on purpose with
/// the `fail_*` switches.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPortalStore {
    committed: Arc<RwLock<PortalState>>,
    writer: Arc<Mutex<()>>,
    faults: Arc<Faults>,
}

impl InMemoryPortalStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&PortalState) -> T) -> T {
        f(&self.committed.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut PortalState) -> T) -> T {
        f(&mut self.committed.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Seed a client; returns it for convenience.
    pub fn insert_client(&self, client: Client) -> Client {
        self.write(|state| state.clients.insert(client.id, client.clone()));
        client
    }

    /// Seed an offering; returns it for convenience.
    pub fn insert_offering(&self, offering: Offering) -> Offering {
        self.write(|state| state.offerings.insert(offering.id, offering.clone()));
        offering
    }

    /// Committed state of a client.
    #[must_use]
    pub fn client(&self, id: ClientId) -> Option<Client> {
        self.read(|state| state.clients.get(&id).cloned())
    }

    /// Committed balance of a client (0 when unknown).
    #[must_use]
    pub fn remaining_tickets(&self, id: ClientId) -> u32 {
        self.client(id).map_or(0, |client| client.remaining_tickets)
    }

    /// Committed ledger of a client, oldest first.
    #[must_use]
    pub fn consumption(&self, client_id: ClientId) -> Vec<ConsumptionLogEntry> {
        self.read(|state| {
            state
                .consumption
                .iter()
                .filter(|entry| entry.client_id == client_id)
                .cloned()
                .collect()
        })
    }

    /// Every committed ticket, in creation order.
    #[must_use]
    pub fn tickets(&self) -> Vec<SupportTicket> {
        self.read(|state| state.tickets.clone())
    }

    /// Every committed application, in creation order.
    #[must_use]
    pub fn applications(&self) -> Vec<Application> {
        self.read(|state| state.applications.clone())
    }

    /// Committed messages of a ticket, in posting order.
    #[must_use]
    pub fn messages(&self, ticket_id: TicketId) -> Vec<Message> {
        self.read(|state| {
            state
                .messages
                .iter()
                .filter(|message| message.ticket_id == ticket_id)
                .cloned()
                .collect()
        })
    }

    /// Make every ledger append fail with a database error.
    pub fn fail_consumption_appends(&self, fail: bool) {
        self.faults
            .fail_consumption_appends
            .store(fail, Ordering::SeqCst);
    }

    /// Make every commit fail with a database error.
    pub fn fail_commits(&self, fail: bool) {
        self.faults.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Make `ping` (and only `ping`) fail, as an unreachable database would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl PortalStore for InMemoryPortalStore {
    fn begin(&self) -> StoreFuture<'_, Box<dyn PortalTransaction>> {
        Box::pin(async move {
            let guard = Arc::clone(&self.writer).lock_owned().await;
            let working = self.read(PortalState::clone);
            Ok(Box::new(InMemoryTransaction {
                _guard: guard,
                working,
                committed: Arc::clone(&self.committed),
                faults: Arc::clone(&self.faults),
            }) as Box<dyn PortalTransaction>)
        })
    }

    fn find_client(&self, id: ClientId) -> StoreFuture<'_, Option<Client>> {
        let client = self.client(id);
        Box::pin(async move { Ok(client) })
    }

    fn find_ticket(&self, id: TicketId) -> StoreFuture<'_, Option<SupportTicket>> {
        let ticket = self.read(|state| state.tickets.iter().find(|t| t.id == id).cloned());
        Box::pin(async move { Ok(ticket) })
    }

    fn list_tickets(&self, query: TicketQuery) -> StoreFuture<'_, Vec<SupportTicket>> {
        let mut tickets: Vec<SupportTicket> = self.read(|state| {
            state
                .tickets
                .iter()
                .filter(|ticket| query.matches(ticket, state.assignees(ticket.client_id)))
                .cloned()
                .collect()
        });
        tickets.sort_by(|a, b| b.last_update.cmp(&a.last_update));
        Box::pin(async move { Ok(tickets) })
    }

    fn list_messages(&self, ticket_id: TicketId) -> StoreFuture<'_, Vec<Message>> {
        let mut messages = self.messages(ticket_id);
        messages.sort_by_key(|message| message.timestamp);
        Box::pin(async move { Ok(messages) })
    }

    fn list_consumption(&self, client_id: ClientId) -> StoreFuture<'_, Vec<ConsumptionLogEntry>> {
        let mut entries = self.consumption(client_id);
        entries.sort_by_key(|entry| entry.date);
        Box::pin(async move { Ok(entries) })
    }

    fn find_offering(&self, id: OfferingId) -> StoreFuture<'_, Option<Offering>> {
        let offering = self.read(|state| state.offerings.get(&id).cloned());
        Box::pin(async move { Ok(offering) })
    }

    fn list_applications(&self, query: ApplicationQuery) -> StoreFuture<'_, Vec<Application>> {
        let mut applications: Vec<Application> = self.read(|state| {
            state
                .applications
                .iter()
                .filter(|app| query.matches(app, state.assignees(app.client_id)))
                .cloned()
                .collect()
        });
        applications.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
        Box::pin(async move { Ok(applications) })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        let result = Faults::check(&self.faults.unavailable, "ping");
        Box::pin(async move { result })
    }
}

struct InMemoryTransaction {
    _guard: OwnedMutexGuard<()>,
    working: PortalState,
    committed: Arc<RwLock<PortalState>>,
    faults: Arc<Faults>,
}

impl InMemoryTransaction {
    fn ticket_mut(&mut self, id: TicketId) -> Option<&mut SupportTicket> {
        self.working.tickets.iter_mut().find(|ticket| ticket.id == id)
    }
}

impl PortalTransaction for InMemoryTransaction {
    fn debit_balance(&mut self, client_id: ClientId, amount: u32) -> StoreFuture<'_, DebitOutcome> {
        let outcome = match self.working.clients.get_mut(&client_id) {
            None => DebitOutcome::UnknownClient,
            Some(client) if client.remaining_tickets < amount => DebitOutcome::Insufficient {
                remaining: client.remaining_tickets,
            },
            Some(client) => {
                client.remaining_tickets -= amount;
                DebitOutcome::Debited {
                    remaining: client.remaining_tickets,
                }
            }
        };
        Box::pin(async move { Ok(outcome) })
    }

    fn append_consumption(&mut self, entry: ConsumptionLogEntry) -> StoreFuture<'_, ()> {
        let result = Faults::check(&self.faults.fail_consumption_appends, "consumption append")
            .and_then(|()| {
                let duplicate = self.working.consumption.iter().any(|existing| {
                    existing.client_id == entry.client_id
                        && existing.entry_type == entry.entry_type
                        && existing.related_id == entry.related_id
                });
                if duplicate {
                    return Err(StoreError::UniqueViolation(format!(
                        "consumption entry for {} already recorded",
                        entry.related_id
                    )));
                }
                self.working.consumption.push(entry);
                Ok(())
            });
        Box::pin(async move { result })
    }

    fn next_ticket_sequence(&mut self) -> StoreFuture<'_, u64> {
        self.working.ticket_sequence += 1;
        let next = self.working.ticket_sequence;
        Box::pin(async move { Ok(next) })
    }

    fn insert_ticket(&mut self, ticket: SupportTicket) -> StoreFuture<'_, ()> {
        self.working.tickets.push(ticket);
        Box::pin(async move { Ok(()) })
    }

    fn lock_ticket(&mut self, id: TicketId) -> StoreFuture<'_, Option<SupportTicket>> {
        let ticket = self.ticket_mut(id).map(|ticket| ticket.clone());
        Box::pin(async move { Ok(ticket) })
    }

    fn update_ticket(&mut self, ticket: SupportTicket) -> StoreFuture<'_, ()> {
        let result = match self.ticket_mut(ticket.id) {
            Some(stored) => {
                stored.status = ticket.status;
                stored.assignee_id = ticket.assignee_id;
                stored.last_update = ticket.last_update;
                Ok(())
            }
            None => Err(StoreError::Database(format!("ticket {} does not exist", ticket.id))),
        };
        Box::pin(async move { result })
    }

    fn insert_message(&mut self, message: Message) -> StoreFuture<'_, ()> {
        self.working.messages.push(message);
        Box::pin(async move { Ok(()) })
    }

    fn mark_messages_read(&mut self, ticket_id: TicketId, user_id: UserId) -> StoreFuture<'_, u64> {
        let marked = self
            .working
            .messages
            .iter_mut()
            .filter(|message| message.ticket_id == ticket_id)
            .map(|message| message.read_by.insert(user_id))
            .filter(|inserted| *inserted)
            .count();
        let marked = u64::try_from(marked).unwrap_or(u64::MAX);
        Box::pin(async move { Ok(marked) })
    }

    fn lock_offering(&mut self, id: OfferingId) -> StoreFuture<'_, Option<Offering>> {
        let offering = self.working.offerings.get(&id).cloned();
        Box::pin(async move { Ok(offering) })
    }

    fn count_applications(&mut self, offering_id: OfferingId) -> StoreFuture<'_, u32> {
        let count = self
            .working
            .applications
            .iter()
            .filter(|app| app.offering_id == offering_id)
            .count();
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        Box::pin(async move { Ok(count) })
    }

    fn application_exists(
        &mut self,
        offering_id: OfferingId,
        client_id: ClientId,
    ) -> StoreFuture<'_, bool> {
        let exists = self
            .working
            .applications
            .iter()
            .any(|app| app.offering_id == offering_id && app.client_id == client_id);
        Box::pin(async move { Ok(exists) })
    }

    fn insert_application(&mut self, application: Application) -> StoreFuture<'_, ()> {
        let duplicate = self.working.applications.iter().any(|app| {
            app.offering_id == application.offering_id && app.client_id == application.client_id
        });
        let result = if duplicate {
            Err(StoreError::UniqueViolation(format!(
                "client {} already applied to {}",
                application.client_id, application.offering_id
            )))
        } else {
            self.working.applications.push(application);
            Ok(())
        };
        Box::pin(async move { result })
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            Faults::check(&self.faults.fail_commits, "commit")?;
            let Self {
                _guard,
                working,
                committed,
                ..
            } = *self;
            *committed.write().unwrap_or_else(PoisonError::into_inner) = working;
            Ok(())
        })
    }
}

/// Actor resolver backed by a fixed token table.
#[derive(Clone, Debug, Default)]
pub struct StaticActorResolver {
    tokens: HashMap<String, Actor>,
}

impl StaticActorResolver {
    /// Create a resolver that knows no token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` for `actor`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, actor: Actor) -> Self {
        self.tokens.insert(token.into(), actor);
        self
    }
}

impl ActorResolver for StaticActorResolver {
    fn resolve<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<Actor>> {
        Box::pin(async move { Ok(self.tokens.get(token).cloned()) })
    }
}
