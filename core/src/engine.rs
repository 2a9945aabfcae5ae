//! The engine facade handed to the HTTP layer.

use crate::access::{self, Scope};
use crate::actor::Actor;
use crate::environment::Clock;
use crate::error::{PortalError, Result};
use crate::ledger::EntitlementAccountant;
use crate::offerings::OfferingRegistrar;
use crate::store::PortalStore;
use crate::tickets::TicketWorkflow;
use crate::types::{ClientId, ClientStatus, ConsumptionLogEntry};
use serde::Serialize;
use std::sync::Arc;

/// A client's current entitlement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    /// Client
    pub client_id: ClientId,
    /// Tickets left
    pub remaining_tickets: u32,
    /// Account status
    pub status: ClientStatus,
}

/// Every engine service wired over one store and one clock.
#[derive(Clone)]
pub struct PortalEngine {
    store: Arc<dyn PortalStore>,
    accountant: EntitlementAccountant,
    tickets: TicketWorkflow,
    offerings: OfferingRegistrar,
}

impl PortalEngine {
    /// Wire the services.
    #[must_use]
    pub fn new(store: Arc<dyn PortalStore>, clock: Arc<dyn Clock>) -> Self {
        let accountant = EntitlementAccountant::new(Arc::clone(&clock));
        let tickets = TicketWorkflow::new(Arc::clone(&store), accountant.clone(), Arc::clone(&clock));
        let offerings = OfferingRegistrar::new(Arc::clone(&store), accountant.clone(), clock);
        Self {
            store,
            accountant,
            tickets,
            offerings,
        }
    }

    /// Support ticket workflow.
    #[must_use]
    pub const fn tickets(&self) -> &TicketWorkflow {
        &self.tickets
    }

    /// Seminar and event registration.
    #[must_use]
    pub const fn offerings(&self) -> &OfferingRegistrar {
        &self.offerings
    }

    /// The debit primitive, for call sites beyond the built-in ones.
    #[must_use]
    pub const fn accountant(&self) -> &EntitlementAccountant {
        &self.accountant
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &dyn PortalStore {
        self.store.as_ref()
    }

    /// A client's ticket balance.
    ///
    /// Only administrators learn whether an unknown client id exists; every
    /// other actor gets `Forbidden` for clients outside their scope.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if the client is outside the actor's scope
    /// - `NotFound` if the client does not exist (administrators only)
    /// - `Storage` if the store fails
    pub async fn balance(&self, actor: &Actor, client_id: ClientId) -> Result<Balance> {
        const FORBIDDEN: &str = "Not allowed to view this client's balance";

        let scope = access::scope(actor);
        let reachable = match scope {
            Scope::Nothing => false,
            Scope::Client(own) => own == client_id,
            Scope::AssignedStaff(_) | Scope::Everything => true,
        };
        if !reachable {
            return Err(PortalError::forbidden(FORBIDDEN));
        }

        let client = match self.store.find_client(client_id).await? {
            Some(client) => client,
            None if scope == Scope::Everything => {
                return Err(PortalError::not_found("Client", client_id));
            }
            None => return Err(PortalError::forbidden(FORBIDDEN)),
        };

        if !access::can_view_balance(actor, &client) {
            return Err(PortalError::forbidden(FORBIDDEN));
        }

        Ok(Balance {
            client_id: client.id,
            remaining_tickets: client.remaining_tickets,
            status: client.status,
        })
    }

    /// A client's consumption ledger, oldest entry first.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the actor is ADMIN or SUPERADMIN
    /// - `NotFound` if the client does not exist
    /// - `Storage` if the store fails
    pub async fn consumption(
        &self,
        actor: &Actor,
        client_id: ClientId,
    ) -> Result<Vec<ConsumptionLogEntry>> {
        if !access::can_view_consumption(actor, client_id) {
            return Err(PortalError::forbidden("Consumption history is restricted to administrators"));
        }
        if self.store.find_client(client_id).await?.is_none() {
            return Err(PortalError::not_found("Client", client_id));
        }
        Ok(self.store.list_consumption(client_id).await?)
    }

    /// Whether the store answers.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the round trip fails.
    pub async fn ready(&self) -> Result<()> {
        Ok(self.store.ping().await?)
    }
}
