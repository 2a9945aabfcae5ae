//! Entitlement Accountant: the only code path that lowers a client's ticket
//! balance.
//!
//! A debit is one atomic conditional update of the balance followed by one
//! ledger append, both inside the caller's transaction:
//!
//! ```text
//! debit_balance(client, amount)      -- check and decrement in one step
//!   ├─ Insufficient → InsufficientBalance, nothing written
//!   └─ Debited      → append ConsumptionLogEntry(type, description, related_id)
//! ```
//!
//! The accountant knows nothing about seminars, events or support cases;
//! callers describe the debit through [`DebitRequest`].

use crate::environment::Clock;
use crate::error::{PortalError, Result};
use crate::store::{DebitOutcome, PortalStore, PortalTransaction};
use crate::types::{ClientId, ConsumptionEntryId, ConsumptionLogEntry};
use std::sync::Arc;
use tracing::{info, warn};

/// What to debit, and how the ledger should describe it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebitRequest {
    /// Client to debit
    pub client_id: ClientId,
    /// Tickets to debit (at least one)
    pub amount: u32,
    /// Ledger category, e.g. `新規相談`
    pub entry_type: String,
    /// Human-readable description
    pub description: String,
    /// Identifier of the ticket/seminar/event causing the debit
    pub related_id: String,
}

impl DebitRequest {
    /// A one-ticket debit, the amount every built-in call site uses.
    #[must_use]
    pub fn single(
        client_id: ClientId,
        entry_type: impl Into<String>,
        description: impl Into<String>,
        related_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id,
            amount: 1,
            entry_type: entry_type.into(),
            description: description.into(),
            related_id: related_id.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.amount == 0 {
            return Err(PortalError::validation("Debit amount must be at least 1"));
        }
        if self.entry_type.trim().is_empty() {
            return Err(PortalError::validation("Debit type must not be empty"));
        }
        if self.related_id.trim().is_empty() {
            return Err(PortalError::validation("Debit related id must not be empty"));
        }
        Ok(())
    }
}

/// A successful debit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Debit {
    /// The ledger entry written for it
    pub entry: ConsumptionLogEntry,
    /// Balance left after the debit
    pub remaining: u32,
}

/// Validates and performs ticket debits.
#[derive(Clone)]
pub struct EntitlementAccountant {
    clock: Arc<dyn Clock>,
}

impl EntitlementAccountant {
    /// Create an accountant stamping ledger entries with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Debit within an open transaction.
    ///
    /// The caller commits (or drops) `tx`; on error nothing this method did
    /// may be committed.
    ///
    /// # Errors
    ///
    /// - `Validation` for a zero amount or empty type/related id
    /// - `NotFound` if the client does not exist
    /// - `InsufficientBalance` if the balance is below `amount`
    /// - `Storage` if the store fails
    pub async fn debit_in(
        &self,
        tx: &mut dyn PortalTransaction,
        request: DebitRequest,
    ) -> Result<Debit> {
        request.validate()?;

        let remaining = match tx.debit_balance(request.client_id, request.amount).await? {
            DebitOutcome::Debited { remaining } => remaining,
            DebitOutcome::Insufficient { remaining } => {
                warn!(
                    client_id = %request.client_id,
                    requested = request.amount,
                    remaining,
                    entry_type = %request.entry_type,
                    "Ticket debit refused: insufficient balance"
                );
                metrics::counter!("portal_ticket_debits_refused_total").increment(1);
                return Err(PortalError::InsufficientBalance {
                    client_id: request.client_id,
                    requested: request.amount,
                    remaining,
                });
            }
            DebitOutcome::UnknownClient => {
                return Err(PortalError::not_found("Client", request.client_id));
            }
        };

        let entry = ConsumptionLogEntry {
            id: ConsumptionEntryId::new(),
            client_id: request.client_id,
            date: self.clock.now(),
            entry_type: request.entry_type,
            description: request.description,
            ticket_cost: request.amount,
            related_id: request.related_id,
        };
        tx.append_consumption(entry.clone()).await?;

        info!(
            client_id = %entry.client_id,
            amount = entry.ticket_cost,
            remaining,
            entry_type = %entry.entry_type,
            related_id = %entry.related_id,
            "Tickets debited"
        );
        metrics::counter!("portal_ticket_debits_total", "type" => entry.entry_type.clone())
            .increment(u64::from(entry.ticket_cost));

        Ok(Debit { entry, remaining })
    }

    /// Debit as a standalone unit of work.
    ///
    /// # Errors
    ///
    /// Same as [`Self::debit_in`], plus `Storage` if the commit fails.
    pub async fn debit(&self, store: &dyn PortalStore, request: DebitRequest) -> Result<Debit> {
        let mut tx = store.begin().await?;
        let debit = self.debit_in(tx.as_mut(), request).await?;
        tx.commit().await?;
        Ok(debit)
    }
}
