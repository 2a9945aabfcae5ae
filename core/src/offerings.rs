//! Seminar and event registration.
//!
//! Registration order inside one transaction:
//!
//! 1. lock the offering (missing or wrong kind → `NotFound`)
//! 2. offering must be open (`募集中`)
//! 3. capacity check
//! 4. duplicate check
//! 5. online offerings only: debit one ticket
//! 6. insert the application
//!
//! A full or duplicate registration never reaches the debit, so a refused
//! registration never costs a ticket.

use crate::access;
use crate::actor::Actor;
use crate::environment::Clock;
use crate::error::{PortalError, Result, StoreError};
use crate::ledger::{DebitRequest, EntitlementAccountant};
use crate::store::{ApplicationQuery, PortalStore};
use crate::types::{
    Application, ApplicationId, ClientId, ConsumptionLogEntry, Offering, OfferingId, OfferingKind,
    OfferingStatus,
};
use std::sync::Arc;
use tracing::{info, warn};

const MAX_NOTES_CHARS: usize = 2_000;

/// A registration submitted by a client-side user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationRequest {
    /// Seminar or event to register for
    pub offering_id: OfferingId,
    /// Attendee name
    pub user_name: String,
    /// Attendee e-mail
    pub user_email: String,
    /// Free-form notes
    pub notes: String,
}

impl ApplicationRequest {
    fn validate(&self) -> Result<()> {
        if self.user_name.trim().is_empty() {
            return Err(PortalError::validation("userName must not be empty"));
        }
        if !self.user_email.contains('@') {
            return Err(PortalError::validation("userEmail must be an e-mail address"));
        }
        if self.notes.chars().count() > MAX_NOTES_CHARS {
            return Err(PortalError::validation(format!(
                "notes must be at most {MAX_NOTES_CHARS} characters"
            )));
        }
        Ok(())
    }
}

/// Outcome of a successful registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationReceipt {
    /// The stored application
    pub application: Application,
    /// Ledger entry, when the offering is online
    pub consumed: Option<ConsumptionLogEntry>,
    /// Client balance after the registration
    pub remaining_tickets: Option<u32>,
}

/// Checks an offering against a pending registration.
///
/// Runs before any write. `taken` is the current number of applications and
/// `already_applied` whether this client holds one of them.
///
/// # Errors
///
/// - `NotFound` if the offering is of another kind
/// - `Validation` if the offering is not open
/// - `CapacityExceeded` if every seat is taken
/// - `DuplicateApplication` if the client already applied
pub fn check_eligibility(
    offering: &Offering,
    kind: OfferingKind,
    taken: u32,
    already_applied: bool,
    client_id: ClientId,
) -> Result<()> {
    if offering.kind != kind {
        return Err(PortalError::not_found(kind_label(kind), offering.id));
    }
    if offering.status != OfferingStatus::Open {
        return Err(PortalError::validation(
            "offering is not accepting applications",
        ));
    }
    if taken >= offering.capacity {
        return Err(PortalError::CapacityExceeded {
            offering_id: offering.id,
            capacity: offering.capacity,
        });
    }
    if already_applied {
        return Err(PortalError::DuplicateApplication {
            offering_id: offering.id,
            client_id,
        });
    }
    Ok(())
}

const fn kind_label(kind: OfferingKind) -> &'static str {
    match kind {
        OfferingKind::Seminar => "Seminar",
        OfferingKind::Event => "Event",
    }
}

/// Registers clients for seminars and events.
#[derive(Clone)]
pub struct OfferingRegistrar {
    store: Arc<dyn PortalStore>,
    accountant: EntitlementAccountant,
    clock: Arc<dyn Clock>,
}

impl OfferingRegistrar {
    /// Create a registrar over `store`.
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

    /// Load an offering of the given kind.
    ///
    /// # Errors
    ///
    /// - `NotFound` if it does not exist or is of another kind
    /// - `Storage` if the store fails
    pub async fn find(&self, kind: OfferingKind, id: OfferingId) -> Result<Offering> {
        self.store
            .find_offering(id)
            .await?
            .filter(|offering| offering.kind == kind)
            .ok_or_else(|| PortalError::not_found(kind_label(kind), id))
    }

    /// Register the actor's client for a seminar or event.
    ///
    /// Online offerings cost one ticket; in-person offerings are free and
    /// succeed even at a zero balance.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the actor is a client-side user bound to a client
    /// - `Validation` for bad input or an offering that is not open
    /// - `NotFound` if the offering does not exist or is of another kind
    /// - `CapacityExceeded` if every seat is taken
    /// - `DuplicateApplication` if the client already applied
    /// - `InsufficientBalance` for an online offering and an empty balance
    /// - `Storage` if the store fails
    pub async fn apply(
        &self,
        actor: &Actor,
        kind: OfferingKind,
        request: ApplicationRequest,
    ) -> Result<ApplicationReceipt> {
        let client_id = access::consuming_client(actor)
            .ok_or_else(|| PortalError::forbidden("Only client users can register"))?;
        request.validate()?;

        let mut tx = self.store.begin().await?;

        let offering = tx
            .lock_offering(request.offering_id)
            .await?
            .ok_or_else(|| PortalError::not_found(kind_label(kind), request.offering_id))?;
        let taken = tx.count_applications(offering.id).await?;
        let already_applied = tx.application_exists(offering.id, client_id).await?;

        if let Err(refusal) = check_eligibility(&offering, kind, taken, already_applied, client_id) {
            warn!(
                offering_id = %offering.id,
                client_id = %client_id,
                kind = %kind,
                reason = %refusal,
                "Registration refused"
            );
            metrics::counter!(
                "portal_applications_total",
                "kind" => kind.as_str(),
                "outcome" => "refused"
            )
            .increment(1);
            return Err(refusal);
        }

        let debit = if offering.location.is_online() {
            Some(
                self.accountant
                    .debit_in(
                        tx.as_mut(),
                        DebitRequest::single(
                            client_id,
                            kind.consumption_type(),
                            offering.title.clone(),
                            offering.id.to_string(),
                        ),
                    )
                    .await?,
            )
        } else {
            None
        };

        let application = Application {
            id: ApplicationId::new(),
            offering_id: offering.id,
            client_id,
            user_id: actor.id,
            user_name: request.user_name,
            user_email: request.user_email,
            notes: request.notes,
            applied_at: self.clock.now(),
        };
        tx.insert_application(application.clone())
            .await
            .map_err(|err| match err {
                StoreError::UniqueViolation(_) => PortalError::DuplicateApplication {
                    offering_id: offering.id,
                    client_id,
                },
                other => PortalError::Storage(other),
            })?;
        tx.commit().await?;

        info!(
            application_id = %application.id,
            offering_id = %offering.id,
            client_id = %client_id,
            kind = %kind,
            online = offering.location.is_online(),
            "Registration accepted"
        );
        metrics::counter!(
            "portal_applications_total",
            "kind" => kind.as_str(),
            "outcome" => "accepted"
        )
        .increment(1);

        let (consumed, remaining_tickets) = match debit {
            Some(debit) => (Some(debit.entry), Some(debit.remaining)),
            None => (None, None),
        };
        Ok(ApplicationReceipt {
            application,
            consumed,
            remaining_tickets,
        })
    }

    /// Applications the actor may see, newest first.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if the actor's scope is empty
    /// - `Storage` if the store fails
    pub async fn list(
        &self,
        actor: &Actor,
        offering_id: Option<OfferingId>,
    ) -> Result<Vec<Application>> {
        let scope = access::scope(actor);
        if scope == access::Scope::Nothing {
            return Err(PortalError::forbidden("No access to applications"));
        }
        Ok(self
            .store
            .list_applications(ApplicationQuery { scope, offering_id })
            .await?)
    }
}
