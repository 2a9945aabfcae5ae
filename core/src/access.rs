//! Access scoping: one predicate per operation.
//!
//! | Role                 | view / reply            | change status     | assign |
//! |----------------------|-------------------------|-------------------|--------|
//! | CLIENT, CLIENTADMIN  | own client's tickets    | no                | no     |
//! | STAFF                | clients they main/sub   | tickets they view | no     |
//! | ADMIN, SUPERADMIN    | everything              | everything        | yes    |
//! | AFFILIATE            | nothing                 | no                | no     |
//!
//! List operations translate the actor into a [`Scope`] and filter with it;
//! records outside the scope are left out, never redacted.

use crate::actor::Actor;
use crate::types::{Application, Client, ClientAssignees, ClientId, Role, StaffId, SupportTicket};

/// The set of clients whose records an actor may see.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Every client
    Everything,
    /// A single client
    Client(ClientId),
    /// Clients whose main or sub assignee is this staff member
    AssignedStaff(StaffId),
    /// No client at all
    Nothing,
}

impl Scope {
    /// Whether a record owned by `client_id` falls inside the scope.
    #[must_use]
    pub fn admits(&self, client_id: ClientId, assignees: ClientAssignees) -> bool {
        match self {
            Self::Everything => true,
            Self::Client(own) => *own == client_id,
            Self::AssignedStaff(staff) => assignees.includes(*staff),
            Self::Nothing => false,
        }
    }
}

/// Visibility scope of an actor.
///
/// A client-side actor without a client binding, or a staff actor without
/// a staff binding, sees nothing.
#[must_use]
pub fn scope(actor: &Actor) -> Scope {
    match actor.role {
        Role::Client | Role::ClientAdmin => actor.client_id.map_or(Scope::Nothing, Scope::Client),
        Role::Staff => actor.staff_id.map_or(Scope::Nothing, Scope::AssignedStaff),
        Role::Admin | Role::SuperAdmin => Scope::Everything,
        Role::Affiliate => Scope::Nothing,
    }
}

/// May the actor read the ticket and its thread?
#[must_use]
pub fn can_view(actor: &Actor, ticket: &SupportTicket, assignees: ClientAssignees) -> bool {
    scope(actor).admits(ticket.client_id, assignees)
}

/// May the actor post to the ticket's thread? Same rule as viewing.
#[must_use]
pub fn can_reply(actor: &Actor, ticket: &SupportTicket, assignees: ClientAssignees) -> bool {
    can_view(actor, ticket, assignees)
}

/// May the actor change the ticket's status?
#[must_use]
pub fn can_mutate_status(actor: &Actor, ticket: &SupportTicket, assignees: ClientAssignees) -> bool {
    match actor.role {
        Role::Admin | Role::SuperAdmin => true,
        Role::Staff => can_view(actor, ticket, assignees),
        Role::Client | Role::ClientAdmin | Role::Affiliate => false,
    }
}

/// May the actor change the ticket's assignee?
#[must_use]
pub fn can_assign(actor: &Actor, _ticket: &SupportTicket) -> bool {
    actor.role.is_admin()
}

/// Client on whose behalf the actor may open tickets and register for
/// offerings; `None` when the actor is not a bound client-side user.
#[must_use]
pub fn consuming_client(actor: &Actor) -> Option<ClientId> {
    actor.acting_client()
}

/// May the actor read a client's consumption ledger?
#[must_use]
pub fn can_view_consumption(actor: &Actor, _client_id: ClientId) -> bool {
    actor.role.is_admin()
}

/// May the actor read a client's ticket balance?
#[must_use]
pub fn can_view_balance(actor: &Actor, client: &Client) -> bool {
    scope(actor).admits(client.id, client.assignees())
}

/// May the actor read an application?
#[must_use]
pub fn can_view_application(
    actor: &Actor,
    application: &Application,
    assignees: ClientAssignees,
) -> bool {
    scope(actor).admits(application.client_id, assignees)
}
