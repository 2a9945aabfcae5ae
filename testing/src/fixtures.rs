//! Ready-made records for tests.

use client_portal_core::actor::Actor;
use client_portal_core::types::{
    Client, ClientId, ClientStatus, Location, Offering, OfferingId, OfferingKind, OfferingStatus,
    Role, StaffId, UserId,
};

/// An active client on the standard plan holding `tickets` tickets.
#[must_use]
pub fn client_with_balance(tickets: u32) -> Client {
    Client {
        id: ClientId::new(),
        plan_id: "standard".to_string(),
        remaining_tickets: tickets,
        status: ClientStatus::Active,
        main_assignee_id: None,
        sub_assignee_id: None,
    }
}

/// A client whose main assignee is `main`.
#[must_use]
pub fn client_assigned_to(tickets: u32, main: StaffId) -> Client {
    Client {
        main_assignee_id: Some(main),
        ..client_with_balance(tickets)
    }
}

/// An open offering.
#[must_use]
pub fn offering(kind: OfferingKind, capacity: u32, location: Location) -> Offering {
    Offering {
        id: OfferingId::new(),
        kind,
        title: match kind {
            OfferingKind::Seminar => "Year-end tax seminar".to_string(),
            OfferingKind::Event => "Online networking night".to_string(),
        },
        status: OfferingStatus::Open,
        capacity,
        location,
        starts_at: None,
    }
}

/// An open online seminar.
#[must_use]
pub fn online_seminar(capacity: u32) -> Offering {
    offering(OfferingKind::Seminar, capacity, Location::Online)
}

/// An open in-person seminar.
#[must_use]
pub fn venue_seminar(capacity: u32) -> Offering {
    offering(OfferingKind::Seminar, capacity, Location::Venue("対面".to_string()))
}

/// An open online event.
#[must_use]
pub fn online_event(capacity: u32) -> Offering {
    offering(OfferingKind::Event, capacity, Location::Online)
}

/// A CLIENT user of `client_id`.
#[must_use]
pub fn client_user(client_id: ClientId) -> Actor {
    Actor::client_user(UserId::new(), Role::Client, client_id)
}

/// A STAFF user.
#[must_use]
pub fn staff(staff_id: StaffId) -> Actor {
    Actor::staff(UserId::new(), staff_id)
}

/// An ADMIN user.
#[must_use]
pub fn admin() -> Actor {
    Actor::unbound(UserId::new(), Role::Admin)
}

/// An AFFILIATE user.
#[must_use]
pub fn affiliate() -> Actor {
    Actor::unbound(UserId::new(), Role::Affiliate)
}
