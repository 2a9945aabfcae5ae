//! The authenticated identity every engine operation runs on behalf of.
//!
//! Token issuance and verification live outside the engine. The HTTP layer
//! hands the bearer token to an [`ActorResolver`] and passes the resulting
//! [`Actor`] into the services.

use crate::store::StoreFuture;
use crate::types::{ClientId, Role, SenderType, StaffId, UserId};
use serde::{Deserialize, Serialize};

/// An authenticated user acting on the portal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// User account id
    pub id: UserId,
    /// Role granted to the account
    pub role: Role,
    /// Client the account belongs to (client-side roles)
    pub client_id: Option<ClientId>,
    /// Staff record of the account (staff role)
    pub staff_id: Option<StaffId>,
}

impl Actor {
    /// A CLIENT or CLIENTADMIN user of `client_id`.
    #[must_use]
    pub const fn client_user(id: UserId, role: Role, client_id: ClientId) -> Self {
        Self {
            id,
            role,
            client_id: Some(client_id),
            staff_id: None,
        }
    }

    /// A STAFF user.
    #[must_use]
    pub const fn staff(id: UserId, staff_id: StaffId) -> Self {
        Self {
            id,
            role: Role::Staff,
            client_id: None,
            staff_id: Some(staff_id),
        }
    }

    /// An actor with no client or staff binding (ADMIN, SUPERADMIN, AFFILIATE).
    #[must_use]
    pub const fn unbound(id: UserId, role: Role) -> Self {
        Self {
            id,
            role,
            client_id: None,
            staff_id: None,
        }
    }

    /// The client this actor acts for, when it is a client-side actor.
    #[must_use]
    pub fn acting_client(&self) -> Option<ClientId> {
        if self.role.is_client_side() {
            self.client_id
        } else {
            None
        }
    }

    /// Category recorded on messages this actor posts.
    #[must_use]
    pub const fn sender_type(&self) -> SenderType {
        match self.role {
            Role::Staff => SenderType::Support,
            Role::Admin | Role::SuperAdmin => SenderType::Admin,
            Role::Client | Role::ClientAdmin | Role::Affiliate => SenderType::User,
        }
    }
}

/// Resolves a bearer token issued by the external auth service.
///
/// Returns `Ok(None)` for unknown or expired tokens.
pub trait ActorResolver: Send + Sync {
    /// Look up the actor bound to `token`.
    ///
    /// # Errors
    ///
    /// Returns a store error if the lookup itself fails.
    fn resolve<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<Actor>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_type_follows_role() {
        let client = Actor::client_user(UserId::new(), Role::ClientAdmin, ClientId::new());
        assert_eq!(client.sender_type(), SenderType::User);

        let staff = Actor::staff(UserId::new(), StaffId::new());
        assert_eq!(staff.sender_type(), SenderType::Support);

        let admin = Actor::unbound(UserId::new(), Role::SuperAdmin);
        assert_eq!(admin.sender_type(), SenderType::Admin);
    }

    #[test]
    fn test_acting_client_only_for_client_roles() {
        let client_id = ClientId::new();
        let mut actor = Actor::client_user(UserId::new(), Role::Client, client_id);
        assert_eq!(actor.acting_client(), Some(client_id));

        actor.role = Role::Staff;
        assert_eq!(actor.acting_client(), None);
    }
}
