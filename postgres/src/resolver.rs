//! Bearer-token lookup against the `api_tokens` table.
//!
//! Tokens are issued by the external auth service and stored as the hex
//! SHA-256 of the raw token; the raw value never reaches the database.

use crate::store::db_error;
use chrono::{DateTime, Utc};
use client_portal_core::actor::{Actor, ActorResolver};
use client_portal_core::error::StoreError;
use client_portal_core::store::StoreFuture;
use client_portal_core::types::{ClientId, Role, StaffId, UnknownVariant, UserId};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

/// Hex SHA-256 of a raw bearer token.
#[must_use]
pub fn token_digest(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Resolves actors from hashed bearer tokens.
#[derive(Clone, Debug)]
pub struct PostgresActorResolver {
    pool: PgPool,
}

impl PostgresActorResolver {
    /// Create a resolver over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a token for `actor`, as the auth service does on issuance.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UniqueViolation`] if the token is already
    /// registered, [`StoreError::Database`] for other failures.
    pub async fn register(
        &self,
        token: &str,
        actor: &Actor,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO api_tokens (token_sha256, user_id, role, client_id, staff_id, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(token_digest(token))
        .bind(actor.id.as_uuid())
        .bind(actor.role.as_str())
        .bind(actor.client_id.map(|id| *id.as_uuid()))
        .bind(actor.staff_id.map(|id| *id.as_uuid()))
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

impl ActorResolver for PostgresActorResolver {
    fn resolve<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<Actor>> {
        Box::pin(async move {
            let row: Option<(Uuid, String, Option<Uuid>, Option<Uuid>)> = sqlx::query_as(
                r"
                SELECT user_id, role, client_id, staff_id
                FROM api_tokens
                WHERE token_sha256 = $1
                  AND (expires_at IS NULL OR expires_at > now())
                ",
            )
            .bind(token_digest(token))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

            let Some((user_id, role, client_id, staff_id)) = row else {
                return Ok(None);
            };
            let role: Role = role
                .parse()
                .map_err(|e: UnknownVariant| StoreError::Corrupt(e.to_string()))?;

            Ok(Some(Actor {
                id: UserId::from_uuid(user_id),
                role,
                client_id: client_id.map(ClientId::from_uuid),
                staff_id: staff_id.map(StaffId::from_uuid),
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_digest_is_lowercase_hex_sha256() {
        assert_eq!(
            token_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(token_digest("").len(), 64);
    }
}
