//! Error taxonomy of the engine.
//!
//! Domain errors are final answers for the caller and are never retried.
//! Only [`StoreError::Database`] (connection-level trouble) is transient.

use crate::types::{ClientId, OfferingId};
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, PortalError>;

/// Errors raised by the storage layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connection, query or transaction failure.
    #[error("Database error: {0}")]
    Database(String),

    /// A unique constraint rejected the write.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A stored value could not be mapped back into a domain type.
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Whether the caller may retry the whole operation.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Errors returned by engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortalError {
    /// The client does not hold enough tickets for the debit.
    #[error("Insufficient ticket balance for client {client_id}: requested {requested}, remaining {remaining}")]
    InsufficientBalance {
        /// Client whose balance was checked
        client_id: ClientId,
        /// Tickets the operation needed
        requested: u32,
        /// Tickets the client holds
        remaining: u32,
    },

    /// The client already applied to this offering.
    #[error("Client {client_id} has already applied to offering {offering_id}")]
    DuplicateApplication {
        /// Target offering
        offering_id: OfferingId,
        /// Applying client
        client_id: ClientId,
    },

    /// The offering has no seats left.
    #[error("Offering {offering_id} is full (capacity {capacity})")]
    CapacityExceeded {
        /// Target offering
        offering_id: OfferingId,
        /// Its capacity
        capacity: u32,
    },

    /// The referenced resource does not exist.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Kind of resource
        resource: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The actor is not allowed to perform the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Malformed input, detected before any side effect.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The storage layer failed.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl PortalError {
    /// Shorthand for [`PortalError::NotFound`].
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`PortalError::Forbidden`].
    #[must_use]
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    /// Shorthand for [`PortalError::Validation`].
    #[must_use]
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}
