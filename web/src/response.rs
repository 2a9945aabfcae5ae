//! Success envelope shared by every endpoint.

use serde::Serialize;

/// `{ "success": true, "data": ..., "message": ... }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Always `true`; failures are rendered by [`crate::AppError`].
    pub success: bool,
    /// Payload
    pub data: T,
    /// Optional human-readable note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Wrap `data` without a message.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    /// Wrap `data` with a message.
    #[must_use]
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }
}
