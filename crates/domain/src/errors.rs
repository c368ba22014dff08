//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Remote error text signalling that a subscription or event no longer exists.
pub const REMOTE_OBJECT_NOT_FOUND: &str = "object was not found";

/// Refresh failures that can never recover without the user reconnecting.
pub const REFRESH_TOKEN_NOT_SET: &str = "refresh token is not set";
pub const REFRESH_TOKEN_EXPIRED: &str = "refresh token has expired due to inactivity";

/// Main error type for Calsync
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CalsyncError {
    /// The user has no token or was marked inactive.
    #[error("User not connected: {0}")]
    NotConnected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote cannot provide an app-wide client; callers fan out per user.
    #[error("Superuser client is not supported")]
    SuperuserNotSupported,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication expired: {0}")]
    AuthExpired(String),

    #[error("Queue is full")]
    QueueFull,

    #[error("Validation error: {0}")]
    Validation(String),

    /// Error reported inside a remote API response body.
    #[error("Remote error {code}: {message}")]
    Remote { code: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CalsyncError {
    /// Convenience constructor for an embedded remote API error.
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote { code: code.into(), message: message.into() }
    }

    /// KV miss, remote 404, or any error reporting a missing object.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Remote { code, .. } if code == "ResourceNotFound" || code == "404" => true,
            _ => self.is_remote_object_not_found(),
        }
    }

    /// The recoverable "object was not found" sentinel returned on renewal.
    pub fn is_remote_object_not_found(&self) -> bool {
        self.to_string().contains(REMOTE_OBJECT_NOT_FOUND)
    }

    /// Refresh failures that require marking the user inactive.
    pub fn is_refresh_token_dead(&self) -> bool {
        let text = self.to_string();
        text.contains(REFRESH_TOKEN_NOT_SET) || text.contains(REFRESH_TOKEN_EXPIRED)
    }
}

/// Result type alias for Calsync operations
pub type Result<T> = std::result::Result<T, CalsyncError>;

impl From<serde_json::Error> for CalsyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization error: {err}"))
    }
}
