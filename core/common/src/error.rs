//! Common error types for docsgate.

use thiserror::Error;

/// Top-level error type for docsgate operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The account has no usable credential; the user must visit `auth_url`.
    #[error("Authorization required for {account}: visit {auth_url}")]
    NotAuthorized { account: String, auth_url: String },

    /// Authorization-code exchange was rejected or could not complete.
    #[error("Authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    /// Credential store could not be read or written.
    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    /// Network or remote API failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Remote API rejected the bearer token.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Remote API denied access to the resource.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing or inconsistent configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
