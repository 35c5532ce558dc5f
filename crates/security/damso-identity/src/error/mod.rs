//! Error types for damso-identity

use thiserror::Error;

/// Result type alias for damso-identity operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for damso-identity
#[derive(Error, Debug)]
pub enum Error {
    /// Typed authentication failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Cryptographic error
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error while talking to the provider
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned a non-success response
    #[error("Provider {operation} failed with status {status}: {detail}")]
    Provider {
        /// Which provider call failed
        operation: &'static str,
        /// HTTP status returned by the provider
        status: u16,
        /// Response body snippet for diagnostics
        detail: String,
    },
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Http(_))
    }

    /// Check if this error is a client error (4xx-like)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::Validation(_))
    }

    /// Check if this error is a server error (5xx-like)
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Error::Storage(_)
                | Error::NotFound(_)
                | Error::Configuration(_)
                | Error::Crypto(_)
                | Error::Json(_)
                | Error::Http(_)
                | Error::Provider { .. }
        )
    }
}

/// Authentication failure taxonomy
///
/// Every variant maps to a deliberate decision a caller can act on.
/// `TokenExpired` is kept apart from `TokenInvalid` so a client knows
/// whether a refresh attempt is worthwhile or a re-login is required.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown email or wrong password
    #[error("invalid email or password")]
    InvalidCredential,

    /// Account exists but is deactivated
    #[error("account is disabled")]
    AccountDisabled,

    /// Email already registered
    #[error("email is already registered")]
    DuplicateEmail,

    /// Malformed structure, bad signature, wrong type, or unknown token
    #[error("invalid token: {0}")]
    TokenInvalid(String),

    /// Signature was valid but the token or its stored record has expired
    #[error("token expired")]
    TokenExpired,

    /// Token subject does not match the owning account
    #[error("token subject does not match the owning account")]
    AccountMismatch,

    /// Provider profile carried no email address
    #[error("provider did not supply an email")]
    MissingProviderEmail,

    /// Request carried no readable login session
    #[error("no login session")]
    NoSession,

    /// Session exists but holds no staged login
    #[error("no pending login for this session")]
    NoPendingLogin,
}
