//! Storage traits and records for principals and refresh tokens
//!
//! Durable persistence is supplied by trait consumers; the in-memory
//! implementations here back tests and development setups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod memory;
pub mod traits;

pub use memory::{InMemoryPrincipalStore, InMemoryRefreshTokenStore};
pub use traits::{PrincipalStore, RefreshTokenStore};

/// Persisted state of an issued refresh token
///
/// The stored record, not the token's embedded expiry, is the source of
/// truth for refresh validity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Exact signed token value; the lookup key
    pub token: String,
    /// Owning principal id
    pub principal_id: i64,
    /// Owner email, denormalized for bulk revocation
    pub owner_email: String,
    /// Issuance timestamp
    pub created_at: DateTime<Utc>,
    /// Expiry timestamp
    pub expires_at: DateTime<Utc>,
    /// Revoked tokens stay on record; revocation is terminal
    pub revoked: bool,
    /// Last successful refresh using this token
    pub last_used_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    /// Whether the record's expiry has passed
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// A record is valid iff it is neither revoked nor expired
    pub fn is_valid(&self) -> bool {
        !self.revoked && !self.is_expired()
    }
}
