//! Store traits consumed by the authentication services

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::RefreshTokenRecord;
use crate::error::Result;
use crate::principal::{NewPrincipal, Principal, Provider};

/// Principal persistence, keyed by id, normalized email, or provider pair
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Create a principal, assigning id and timestamps
    ///
    /// Email uniqueness is enforced here; a taken email fails with
    /// `DuplicateEmail`.
    async fn create(&self, new: NewPrincipal) -> Result<Principal>;

    /// Persist changed fields of an existing principal and return the
    /// stored row with a refreshed `updated_at`
    async fn update(&self, principal: &Principal) -> Result<Principal>;

    /// Look up by internal id
    async fn find_by_id(&self, id: i64) -> Result<Option<Principal>>;

    /// Look up by normalized email
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>>;

    /// Look up an external identity by its provider pair
    async fn find_by_provider(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Option<Principal>>;

    /// Whether a normalized email is already registered
    async fn exists_by_email(&self, email: &str) -> Result<bool>;
}

/// Refresh-token persistence, keyed by exact token value
///
/// Implementations must make each mutation atomic per record;
/// read-committed-or-stronger row semantics are assumed by the refresh flow.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Persist a newly issued refresh token
    async fn save(&self, record: RefreshTokenRecord) -> Result<()>;

    /// Look up the record for an exact token value
    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>>;

    /// Stamp `last_used_at` on a record
    async fn mark_used(&self, token: &str, at: DateTime<Utc>) -> Result<()>;

    /// Revoke every currently valid token owned by the email; returns the
    /// number revoked (zero is not an error)
    async fn revoke_by_owner_email(&self, email: &str) -> Result<usize>;
}
