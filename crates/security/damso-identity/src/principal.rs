//! Principal records and the role/provider enumerations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role attached to a principal, used as its authority for downstream checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Administrative access
    Admin,
    /// Standard user access
    User,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl Role {
    /// Stable string form used in logs and API payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity source a principal was created from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Local email/password signup
    Local,
    /// Kakao OAuth
    Kakao,
}

impl Provider {
    /// Stable string form used in logs and API payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Kakao => "kakao",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local user record resolved from a credential check or a bearer token
///
/// Created on signup or first OAuth login, mutated on provider profile sync
/// and on login, never deleted by this subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Internal numeric id
    pub id: i64,
    /// Unique email, stored normalized (trimmed, lowercased)
    pub email: String,
    /// Password hash; `None` for OAuth-only principals
    pub password_hash: Option<String>,
    /// Display name
    pub nickname: String,
    /// Authority role
    pub role: Role,
    /// Disabled principals cannot authenticate
    pub active: bool,
    /// Identity source
    pub provider: Provider,
    /// Provider-side id, set only for external identities
    pub provider_id: Option<String>,
    /// Profile image URL synced from the provider
    pub profile_image: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
    /// Last successful login
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Data needed to create a principal; ids and timestamps are store-assigned
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    /// Normalized email
    pub email: String,
    /// Password hash; `None` for OAuth-only principals
    pub password_hash: Option<String>,
    /// Display name
    pub nickname: String,
    /// Authority role
    pub role: Role,
    /// Identity source
    pub provider: Provider,
    /// Provider-side id for external identities
    pub provider_id: Option<String>,
    /// Profile image URL from the provider
    pub profile_image: Option<String>,
}

impl NewPrincipal {
    /// New local principal from an email/password signup
    pub fn local(email: impl Into<String>, password_hash: String, nickname: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password_hash: Some(password_hash),
            nickname: nickname.into(),
            role: Role::User,
            provider: Provider::Local,
            provider_id: None,
            profile_image: None,
        }
    }

    /// New principal bootstrapped from an external provider profile
    pub fn external(
        provider: Provider,
        provider_id: impl Into<String>,
        email: impl Into<String>,
        nickname: impl Into<String>,
        profile_image: Option<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password_hash: None,
            nickname: nickname.into(),
            role: Role::User,
            provider,
            provider_id: Some(provider_id.into()),
            profile_image,
        }
    }
}
