//! In-memory store implementations

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::traits::{PrincipalStore, RefreshTokenStore};
use super::RefreshTokenRecord;
use crate::error::{AuthError, Error, Result};
use crate::principal::{NewPrincipal, Principal, Provider};

#[derive(Default)]
struct PrincipalTables {
    principals: BTreeMap<i64, Principal>,
    email_index: BTreeMap<String, i64>,
    provider_index: BTreeMap<(Provider, String), i64>,
}

/// In-memory principal store
///
/// All tables sit behind one lock so index updates stay consistent with the
/// primary map.
pub struct InMemoryPrincipalStore {
    tables: RwLock<PrincipalTables>,
    next_id: AtomicI64,
}

impl InMemoryPrincipalStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(PrincipalTables::default()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryPrincipalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrincipalStore for InMemoryPrincipalStore {
    async fn create(&self, new: NewPrincipal) -> Result<Principal> {
        let mut tables = self.tables.write().unwrap();

        if tables.email_index.contains_key(&new.email) {
            return Err(AuthError::DuplicateEmail.into());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let principal = Principal {
            id,
            email: new.email,
            password_hash: new.password_hash,
            nickname: new.nickname,
            role: new.role,
            active: true,
            provider: new.provider,
            provider_id: new.provider_id,
            profile_image: new.profile_image,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        tables.email_index.insert(principal.email.clone(), id);
        if let Some(provider_id) = &principal.provider_id {
            tables
                .provider_index
                .insert((principal.provider, provider_id.clone()), id);
        }
        tables.principals.insert(id, principal.clone());
        Ok(principal)
    }

    async fn update(&self, principal: &Principal) -> Result<Principal> {
        let mut tables = self.tables.write().unwrap();

        let existing = tables
            .principals
            .get(&principal.id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("principal {}", principal.id)))?;

        // Keep indices in step if a key field ever changes
        if existing.email != principal.email {
            tables.email_index.remove(&existing.email);
            tables
                .email_index
                .insert(principal.email.clone(), principal.id);
        }
        if existing.provider_id != principal.provider_id {
            if let Some(old) = &existing.provider_id {
                tables.provider_index.remove(&(existing.provider, old.clone()));
            }
            if let Some(new) = &principal.provider_id {
                tables
                    .provider_index
                    .insert((principal.provider, new.clone()), principal.id);
            }
        }

        let mut stored = principal.clone();
        stored.updated_at = Utc::now();
        tables.principals.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Principal>> {
        let tables = self.tables.read().unwrap();
        Ok(tables.principals.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>> {
        let tables = self.tables.read().unwrap();
        if let Some(id) = tables.email_index.get(email) {
            Ok(tables.principals.get(id).cloned())
        } else {
            Ok(None)
        }
    }

    async fn find_by_provider(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Option<Principal>> {
        let tables = self.tables.read().unwrap();
        if let Some(id) = tables
            .provider_index
            .get(&(provider, provider_id.to_string()))
        {
            Ok(tables.principals.get(id).cloned())
        } else {
            Ok(None)
        }
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        let tables = self.tables.read().unwrap();
        Ok(tables.email_index.contains_key(email))
    }
}

#[derive(Default)]
struct RefreshTokenTables {
    tokens: BTreeMap<String, RefreshTokenRecord>,
    owner_index: BTreeMap<String, Vec<String>>,
}

/// In-memory refresh-token store
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    tables: RwLock<RefreshTokenTables>,
}

impl InMemoryRefreshTokenStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired records; returns how many were removed
    pub fn cleanup_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut tables = self.tables.write().unwrap();

        let expired: Vec<String> = tables
            .tokens
            .iter()
            .filter(|(_, record)| record.expires_at <= now)
            .map(|(token, _)| token.clone())
            .collect();

        for token in &expired {
            if let Some(record) = tables.tokens.remove(token) {
                if let Some(owned) = tables.owner_index.get_mut(&record.owner_email) {
                    owned.retain(|t| t != token);
                }
            }
        }

        Ok(expired.len())
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn save(&self, record: RefreshTokenRecord) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        let owned = tables
            .owner_index
            .entry(record.owner_email.clone())
            .or_default();
        if !owned.contains(&record.token) {
            owned.push(record.token.clone());
        }
        tables.tokens.insert(record.token.clone(), record);
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<RefreshTokenRecord>> {
        let tables = self.tables.read().unwrap();
        Ok(tables.tokens.get(token).cloned())
    }

    async fn mark_used(&self, token: &str, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        let record = tables
            .tokens
            .get_mut(token)
            .ok_or_else(|| Error::NotFound("refresh token record".to_string()))?;
        record.last_used_at = Some(at);
        Ok(())
    }

    async fn revoke_by_owner_email(&self, email: &str) -> Result<usize> {
        let mut tables = self.tables.write().unwrap();

        let owned = match tables.owner_index.get(email) {
            Some(tokens) => tokens.clone(),
            None => return Ok(0),
        };

        let mut revoked = 0;
        for token in owned {
            if let Some(record) = tables.tokens.get_mut(&token) {
                if record.is_valid() {
                    record.revoked = true;
                    revoked += 1;
                }
            }
        }
        Ok(revoked)
    }
}
