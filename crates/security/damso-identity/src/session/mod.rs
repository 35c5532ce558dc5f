//! Login-session slots for the OAuth redirect flow
//!
//! A login session is a short-lived server-side entry addressed by a random
//! id carried in a private cookie. It holds exactly two typed values: the
//! return URL captured when login starts, and the [`PendingLogin`] staged by
//! a successful callback. Slots expire with the session TTL; an expired slot
//! reads as absent.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};

use crate::error::Result;
use crate::principal::Principal;

/// Completed OAuth login awaiting pickup by the token-exchange call
///
/// At most one per session; consuming it removes it.
#[derive(Debug, Clone)]
pub struct PendingLogin {
    /// Principal the login resolved to
    pub principal: Principal,
    /// Freshly minted access token
    pub access_token: String,
    /// Freshly minted refresh token
    pub refresh_token: String,
}

/// Login-session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Slot lifetime; also bounds how long a PendingLogin may wait
    pub ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
        }
    }
}

/// Generate a random session id (32 bytes, unpadded base64url)
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Typed, TTL-bounded store for OAuth login-session state
#[async_trait]
pub trait LoginSessionStore: Send + Sync {
    /// Remember where the front-end wants the browser sent after callback
    async fn set_return_url(&self, session_id: &str, url: String) -> Result<()>;

    /// Read the stored return URL, if the session is live and has one
    async fn return_url(&self, session_id: &str) -> Result<Option<String>>;

    /// Stage a completed login for pickup, replacing any earlier one
    async fn stage_pending_login(&self, session_id: &str, login: PendingLogin) -> Result<()>;

    /// Consume the staged login: read it and remove it in one step
    async fn take_pending_login(&self, session_id: &str) -> Result<Option<PendingLogin>>;

    /// Drop expired sessions; returns how many were removed
    async fn cleanup_expired(&self) -> Result<usize>;
}

struct LoginSessionEntry {
    return_url: Option<String>,
    pending: Option<PendingLogin>,
    expires_at: DateTime<Utc>,
}

impl LoginSessionEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// In-memory login-session store
pub struct InMemoryLoginSessionStore {
    sessions: RwLock<BTreeMap<String, LoginSessionEntry>>,
    ttl: chrono::Duration,
}

impl InMemoryLoginSessionStore {
    /// Create a store with the given settings
    pub fn new(config: SessionConfig) -> Self {
        let ttl = chrono::Duration::from_std(config.ttl)
            .unwrap_or_else(|_| chrono::Duration::days(365_000));
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            ttl,
        }
    }

    fn touch<'a>(
        &self,
        sessions: &'a mut BTreeMap<String, LoginSessionEntry>,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> &'a mut LoginSessionEntry {
        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| LoginSessionEntry {
                return_url: None,
                pending: None,
                expires_at: now + self.ttl,
            });
        if entry.is_expired(now) {
            entry.return_url = None;
            entry.pending = None;
        }
        entry.expires_at = now + self.ttl;
        entry
    }
}

impl Default for InMemoryLoginSessionStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[async_trait]
impl LoginSessionStore for InMemoryLoginSessionStore {
    async fn set_return_url(&self, session_id: &str, url: String) -> Result<()> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap();
        let entry = self.touch(&mut sessions, session_id, now);
        entry.return_url = Some(url);
        Ok(())
    }

    async fn return_url(&self, session_id: &str) -> Result<Option<String>> {
        let now = Utc::now();
        let sessions = self.sessions.read().unwrap();
        Ok(sessions
            .get(session_id)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.return_url.clone()))
    }

    async fn stage_pending_login(&self, session_id: &str, login: PendingLogin) -> Result<()> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap();
        let entry = self.touch(&mut sessions, session_id, now);
        entry.pending = Some(login);
        Ok(())
    }

    async fn take_pending_login(&self, session_id: &str) -> Result<Option<PendingLogin>> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap();
        match sessions.get_mut(session_id) {
            Some(entry) if !entry.is_expired(now) => Ok(entry.pending.take()),
            _ => Ok(None),
        }
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap();

        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            sessions.remove(id);
        }
        Ok(expired.len())
    }
}
