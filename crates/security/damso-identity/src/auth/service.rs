//! Account and token lifecycle operations
//!
//! [`AuthenticationService`] owns the credential checks and the token
//! lifecycle: password login, access/refresh pair issuance, refresh-driven
//! access renewal, and bulk revocation. Refresh tokens are valid only while
//! their stored record is live; presenting the token string alone proves
//! nothing once the record is revoked or expired.

use std::sync::Arc;

use chrono::Utc;
use email_address::EmailAddress;
use tracing::{debug, info, instrument, warn};

use crate::auth::password::PasswordHasher;
use crate::auth::token::{TokenCodec, TokenType};
use crate::error::{AuthError, Error, Result};
use crate::principal::{NewPrincipal, Principal};
use crate::storage::{PrincipalStore, RefreshTokenRecord, RefreshTokenStore};

/// Access/refresh token pair returned by login and signup flows
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Short-lived bearer token for API requests
    pub access_token: String,
    /// Long-lived token exchanged for new access tokens
    pub refresh_token: String,
}

/// Lowercase and trim an email so lookups are case-insensitive
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Core authentication operations over pluggable stores
pub struct AuthenticationService<U, R> {
    principals: Arc<U>,
    refresh_tokens: Arc<R>,
    codec: Arc<TokenCodec>,
    hasher: Arc<dyn PasswordHasher>,
}

impl<U, R> AuthenticationService<U, R>
where
    U: PrincipalStore,
    R: RefreshTokenStore,
{
    /// Create a service over the given stores, codec, and hasher
    pub fn new(
        principals: Arc<U>,
        refresh_tokens: Arc<R>,
        codec: Arc<TokenCodec>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            principals,
            refresh_tokens,
            codec,
            hasher,
        }
    }

    /// Token codec shared with the request-authentication layer
    pub fn codec(&self) -> Arc<TokenCodec> {
        Arc::clone(&self.codec)
    }

    /// Register a local account with a hashed password
    ///
    /// Fails with [`Error::Validation`] on a malformed email, a password
    /// under 8 characters, or an empty or over-long nickname, and with
    /// [`AuthError::DuplicateEmail`] when the address is taken.
    #[instrument(skip(self, password))]
    pub async fn signup(&self, email: &str, password: &str, nickname: &str) -> Result<Principal> {
        let email = normalize_email(email);
        if email.parse::<EmailAddress>().is_err() {
            return Err(Error::Validation("email address is not valid".to_string()));
        }
        if password.chars().count() < 8 {
            return Err(Error::Validation(
                "password must be at least 8 characters".to_string(),
            ));
        }
        let nickname = nickname.trim();
        if nickname.is_empty() || nickname.chars().count() > 30 {
            return Err(Error::Validation(
                "nickname must be between 1 and 30 characters".to_string(),
            ));
        }

        if self.principals.exists_by_email(&email).await? {
            return Err(AuthError::DuplicateEmail.into());
        }

        let password_hash = self.hasher.hash(password)?;
        let principal = self
            .principals
            .create(NewPrincipal::local(&email, password_hash, nickname))
            .await?;

        info!(principal_id = principal.id, "account created");
        Ok(principal)
    }

    /// Check a password against the stored account
    ///
    /// Unknown addresses and wrong passwords both come back as
    /// [`AuthError::InvalidCredential`]; a deactivated account is reported
    /// as [`AuthError::AccountDisabled`] only after the password matched.
    #[instrument(skip(self, password))]
    pub async fn authenticate_by_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Principal> {
        let email = normalize_email(email);
        let Some(mut principal) = self.principals.find_by_email(&email).await? else {
            debug!("login for unknown email");
            return Err(AuthError::InvalidCredential.into());
        };

        let Some(hash) = principal.password_hash.as_deref() else {
            debug!(principal_id = principal.id, "password login on external account");
            return Err(AuthError::InvalidCredential.into());
        };
        if !self.hasher.verify(password, hash) {
            return Err(AuthError::InvalidCredential.into());
        }
        if !principal.active {
            warn!(principal_id = principal.id, "login on disabled account");
            return Err(AuthError::AccountDisabled.into());
        }

        principal.last_login_at = Some(Utc::now());
        let principal = self.principals.update(&principal).await?;
        Ok(principal)
    }

    /// Mint an access/refresh pair and persist the refresh record
    ///
    /// Every call stores a fresh record, so each device or login holds its
    /// own refresh token. The pair is returned only after the record is
    /// durably saved.
    #[instrument(skip(self, principal), fields(principal_id = principal.id))]
    pub async fn issue_token_pair(&self, principal: &Principal) -> Result<TokenPair> {
        let access_token = self.codec.issue_access(&principal.email, principal.id)?;
        let refresh_token = self.codec.issue_refresh(&principal.email)?;

        let now = Utc::now();
        let record = RefreshTokenRecord {
            token: refresh_token.clone(),
            principal_id: principal.id,
            owner_email: principal.email.clone(),
            created_at: now,
            expires_at: now + self.codec.refresh_ttl(),
            revoked: false,
            last_used_at: None,
        };
        self.refresh_tokens.save(record).await?;

        debug!(principal_id = principal.id, "token pair issued");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Password login: authenticate, then issue a token pair
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(Principal, TokenPair)> {
        let principal = self.authenticate_by_password(email, password).await?;
        let pair = self.issue_token_pair(&principal).await?;
        info!(principal_id = principal.id, "password login succeeded");
        Ok((principal, pair))
    }

    /// Exchange a live refresh token for a new access token
    ///
    /// The stored record decides validity: a revoked or expired record fails
    /// with [`AuthError::TokenExpired`] even if the token's own signature and
    /// expiry still check out. The refresh token itself is not rotated.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.codec.verify_typed(refresh_token, TokenType::Refresh)?;

        let Some(record) = self.refresh_tokens.find_by_token(refresh_token).await? else {
            debug!("refresh with token that has no stored record");
            return Err(AuthError::TokenInvalid("no stored refresh record".to_string()).into());
        };
        if !record.is_valid() {
            debug!(principal_id = record.principal_id, "refresh with dead record");
            return Err(AuthError::TokenExpired.into());
        }

        let principal = match self.principals.find_by_id(record.principal_id).await? {
            Some(principal) if principal.active => principal,
            _ => {
                warn!(principal_id = record.principal_id, "refresh for unusable account");
                return Err(AuthError::AccountDisabled.into());
            }
        };
        if claims.sub != principal.email {
            warn!(principal_id = principal.id, "refresh subject does not match owner");
            return Err(AuthError::AccountMismatch.into());
        }

        let access_token = self.codec.issue_access(&principal.email, principal.id)?;
        self.refresh_tokens
            .mark_used(refresh_token, Utc::now())
            .await?;

        debug!(principal_id = principal.id, "access token renewed");
        Ok(TokenPair {
            access_token,
            refresh_token: refresh_token.to_string(),
        })
    }

    /// Revoke every live refresh token owned by the given email
    ///
    /// Returns how many records were flipped; zero is not an error.
    #[instrument(skip(self))]
    pub async fn revoke_all_for_principal(&self, email: &str) -> Result<usize> {
        let email = normalize_email(email);
        let revoked = self.refresh_tokens.revoke_by_owner_email(&email).await?;
        info!(count = revoked, "refresh tokens revoked");
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::Argon2PasswordHasher;
    use crate::storage::traits::{MockPrincipalStore, MockRefreshTokenStore};
    use crate::storage::{InMemoryPrincipalStore, InMemoryRefreshTokenStore};
    use std::time::Duration;

    fn codec() -> Arc<TokenCodec> {
        Arc::new(
            TokenCodec::new(
                *b"0123456789abcdef0123456789abcdef",
                Duration::from_secs(1800),
                Duration::from_secs(14 * 24 * 3600),
            )
            .unwrap(),
        )
    }

    fn service() -> AuthenticationService<InMemoryPrincipalStore, InMemoryRefreshTokenStore> {
        AuthenticationService::new(
            Arc::new(InMemoryPrincipalStore::new()),
            Arc::new(InMemoryRefreshTokenStore::new()),
            codec(),
            Arc::new(Argon2PasswordHasher::new()),
        )
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let service = service();
        let created = service
            .signup("Dana@Damso.app", "correct horse", "dana")
            .await
            .unwrap();
        assert_eq!(created.email, "dana@damso.app");

        let (principal, pair) = service.login("  DANA@damso.app ", "correct horse").await.unwrap();
        assert_eq!(principal.id, created.id);
        assert!(principal.last_login_at.is_some());

        let claims = service.codec().verify(&pair.access_token).unwrap();
        assert_eq!(claims.sub, "dana@damso.app");
        assert_eq!(claims.user_id, Some(created.id));
    }

    #[tokio::test]
    async fn test_signup_rejects_bad_input() {
        let service = service();

        let err = service.signup("not-an-email", "long password", "nick").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = service.signup("short@damso.app", "2short", "nick").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = service
            .signup("nick@damso.app", "long password", &"x".repeat(31))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = service
            .signup("blank@damso.app", "long password", "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_signup_is_rejected() {
        let service = service();
        service
            .signup("dup@damso.app", "password-one", "dup")
            .await
            .unwrap();
        let err = service
            .signup("DUP@damso.app", "password-two", "dup2")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_alike() {
        let service = service();
        service
            .signup("known@damso.app", "right password", "known")
            .await
            .unwrap();

        let unknown = service
            .authenticate_by_password("missing@damso.app", "whatever")
            .await
            .unwrap_err();
        let wrong = service
            .authenticate_by_password("known@damso.app", "wrong password")
            .await
            .unwrap_err();

        assert!(matches!(unknown, Error::Auth(AuthError::InvalidCredential)));
        assert!(matches!(wrong, Error::Auth(AuthError::InvalidCredential)));
    }

    #[tokio::test]
    async fn test_disabled_account_cannot_login() {
        let principals = Arc::new(InMemoryPrincipalStore::new());
        let service = AuthenticationService::new(
            Arc::clone(&principals),
            Arc::new(InMemoryRefreshTokenStore::new()),
            codec(),
            Arc::new(Argon2PasswordHasher::new()),
        );

        let mut created = service
            .signup("frozen@damso.app", "cold password", "frozen")
            .await
            .unwrap();
        created.active = false;
        principals.update(&created).await.unwrap();

        let err = service
            .login("frozen@damso.app", "cold password")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::AccountDisabled)));
    }

    #[tokio::test]
    async fn test_refresh_mints_new_access_and_keeps_refresh() {
        let service = service();
        service
            .signup("fresh@damso.app", "long password", "fresh")
            .await
            .unwrap();
        let (_, pair) = service.login("fresh@damso.app", "long password").await.unwrap();

        let renewed = service.refresh(&pair.refresh_token).await.unwrap();
        assert_eq!(renewed.refresh_token, pair.refresh_token);
        assert_ne!(renewed.access_token, pair.access_token);

        let claims = service.codec().verify(&renewed.access_token).unwrap();
        assert_eq!(claims.sub, "fresh@damso.app");
    }

    #[tokio::test]
    async fn test_refresh_with_access_token_is_invalid() {
        let service = service();
        service
            .signup("typed@damso.app", "long password", "typed")
            .await
            .unwrap();
        let (_, pair) = service.login("typed@damso.app", "long password").await.unwrap();

        let err = service.refresh(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::TokenInvalid(_))));
    }

    #[tokio::test]
    async fn test_refresh_with_unknown_token_is_invalid() {
        let service = service();
        let foreign = codec().issue_refresh("ghost@damso.app").unwrap();

        let err = service.refresh(&foreign).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::TokenInvalid(_))));
    }

    #[tokio::test]
    async fn test_revoked_record_turns_refresh_into_expired() {
        let service = service();
        service
            .signup("revoked@damso.app", "long password", "revoked")
            .await
            .unwrap();
        let (_, pair) = service.login("revoked@damso.app", "long password").await.unwrap();

        assert_eq!(
            service.revoke_all_for_principal("revoked@damso.app").await.unwrap(),
            1
        );
        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::TokenExpired)));

        // Revoking again finds nothing live and still succeeds.
        assert_eq!(
            service.revoke_all_for_principal("revoked@damso.app").await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_each_login_gets_its_own_refresh_record() {
        let service = service();
        service
            .signup("multi@damso.app", "long password", "multi")
            .await
            .unwrap();

        let (_, phone) = service.login("multi@damso.app", "long password").await.unwrap();
        let (_, laptop) = service.login("multi@damso.app", "long password").await.unwrap();
        assert_ne!(phone.refresh_token, laptop.refresh_token);

        // Both stay usable side by side.
        service.refresh(&phone.refresh_token).await.unwrap();
        service.refresh(&laptop.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_records_last_use() {
        let principals = Arc::new(InMemoryPrincipalStore::new());
        let refresh_tokens = Arc::new(InMemoryRefreshTokenStore::new());
        let service = AuthenticationService::new(
            Arc::clone(&principals),
            Arc::clone(&refresh_tokens),
            codec(),
            Arc::new(Argon2PasswordHasher::new()),
        );

        service
            .signup("used@damso.app", "long password", "used")
            .await
            .unwrap();
        let (_, pair) = service.login("used@damso.app", "long password").await.unwrap();

        let before = refresh_tokens
            .find_by_token(&pair.refresh_token)
            .await
            .unwrap()
            .unwrap();
        assert!(before.last_used_at.is_none());

        service.refresh(&pair.refresh_token).await.unwrap();
        let after = refresh_tokens
            .find_by_token(&pair.refresh_token)
            .await
            .unwrap()
            .unwrap();
        assert!(after.last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_refresh_for_deactivated_owner_is_disabled() {
        let principals = Arc::new(InMemoryPrincipalStore::new());
        let service = AuthenticationService::new(
            Arc::clone(&principals),
            Arc::new(InMemoryRefreshTokenStore::new()),
            codec(),
            Arc::new(Argon2PasswordHasher::new()),
        );

        let mut created = service
            .signup("gone@damso.app", "long password", "gone")
            .await
            .unwrap();
        let (_, pair) = service.login("gone@damso.app", "long password").await.unwrap();

        created.active = false;
        principals.update(&created).await.unwrap();

        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::AccountDisabled)));
    }

    #[tokio::test]
    async fn test_refresh_subject_must_match_owner_email() {
        let principals = Arc::new(InMemoryPrincipalStore::new());
        let refresh_tokens = Arc::new(InMemoryRefreshTokenStore::new());
        let service = AuthenticationService::new(
            Arc::clone(&principals),
            Arc::clone(&refresh_tokens),
            codec(),
            Arc::new(Argon2PasswordHasher::new()),
        );

        service
            .signup("owner@damso.app", "long password", "owner")
            .await
            .unwrap();
        let (principal, _) = service.login("owner@damso.app", "long password").await.unwrap();

        // A record pointing at the owner but carrying another subject.
        let stray = service.codec().issue_refresh("intruder@damso.app").unwrap();
        let now = Utc::now();
        refresh_tokens
            .save(RefreshTokenRecord {
                token: stray.clone(),
                principal_id: principal.id,
                owner_email: principal.email.clone(),
                created_at: now,
                expires_at: now + chrono::Duration::days(14),
                revoked: false,
                last_used_at: None,
            })
            .await
            .unwrap();

        let err = service.refresh(&stray).await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::AccountMismatch)));
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_from_signup() {
        let mut principals = MockPrincipalStore::new();
        principals
            .expect_exists_by_email()
            .returning(|_| Err(Error::Storage("connection reset".to_string())));

        let service = AuthenticationService::new(
            Arc::new(principals),
            Arc::new(InMemoryRefreshTokenStore::new()),
            codec(),
            Arc::new(Argon2PasswordHasher::new()),
        );

        let err = service
            .signup("down@damso.app", "long password", "down")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_pair_is_not_returned_when_record_save_fails() {
        let principals = Arc::new(InMemoryPrincipalStore::new());
        let mut refresh_tokens = MockRefreshTokenStore::new();
        refresh_tokens
            .expect_save()
            .returning(|_| Err(Error::Storage("disk full".to_string())));

        let service = AuthenticationService::new(
            Arc::clone(&principals),
            Arc::new(refresh_tokens),
            codec(),
            Arc::new(Argon2PasswordHasher::new()),
        );

        service
            .signup("atomic@damso.app", "long password", "atomic")
            .await
            .unwrap();
        let err = service
            .login("atomic@damso.app", "long password")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
