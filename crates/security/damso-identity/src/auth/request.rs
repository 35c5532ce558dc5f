//! Per-request bearer-token authentication
//!
//! [`RequestAuthenticator`] turns an `Authorization` header into an
//! [`AuthOutcome`]. A request without credentials proceeds anonymously and
//! is rejected, if at all, by route-level authorization. A request that does
//! present a token must present a live one: expired and invalid tokens are
//! reported as distinct errors so clients know whether a refresh can help.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::auth::token::{TokenCodec, TokenType};
use crate::error::{AuthError, Error, Result};
use crate::principal::{Principal, Role};
use crate::storage::PrincipalStore;

const BEARER_PREFIX: &str = "Bearer ";

/// Authenticated caller attached to a request
#[derive(Debug, Clone)]
pub struct SecurityContext {
    /// Principal the access token resolved to
    pub principal: Principal,
}

impl SecurityContext {
    /// Role granted to this request
    pub fn authority(&self) -> Role {
        self.principal.role
    }

    /// Whether the caller holds the admin role
    pub fn is_admin(&self) -> bool {
        self.principal.role == Role::Admin
    }
}

/// Result of authenticating one request
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// No usable credentials were presented
    Anonymous,
    /// A live access token resolved to an active principal
    Authenticated(SecurityContext),
}

impl AuthOutcome {
    /// Security context, if the request authenticated
    pub fn context(&self) -> Option<&SecurityContext> {
        match self {
            AuthOutcome::Authenticated(ctx) => Some(ctx),
            AuthOutcome::Anonymous => None,
        }
    }
}

/// Stateless authenticator shared across requests
pub struct RequestAuthenticator<U> {
    codec: Arc<TokenCodec>,
    principals: Arc<U>,
}

impl<U> RequestAuthenticator<U>
where
    U: PrincipalStore,
{
    /// Create an authenticator over the shared codec and principal store
    pub fn new(codec: Arc<TokenCodec>, principals: Arc<U>) -> Self {
        Self { codec, principals }
    }

    /// Authenticate one request from its `Authorization` header
    ///
    /// Returns [`AuthOutcome::Anonymous`] when no bearer token is present or
    /// when a verified token points at a missing or deactivated account.
    /// Fails with [`AuthError::TokenExpired`] or [`AuthError::TokenInvalid`]
    /// when a token was presented but does not verify.
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<AuthOutcome> {
        let Some(token) = authorization.and_then(|value| value.strip_prefix(BEARER_PREFIX)) else {
            return Ok(AuthOutcome::Anonymous);
        };

        let claims = match self.codec.verify_typed(token, TokenType::Access) {
            Ok(claims) => claims,
            Err(Error::Auth(AuthError::TokenExpired)) => {
                debug!("request carried an expired access token");
                return Err(AuthError::TokenExpired.into());
            }
            Err(err) => {
                debug!(error = %err, "request carried an unverifiable token");
                return Err(AuthError::TokenInvalid("unverifiable bearer token".to_string()).into());
            }
        };

        let Some(principal_id) = claims.user_id else {
            warn!("access token carries no principal id");
            return Ok(AuthOutcome::Anonymous);
        };

        match self.principals.find_by_id(principal_id).await? {
            Some(principal) if principal.active => {
                debug!(principal_id = principal.id, "request authenticated");
                Ok(AuthOutcome::Authenticated(SecurityContext { principal }))
            }
            Some(principal) => {
                warn!(principal_id = principal.id, "token for deactivated account");
                Ok(AuthOutcome::Anonymous)
            }
            None => {
                warn!(principal_id, "verified token resolves to no account");
                Ok(AuthOutcome::Anonymous)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::Argon2PasswordHasher;
    use crate::auth::service::AuthenticationService;
    use crate::storage::{InMemoryPrincipalStore, InMemoryRefreshTokenStore};
    use std::time::Duration;

    struct Fixture {
        service: AuthenticationService<InMemoryPrincipalStore, InMemoryRefreshTokenStore>,
        principals: Arc<InMemoryPrincipalStore>,
        authenticator: RequestAuthenticator<InMemoryPrincipalStore>,
    }

    fn fixture(access_ttl: Duration) -> Fixture {
        let codec = Arc::new(
            TokenCodec::new(
                *b"0123456789abcdef0123456789abcdef",
                access_ttl,
                Duration::from_secs(14 * 24 * 3600),
            )
            .unwrap(),
        );
        let principals = Arc::new(InMemoryPrincipalStore::new());
        let service = AuthenticationService::new(
            Arc::clone(&principals),
            Arc::new(InMemoryRefreshTokenStore::new()),
            Arc::clone(&codec),
            Arc::new(Argon2PasswordHasher::new()),
        );
        let authenticator = RequestAuthenticator::new(codec, Arc::clone(&principals));
        Fixture {
            service,
            principals,
            authenticator,
        }
    }

    #[tokio::test]
    async fn test_missing_header_is_anonymous() {
        let fx = fixture(Duration::from_secs(1800));
        let outcome = fx.authenticator.authenticate(None).await.unwrap();
        assert!(outcome.context().is_none());
    }

    #[tokio::test]
    async fn test_non_bearer_header_is_anonymous() {
        let fx = fixture(Duration::from_secs(1800));
        let outcome = fx
            .authenticator
            .authenticate(Some("Basic dXNlcjpwYXNz"))
            .await
            .unwrap();
        assert!(outcome.context().is_none());
    }

    #[tokio::test]
    async fn test_valid_token_builds_security_context() {
        let fx = fixture(Duration::from_secs(1800));
        fx.service
            .signup("ctx@damso.app", "long password", "ctx")
            .await
            .unwrap();
        let (principal, pair) = fx.service.login("ctx@damso.app", "long password").await.unwrap();

        let outcome = fx
            .authenticator
            .authenticate(Some(&format!("Bearer {}", pair.access_token)))
            .await
            .unwrap();
        let ctx = outcome.context().unwrap();
        assert_eq!(ctx.principal.id, principal.id);
        assert_eq!(ctx.authority(), Role::User);
        assert!(!ctx.is_admin());
    }

    #[tokio::test]
    async fn test_garbage_token_is_invalid_not_expired() {
        let fx = fixture(Duration::from_secs(1800));
        let err = fx
            .authenticator
            .authenticate(Some("Bearer not.a.token"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::TokenInvalid(_))));
    }

    #[tokio::test]
    async fn test_expired_token_is_reported_distinctly() {
        let fx = fixture(Duration::ZERO);
        fx.service
            .signup("expired@damso.app", "long password", "expired")
            .await
            .unwrap();
        let (_, pair) = fx
            .service
            .login("expired@damso.app", "long password")
            .await
            .unwrap();

        let err = fx
            .authenticator
            .authenticate(Some(&format!("Bearer {}", pair.access_token)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_accepted_for_requests() {
        let fx = fixture(Duration::from_secs(1800));
        fx.service
            .signup("wrongkind@damso.app", "long password", "wrongkind")
            .await
            .unwrap();
        let (_, pair) = fx
            .service
            .login("wrongkind@damso.app", "long password")
            .await
            .unwrap();

        let err = fx
            .authenticator
            .authenticate(Some(&format!("Bearer {}", pair.refresh_token)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::TokenInvalid(_))));
    }

    #[tokio::test]
    async fn test_deactivated_account_falls_back_to_anonymous() {
        let fx = fixture(Duration::from_secs(1800));
        let mut created = fx
            .service
            .signup("offline@damso.app", "long password", "offline")
            .await
            .unwrap();
        let (_, pair) = fx
            .service
            .login("offline@damso.app", "long password")
            .await
            .unwrap();

        created.active = false;
        fx.principals.update(&created).await.unwrap();

        let outcome = fx
            .authenticator
            .authenticate(Some(&format!("Bearer {}", pair.access_token)))
            .await
            .unwrap();
        assert!(outcome.context().is_none());
    }

    #[tokio::test]
    async fn test_token_for_unknown_account_is_anonymous() {
        let fx = fixture(Duration::from_secs(1800));
        let token = fx.service.codec().issue_access("nobody@damso.app", 404).unwrap();

        let outcome = fx
            .authenticator
            .authenticate(Some(&format!("Bearer {}", token)))
            .await
            .unwrap();
        assert!(outcome.context().is_none());
    }
}
