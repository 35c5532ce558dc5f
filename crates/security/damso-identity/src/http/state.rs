//! Shared state for the API routers

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use crate::auth::password::PasswordHasher;
use crate::auth::request::RequestAuthenticator;
use crate::auth::service::AuthenticationService;
use crate::auth::token::TokenCodec;
use crate::config::{CookieConfig, IdentityConfig};
use crate::error::Result;
use crate::oauth::{KakaoClient, OAuthCoordinator};
use crate::session::LoginSessionStore;
use crate::storage::{PrincipalStore, RefreshTokenStore};

/// State behind the account and token routes
pub struct AppState<U, R, L> {
    pub auth: Arc<AuthenticationService<U, R>>,
    pub authenticator: Arc<RequestAuthenticator<U>>,
    /// Present only when Kakao login is configured
    pub oauth: Option<Arc<OAuthCoordinator<U, R, L>>>,
    pub cookies: CookieConfig,
    pub session_ttl: Duration,
}

impl<U, R, L> AppState<U, R, L>
where
    U: PrincipalStore,
    R: RefreshTokenStore,
    L: LoginSessionStore,
{
    /// Wire up services from configuration and the given stores
    pub fn from_config(
        config: IdentityConfig,
        principals: Arc<U>,
        refresh_tokens: Arc<R>,
        sessions: Arc<L>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Result<Self> {
        let codec = Arc::new(TokenCodec::new(
            config.token.secret.to_vec(),
            config.token.access_ttl,
            config.token.refresh_ttl,
        )?);
        let auth = Arc::new(AuthenticationService::new(
            Arc::clone(&principals),
            Arc::clone(&refresh_tokens),
            Arc::clone(&codec),
            hasher,
        ));
        let authenticator = Arc::new(RequestAuthenticator::new(
            Arc::clone(&codec),
            Arc::clone(&principals),
        ));

        let oauth = match config.kakao {
            Some(kakao) => Some(Arc::new(OAuthCoordinator::new(
                KakaoClient::new(kakao)?,
                Arc::clone(&auth),
                principals,
                sessions,
                config.frontend_url,
            ))),
            None => None,
        };

        Ok(Self {
            auth,
            authenticator,
            oauth,
            cookies: config.cookies,
            session_ttl: config.session.ttl,
        })
    }

    /// State for the OAuth sub-router, when social login is configured
    pub fn oauth_state(&self) -> Option<OAuthState<U, R, L>> {
        self.oauth.as_ref().map(|oauth| OAuthState {
            oauth: Arc::clone(oauth),
            codec: self.auth.codec(),
            cookies: self.cookies.clone(),
            session_ttl: self.session_ttl,
        })
    }
}

// Manual Clone: avoid derive adding `U: Clone, R: Clone, L: Clone` bounds.
impl<U, R, L> Clone for AppState<U, R, L> {
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
            authenticator: Arc::clone(&self.authenticator),
            oauth: self.oauth.clone(),
            cookies: self.cookies.clone(),
            session_ttl: self.session_ttl,
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<U, R, L> FromRef<AppState<U, R, L>> for Key {
    fn from_ref(state: &AppState<U, R, L>) -> Self {
        state.cookies.key.clone()
    }
}

/// State behind the OAuth routes; exists only when a provider is configured
pub struct OAuthState<U, R, L> {
    pub oauth: Arc<OAuthCoordinator<U, R, L>>,
    pub codec: Arc<TokenCodec>,
    pub cookies: CookieConfig,
    pub session_ttl: Duration,
}

impl<U, R, L> Clone for OAuthState<U, R, L> {
    fn clone(&self) -> Self {
        Self {
            oauth: Arc::clone(&self.oauth),
            codec: Arc::clone(&self.codec),
            cookies: self.cookies.clone(),
            session_ttl: self.session_ttl,
        }
    }
}

impl<U, R, L> FromRef<OAuthState<U, R, L>> for Key {
    fn from_ref(state: &OAuthState<U, R, L>) -> Self {
        state.cookies.key.clone()
    }
}
