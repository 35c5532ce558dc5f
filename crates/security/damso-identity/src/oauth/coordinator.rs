//! OAuth login flow orchestration
//!
//! The browser flow never carries tokens in URLs. The callback computes the
//! full login result, stages it in the caller's login session, and redirects
//! with only a status indicator; the front-end then trades its session for
//! the staged [`PendingLogin`] over a same-site API call.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::auth::service::{normalize_email, AuthenticationService};
use crate::error::{AuthError, Error, Result};
use crate::oauth::kakao::KakaoClient;
use crate::oauth::ProviderProfile;
use crate::principal::{NewPrincipal, Principal};
use crate::session::{LoginSessionStore, PendingLogin};
use crate::storage::{PrincipalStore, RefreshTokenStore};

/// Drives the Kakao login flow end to end
pub struct OAuthCoordinator<U, R, L> {
    kakao: KakaoClient,
    auth: Arc<AuthenticationService<U, R>>,
    principals: Arc<U>,
    sessions: Arc<L>,
    default_return_url: String,
}

impl<U, R, L> OAuthCoordinator<U, R, L>
where
    U: PrincipalStore,
    R: RefreshTokenStore,
    L: LoginSessionStore,
{
    /// Create a coordinator over the provider client and shared services
    pub fn new(
        kakao: KakaoClient,
        auth: Arc<AuthenticationService<U, R>>,
        principals: Arc<U>,
        sessions: Arc<L>,
        default_return_url: impl Into<String>,
    ) -> Self {
        Self {
            kakao,
            auth,
            principals,
            sessions,
            default_return_url: default_return_url.into(),
        }
    }

    /// Start a login: remember where to send the browser back, return the
    /// provider authorization URL
    #[instrument(skip(self, session_id))]
    pub async fn begin_login(
        &self,
        session_id: &str,
        return_url: Option<String>,
    ) -> Result<String> {
        if let Some(url) = return_url {
            self.sessions.set_return_url(session_id, url).await?;
        }
        Ok(self.kakao.authorization_url())
    }

    /// Handle the provider callback; always resolves to a redirect URL
    ///
    /// Success and failure both land on the stored return URL (or the
    /// configured default) with a `status` query parameter. Tokens never
    /// appear in the redirect.
    #[instrument(skip_all)]
    pub async fn handle_callback(&self, session_id: &str, code: &str) -> String {
        let base = self.return_base(session_id).await;
        match self.complete_login(session_id, code).await {
            Ok(principal_id) => {
                info!(principal_id, "social login staged");
                format!("{base}?status=success")
            }
            Err(err) => {
                warn!(error = %err, "social login failed");
                failed_redirect(&base, &failure_message(&err))
            }
        }
    }

    /// Failure redirect for callbacks that never got a usable code
    #[instrument(skip_all)]
    pub async fn failure_redirect(&self, session_id: &str, message: &str) -> String {
        let base = self.return_base(session_id).await;
        failed_redirect(&base, message)
    }

    async fn return_base(&self, session_id: &str) -> String {
        match self.sessions.return_url(session_id).await {
            Ok(Some(url)) => url,
            Ok(None) => self.default_return_url.clone(),
            Err(err) => {
                warn!(error = %err, "login session read failed, using default return URL");
                self.default_return_url.clone()
            }
        }
    }

    /// Hand the staged login to the front-end, consuming it
    ///
    /// A second call for the same session fails with
    /// [`AuthError::NoPendingLogin`], as does a session whose slot expired.
    #[instrument(skip_all)]
    pub async fn exchange_pending_login(&self, session_id: &str) -> Result<PendingLogin> {
        match self.sessions.take_pending_login(session_id).await? {
            Some(pending) => {
                info!(principal_id = pending.principal.id, "pending login exchanged");
                Ok(pending)
            }
            None => Err(AuthError::NoPendingLogin.into()),
        }
    }

    async fn complete_login(&self, session_id: &str, code: &str) -> Result<i64> {
        let token = self.kakao.exchange_code(code).await?;
        let profile = self.kakao.fetch_profile(&token.access_token).await?;
        let principal = self.upsert_principal(profile).await?;
        let pair = self.auth.issue_token_pair(&principal).await?;

        let principal_id = principal.id;
        self.sessions
            .stage_pending_login(
                session_id,
                PendingLogin {
                    principal,
                    access_token: pair.access_token,
                    refresh_token: pair.refresh_token,
                },
            )
            .await?;
        Ok(principal_id)
    }

    /// Find-or-create keyed by (provider, provider id)
    ///
    /// A returning account gets its nickname and avatar synced from the
    /// provider. A first-time account needs a shared email; without one no
    /// principal is created.
    async fn upsert_principal(&self, profile: ProviderProfile) -> Result<Principal> {
        match self
            .principals
            .find_by_provider(profile.provider, &profile.provider_id)
            .await?
        {
            Some(mut principal) => {
                if let Some(nickname) = profile.nickname {
                    principal.nickname = nickname;
                }
                if let Some(image) = profile.profile_image {
                    principal.profile_image = Some(image);
                }
                principal.last_login_at = Some(Utc::now());
                self.principals.update(&principal).await
            }
            None => {
                let Some(email) = profile.email else {
                    return Err(AuthError::MissingProviderEmail.into());
                };
                let nickname = profile
                    .nickname
                    .unwrap_or_else(|| format!("kakao_{}", profile.provider_id));
                let created = self
                    .principals
                    .create(NewPrincipal::external(
                        profile.provider,
                        profile.provider_id,
                        normalize_email(&email),
                        nickname,
                        profile.profile_image,
                    ))
                    .await?;
                info!(principal_id = created.id, "account created from provider profile");
                Ok(created)
            }
        }
    }
}

fn failure_message(err: &Error) -> String {
    match err {
        Error::Auth(auth) => auth.to_string(),
        _ => "social login failed".to_string(),
    }
}

fn failed_redirect(base: &str, message: &str) -> String {
    format!("{base}?status=failed&message={}", urlencoding::encode(message))
}
