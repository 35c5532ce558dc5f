//! Kakao OAuth2 wire client
//!
//! Two provider calls, both with bounded timeouts and no retries: the
//! authorization-code exchange against `kauth.kakao.com` and the profile
//! fetch against `kapi.kakao.com`. Responses are normalized into a
//! [`ProviderProfile`] so the rest of the crate never sees Kakao's payload
//! shape.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{Error, Result};
use crate::oauth::ProviderProfile;
use crate::principal::Provider;

const DEFAULT_AUTHORIZATION_URI: &str = "https://kauth.kakao.com/oauth/authorize";
const DEFAULT_TOKEN_URI: &str = "https://kauth.kakao.com/oauth/token";
const DEFAULT_USER_INFO_URI: &str = "https://kapi.kakao.com/v2/user/me";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Kakao OAuth2 configuration
///
/// Required fields are constructor parameters; endpoints default to Kakao's
/// production hosts and can be overridden for tests.
#[derive(Clone)]
pub struct KakaoConfig {
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) redirect_uri: Url,
    pub(crate) authorization_uri: Url,
    pub(crate) token_uri: Url,
    pub(crate) user_info_uri: Url,
    pub(crate) timeout: Duration,
}

impl KakaoConfig {
    /// Create a configuration with Kakao's production endpoints
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Url,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri,
            authorization_uri: DEFAULT_AUTHORIZATION_URI
                .parse()
                .expect("valid default URL"),
            token_uri: DEFAULT_TOKEN_URI.parse().expect("valid default URL"),
            user_info_uri: DEFAULT_USER_INFO_URI.parse().expect("valid default URL"),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the authorization endpoint
    #[must_use]
    pub fn with_authorization_uri(mut self, url: Url) -> Self {
        self.authorization_uri = url;
        self
    }

    /// Override the token endpoint
    #[must_use]
    pub fn with_token_uri(mut self, url: Url) -> Self {
        self.token_uri = url;
        self
    }

    /// Override the user-info endpoint
    #[must_use]
    pub fn with_user_info_uri(mut self, url: Url) -> Self {
        self.user_info_uri = url;
        self
    }

    /// Override the per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for KakaoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KakaoConfig")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("authorization_uri", &self.authorization_uri.as_str())
            .field("token_uri", &self.token_uri.as_str())
            .field("user_info_uri", &self.user_info_uri.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Token response from the Kakao token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct KakaoTokenResponse {
    /// Provider access token used for the profile fetch
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Raw user payload from `GET /v2/user/me`
#[derive(Debug, Clone, Deserialize)]
pub struct KakaoUserResponse {
    pub id: i64,
    #[serde(default)]
    pub kakao_account: Option<KakaoAccount>,
    #[serde(default)]
    pub properties: Option<KakaoProperties>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KakaoAccount {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile: Option<KakaoProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KakaoProfile {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub thumbnail_image_url: Option<String>,
}

/// Legacy `properties` block; kept as a fallback for older consents
#[derive(Debug, Clone, Deserialize)]
pub struct KakaoProperties {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

impl KakaoUserResponse {
    /// Flatten Kakao's nested payload into a [`ProviderProfile`]
    ///
    /// `kakao_account.profile` wins over the legacy `properties` block.
    pub fn into_profile(self) -> ProviderProfile {
        let (email, profile) = match self.kakao_account {
            Some(account) => (account.email, account.profile),
            None => (None, None),
        };
        let properties = self.properties;

        let nickname = profile
            .as_ref()
            .and_then(|p| p.nickname.clone())
            .or_else(|| properties.as_ref().and_then(|p| p.nickname.clone()));
        let profile_image = profile
            .as_ref()
            .and_then(|p| p.profile_image_url.clone())
            .or_else(|| properties.as_ref().and_then(|p| p.profile_image.clone()));

        ProviderProfile {
            provider: Provider::Kakao,
            provider_id: self.id.to_string(),
            email,
            nickname,
            profile_image,
        }
    }
}

/// HTTP client for the two Kakao provider calls
pub struct KakaoClient {
    config: KakaoConfig,
    http: reqwest::Client,
}

impl KakaoClient {
    /// Build a client with connect and request timeouts from the config
    pub fn new(config: KakaoConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, http })
    }

    /// Authorization URL the browser is sent to for consent
    #[must_use]
    pub fn authorization_url(&self) -> String {
        let mut url = self.config.authorization_uri.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("response_type", "code");
        url.into()
    }

    /// Exchange an authorization code for provider tokens
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> Result<KakaoTokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(self.config.token_uri.clone())
            .form(&params)
            .send()
            .await?;
        let response = Self::ensure_success("token exchange", response).await?;

        debug!("authorization code exchanged");
        response.json::<KakaoTokenResponse>().await.map_err(Into::into)
    }

    /// Fetch the account profile with a provider access token
    #[instrument(skip(self, access_token))]
    pub async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile> {
        let response = self
            .http
            .get(self.config.user_info_uri.clone())
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = Self::ensure_success("profile fetch", response).await?;

        let user = response.json::<KakaoUserResponse>().await?;
        debug!(provider_id = user.id, "provider profile fetched");
        Ok(user.into_profile())
    }

    /// Map a non-2xx provider response to a detailed error
    async fn ensure_success(
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        Err(Error::Provider {
            operation,
            status,
            detail,
        })
    }
}
