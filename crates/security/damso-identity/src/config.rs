//! Environment-driven configuration
//!
//! All knobs live under the `DAMSO_` prefix. Only the token secret is
//! required; Kakao login switches on when `DAMSO_KAKAO_CLIENT_ID` is set,
//! and then needs the client secret and redirect URI as well.

use std::fmt;
use std::time::Duration;

use axum_extra::extract::cookie::Key;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use url::Url;
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::oauth::KakaoConfig;
use crate::session::SessionConfig;

const DEFAULT_ACCESS_TTL_SECS: u64 = 30 * 60;
const DEFAULT_REFRESH_TTL_SECS: u64 = 14 * 24 * 3600;
const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_REFRESH_COOKIE_PATH: &str = "/";

/// Signing secret and token lifetimes
#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC secret; at least 32 bytes
    pub secret: Zeroizing<Vec<u8>>,
    /// Access-token lifetime
    pub access_ttl: Duration,
    /// Refresh-token lifetime
    pub refresh_ttl: Duration,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

/// Cookie hardening and the private-cookie encryption key
#[derive(Clone)]
pub struct CookieConfig {
    /// Key encrypting the login-session cookie
    pub key: Key,
    /// Whether cookies are marked `Secure`
    pub secure: bool,
    /// Path scope of the refresh-token cookie
    pub refresh_path: String,
}

impl fmt::Debug for CookieConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieConfig")
            .field("secure", &self.secure)
            .field("refresh_path", &self.refresh_path)
            .finish_non_exhaustive()
    }
}

/// Full configuration for the identity service
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub token: TokenConfig,
    pub session: SessionConfig,
    pub cookies: CookieConfig,
    /// Where OAuth redirects land when no return URL was captured
    pub frontend_url: String,
    /// Kakao login settings; `None` leaves social login switched off
    pub kakao: Option<KakaoConfig>,
}

impl IdentityConfig {
    /// Load configuration from `DAMSO_*` environment variables
    ///
    /// # Required
    /// - `DAMSO_TOKEN_SECRET`: HMAC signing secret, at least 32 bytes
    ///
    /// # Optional
    /// - `DAMSO_ACCESS_TOKEN_TTL_SECS` (default 1800)
    /// - `DAMSO_REFRESH_TOKEN_TTL_SECS` (default 1209600)
    /// - `DAMSO_SESSION_TTL_SECS` (default 1800)
    /// - `DAMSO_COOKIE_KEY`: base64 key for the session cookie, at least
    ///   64 bytes decoded; an ephemeral key is generated when unset
    /// - `DAMSO_COOKIE_SECURE` (default `false`)
    /// - `DAMSO_REFRESH_COOKIE_PATH` (default `/`)
    /// - `DAMSO_FRONTEND_URL` (default `http://localhost:3000`)
    /// - `DAMSO_KAKAO_CLIENT_ID`, `DAMSO_KAKAO_CLIENT_SECRET`,
    ///   `DAMSO_KAKAO_REDIRECT_URI`: enable Kakao login together
    /// - `DAMSO_KAKAO_AUTHORIZATION_URI`, `DAMSO_KAKAO_TOKEN_URI`,
    ///   `DAMSO_KAKAO_USER_INFO_URI`: endpoint overrides
    /// - `DAMSO_PROVIDER_TIMEOUT_SECS` (default 10)
    pub fn from_env() -> Result<Self> {
        let secret = required("DAMSO_TOKEN_SECRET")?;
        let token = TokenConfig {
            secret: Zeroizing::new(secret.into_bytes()),
            access_ttl: duration_secs("DAMSO_ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TTL_SECS)?,
            refresh_ttl: duration_secs("DAMSO_REFRESH_TOKEN_TTL_SECS", DEFAULT_REFRESH_TTL_SECS)?,
        };

        let session = SessionConfig {
            ttl: duration_secs("DAMSO_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
        };

        let key = match optional("DAMSO_COOKIE_KEY") {
            Some(encoded) => {
                let bytes = STANDARD.decode(encoded.as_bytes()).map_err(|err| {
                    Error::Configuration(format!("DAMSO_COOKIE_KEY is not valid base64: {err}"))
                })?;
                Key::try_from(bytes.as_slice()).map_err(|_| {
                    Error::Configuration(
                        "DAMSO_COOKIE_KEY must decode to at least 64 bytes".to_string(),
                    )
                })?
            }
            None => Key::generate(),
        };
        let cookies = CookieConfig {
            key,
            secure: flag("DAMSO_COOKIE_SECURE", false),
            refresh_path: optional("DAMSO_REFRESH_COOKIE_PATH")
                .unwrap_or_else(|| DEFAULT_REFRESH_COOKIE_PATH.to_string()),
        };

        let frontend_url =
            optional("DAMSO_FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string());

        let kakao = match optional("DAMSO_KAKAO_CLIENT_ID") {
            Some(client_id) => {
                let client_secret = required("DAMSO_KAKAO_CLIENT_SECRET")?;
                let redirect_uri = parse_url(
                    "DAMSO_KAKAO_REDIRECT_URI",
                    required("DAMSO_KAKAO_REDIRECT_URI")?,
                )?;
                let mut config = KakaoConfig::new(client_id, client_secret, redirect_uri)
                    .with_timeout(duration_secs(
                        "DAMSO_PROVIDER_TIMEOUT_SECS",
                        DEFAULT_PROVIDER_TIMEOUT_SECS,
                    )?);

                if let Some(raw) = optional("DAMSO_KAKAO_AUTHORIZATION_URI") {
                    config = config
                        .with_authorization_uri(parse_url("DAMSO_KAKAO_AUTHORIZATION_URI", raw)?);
                }
                if let Some(raw) = optional("DAMSO_KAKAO_TOKEN_URI") {
                    config = config.with_token_uri(parse_url("DAMSO_KAKAO_TOKEN_URI", raw)?);
                }
                if let Some(raw) = optional("DAMSO_KAKAO_USER_INFO_URI") {
                    config = config.with_user_info_uri(parse_url("DAMSO_KAKAO_USER_INFO_URI", raw)?);
                }
                Some(config)
            }
            None => None,
        };

        Ok(Self {
            token,
            session,
            cookies,
            frontend_url,
            kakao,
        })
    }
}

fn required(name: &'static str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::Configuration(format!("{name} is required")))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn duration_secs(name: &str, default: u64) -> Result<Duration> {
    match optional(name) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|err| Error::Configuration(format!("{name}: {err}"))),
        None => Ok(Duration::from_secs(default)),
    }
}

fn flag(name: &str, default: bool) -> bool {
    match optional(name).as_deref() {
        Some("1") | Some("true") | Some("yes") => true,
        Some(_) => false,
        None => default,
    }
}

fn parse_url(name: &str, raw: String) -> Result<Url> {
    raw.parse()
        .map_err(|err| Error::Configuration(format!("{name}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_parsing_and_defaults() {
        std::env::set_var("DAMSO_TEST_DURATION_GOOD", "90");
        std::env::set_var("DAMSO_TEST_DURATION_BAD", "ninety");

        assert_eq!(
            duration_secs("DAMSO_TEST_DURATION_GOOD", 5).unwrap(),
            Duration::from_secs(90)
        );
        assert_eq!(
            duration_secs("DAMSO_TEST_DURATION_UNSET", 5).unwrap(),
            Duration::from_secs(5)
        );
        assert!(duration_secs("DAMSO_TEST_DURATION_BAD", 5).is_err());
    }

    #[test]
    fn test_flag_parsing() {
        std::env::set_var("DAMSO_TEST_FLAG_ON", "true");
        std::env::set_var("DAMSO_TEST_FLAG_OFF", "0");

        assert!(flag("DAMSO_TEST_FLAG_ON", false));
        assert!(!flag("DAMSO_TEST_FLAG_OFF", true));
        assert!(flag("DAMSO_TEST_FLAG_UNSET", true));
        assert!(!flag("DAMSO_TEST_FLAG_UNSET", false));
    }

    // Single test so concurrent tests never race on the shared DAMSO_* names.
    #[test]
    fn test_from_env_end_to_end() {
        for name in [
            "DAMSO_TOKEN_SECRET",
            "DAMSO_ACCESS_TOKEN_TTL_SECS",
            "DAMSO_COOKIE_KEY",
            "DAMSO_KAKAO_CLIENT_ID",
            "DAMSO_KAKAO_CLIENT_SECRET",
            "DAMSO_KAKAO_REDIRECT_URI",
        ] {
            std::env::remove_var(name);
        }

        let err = IdentityConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("DAMSO_TOKEN_SECRET"));

        std::env::set_var(
            "DAMSO_TOKEN_SECRET",
            "an-hmac-secret-of-at-least-32-bytes!",
        );
        let config = IdentityConfig::from_env().unwrap();
        assert_eq!(config.token.access_ttl, Duration::from_secs(1800));
        assert_eq!(config.token.refresh_ttl, Duration::from_secs(14 * 24 * 3600));
        assert_eq!(config.session.ttl, Duration::from_secs(1800));
        assert!(!config.cookies.secure);
        assert_eq!(config.cookies.refresh_path, "/");
        assert_eq!(config.frontend_url, "http://localhost:3000");
        assert!(config.kakao.is_none());

        // Kakao switches on only with the full trio.
        std::env::set_var("DAMSO_KAKAO_CLIENT_ID", "kakao-client");
        let err = IdentityConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("DAMSO_KAKAO_CLIENT_SECRET"));

        std::env::set_var("DAMSO_KAKAO_CLIENT_SECRET", "kakao-secret");
        std::env::set_var(
            "DAMSO_KAKAO_REDIRECT_URI",
            "https://api.damso.app/api/oauth/kakao/callback",
        );
        std::env::set_var("DAMSO_ACCESS_TOKEN_TTL_SECS", "600");
        let config = IdentityConfig::from_env().unwrap();
        assert_eq!(config.token.access_ttl, Duration::from_secs(600));
        assert!(config.kakao.is_some());

        // Redacted debug output keeps the secret out of logs.
        let shown = format!("{:?}", config.token);
        assert!(!shown.contains("an-hmac-secret"));

        for name in [
            "DAMSO_TOKEN_SECRET",
            "DAMSO_ACCESS_TOKEN_TTL_SECS",
            "DAMSO_KAKAO_CLIENT_ID",
            "DAMSO_KAKAO_CLIENT_SECRET",
            "DAMSO_KAKAO_REDIRECT_URI",
        ] {
            std::env::remove_var(name);
        }
    }
}
