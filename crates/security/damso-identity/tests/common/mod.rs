#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::SET_COOKIE;
use axum::http::Response;
use axum_extra::extract::cookie::Key;
use http_body_util::BodyExt;
use zeroize::Zeroizing;

use damso_identity::auth::{Argon2PasswordHasher, AuthenticationService, TokenCodec};
use damso_identity::config::{CookieConfig, IdentityConfig, TokenConfig};
use damso_identity::oauth::KakaoConfig;
use damso_identity::session::{InMemoryLoginSessionStore, SessionConfig};
use damso_identity::storage::{InMemoryPrincipalStore, InMemoryRefreshTokenStore};

pub const TEST_SECRET: &[u8; 36] = b"an-hmac-secret-of-at-least-32-bytes!";
pub const ACCESS_TTL: Duration = Duration::from_secs(30 * 60);
pub const REFRESH_TTL: Duration = Duration::from_secs(14 * 24 * 3600);

pub type TestService = AuthenticationService<InMemoryPrincipalStore, InMemoryRefreshTokenStore>;

/// In-memory stores plus the service wired over them
pub struct Backend {
    pub principals: Arc<InMemoryPrincipalStore>,
    pub refresh_tokens: Arc<InMemoryRefreshTokenStore>,
    pub sessions: Arc<InMemoryLoginSessionStore>,
    pub service: Arc<TestService>,
}

pub fn backend() -> Backend {
    backend_with(ACCESS_TTL, REFRESH_TTL)
}

pub fn backend_with(access_ttl: Duration, refresh_ttl: Duration) -> Backend {
    init_tracing();
    let codec = Arc::new(
        TokenCodec::new(TEST_SECRET.to_vec(), access_ttl, refresh_ttl)
            .expect("test codec"),
    );
    let principals = Arc::new(InMemoryPrincipalStore::new());
    let refresh_tokens = Arc::new(InMemoryRefreshTokenStore::new());
    let sessions = Arc::new(InMemoryLoginSessionStore::default());
    let service = Arc::new(AuthenticationService::new(
        Arc::clone(&principals),
        Arc::clone(&refresh_tokens),
        codec,
        Arc::new(Argon2PasswordHasher::new()),
    ));
    Backend {
        principals,
        refresh_tokens,
        sessions,
        service,
    }
}

/// Configuration for the HTTP router tests
pub fn identity_config(access_ttl: Duration, kakao: Option<KakaoConfig>) -> IdentityConfig {
    IdentityConfig {
        token: TokenConfig {
            secret: Zeroizing::new(TEST_SECRET.to_vec()),
            access_ttl,
            refresh_ttl: REFRESH_TTL,
        },
        session: SessionConfig::default(),
        cookies: CookieConfig {
            key: Key::generate(),
            secure: false,
            refresh_path: "/".to_string(),
        },
        frontend_url: "https://app.damso.app".to_string(),
        kakao,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Value of the named cookie from a response's `Set-Cookie` headers
pub fn set_cookie_value<T>(response: &Response<T>, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .find(|raw| raw.starts_with(&prefix))
        .map(|raw| {
            raw[prefix.len()..]
                .split(';')
                .next()
                .unwrap_or_default()
                .to_string()
        })
}

/// Full `Set-Cookie` line for the named cookie, attributes included
pub fn set_cookie_line<T>(response: &Response<T>, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .find(|raw| raw.starts_with(&prefix))
        .map(str::to_string)
}

/// Collect a response body into JSON
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}
