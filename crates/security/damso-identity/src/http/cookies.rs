//! Cookie construction for the refresh token and the login session
//!
//! The refresh token travels only in an `HttpOnly` cookie, never in a JSON
//! body. The login-session cookie is encrypted client-side state holding
//! nothing but a random session id.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::config::CookieConfig;

pub(crate) const REFRESH_COOKIE_NAME: &str = "refresh_token";
pub(crate) const SESSION_COOKIE_NAME: &str = "damso_session";

/// Cookie carrying the refresh token, scoped to the configured path
pub(super) fn refresh_cookie(
    token: &str,
    max_age: Duration,
    config: &CookieConfig,
) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, token.to_string()))
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Lax)
        .path(config.refresh_path.clone())
        .max_age(max_age)
        .build()
}

/// Removal cookie for the refresh token
pub(super) fn clear_refresh_cookie(config: &CookieConfig) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, ""))
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Lax)
        .path(config.refresh_path.clone())
        .max_age(Duration::ZERO)
        .build()
}

/// Login-session cookie; the value goes through the private jar
pub(super) fn session_cookie(
    session_id: &str,
    ttl: std::time::Duration,
    secure: bool,
) -> Cookie<'static> {
    let max_age = Duration::try_from(ttl).unwrap_or(Duration::MAX);
    Cookie::build((SESSION_COOKIE_NAME, session_id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}
