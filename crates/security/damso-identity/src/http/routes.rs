//! The `/api` routes

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use axum_extra::extract::{CookieJar, PrivateCookieJar};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use validator::Validate;

use crate::error::{AuthError, Error};
use crate::http::cookies;
use crate::http::extract::{authenticate_request, Authenticated};
use crate::http::state::{AppState, OAuthState};
use crate::http::{ApiError, ApiResponse};
use crate::principal::{Principal, Provider, Role};
use crate::session::{generate_session_id, LoginSessionStore};
use crate::storage::{PrincipalStore, RefreshTokenStore};

/// Build the full `/api` router over the given state
///
/// Kakao routes are registered only when a provider is configured. The
/// bearer-token middleware wraps everything, so any route can observe the
/// caller's [`crate::auth::SecurityContext`].
pub fn api_router<U, R, L>(state: AppState<U, R, L>) -> Router
where
    U: PrincipalStore + 'static,
    R: RefreshTokenStore + 'static,
    L: LoginSessionStore + 'static,
{
    let mut router = Router::new()
        .route("/api/health", get(health))
        .route("/api/signup", post(signup::<U, R, L>))
        .route("/api/login", post(login::<U, R, L>))
        .route("/api/refresh", post(refresh::<U, R, L>))
        .route("/api/logout", post(logout::<U, R, L>))
        .route("/api/me", get(me))
        .with_state(state.clone());

    if let Some(oauth_state) = state.oauth_state() {
        router = router.merge(oauth_router(oauth_state));
    }

    router.layer(middleware::from_fn_with_state(
        state,
        authenticate_request::<U, R, L>,
    ))
}

fn oauth_router<U, R, L>(state: OAuthState<U, R, L>) -> Router
where
    U: PrincipalStore + 'static,
    R: RefreshTokenStore + 'static,
    L: LoginSessionStore + 'static,
{
    Router::new()
        .route("/api/oauth/kakao/login", get(kakao_login::<U, R, L>))
        .route("/api/oauth/kakao/callback", get(kakao_callback::<U, R, L>))
        .route(
            "/api/oauth/kakao/exchange-token",
            post(kakao_exchange::<U, R, L>),
        )
        .with_state(state)
}

// ── Request / response bodies ──────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "email address is not valid"))]
    pub email: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 30, message = "nickname must be between 1 and 30 characters"))]
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public view of a principal; never carries the password hash
#[derive(Debug, Serialize)]
pub struct PrincipalResponse {
    pub id: i64,
    pub email: String,
    pub nickname: String,
    pub role: Role,
    pub provider: Provider,
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<Principal> for PrincipalResponse {
    fn from(principal: Principal) -> Self {
        Self {
            id: principal.id,
            email: principal.email,
            nickname: principal.nickname,
            role: principal.role,
            provider: principal.provider,
            profile_image: principal.profile_image,
            created_at: principal.created_at,
            last_login_at: principal.last_login_at,
        }
    }
}

/// Access token payload; the refresh token only ever travels as a cookie
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub principal: PrincipalResponse,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub revoked: usize,
}

// ── Health ─────────────────────────────────────────────────────────

async fn health() -> ApiResponse<()> {
    ApiResponse::message("healthy")
}

// ── Signup / login ─────────────────────────────────────────────────

async fn signup<U, R, L>(
    State(state): State<AppState<U, R, L>>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, ApiResponse<PrincipalResponse>), ApiError>
where
    U: PrincipalStore,
    R: RefreshTokenStore,
    L: LoginSessionStore,
{
    payload
        .validate()
        .map_err(|err| Error::Validation(err.to_string()))?;

    let principal = state
        .auth
        .signup(&payload.email, &payload.password, &payload.nickname)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("account created", principal.into()),
    ))
}

async fn login<U, R, L>(
    State(state): State<AppState<U, R, L>>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<LoginResponse>), ApiError>
where
    U: PrincipalStore,
    R: RefreshTokenStore,
    L: LoginSessionStore,
{
    let (principal, pair) = state.auth.login(&payload.email, &payload.password).await?;

    let codec = state.auth.codec();
    let max_age = time::Duration::seconds(codec.refresh_ttl().num_seconds());
    let jar = jar.add(cookies::refresh_cookie(
        &pair.refresh_token,
        max_age,
        &state.cookies,
    ));

    Ok((
        jar,
        ApiResponse::ok(
            "login successful",
            LoginResponse {
                access_token: pair.access_token,
                token_type: "Bearer",
                expires_in: codec.access_ttl().num_seconds(),
                principal: principal.into(),
            },
        ),
    ))
}

// ── Token lifecycle ────────────────────────────────────────────────

async fn refresh<U, R, L>(
    State(state): State<AppState<U, R, L>>,
    jar: CookieJar,
) -> Result<ApiResponse<TokenResponse>, ApiError>
where
    U: PrincipalStore,
    R: RefreshTokenStore,
    L: LoginSessionStore,
{
    let Some(cookie) = jar.get(cookies::REFRESH_COOKIE_NAME) else {
        return Err(ApiError::from(Error::Auth(AuthError::TokenInvalid(
            "refresh cookie missing".to_string(),
        ))));
    };

    let pair = state.auth.refresh(cookie.value()).await?;
    Ok(ApiResponse::ok(
        "token refreshed",
        TokenResponse {
            access_token: pair.access_token,
            token_type: "Bearer",
            expires_in: state.auth.codec().access_ttl().num_seconds(),
        },
    ))
}

async fn logout<U, R, L>(
    State(state): State<AppState<U, R, L>>,
    Authenticated(ctx): Authenticated,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<LogoutResponse>), ApiError>
where
    U: PrincipalStore,
    R: RefreshTokenStore,
    L: LoginSessionStore,
{
    let revoked = state
        .auth
        .revoke_all_for_principal(&ctx.principal.email)
        .await?;
    let jar = jar.add(cookies::clear_refresh_cookie(&state.cookies));
    Ok((jar, ApiResponse::ok("logged out", LogoutResponse { revoked })))
}

async fn me(Authenticated(ctx): Authenticated) -> ApiResponse<PrincipalResponse> {
    ApiResponse::ok("ok", ctx.principal.into())
}

// ── Kakao login ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct KakaoLoginParams {
    pub redirect_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KakaoCallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

async fn kakao_login<U, R, L>(
    State(state): State<OAuthState<U, R, L>>,
    jar: PrivateCookieJar,
    Query(params): Query<KakaoLoginParams>,
) -> Result<(PrivateCookieJar, Redirect), ApiError>
where
    U: PrincipalStore,
    R: RefreshTokenStore,
    L: LoginSessionStore,
{
    let session_id = session_id_from(&jar).unwrap_or_else(generate_session_id);
    let authorize = state
        .oauth
        .begin_login(&session_id, params.redirect_url)
        .await?;

    let jar = jar.add(cookies::session_cookie(
        &session_id,
        state.session_ttl,
        state.cookies.secure,
    ));
    Ok((jar, Redirect::to(&authorize)))
}

async fn kakao_callback<U, R, L>(
    State(state): State<OAuthState<U, R, L>>,
    jar: PrivateCookieJar,
    Query(params): Query<KakaoCallbackParams>,
) -> (PrivateCookieJar, Redirect)
where
    U: PrincipalStore,
    R: RefreshTokenStore,
    L: LoginSessionStore,
{
    let session_id = session_id_from(&jar).unwrap_or_else(generate_session_id);

    let target = if let Some(error) = params.error {
        let detail = params.error_description.unwrap_or(error);
        warn!(detail = %detail, "provider reported an authorization error");
        state.oauth.failure_redirect(&session_id, &detail).await
    } else if let Some(code) = params.code.as_deref() {
        state.oauth.handle_callback(&session_id, code).await
    } else {
        state
            .oauth
            .failure_redirect(&session_id, "missing authorization code")
            .await
    };

    let jar = jar.add(cookies::session_cookie(
        &session_id,
        state.session_ttl,
        state.cookies.secure,
    ));
    (jar, Redirect::to(&target))
}

async fn kakao_exchange<U, R, L>(
    State(state): State<OAuthState<U, R, L>>,
    private: PrivateCookieJar,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<LoginResponse>), ApiError>
where
    U: PrincipalStore,
    R: RefreshTokenStore,
    L: LoginSessionStore,
{
    let Some(session_id) = session_id_from(&private) else {
        return Err(ApiError::from(Error::Auth(AuthError::NoSession)));
    };

    let pending = state.oauth.exchange_pending_login(&session_id).await?;

    let max_age = time::Duration::seconds(state.codec.refresh_ttl().num_seconds());
    let jar = jar.add(cookies::refresh_cookie(
        &pending.refresh_token,
        max_age,
        &state.cookies,
    ));
    Ok((
        jar,
        ApiResponse::ok(
            "login completed",
            LoginResponse {
                access_token: pending.access_token,
                token_type: "Bearer",
                expires_in: state.codec.access_ttl().num_seconds(),
                principal: pending.principal.into(),
            },
        ),
    ))
}

// ── Helpers ────────────────────────────────────────────────────────

fn session_id_from(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(cookies::SESSION_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
}
