//! Request authentication middleware and the [`Authenticated`] extractor
//!
//! The middleware runs once per request: it authenticates any bearer token,
//! attaches the resulting [`SecurityContext`] to request extensions, and
//! lets anonymous requests through untouched. Handlers that need a caller
//! take [`Authenticated`] and get a `401` rejection when none is attached.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::request::{AuthOutcome, SecurityContext};
use crate::http::state::AppState;
use crate::http::ApiError;
use crate::session::LoginSessionStore;
use crate::storage::{PrincipalStore, RefreshTokenStore};

/// Middleware authenticating the `Authorization` header, if present
///
/// Requests with a bad token are rejected here with the envelope error;
/// requests without one proceed anonymously.
pub async fn authenticate_request<U, R, L>(
    State(state): State<AppState<U, R, L>>,
    mut request: Request,
    next: Next,
) -> Response
where
    U: PrincipalStore + 'static,
    R: RefreshTokenStore + 'static,
    L: LoginSessionStore + 'static,
{
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    match state.authenticator.authenticate(header.as_deref()).await {
        Ok(AuthOutcome::Authenticated(context)) => {
            request.extensions_mut().insert(context);
        }
        Ok(AuthOutcome::Anonymous) => {}
        Err(err) => return ApiError::from(err).into_response(),
    }
    next.run(request).await
}

/// Extractor for handlers that require an authenticated caller
#[derive(Debug, Clone)]
pub struct Authenticated(pub SecurityContext);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SecurityContext>()
            .cloned()
            .map(Authenticated)
            .ok_or_else(|| ApiError::unauthorized("authentication required"))
    }
}
