//! HTTP surface: the `/api` router, request extractors, and cookie plumbing
//!
//! Every JSON endpoint answers with the same envelope:
//!
//! ```json
//! { "success": true, "message": "ok", "data": { ... } }
//! ```
//!
//! Errors keep the envelope with `success: false` and `data: null`; the
//! token and session family additionally carries a stable `code` so clients
//! can tell an expired access token from a rejected one.

pub mod cookies;
pub mod extract;
pub mod routes;
pub mod state;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::error::{AuthError, Error};

pub use extract::Authenticated;
pub use routes::api_router;
pub use state::AppState;

/// Uniform JSON envelope for API responses
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful response with a payload
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            code: None,
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Successful response without a payload
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            code: None,
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Error shaped for the wire: status, client message, optional stable code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: Option<&'static str>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
        }
    }

    fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    /// 401 without a code, for requests that need an authenticated caller
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Auth(auth) => {
                let message = auth.to_string();
                match auth {
                    AuthError::InvalidCredential => {
                        Self::new(StatusCode::UNAUTHORIZED, message)
                    }
                    AuthError::AccountDisabled => Self::new(StatusCode::FORBIDDEN, message),
                    AuthError::DuplicateEmail | AuthError::MissingProviderEmail => {
                        Self::new(StatusCode::BAD_REQUEST, message)
                    }
                    AuthError::TokenInvalid(_) => {
                        Self::new(StatusCode::UNAUTHORIZED, "invalid token")
                            .with_code("token_invalid")
                    }
                    AuthError::TokenExpired => {
                        Self::new(StatusCode::UNAUTHORIZED, message).with_code("token_expired")
                    }
                    AuthError::AccountMismatch => {
                        Self::new(StatusCode::UNAUTHORIZED, message).with_code("account_mismatch")
                    }
                    AuthError::NoSession => {
                        Self::new(StatusCode::UNAUTHORIZED, message).with_code("no_session")
                    }
                    AuthError::NoPendingLogin => {
                        Self::new(StatusCode::UNAUTHORIZED, message).with_code("no_pending_login")
                    }
                }
            }
            Error::Validation(message) => Self::new(StatusCode::BAD_REQUEST, message),
            Error::NotFound(what) => {
                Self::new(StatusCode::NOT_FOUND, format!("{what} not found"))
            }
            other => {
                error!(error = %other, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            message: self.message,
            code: self.code,
            data: None,
        };
        (self.status, Json(body)).into_response()
    }
}
