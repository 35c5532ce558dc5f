//! # Damso Identity
//!
//! Token lifecycle, request authentication, and Kakao social login for the
//! Damso backend.
//!
//! ## Features
//!
//! - **Password login**: Argon2id hashing behind a trait seam, with uniform
//!   credential errors that never reveal whether an email exists
//! - **Token lifecycle**: HMAC-signed access/refresh pairs; refresh validity
//!   lives in a stored record, so revocation works without key rotation
//! - **Request authentication**: bearer-token middleware producing a typed,
//!   request-scoped security context
//! - **Kakao login**: the full authorization-code flow, with the login
//!   result staged server-side and never placed in a redirect URL
//! - **Storage**: trait seams for principals, refresh tokens, and login
//!   sessions, each with an in-memory backend
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use damso_identity::auth::{Argon2PasswordHasher, AuthenticationService, TokenCodec};
//! use damso_identity::storage::{InMemoryPrincipalStore, InMemoryRefreshTokenStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let codec = Arc::new(TokenCodec::new(
//!         *b"an-hmac-secret-of-at-least-32-bytes!",
//!         Duration::from_secs(30 * 60),
//!         Duration::from_secs(14 * 24 * 3600),
//!     )?);
//!     let service = AuthenticationService::new(
//!         Arc::new(InMemoryPrincipalStore::new()),
//!         Arc::new(InMemoryRefreshTokenStore::new()),
//!         codec,
//!         Arc::new(Argon2PasswordHasher::new()),
//!     );
//!
//!     // Sign up, log in, and renew the access token.
//!     let principal = service.signup("user@damso.app", "correct horse", "user").await?;
//!     assert_eq!(principal.email, "user@damso.app");
//!
//!     let (_, pair) = service.login("user@damso.app", "correct horse").await?;
//!     let renewed = service.refresh(&pair.refresh_token).await?;
//!     assert_ne!(renewed.access_token, pair.access_token);
//!     assert_eq!(renewed.refresh_token, pair.refresh_token);
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(rust_2018_idioms)]

/// Authentication: passwords, tokens, and per-request verification
pub mod auth;

/// Environment-driven configuration
pub mod config;

/// Error types for the crate
pub mod error;

/// Axum router, extractors, and cookie handling
pub mod http;

/// Social login against external providers
pub mod oauth;

/// Principals, roles, and identity providers
pub mod principal;

/// Login-session storage backing the OAuth hand-off
pub mod session;

/// Storage traits and in-memory backends
pub mod storage;

// Re-export commonly used types
pub use auth::{
    AuthenticationService, RequestAuthenticator, SecurityContext, TokenCodec, TokenPair,
};
pub use config::IdentityConfig;
pub use error::{AuthError, Error, Result};
pub use http::{api_router, AppState};
pub use principal::{NewPrincipal, Principal, Provider, Role};
