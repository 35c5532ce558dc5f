//! Authentication: credentials, tokens, and per-request verification
//!
//! - [`token`]: signed compact tokens and the [`TokenCodec`]
//! - [`password`]: the [`PasswordHasher`] seam and its Argon2id default
//! - [`service`]: account and token lifecycle ([`AuthenticationService`])
//! - [`request`]: bearer-header authentication ([`RequestAuthenticator`])

pub mod password;
pub mod request;
pub mod service;
pub mod token;

pub use password::{Argon2PasswordHasher, PasswordHasher};
pub use request::{AuthOutcome, RequestAuthenticator, SecurityContext};
pub use service::{normalize_email, AuthenticationService, TokenPair};
pub use token::{TokenClaims, TokenCodec, TokenType};
