//! Social login against external identity providers
//!
//! [`kakao`] speaks the provider's wire protocol; [`coordinator`] drives the
//! whole browser flow: authorization redirect, callback exchange, account
//! upsert, and the staged hand-off that gets tokens to the front-end without
//! putting them in a redirect URL.

pub mod coordinator;
pub mod kakao;

use serde::{Deserialize, Serialize};

use crate::principal::Provider;

pub use coordinator::OAuthCoordinator;
pub use kakao::{KakaoClient, KakaoConfig};

/// Provider-neutral view of an external account profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Which provider vouched for this profile
    pub provider: Provider,
    /// Provider-scoped stable account id
    pub provider_id: String,
    /// Email, when the provider shares one
    pub email: Option<String>,
    /// Display name, when shared
    pub nickname: Option<String>,
    /// Avatar URL, when shared
    pub profile_image: Option<String>,
}
