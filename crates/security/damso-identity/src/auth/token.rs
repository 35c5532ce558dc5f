//! Compact signed tokens for access and refresh credentials
//!
//! Wire format is the three-segment compact form
//! `base64url(header).base64url(claims).base64url(mac)` without padding,
//! signed with HMAC-SHA256 under a single symmetric secret. Verification
//! fails closed: any structural defect, signature mismatch, or expiry is a
//! typed failure, never a partial success.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{AuthError, Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Minimum secret length; shorter keys weaken the MAC below its digest size
const MIN_SECRET_LEN: usize = 32;

const ALGORITHM: &str = "HS256";
const TOKEN_KIND: &str = "JWT";

/// Whether a token proves authentication or redeems a new access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived, stateless credential
    Access,
    /// Long-lived credential backed by a persisted record
    Refresh,
}

impl TokenType {
    /// Stable string form used in claims and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            typ: TOKEN_KIND.to_string(),
        }
    }
}

/// Claims carried by every token issued by this subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the principal's email
    pub sub: String,
    /// Internal principal id; present on access tokens only
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    /// Access or refresh
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Issued-at, seconds since the epoch
    pub iat: i64,
    /// Expiry, seconds since the epoch
    pub exp: i64,
    /// Random token id; two tokens minted in the same second stay distinct
    #[serde(default)]
    pub jti: String,
}

/// Random 128-bit token id in unpadded base64url
pub(crate) fn generate_jti() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Signs and verifies compact tokens under one symmetric secret
pub struct TokenCodec {
    secret: Zeroizing<Vec<u8>>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    /// Create a codec from a secret and the configured access/refresh TTLs
    ///
    /// Fails with a configuration error if the secret is shorter than 32
    /// bytes or a TTL does not fit the claim arithmetic.
    pub fn new(
        secret: impl Into<Vec<u8>>,
        access_ttl: std::time::Duration,
        refresh_ttl: std::time::Duration,
    ) -> Result<Self> {
        let secret = Zeroizing::new(secret.into());
        if secret.len() < MIN_SECRET_LEN {
            return Err(Error::Configuration(format!(
                "token secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        let access_ttl = Duration::from_std(access_ttl)
            .map_err(|e| Error::Configuration(format!("access token TTL out of range: {e}")))?;
        let refresh_ttl = Duration::from_std(refresh_ttl)
            .map_err(|e| Error::Configuration(format!("refresh token TTL out of range: {e}")))?;
        Ok(Self {
            secret,
            access_ttl,
            refresh_ttl,
        })
    }

    /// Configured access-token lifetime
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Configured refresh-token lifetime
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issue an access token for a principal
    pub fn issue_access(&self, email: &str, user_id: i64) -> Result<String> {
        let now = Utc::now();
        self.issue(&TokenClaims {
            sub: email.to_string(),
            user_id: Some(user_id),
            token_type: TokenType::Access,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
            jti: generate_jti(),
        })
    }

    /// Issue a refresh token for a principal
    pub fn issue_refresh(&self, email: &str) -> Result<String> {
        let now = Utc::now();
        self.issue(&TokenClaims {
            sub: email.to_string(),
            user_id: None,
            token_type: TokenType::Refresh,
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
            jti: generate_jti(),
        })
    }

    /// Sign arbitrary claims into the compact wire form
    pub fn issue(&self, claims: &TokenClaims) -> Result<String> {
        let header = serde_json::to_vec(&TokenHeader::hs256())?;
        let payload = serde_json::to_vec(claims)?;

        let mut token = String::new();
        token.push_str(&URL_SAFE_NO_PAD.encode(header));
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(payload));

        let mac = self.sign(token.as_bytes())?;
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(mac));
        Ok(token)
    }

    /// Verify a token and return its claims
    ///
    /// Signature is checked before anything in the payload is trusted;
    /// expiry is checked only once the signature holds, so `TokenExpired`
    /// always implies an authentic token.
    pub fn verify(&self, token: &str) -> Result<TokenClaims> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(AuthError::TokenInvalid("malformed token structure".to_string()).into());
        }

        let signature = URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|_| AuthError::TokenInvalid("malformed signature encoding".to_string()))?;

        let signed_len = parts[0].len() + 1 + parts[1].len();
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::Crypto(format!("MAC init failed: {e}")))?;
        mac.update(token[..signed_len].as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::TokenInvalid("signature mismatch".to_string()))?;

        let header_bytes = URL_SAFE_NO_PAD
            .decode(parts[0])
            .map_err(|_| AuthError::TokenInvalid("malformed header encoding".to_string()))?;
        let header: TokenHeader = serde_json::from_slice(&header_bytes)
            .map_err(|_| AuthError::TokenInvalid("malformed header".to_string()))?;
        if header.alg != ALGORITHM {
            return Err(AuthError::TokenInvalid(format!(
                "unsupported algorithm: {}",
                header.alg
            ))
            .into());
        }

        let payload = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|_| AuthError::TokenInvalid("malformed claims encoding".to_string()))?;
        let claims: TokenClaims = serde_json::from_slice(&payload)
            .map_err(|_| AuthError::TokenInvalid("malformed claims".to_string()))?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::TokenExpired.into());
        }

        Ok(claims)
    }

    /// Verify a token and additionally require a specific token type
    pub fn verify_typed(&self, token: &str, expected: TokenType) -> Result<TokenClaims> {
        let claims = self.verify(token)?;
        if claims.token_type != expected {
            return Err(AuthError::TokenInvalid(format!(
                "expected {expected} token, got {}",
                claims.token_type
            ))
            .into());
        }
        Ok(claims)
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::Crypto(format!("MAC init failed: {e}")))?;
        mac.update(message);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}
