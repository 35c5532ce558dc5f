//! Password hashing behind a trait seam
//!
//! The authentication service only sees the [`PasswordHasher`] capability;
//! [`Argon2PasswordHasher`] is the shipped implementation (Argon2id with the
//! crate's recommended parameters, per-password random salt, PHC string
//! output).

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Argon2,
};

use crate::error::{Error, Result};

/// Hashing capability consumed by the authentication service
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password into a self-describing digest string
    fn hash(&self, plain: &str) -> Result<String>;

    /// Check a plaintext password against a stored digest
    ///
    /// A malformed or foreign digest verifies `false`; it never errors.
    fn verify(&self, plain: &str, digest: &str) -> bool;
}

/// Argon2id password hasher
#[derive(Default)]
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    /// New hasher with the default Argon2id parameters
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, plain: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plain.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::Crypto(format!("password hashing failed: {e}")))
    }

    fn verify(&self, plain: &str, digest: &str) -> bool {
        match PasswordHash::new(digest) {
            Ok(parsed) => self
                .argon2
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}
