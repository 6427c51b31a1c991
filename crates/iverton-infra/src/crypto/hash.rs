//! Argon2id password hashing.
//!
//! Implements the `PasswordHasher` trait from `iverton-core` with the `argon2`
//! crate. Hashes are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`)
//! with a random 16-byte salt per password; verification re-derives with the
//! parameters embedded in the string and compares in constant time.

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::Rng;

use iverton_core::auth::directory::PasswordHasher;
use iverton_types::error::AuthError;

const SALT_LEN: usize = 16;

/// Argon2id implementation of `PasswordHasher`.
///
/// Defaults to the OWASP parameters: 19 MiB memory, 2 iterations,
/// 1 degree of parallelism.
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    pub fn new() -> Self {
        Self::with_params(Params::default())
    }

    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        let mut bytes = [0u8; SALT_LEN];
        rand::rng().fill(&mut bytes[..]);
        let salt = SaltString::encode_b64(&bytes).map_err(|_| AuthError::Hashing)?;

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| AuthError::Hashing)
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            tracing::debug!("stored password hash is not a PHC string");
            return false;
        };
        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}
