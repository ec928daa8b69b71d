//! Password hashing and verification using Argon2id

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use std::sync::{Arc, OnceLock};
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::warn;

/// Plaintext behind the decoy hash checked for unknown principals
const DECOY_PASSWORD: &str = "decoy-password-for-unknown-principals";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to hash password: {0}")]
    Hash(String),
}

/// Salted, deliberately slow one-way password hashing.
///
/// Parameters are fixed at m = 19 MiB, t = 2, p = 1. Both operations are
/// CPU-bound and should run on the blocking pool when called from a request.
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
    decoy: Arc<OnceLock<String>>,
    /// Argon2 verifications actually run
    #[cfg(test)]
    pub(crate) verifications: Arc<AtomicUsize>,
}

impl Default for PasswordService {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordService {
    pub fn new() -> Self {
        Self::with_argon2(Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            Params::default(),
        ))
    }

    #[cfg(test)]
    pub(crate) fn with_params(params: Params) -> Self {
        Self::with_argon2(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn with_argon2(argon2: Argon2<'static>) -> Self {
        Self {
            argon2,
            decoy: Arc::new(OnceLock::new()),
            #[cfg(test)]
            verifications: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Hash a password into a PHC string safe for storage
    pub fn hash(&self, plaintext: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hash(e.to_string()))?
            .to_string();

        Ok(hash)
    }

    /// Check a password against a stored PHC string.
    ///
    /// Never errors: a mismatch or an unparseable stored hash is `false`.
    pub fn verify(&self, plaintext: &str, hashed: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hashed) {
            Ok(parsed_hash) => parsed_hash,
            Err(e) => {
                warn!("Stored password hash is malformed: {}", e);
                return false;
            }
        };

        #[cfg(test)]
        self.verifications.fetch_add(1, Ordering::SeqCst);

        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Do the work of [`verify`](Self::verify) for a principal that does not
    /// exist, so an unknown account costs as much as a wrong password.
    ///
    /// Always `false`. The decoy hash is built once, with this service's
    /// parameters.
    pub fn verify_decoy(&self, plaintext: &str) -> bool {
        let decoy = self.decoy.get_or_init(|| {
            self.hash(DECOY_PASSWORD).unwrap_or_else(|e| {
                warn!("Failed to build decoy password hash: {}", e);
                String::new()
            })
        });

        let _ = self.verify(plaintext, decoy);
        false
    }
}
