use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

/// Newtype for a plaintext password; its Debug output is redacted.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

/// Newtype for a password digest in PHC string format.
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum HashError {
    #[error("failed to hash password: {0}")]
    Hash(String),
}

/// Adaptive, salted credential hashing.
///
/// A trait so the session manager can be exercised with an instrumented
/// hasher; production code uses [`Argon2Hasher`].
pub trait CredentialHasher: Send + Sync {
    /// Hash with a per-call random salt embedded in the digest.
    fn hash(&self, password: &Password) -> Result<PasswordHashString, HashError>;

    /// Verify a password against a stored digest. A mismatch is `false`,
    /// never an error; a malformed digest also verifies as `false`.
    fn verify(&self, password: &Password, digest: &PasswordHashString) -> bool;
}

/// Argon2id with the crate's secure defaults.
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &Password) -> Result<PasswordHashString, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_str().as_bytes(), &salt)
            .map(|hash| PasswordHashString::new(hash.to_string()))
            .map_err(|e| HashError::Hash(e.to_string()))
    }

    fn verify(&self, password: &Password, digest: &PasswordHashString) -> bool {
        let parsed = match PasswordHash::new(digest.as_str()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "stored password digest is malformed");
                return false;
            }
        };
        Argon2::default()
            .verify_password(password.as_str().as_bytes(), &parsed)
            .is_ok()
    }
}
