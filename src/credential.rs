use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

///
/// Turns plaintext passwords into stored credentials and checks them back.
/// Route handlers only ever see this capability, never the hashing scheme.
pub trait CredentialHasher: Send + Sync {
    ///
    /// Produce the credential to store for a plaintext password
    fn hash(&self, plaintext: &str) -> Result<String>;

    ///
    /// Whether the plaintext matches a stored credential.
    /// A credential that cannot be parsed never matches.
    fn verify(&self, plaintext: &str, credential: &str) -> bool;
}

///
/// Salted Argon2id hashes in the PHC string format
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow!("Failed to hash a password: {}", e))
    }

    fn verify(&self, plaintext: &str, credential: &str) -> bool {
        match PasswordHash::new(credential) {
            Ok(parsed) => Argon2::default()
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}
