//! Lookup and verification hashing for API keys
//!
//! The lookup hash is a keyed HMAC, cheap enough to compute on every request
//! and deterministic so it can index the store. The verification hash is a
//! salted Argon2id PHC string over `plaintext || pepper`.

use std::fmt;
use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::domain::api_key::{KeyAlgorithm, KeyHashes};
use crate::domain::DomainError;

type HmacSha256 = Hmac<Sha256>;

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Argon2Settings {
    /// Memory cost in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Argon2Settings {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl Argon2Settings {
    /// Minimal cost, for tests only
    pub fn fast() -> Self {
        Self {
            memory_kib: Params::MIN_M_COST.max(64),
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Derives both hashes of a plaintext key under the server pepper
#[derive(Clone)]
pub struct KeyHasher {
    pepper: String,
    argon2: Argon2<'static>,
}

impl fmt::Debug for KeyHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHasher")
            .field("pepper", &"[hidden]")
            .finish()
    }
}

impl KeyHasher {
    pub fn new(pepper: impl Into<String>, settings: Argon2Settings) -> Result<Self, DomainError> {
        let pepper = pepper.into();

        if pepper.is_empty() {
            return Err(DomainError::configuration("API key pepper must not be empty"));
        }

        let params = Params::new(
            settings.memory_kib,
            settings.iterations,
            settings.parallelism,
            None,
        )
        .map_err(|e| DomainError::configuration(format!("Invalid Argon2 parameters: {}", e)))?;

        Ok(Self {
            pepper,
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// HMAC-SHA256(pepper, plaintext), hex encoded
    pub fn lookup_hash(&self, plaintext: &str) -> Result<String, DomainError> {
        let mut mac = HmacSha256::new_from_slice(self.pepper.as_bytes())
            .map_err(|e| DomainError::internal(format!("Failed to key HMAC: {}", e)))?;
        mac.update(plaintext.as_bytes());

        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Computes the lookup hash and a freshly salted verification hash
    pub fn hash(&self, plaintext: &str) -> Result<KeyHashes, DomainError> {
        let salt = SaltString::generate(&mut OsRng);
        let verification_hash = self
            .argon2
            .hash_password(self.peppered(plaintext).as_bytes(), &salt)
            .map_err(|e| DomainError::internal(format!("Failed to hash API key: {}", e)))?
            .to_string();

        Ok(KeyHashes {
            lookup_hash: self.lookup_hash(plaintext)?,
            verification_hash,
            salt: salt.as_str().to_string(),
            algorithm: KeyAlgorithm::Argon2id,
        })
    }

    /// Slow-hash check of a plaintext against a stored PHC string
    pub fn verify(&self, plaintext: &str, verification_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(verification_hash) else {
            return false;
        };

        self.argon2
            .verify_password(self.peppered(plaintext).as_bytes(), &parsed)
            .is_ok()
    }

    /// [`verify`](Self::verify) on the blocking pool, off the request task
    pub async fn verify_off_thread(
        self: &Arc<Self>,
        plaintext: &str,
        verification_hash: &str,
    ) -> Result<bool, DomainError> {
        let hasher = Arc::clone(self);
        let plaintext = plaintext.to_string();
        let verification_hash = verification_hash.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &verification_hash))
            .await
            .map_err(|e| DomainError::internal(format!("Verification task failed: {}", e)))
    }

    fn peppered(&self, plaintext: &str) -> String {
        let mut input = String::with_capacity(plaintext.len() + self.pepper.len());
        input.push_str(plaintext);
        input.push_str(&self.pepper);
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher(pepper: &str) -> KeyHasher {
        KeyHasher::new(pepper, Argon2Settings::fast()).unwrap()
    }

    #[test]
    fn test_lookup_hash_is_deterministic_and_peppered() {
        let a = hasher("pepper-a");
        let b = hasher("pepper-b");

        let first = a.lookup_hash("ezk_KEY").unwrap();
        assert_eq!(first, a.lookup_hash("ezk_KEY").unwrap());
        assert_eq!(first.len(), 64);
        assert_ne!(first, b.lookup_hash("ezk_KEY").unwrap());
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher("pepper");
        let hashes = hasher.hash("ezk_SECRET").unwrap();

        assert!(hashes.verification_hash.starts_with("$argon2id$"));
        assert!(hashes.verification_hash.contains(&hashes.salt));
        assert_eq!(hashes.algorithm, KeyAlgorithm::Argon2id);

        assert!(hasher.verify("ezk_SECRET", &hashes.verification_hash));
        assert!(!hasher.verify("ezk_OTHER", &hashes.verification_hash));
    }

    #[test]
    fn test_verification_depends_on_pepper() {
        let hashes = hasher("pepper-a").hash("ezk_SECRET").unwrap();

        assert!(!hasher("pepper-b").verify("ezk_SECRET", &hashes.verification_hash));
    }

    #[test]
    fn test_salts_are_unique() {
        let hasher = hasher("pepper");
        let first = hasher.hash("ezk_SECRET").unwrap();
        let second = hasher.hash("ezk_SECRET").unwrap();

        assert_ne!(first.verification_hash, second.verification_hash);
        assert_eq!(first.lookup_hash, second.lookup_hash);
    }

    #[tokio::test]
    async fn test_verify_off_thread_matches_verify() {
        let hasher = Arc::new(hasher("pepper"));
        let hashes = hasher.hash("ezk_SECRET").unwrap();

        assert!(hasher
            .verify_off_thread("ezk_SECRET", &hashes.verification_hash)
            .await
            .unwrap());
        assert!(!hasher
            .verify_off_thread("ezk_OTHER", &hashes.verification_hash)
            .await
            .unwrap());
        assert!(!hasher
            .verify_off_thread("ezk_SECRET", "not-a-phc-string")
            .await
            .unwrap());
    }

    #[test]
    fn test_verify_invalid_hash() {
        assert!(!hasher("pepper").verify("ezk_SECRET", "not-a-phc-string"));
    }

    #[test]
    fn test_empty_pepper_rejected() {
        assert!(matches!(
            KeyHasher::new("", Argon2Settings::fast()),
            Err(DomainError::Configuration { .. })
        ));
    }
}
