//! API key generation and format validation
//!
//! Keys look like `ezk_<body>_<checksum>`: 26 random symbols and an
//! 8-symbol checksum, both over a 32-symbol alphabet without the easily
//! confused `I`, `O`, `0` and `1`.

use rand::rngs::OsRng;
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Symbol alphabet for key bodies and checksums
pub const KEY_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Scheme tag every key starts with
pub const KEY_SCHEME: &str = "ezk";

pub const BODY_LEN: usize = 26;
pub const CHECKSUM_LEN: usize = 8;

/// Number of leading characters kept as the displayable prefix
pub const PREFIX_LEN: usize = 12;

/// Total length of a well-formed key
pub const KEY_LEN: usize = KEY_SCHEME.len() + 1 + BODY_LEN + 1 + CHECKSUM_LEN;

/// Why a presented key was rejected before any lookup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyFormatError {
    #[error("key is shorter than {min} characters")]
    TooShort { min: usize },

    #[error("key does not have the form ezk_<body>_<checksum>")]
    Malformed,

    #[error("key contains symbols outside the key alphabet")]
    InvalidSymbol,

    #[error("key checksum does not match")]
    ChecksumMismatch,
}

/// Result of generating a new API key
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    /// The full API key (only shown once at creation)
    pub key: String,
    /// The key prefix for identification
    pub prefix: String,
}

/// Generator for `ezk_` API keys
#[derive(Debug, Clone, Default)]
pub struct ApiKeyGenerator;

impl ApiKeyGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generates a fresh key from the OS random number generator
    pub fn generate(&self) -> GeneratedApiKey {
        let body: String = (0..BODY_LEN)
            .map(|_| KEY_ALPHABET[OsRng.gen_range(0..KEY_ALPHABET.len())] as char)
            .collect();

        let key = format!("{}_{}_{}", KEY_SCHEME, body, Self::checksum(&body));
        let prefix = Self::prefix_of(&key).to_string();

        GeneratedApiKey { key, prefix }
    }

    /// SHA-256 of the body; the first 8 digest bytes are each mapped
    /// `byte % 32` into the alphabet
    pub fn checksum(body: &str) -> String {
        let digest = Sha256::digest(body.as_bytes());

        digest[..CHECKSUM_LEN]
            .iter()
            .map(|b| KEY_ALPHABET[(*b as usize) % KEY_ALPHABET.len()] as char)
            .collect()
    }

    /// Checks length, structure, alphabet and checksum
    pub fn validate_format(key: &str) -> Result<(), KeyFormatError> {
        if key.len() < KEY_LEN {
            return Err(KeyFormatError::TooShort { min: KEY_LEN });
        }

        let mut parts = key.split('_');
        let (Some(scheme), Some(body), Some(checksum), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(KeyFormatError::Malformed);
        };

        if scheme != KEY_SCHEME || body.len() != BODY_LEN || checksum.len() != CHECKSUM_LEN {
            return Err(KeyFormatError::Malformed);
        }

        let in_alphabet = |s: &str| s.bytes().all(|b| KEY_ALPHABET.contains(&b));
        if !in_alphabet(body) || !in_alphabet(checksum) {
            return Err(KeyFormatError::InvalidSymbol);
        }

        if Self::checksum(body) != checksum {
            return Err(KeyFormatError::ChecksumMismatch);
        }

        Ok(())
    }

    /// First characters of a key, safe to display and log
    pub fn prefix_of(key: &str) -> &str {
        let end = key
            .char_indices()
            .nth(PREFIX_LEN)
            .map(|(i, _)| i)
            .unwrap_or(key.len());
        &key[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_key_shape() {
        let generated = ApiKeyGenerator::new().generate();

        assert_eq!(generated.key.len(), KEY_LEN);
        assert!(generated.key.starts_with("ezk_"));
        assert_eq!(generated.prefix.len(), PREFIX_LEN);
        assert!(generated.key.starts_with(&generated.prefix));
    }

    #[test]
    fn test_checksum_rederives_for_generated_keys() {
        let generator = ApiKeyGenerator::new();

        for _ in 0..500 {
            let generated = generator.generate();
            let body = &generated.key[4..4 + BODY_LEN];
            let checksum = &generated.key[4 + BODY_LEN + 1..];

            assert_eq!(ApiKeyGenerator::checksum(body), checksum);
            assert_eq!(ApiKeyGenerator::validate_format(&generated.key), Ok(()));
        }
    }

    #[test]
    fn test_single_symbol_corruption_fails_validation() {
        let key = ApiKeyGenerator::new().generate().key;
        let bytes = key.as_bytes();

        for position in (KEY_SCHEME.len() + 1)..key.len() {
            if bytes[position] == b'_' {
                continue;
            }

            for &replacement in KEY_ALPHABET.iter().filter(|&&c| c != bytes[position]) {
                let mut corrupted = bytes.to_vec();
                corrupted[position] = replacement;
                let corrupted = String::from_utf8(corrupted).unwrap();

                assert!(
                    ApiKeyGenerator::validate_format(&corrupted).is_err(),
                    "corruption at {} went undetected",
                    position
                );
            }
        }
    }

    #[test]
    fn test_key_uniqueness() {
        let generator = ApiKeyGenerator::new();
        let a = generator.generate();
        let b = generator.generate();

        assert_ne!(a.key, b.key);
    }

    #[test]
    fn test_validate_rejects_malformed() {
        assert_eq!(
            ApiKeyGenerator::validate_format("ezk_short"),
            Err(KeyFormatError::TooShort { min: KEY_LEN })
        );

        let good = ApiKeyGenerator::new().generate().key;

        let wrong_scheme = good.replacen("ezk_", "abc_", 1);
        assert_eq!(
            ApiKeyGenerator::validate_format(&wrong_scheme),
            Err(KeyFormatError::Malformed)
        );

        let lowercase = good.to_lowercase();
        assert_eq!(
            ApiKeyGenerator::validate_format(&lowercase),
            Err(KeyFormatError::InvalidSymbol)
        );

        let extra = format!("{}_X", good);
        assert_eq!(
            ApiKeyGenerator::validate_format(&extra),
            Err(KeyFormatError::Malformed)
        );
    }

    #[test]
    fn test_prefix_of() {
        assert_eq!(
            ApiKeyGenerator::prefix_of("ezk_ABCDEFGHJKLMNPQRSTUVWXYZ2_ABCDEFGH"),
            "ezk_ABCDEFGH"
        );
        assert_eq!(ApiKeyGenerator::prefix_of("ezk_AB"), "ezk_AB");
    }
}
