//! API key infrastructure
//!
//! Key generation and format checks, peppered hashing, and the issuance
//! service on top of the credential store.

mod generator;
mod hasher;
mod service;

pub use generator::{
    ApiKeyGenerator, GeneratedApiKey, KeyFormatError, KEY_ALPHABET, KEY_LEN, PREFIX_LEN,
};
pub use hasher::{Argon2Settings, KeyHasher};
pub use service::{ApiKeyService, IssuedKey};
