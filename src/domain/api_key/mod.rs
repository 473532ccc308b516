//! API key domain

mod entity;

pub use entity::{ApiKey, ApiKeyId, ApiKeyStatus, KeyAlgorithm, KeyHashes};
