//! HS256 session token signing and validation

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::domain::DomainError;

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: i64,
    /// Expiration timestamp (Unix epoch)
    pub exp: i64,
}

impl JwtClaims {
    pub fn new(user_id: impl Into<String>, issuer: impl Into<String>, expiration_hours: u64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(expiration_hours as i64);

        Self {
            sub: user_id.into(),
            iss: issuer.into(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.sub
    }
}

/// Configuration for JWT service
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared HS256 secret
    pub secret: String,
    /// Expected `iss` claim
    pub issuer: String,
    /// Token expiration time in hours
    pub expiration_hours: u64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
            expiration_hours: 24,
        }
    }
}

/// Session token operations
pub trait JwtGenerator: Send + Sync + Debug {
    /// Signs a token for a user
    fn generate(&self, user_id: &str) -> Result<String, DomainError>;

    /// Checks signature, issuer and expiry and returns the claims
    fn validate(&self, token: &str) -> Result<JwtClaims, DomainError>;
}

#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.config.issuer)
            .field("expiration_hours", &self.config.expiration_hours)
            .field("secret", &"[hidden]")
            .finish()
    }
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }
}

impl JwtGenerator for JwtService {
    fn generate(&self, user_id: &str) -> Result<String, DomainError> {
        let claims = JwtClaims::new(user_id, &self.config.issuer, self.config.expiration_hours);

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| DomainError::internal(format!("Failed to generate JWT: {}", e)))
    }

    fn validate(&self, token: &str) -> Result<JwtClaims, DomainError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let token_data = decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| DomainError::unauthorized(format!("Invalid session token: {}", e)))?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str, issuer: &str) -> JwtService {
        JwtService::new(JwtConfig::new(secret, issuer))
    }

    #[test]
    fn test_generate_and_validate() {
        let service = service("secret", "ezk");

        let token = service.generate("user-1").unwrap();
        let claims = service.validate(&token).unwrap();

        assert_eq!(claims.user_id(), "user-1");
        assert_eq!(claims.iss, "ezk");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let token = service("secret-a", "ezk").generate("user-1").unwrap();

        let result = service("secret-b", "ezk").validate(&token);
        assert!(matches!(result, Err(DomainError::Unauthorized { .. })));
    }

    #[test]
    fn test_wrong_issuer_is_unauthorized() {
        let token = service("secret", "someone-else").generate("user-1").unwrap();

        let result = service("secret", "ezk").validate(&token);
        assert!(matches!(result, Err(DomainError::Unauthorized { .. })));
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        let service = service("secret", "ezk");
        let claims = JwtClaims {
            sub: "user-1".to_string(),
            iss: "ezk".to_string(),
            iat: Utc::now().timestamp() - 7200,
            exp: Utc::now().timestamp() - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(matches!(
            service.validate(&token),
            Err(DomainError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_garbage_token() {
        assert!(service("secret", "ezk").validate("not.a.jwt").is_err());
    }
}
