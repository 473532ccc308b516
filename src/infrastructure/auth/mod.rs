//! Credential verification: API keys and session tokens

mod gate;
mod jwt;

pub use gate::{CredentialGate, GateConfig};
pub use jwt::{JwtClaims, JwtConfig, JwtGenerator, JwtService};
