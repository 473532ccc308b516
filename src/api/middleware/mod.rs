//! API middleware components

pub mod auth;
pub mod logging;

pub use auth::{is_public_path, require_credential, require_tenant, Authenticated};
pub use logging::logging_middleware;
