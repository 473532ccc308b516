//! Infrastructure layer - backends and services behind the domain traits

pub mod api_key;
pub mod auth;
pub mod cache;
pub mod logging;
pub mod otp;
pub mod quota;
pub mod storage;
pub mod usage;
