//! Middleware module - Bearer token authentication and rate limiting

pub mod auth;
pub mod jwt;
pub mod rate_limit;

pub use auth::AuthLayer;
pub use jwt::{Claims, TokenVerifier};
pub use rate_limit::RateLimitLayer;
