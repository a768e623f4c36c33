//! Worker module - Worker abstraction, HTTP client, registry and health monitoring

pub mod health_check;
pub mod http_worker;
pub mod registry;
pub mod traits;
