//! API module - Route table and request handlers

pub mod handlers;
pub mod routes;
