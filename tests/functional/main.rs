#[path = "../common/mod.rs"]
mod common;

mod auth_test;
mod http_worker_test;
mod jwks_test;
