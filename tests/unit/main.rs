#[path = "../common/mod.rs"]
mod common;

mod dispatch_test;
