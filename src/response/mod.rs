//! Response helpers - Base64 payloads and PNG image bodies

pub mod base64;
pub mod png;
