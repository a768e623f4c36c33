//! Base64 encoding and decoding for image payloads

use base64::{engine::general_purpose::STANDARD, Engine};
use crate::error::{AppError, Result};

/// Encode binary data to base64 string
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode a base64 string or `data:` URL to binary data
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    let data = match encoded.split_once(',') {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => encoded,
    };

    STANDARD
        .decode(data.trim())
        .map_err(|e| AppError::InferenceFailure(format!("Invalid base64 image data: {}", e)))
}

/// Create a data URL from binary image data
pub fn create_data_url(data: &[u8], format: &str) -> String {
    format!("data:image/{};base64,{}", format, encode(data))
}
