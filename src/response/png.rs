//! PNG payload checks and image responses

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue},
    response::{IntoResponse, Response},
};
use bytes::Bytes;

use crate::jobs::types::GenerationResult;

/// Eight-byte signature every PNG file starts with
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Header carrying the number of images a result holds
pub const IMAGE_COUNT_HEADER: &str = "x-image-count";

pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(&PNG_SIGNATURE)
}

/// Build a `200 image/png` response for one image of a result
pub fn image_response(result: &GenerationResult, image: Bytes) -> Response {
    let mut response = image.into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(GenerationResult::CONTENT_TYPE));
    headers.insert(IMAGE_COUNT_HEADER, HeaderValue::from(result.len()));
    response
}
