//! Functional tests for bearer token authentication

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    Extension, Router,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use prompt_forge_gateway::middleware::{jwt::SharedSecretVerifier, AuthLayer, Claims};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "test-secret";
const AUDIENCE: &str = "prompt-forge";

fn token(secret: &str, audience: &str) -> String {
    let claims = json!({
        "sub": "user-42",
        "aud": audience,
        "exp": chrono::Utc::now().timestamp() + 600,
    });
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

fn create_test_app() -> Router {
    Router::new()
        .route("/test", axum::routing::get(|| async { "OK" }))
        .route(
            "/whoami",
            axum::routing::get(|Extension(claims): Extension<Claims>| async move {
                claims.sub.unwrap_or_default()
            }),
        )
        .route("/health", axum::routing::get(|| async { "healthy" }))
        .layer(AuthLayer::new(Arc::new(SharedSecretVerifier::new(SECRET, Some(AUDIENCE), None))))
}

async fn send(app: Router, uri: &str, authorization: Option<String>) -> axum::response::Response {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
}

#[tokio::test]
async fn test_auth_with_valid_bearer_token() {
    let response = send(create_test_app(), "/test", Some(format!("Bearer {}", token(SECRET, AUDIENCE)))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_claims_reach_handler() {
    let response = send(create_test_app(), "/whoami", Some(format!("Bearer {}", token(SECRET, AUDIENCE)))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], b"user-42");
}

#[tokio::test]
async fn test_auth_with_forged_token() {
    let response = send(create_test_app(), "/test", Some(format!("Bearer {}", token("wrong", AUDIENCE)))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_auth_with_wrong_audience() {
    let response = send(create_test_app(), "/test", Some(format!("Bearer {}", token(SECRET, "other-api")))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_auth_without_bearer_scheme() {
    let response = send(create_test_app(), "/test", Some(token(SECRET, AUDIENCE))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_auth_without_header() {
    let response = send(create_test_app(), "/test", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["type"], "authentication_error");
}

#[tokio::test]
async fn test_auth_health_endpoint_bypass() {
    let response = send(create_test_app(), "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_disabled_auth_allows_all() {
    let app = Router::new()
        .route("/test", axum::routing::get(|| async { "OK" }))
        .layer(AuthLayer::disabled());

    let response = send(app, "/test", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
