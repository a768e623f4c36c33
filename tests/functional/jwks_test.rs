//! Functional tests for RS256 verification against a JWKS endpoint

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use prompt_forge_gateway::error::AppError;
use prompt_forge_gateway::middleware::jwt::{JwksVerifier, TokenVerifier};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SIGNING_KEY: &str = include_str!("../fixtures/test_signing_key.pem");
const JWKS: &str = include_str!("../fixtures/jwks.json");
const AUDIENCE: &str = "https://prompt-forge/api";

fn issuer(server: &MockServer) -> String {
    format!("{}/", server.uri())
}

fn rs256_token(kid: &str, issuer: &str, audience: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let claims = json!({
        "sub": "auth0|123",
        "aud": audience,
        "iss": issuer,
        "exp": chrono::Utc::now().timestamp() + 600,
    });
    encode(&header, &claims, &EncodingKey::from_rsa_pem(SIGNING_KEY.as_bytes()).unwrap()).unwrap()
}

async fn jwks_server(expected_fetches: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(JWKS, "application/json"))
        .expect(expected_fetches)
        .mount(&server)
        .await;
    server
}

fn verifier(server: &MockServer) -> JwksVerifier {
    JwksVerifier::new(
        format!("{}/.well-known/jwks.json", server.uri()),
        AUDIENCE,
        &issuer(server),
        Duration::from_secs(3600),
    )
    .unwrap()
}

#[tokio::test]
async fn test_valid_token_verified_and_keys_cached() {
    let server = jwks_server(1).await;
    let verifier = verifier(&server);
    let token = rs256_token("test-key-1", &issuer(&server), AUDIENCE);

    let claims = verifier.authenticate(&token).await.unwrap();
    assert_eq!(claims.sub.as_deref(), Some("auth0|123"));

    // Second call is served from the cache
    verifier.authenticate(&token).await.unwrap();
}

#[tokio::test]
async fn test_wrong_issuer_rejected() {
    let server = jwks_server(1).await;
    let verifier = verifier(&server);
    let token = rs256_token("test-key-1", "https://someone-else/", AUDIENCE);

    assert!(matches!(verifier.authenticate(&token).await, Err(AppError::AuthInvalid(_))));
}

#[tokio::test]
async fn test_unknown_key_id_rejected() {
    let server = jwks_server(1).await;
    let verifier = verifier(&server);
    let token = rs256_token("rotated-away", &issuer(&server), AUDIENCE);

    assert!(matches!(verifier.authenticate(&token).await, Err(AppError::AuthInvalid(_))));
    // A second unknown kid right away does not refetch the key set
    assert!(verifier.authenticate(&token).await.is_err());
}

#[tokio::test]
async fn test_garbage_token_rejected_without_fetch() {
    let server = jwks_server(0).await;
    let verifier = verifier(&server);

    assert!(matches!(verifier.authenticate("not.a.jwt").await, Err(AppError::AuthInvalid(_))));
}
