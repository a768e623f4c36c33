//! Bearer token authentication middleware

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::middleware::jwt::TokenVerifier;

/// Paths reachable without a token
const PUBLIC_PATHS: [&str; 1] = ["/health"];

/// Authentication layer; without a verifier every request passes through
#[derive(Clone)]
pub struct AuthLayer {
    verifier: Option<Arc<dyn TokenVerifier>>,
}

impl AuthLayer {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            verifier: Some(verifier),
        }
    }

    pub fn disabled() -> Self {
        Self { verifier: None }
    }

    pub fn from_verifier(verifier: Option<Arc<dyn TokenVerifier>>) -> Self {
        Self { verifier }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            verifier: self.verifier.clone(),
        }
    }
}

/// Authentication middleware service
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    verifier: Option<Arc<dyn TokenVerifier>>,
}

/// Extract the token from an `Authorization: Bearer <token>` header value
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let verifier = match &self.verifier {
            Some(verifier) if !PUBLIC_PATHS.contains(&request.uri().path()) => verifier.clone(),
            _ => {
                let future = self.inner.call(request);
                return Box::pin(future);
            }
        };

        let token = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(bearer_token)
            .map(str::to_string);

        let Some(token) = token else {
            warn!(path = %request.uri().path(), "No bearer token provided");
            return Box::pin(async move {
                Ok(AppError::AuthInvalid(
                    "Bearer token required. Provide via Authorization header: 'Bearer <JWT>'".to_string(),
                )
                .into_response())
            });
        };

        // The readied service goes into the future; keep a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match verifier.authenticate(&token).await {
                Ok(claims) => {
                    debug!(sub = ?claims.sub, "Token accepted");
                    request.extensions_mut().insert(claims);
                    inner.call(request).await
                }
                Err(e) => {
                    warn!(error = %e, "Token rejected");
                    Ok(e.into_response())
                }
            }
        })
    }
}
