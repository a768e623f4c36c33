//! Rate limiting middleware using the Governor crate
//!
//! Result polling and every other route draw from separate quotas.

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{
    num::NonZeroU32,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::warn;

use crate::config::RateLimitConfig;
use crate::error::AppError;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>;

/// Prefix of the polling route
const POLL_PREFIX: &str = "/result/";

fn limiter(requests_per_second: u32, burst_size: u32) -> SharedRateLimiter {
    let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst_size).unwrap_or(per_second);
    Arc::new(RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst)))
}

/// Rate limiting layer
#[derive(Clone)]
pub struct RateLimitLayer {
    general: SharedRateLimiter,
    polling: SharedRateLimiter,
}

impl RateLimitLayer {
    pub fn new(requests_per_second: u32, burst_size: u32, poll_per_second: u32, poll_burst_size: u32) -> Self {
        Self {
            general: limiter(requests_per_second, burst_size),
            polling: limiter(poll_per_second, poll_burst_size),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.requests_per_second,
            config.burst_size,
            config.poll_requests_per_second,
            config.poll_burst_size,
        )
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            general: self.general.clone(),
            polling: self.polling.clone(),
        }
    }
}

/// Rate limiting middleware service
#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    general: SharedRateLimiter,
    polling: SharedRateLimiter,
}

impl<S> Service<Request<Body>> for RateLimitMiddleware<S>
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

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let path = request.uri().path();
        if path == "/health" {
            return Box::pin(self.inner.call(request));
        }

        let limiter = if path.starts_with(POLL_PREFIX) {
            &self.polling
        } else {
            &self.general
        };

        match limiter.check() {
            Ok(_) => Box::pin(self.inner.call(request)),
            Err(_) => {
                warn!(path = %path, "Rate limit exceeded");
                Box::pin(async move { Ok(AppError::RateLimitExceeded.into_response()) })
            }
        }
    }
}
