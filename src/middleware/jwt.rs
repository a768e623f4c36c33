//! Bearer token verification against JWKS or a shared secret

use async_trait::async_trait;
use jsonwebtoken::{
    decode, decode_header,
    jwk::{Jwk, JwkSet},
    Algorithm, DecodingKey, Validation,
};
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::{AuthConfig, AuthMode};
use crate::error::{AppError, Result};

/// Keys are not refetched more often than this, even for unknown key ids
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Validated token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Validates bearer tokens
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Claims>;
}

/// Build the verifier the configuration asks for; `None` when auth is disabled
pub fn build_verifier(config: &AuthConfig) -> Result<Option<Arc<dyn TokenVerifier>>> {
    if !config.enabled {
        return Ok(None);
    }

    let verifier: Arc<dyn TokenVerifier> = match config.mode {
        AuthMode::Jwks => Arc::new(JwksVerifier::new(
            config.jwks_url(),
            &config.audience,
            &config.issuer(),
            Duration::from_secs(config.jwks_cache_ttl_secs),
        )?),
        AuthMode::SharedSecret => {
            let secret = config.shared_secret.as_deref().ok_or_else(|| {
                AppError::Internal("auth.shared_secret is not configured".to_string())
            })?;
            let audience = Some(config.audience.as_str()).filter(|a| !a.is_empty());
            let issuer = config.issuer.as_deref();
            Arc::new(SharedSecretVerifier::new(secret, audience, issuer))
        }
    };

    info!(mode = ?config.mode, "Bearer token verification enabled");
    Ok(Some(verifier))
}

fn rejected(error: jsonwebtoken::errors::Error) -> AppError {
    AppError::AuthInvalid(error.to_string())
}

/// HS256 verification with a locally configured secret
pub struct SharedSecretVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SharedSecretVerifier {
    pub fn new(secret: &str, audience: Option<&str>, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl TokenVerifier for SharedSecretVerifier {
    async fn authenticate(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(rejected)
    }
}

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// RS256 verification against an identity provider's published keys
pub struct JwksVerifier {
    client: Client,
    jwks_url: String,
    validation: Validation,
    cache_ttl: Duration,
    cache: RwLock<Option<CachedKeys>>,
}

impl JwksVerifier {
    pub fn new(jwks_url: String, audience: &str, issuer: &str, cache_ttl: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        validation.set_issuer(&[issuer]);

        Ok(Self {
            client,
            jwks_url,
            validation,
            cache_ttl,
            cache: RwLock::new(None),
        })
    }

    fn cached_key(&self, kid: &str, max_age: Duration) -> Option<Jwk> {
        let cache = self.cache.read();
        let cached = cache.as_ref()?;
        if cached.fetched_at.elapsed() > max_age {
            return None;
        }
        cached.keys.find(kid).cloned()
    }

    fn fetched_recently(&self) -> bool {
        self.cache
            .read()
            .as_ref()
            .map(|c| c.fetched_at.elapsed() < MIN_REFRESH_INTERVAL)
            .unwrap_or(false)
    }

    async fn refresh(&self) -> Result<()> {
        let keys: JwkSet = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Internal(format!("Failed to fetch JWKS: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse JWKS: {}", e)))?;

        debug!(url = %self.jwks_url, keys = keys.keys.len(), "Fetched signing keys");
        *self.cache.write() = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        Ok(())
    }

    /// Look up a signing key, refetching the set when it is stale or lacks `kid`
    async fn signing_key(&self, kid: &str) -> Result<Jwk> {
        if let Some(key) = self.cached_key(kid, self.cache_ttl) {
            return Ok(key);
        }

        if !self.fetched_recently() {
            self.refresh().await?;
        }

        self.cached_key(kid, Duration::MAX)
            .ok_or_else(|| AppError::AuthInvalid("No signing key matches the token".to_string()))
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn authenticate(&self, token: &str) -> Result<Claims> {
        let header = decode_header(token).map_err(rejected)?;
        let kid = header
            .kid
            .ok_or_else(|| AppError::AuthInvalid("Token has no key id".to_string()))?;

        let jwk = self.signing_key(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(rejected)?;

        decode::<Claims>(token, &key, &self.validation)
            .map(|data| data.claims)
            .map_err(rejected)
    }
}
