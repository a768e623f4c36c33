//! Application settings and configuration management

use crate::error::{AppError, Result};
use crate::worker::traits::{InferenceDefaults, LoraAdapter, PipelineKind};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Environment variable that overrides the configuration file location
pub const CONFIG_PATH_ENV: &str = "PROMPT_FORGE_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

/// How bearer tokens are verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// RS256 tokens checked against the identity provider's JWKS
    Jwks,
    /// HS256 tokens signed with a locally configured secret
    SharedSecret,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_auth_mode")]
    pub mode: AuthMode,
    /// Identity provider domain, e.g. `tenant.eu.auth0.com`
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub audience: String,
    /// Explicit JWKS location; derived from `domain` when unset
    #[serde(default)]
    pub jwks_url: Option<String>,
    /// Explicit issuer; derived from `domain` when unset
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub shared_secret: Option<String>,
    #[serde(default = "default_jwks_cache_ttl")]
    pub jwks_cache_ttl_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_auth_mode() -> AuthMode {
    AuthMode::Jwks
}

fn default_jwks_cache_ttl() -> u64 {
    3600
}

impl AuthConfig {
    pub fn jwks_url(&self) -> String {
        self.jwks_url
            .clone()
            .unwrap_or_else(|| format!("https://{}/.well-known/jwks.json", self.domain))
    }

    pub fn issuer(&self) -> String {
        self.issuer
            .clone()
            .unwrap_or_else(|| format!("https://{}/", self.domain))
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: default_auth_mode(),
            domain: String::new(),
            audience: String::new(),
            jwks_url: None,
            issuer: None,
            shared_secret: None,
            jwks_cache_ttl_secs: default_jwks_cache_ttl(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst_size: u32,
    /// Quota applied to `/result/*` polling only
    #[serde(default = "default_poll_rps")]
    pub poll_requests_per_second: u32,
    #[serde(default = "default_poll_burst")]
    pub poll_burst_size: u32,
}

fn default_rps() -> u32 {
    20
}

fn default_burst() -> u32 {
    40
}

fn default_poll_rps() -> u32 {
    100
}

fn default_poll_burst() -> u32 {
    200
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: default_rps(),
            burst_size: default_burst(),
            poll_requests_per_second: default_poll_rps(),
            poll_burst_size: default_poll_burst(),
        }
    }
}

/// Asynchronous job execution configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    /// Upper bound for a single worker invocation
    #[serde(default = "default_job_timeout")]
    pub timeout_secs: u64,
    /// How long finished jobs stay retrievable
    #[serde(default = "default_result_ttl")]
    pub result_ttl_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Worker invocations allowed to run at once across all models
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_job_timeout() -> u64 {
    900
}

fn default_result_ttl() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_max_in_flight() -> usize {
    32
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_job_timeout(),
            result_ttl_secs: default_result_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

/// Model catalog configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Directory holding model icon images
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
}

fn default_assets_dir() -> String {
    "./assets".to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// One servable model: catalog metadata plus the worker that serves it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub trigger_word: Option<String>,
    /// Icon file name, relative to `catalog.assets_dir`
    #[serde(default)]
    pub icon: Option<String>,
    pub pipeline: PipelineKind,
    #[serde(default)]
    pub adapter: Option<LoraAdapter>,
    #[serde(default)]
    pub defaults: InferenceDefaults,
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,
}

fn default_health_check_path() -> String {
    "/health".to_string()
}

fn default_health_check_interval() -> u64 {
    30
}

impl Settings {
    /// Load settings from the configured file (if any) and environment variables
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config/default.toml".to_string());
        Self::load_from_path(path)
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("auth.enabled", true)?
            .set_default("jobs.timeout_secs", 900)?
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("config/default")).required(false))
            // Override with environment variables, e.g. PROMPT_FORGE_SERVER__PORT
            .add_source(
                Environment::with_prefix("PROMPT_FORGE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0".to_string()));
        }

        if self.jobs.timeout_secs == 0 {
            return Err(invalid("jobs.timeout_secs must be positive".to_string()));
        }

        if self.jobs.max_in_flight == 0 {
            return Err(invalid("jobs.max_in_flight must be positive".to_string()));
        }

        if self.auth.enabled {
            match self.auth.mode {
                AuthMode::Jwks => {
                    if self.auth.domain.is_empty() && self.auth.jwks_url.is_none() {
                        return Err(invalid(
                            "auth.domain or auth.jwks_url is required for jwks mode".to_string(),
                        ));
                    }
                    if self.auth.audience.is_empty() {
                        return Err(invalid("auth.audience is required for jwks mode".to_string()));
                    }
                }
                AuthMode::SharedSecret => {
                    if self.auth.shared_secret.as_deref().map_or(true, str::is_empty) {
                        return Err(invalid(
                            "auth.shared_secret is required for shared_secret mode".to_string(),
                        ));
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if model.id.is_empty() {
                return Err(invalid("Model id cannot be empty".to_string()));
            }
            if !seen.insert(model.id.as_str()) {
                return Err(invalid(format!("Model '{}' is configured twice", model.id)));
            }
            if model.available && model.endpoints.is_empty() {
                return Err(invalid(format!(
                    "Model '{}' is available but has no worker endpoints",
                    model.id
                )));
            }
        }

        Ok(())
    }
}

fn invalid(message: String) -> AppError {
    AppError::Config(config::ConfigError::Message(message))
}
