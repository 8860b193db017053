use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Duration;
use rand::{rngs::OsRng, RngCore};
use std::env;
use tracing::warn;

pub const DEFAULT_MAGIC_LINK_TTL_SECONDS: i64 = 30 * 60;
/// One year.
pub const MAX_MAGIC_LINK_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;
pub const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("SECRET must be at least 32 bytes")]
    WeakSecret,
    #[error("SECRET appears to be a placeholder value")]
    PlaceholderSecret,
}

/// Settings the magic-link service needs, passed in explicitly.
#[derive(Debug, Clone)]
pub struct MagicLinkConfig {
    /// Key for the token hash. Rotating it invalidates outstanding links.
    pub secret: String,
    pub ttl: Duration,
    /// Frontend origin the emailed link points at, without trailing slash.
    pub base_url: String,
}

impl MagicLinkConfig {
    pub fn new(secret: impl Into<String>, ttl: Duration, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            secret: secret.into(),
            ttl,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn token_lifetime_minutes(&self) -> i64 {
        self.ttl.num_seconds() / 60
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub magic_link: MagicLinkConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = current_environment();
        let is_production = environment == "production";

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/passline.db?mode=rwc".to_string());
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("PORT", 8080u16)?;

        let ttl_seconds = parse_var("MAGIC_LINK_TTL_SECONDS", DEFAULT_MAGIC_LINK_TTL_SECONDS)?;
        let ttl = ttl_from_seconds(ttl_seconds)?;

        let base_url =
            env::var("FRONTEND_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let secret = load_secret(is_production)?;

        Ok(Self {
            environment,
            database_url,
            host,
            port,
            magic_link: MagicLinkConfig::new(secret, ttl, base_url),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

pub(crate) fn current_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string())
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

fn ttl_from_seconds(seconds: i64) -> Result<Duration, ConfigError> {
    if !(1..=MAX_MAGIC_LINK_TTL_SECONDS).contains(&seconds) {
        return Err(ConfigError::Invalid {
            key: "MAGIC_LINK_TTL_SECONDS",
            value: seconds.to_string(),
        });
    }

    Duration::try_seconds(seconds).ok_or(ConfigError::Invalid {
        key: "MAGIC_LINK_TTL_SECONDS",
        value: seconds.to_string(),
    })
}

fn load_secret(is_production: bool) -> Result<String, ConfigError> {
    match env::var("SECRET") {
        Ok(secret) if !secret.is_empty() => {
            if is_production {
                validate_secret(&secret)?;
            }
            Ok(secret)
        }
        _ if is_production => Err(ConfigError::Missing("SECRET")),
        _ => {
            warn!("SECRET not set; generating ephemeral secret (development only)");
            let mut bytes = [0u8; MIN_SECRET_BYTES];
            OsRng.fill_bytes(&mut bytes);
            Ok(URL_SAFE_NO_PAD.encode(bytes))
        }
    }
}

fn validate_secret(secret: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_SECRET_BYTES {
        return Err(ConfigError::WeakSecret);
    }

    let lowered = secret.to_ascii_lowercase();
    if lowered.contains("example") || lowered.contains("changeme") || lowered.contains("default") {
        return Err(ConfigError::PlaceholderSecret);
    }

    Ok(())
}
