//! Server configuration

use std::path::PathBuf;

use crate::auth::{Expiry, SessionConfig};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Server configuration, built once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment: development | staging | production
    pub environment: String,
    pub http_port: u16,
    /// PostgreSQL connection URL; `None` runs on the in-memory store
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl: Expiry,
    pub refresh_token_ttl: Expiry,
    /// Root of `profile/` and `products/`
    pub upload_dir: PathBuf,
    /// Daily rolling log files go here when set
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
    /// Allowed CORS origin in production
    pub client_url: Option<String>,
    pub seed_demo_data: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BoxError> {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".into());
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());

        Ok(Self {
            http_port: lookup("HTTP_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: lookup("DB_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(10),
            access_token_secret: require_secret(&lookup, "ACCESS_TOKEN_SECRET", &environment)?,
            refresh_token_secret: require_secret(&lookup, "REFRESH_TOKEN_SECRET", &environment)?,
            access_token_ttl: parse_expiry(&lookup, "ACCESS_TOKEN_EXPIRES_IN", "15m")?,
            refresh_token_ttl: parse_expiry(&lookup, "REFRESH_TOKEN_EXPIRES_IN", "7d")?,
            upload_dir: non_empty("UPLOAD_DIR")
                .unwrap_or_else(|| "public".into())
                .into(),
            log_dir: non_empty("LOG_DIR").map(PathBuf::from),
            log_level: non_empty("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            client_url: non_empty("CLIENT_URL"),
            seed_demo_data: lookup("SEED_DEMO_DATA")
                .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes")),
            environment,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            access_secret: self.access_token_secret.clone(),
            refresh_secret: self.refresh_token_secret.clone(),
            access_ttl: self.access_token_ttl,
            refresh_ttl: self.refresh_token_ttl,
        }
    }
}

/// Require a secret: must be set and non-empty outside development
fn require_secret(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    environment: &str,
) -> Result<String, BoxError> {
    let val = match lookup(name) {
        Some(v) => v,
        None => {
            if environment != "development" {
                return Err(format!("{name} must be set in {environment} environment").into());
            }
            format!("dev-{name}-not-for-production")
        }
    };
    if val.is_empty() && environment != "development" {
        return Err(format!("{name} must not be empty in {environment} environment").into());
    }
    Ok(val)
}

fn parse_expiry(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> Result<Expiry, BoxError> {
    let raw = lookup(name).unwrap_or_else(|| default.into());
    raw.parse::<Expiry>()
        .map_err(|e| format!("{name}={raw:?} is not a valid duration: {e}").into())
}
