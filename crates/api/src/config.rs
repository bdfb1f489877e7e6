//! Process configuration, read once at startup.

use std::env;
use std::net::SocketAddr;

use thiserror::Error;

use taskforge_observability::LogFormat;

use crate::rate_limit::RateLimitConfig;

const DEV_JWT_SECRET: &str = "taskforge-dev-secret-change-me";

/// Requests per 15 minutes per client.
const DEFAULT_AUTH_RATE_LIMIT: u32 = 20;
const DEFAULT_API_RATE_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{0} must be set in release builds")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expire_hours: i64,
    pub cookie_secure: bool,
    pub cors_origins: Vec<String>,
    pub client_url: String,
    pub mail: Option<MailConfig>,
    pub google: Option<GoogleConfig>,
    pub log_format: LogFormat,
    /// Applied to register and login.
    pub auth_rate_limit: RateLimitConfig,
    /// Applied to every gated `/api/v1` route.
    pub api_rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".into())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if cfg!(debug_assertions) => DEV_JWT_SECRET.to_string(),
            None => return Err(ConfigError::Missing("JWT_SECRET")),
        };

        let jwt_expire_hours = match var("JWT_EXPIRE_HOURS") {
            Some(raw) => raw.parse::<i64>().ok().filter(|h| *h > 0).ok_or(ConfigError::Invalid {
                var: "JWT_EXPIRE_HOURS",
                reason: format!("expected a positive number of hours, got '{raw}'"),
            })?,
            None => 720,
        };

        let cookie_secure = match var("COOKIE_SECURE") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid {
                var: "COOKIE_SECURE",
                reason: format!("expected true/false, got '{raw}'"),
            })?,
            None => false,
        };

        let log_format = match var("LOG_FORMAT") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                var: "LOG_FORMAT",
                reason,
            })?,
            None => LogFormat::Json,
        };

        let auth_rate_limit = RateLimitConfig::per_window(limit_var("AUTH_RATE_LIMIT", DEFAULT_AUTH_RATE_LIMIT)?);
        let api_rate_limit = RateLimitConfig::per_window(limit_var("API_RATE_LIMIT", DEFAULT_API_RATE_LIMIT)?);

        let mail = match (var("MAIL_API_URL"), var("MAIL_API_KEY")) {
            (Some(api_url), Some(api_key)) => Some(MailConfig {
                api_url,
                api_key,
                from: var("MAIL_FROM").unwrap_or_else(|| "no-reply@taskforge.local".into()),
            }),
            _ => None,
        };

        let google = match (
            var("GOOGLE_CLIENT_ID"),
            var("GOOGLE_CLIENT_SECRET"),
            var("GOOGLE_CALLBACK_URL"),
        ) {
            (Some(client_id), Some(client_secret), Some(callback_url)) => Some(GoogleConfig {
                client_id,
                client_secret,
                callback_url,
            }),
            _ => None,
        };

        Ok(Self {
            bind_addr,
            database_url: var("DATABASE_URL"),
            redis_url: var("REDIS_URL"),
            jwt_secret,
            jwt_expire_hours,
            cookie_secure,
            cors_origins: var("CORS_ORIGINS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            client_url: var("CLIENT_URL")
                .unwrap_or_else(|| "http://localhost:3000".into())
                .trim_end_matches('/')
                .to_string(),
            mail,
            google,
            log_format,
            auth_rate_limit,
            api_rate_limit,
        })
    }

    /// Deterministic in-memory configuration for tests.
    pub fn for_tests() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: None,
            redis_url: None,
            jwt_secret: "test-secret".into(),
            jwt_expire_hours: 1,
            cookie_secure: false,
            cors_origins: Vec::new(),
            client_url: "http://localhost:3000".into(),
            mail: None,
            google: None,
            log_format: LogFormat::Pretty,
            // High enough that suites never hit them; limit tests lower these.
            auth_rate_limit: RateLimitConfig::per_window(10_000),
            api_rate_limit: RateLimitConfig::per_window(10_000),
        }
    }

    /// Set when `JWT_SECRET` was missing in a debug build. Reported by the
    /// caller once logging is up.
    pub fn uses_dev_jwt_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.jwt_expire_hours)
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn limit_var(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match var(name) {
        Some(raw) => raw.parse::<u32>().ok().filter(|n| *n > 0).ok_or(ConfigError::Invalid {
            var: name,
            reason: format!("expected a positive request count, got '{raw}'"),
        }),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
