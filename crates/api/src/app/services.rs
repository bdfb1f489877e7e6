//! Process-scoped handles shared by every handler.

use std::sync::Arc;

use thiserror::Error;

use taskforge_auth::TokenIssuer;
use taskforge_events::{Backplane, InMemoryBackplane};
use taskforge_infra::{
    GoogleOAuth, GoogleOAuthConfig, HttpMailer, IdentityProvider, InMemoryStore, LogMailer, Mailer,
    PgDocumentStore, Store,
};

use crate::config::AppConfig;
use crate::rate_limit::RateLimiter;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("store initialization failed: {0}")]
    Store(#[from] taskforge_infra::StoreError),

    #[error("mailer initialization failed: {0}")]
    Mail(#[from] taskforge_infra::MailError),

    #[error("identity provider initialization failed: {0}")]
    OAuth(#[from] taskforge_infra::OAuthError),

    #[error("backplane initialization failed: {0}")]
    Backplane(#[from] taskforge_events::BackplaneError),

    #[error("REDIS_URL is set but the server was built without the `redis` feature")]
    RedisUnsupported,
}

#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
    /// `None` when no provider is configured; OAuth routes then answer 404.
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub backplane: Arc<dyn Backplane>,
    pub tokens: TokenIssuer,
    pub auth_limiter: Arc<RateLimiter>,
    pub api_limiter: Arc<RateLimiter>,
    pub config: AppConfig,
}

impl AppServices {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        identity: Option<Arc<dyn IdentityProvider>>,
        backplane: Arc<dyn Backplane>,
    ) -> Self {
        let tokens = TokenIssuer::new(config.jwt_secret.as_bytes(), config.session_ttl());
        Self {
            store,
            mailer,
            identity,
            backplane,
            tokens,
            auth_limiter: Arc::new(RateLimiter::new(config.auth_rate_limit.clone())),
            api_limiter: Arc::new(RateLimiter::new(config.api_rate_limit.clone())),
            config,
        }
    }

    /// In-memory store, log mailer, in-process backplane.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryStore::new()),
            Arc::new(LogMailer),
            None,
            Arc::new(InMemoryBackplane::new()),
        )
    }
}

/// Wire services from configuration.
pub async fn build_services(config: AppConfig) -> Result<AppServices, StartupError> {
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let store = PgDocumentStore::connect(url).await?;
            store.migrate().await?;
            tracing::info!("using postgres document store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store (data is lost on restart)");
            Arc::new(InMemoryStore::new())
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.mail {
        Some(mail) => Arc::new(HttpMailer::new(&mail.api_url, &mail.api_key, &mail.from)?),
        None => {
            tracing::info!("mail provider not configured; emails are logged only");
            Arc::new(LogMailer)
        }
    };

    let identity: Option<Arc<dyn IdentityProvider>> = match &config.google {
        Some(google) => Some(Arc::new(GoogleOAuth::new(GoogleOAuthConfig {
            client_id: google.client_id.clone(),
            client_secret: google.client_secret.clone(),
            callback_url: google.callback_url.clone(),
        })?)),
        None => None,
    };

    let backplane = build_backplane(&config)?;

    Ok(AppServices::new(config, store, mailer, identity, backplane))
}

#[cfg(feature = "redis")]
fn build_backplane(config: &AppConfig) -> Result<Arc<dyn Backplane>, StartupError> {
    use taskforge_infra::event_bus::{RedisBackplane, redis_pubsub::DEFAULT_CHANNEL};

    match &config.redis_url {
        Some(url) => {
            tracing::info!("using redis realtime backplane");
            Ok(Arc::new(RedisBackplane::connect(url, DEFAULT_CHANNEL)?))
        }
        None => Ok(Arc::new(InMemoryBackplane::new())),
    }
}

#[cfg(not(feature = "redis"))]
fn build_backplane(config: &AppConfig) -> Result<Arc<dyn Backplane>, StartupError> {
    match &config.redis_url {
        Some(_) => Err(StartupError::RedisUnsupported),
        None => Ok(Arc::new(InMemoryBackplane::new())),
    }
}
