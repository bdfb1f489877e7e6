//! External identity providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod google;

pub use google::{GoogleOAuth, GoogleOAuthConfig};

/// Identity asserted by a provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProfile {
    pub provider: String,
    /// Stable provider-side user id.
    pub subject: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("identity provider transport error: {0}")]
    Transport(String),

    #[error("identity provider rejected the code exchange: {0}")]
    Rejected(String),

    #[error("identity provider returned an unusable profile: {0}")]
    InvalidProfile(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name stored on external credentials, e.g. `google`.
    fn name(&self) -> &str;

    /// Where to send the browser to start the flow.
    fn authorize_url(&self, state: &str) -> Result<String, OAuthError>;

    /// Trade an authorization code for a verified profile.
    async fn exchange(&self, code: &str) -> Result<ExternalProfile, OAuthError>;
}
