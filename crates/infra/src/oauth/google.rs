//! Google OpenID Connect (authorization code flow).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use super::{ExternalProfile, IdentityProvider, OAuthError};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

#[derive(Debug, Clone)]
pub struct GoogleOAuth {
    http: reqwest::Client,
    config: GoogleOAuthConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleOAuth {
    pub fn new(config: GoogleOAuthConfig) -> Result<Self, OAuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| OAuthError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }
}

impl UserInfo {
    fn into_profile(self, provider: &str) -> Result<ExternalProfile, OAuthError> {
        let email = self
            .email
            .ok_or_else(|| OAuthError::InvalidProfile("no email on profile".into()))?;
        if !self.email_verified {
            return Err(OAuthError::InvalidProfile("email is not verified".into()));
        }
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        Ok(ExternalProfile {
            provider: provider.to_string(),
            subject: self.sub,
            email,
            name,
            avatar: self.picture,
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleOAuth {
    fn name(&self) -> &str {
        "google"
    }

    fn authorize_url(&self, state: &str) -> Result<String, OAuthError> {
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
            ],
        )
        .map_err(|e| OAuthError::Transport(e.to_string()))?;
        Ok(url.into())
    }

    async fn exchange(&self, code: &str) -> Result<ExternalProfile, OAuthError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| OAuthError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(OAuthError::Rejected(format!("token endpoint returned {}", response.status())));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| OAuthError::Rejected(e.to_string()))?;

        let response = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| OAuthError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(OAuthError::Rejected(format!("userinfo endpoint returned {}", response.status())));
        }
        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| OAuthError::InvalidProfile(e.to_string()))?;

        info.into_profile(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GoogleOAuth {
        GoogleOAuth::new(GoogleOAuthConfig {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            callback_url: "http://localhost:5000/api/v1/auth/google/callback".into(),
        })
        .unwrap()
    }

    #[test]
    fn authorize_url_carries_state_and_callback() {
        let url = Url::parse(&provider().authorize_url("abc123").unwrap()).unwrap();
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(params.contains(&("state".into(), "abc123".into())));
        assert!(params.contains(&("client_id".into(), "cid".into())));
        assert!(params.contains(&(
            "redirect_uri".into(),
            "http://localhost:5000/api/v1/auth/google/callback".into()
        )));
    }

    #[test]
    fn unverified_email_is_rejected() {
        let info = UserInfo {
            sub: "1".into(),
            email: Some("ada@example.com".into()),
            email_verified: false,
            name: None,
            picture: None,
        };
        assert!(matches!(info.into_profile("google"), Err(OAuthError::InvalidProfile(_))));
    }

    #[test]
    fn missing_name_falls_back_to_email_local_part() {
        let info = UserInfo {
            sub: "1".into(),
            email: Some("ada@example.com".into()),
            email_verified: true,
            name: None,
            picture: None,
        };
        let profile = info.into_profile("google").unwrap();
        assert_eq!(profile.name, "ada");
        assert_eq!(profile.provider, "google");
    }
}
