/// Spotify authorization-code flow
///
/// Sits outside the recommendation core: the HTTP layer drives the redirect dance
/// through [`SessionConnector`] and hands the resulting provider to the session.
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::{header::AUTHORIZATION, Client as HttpClient, Url};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    config::SpotifyConfig,
    db::Cache,
    error::{AppError, AppResult},
    services::providers::{MusicProvider, SpotifyProvider},
};

/// Read top tracks, write public and private playlists
pub const SCOPES: &str = "user-top-read playlist-modify-public playlist-modify-private";

/// Tokens are refreshed this long before Spotify would reject them
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl SpotifyToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

pub struct SpotifyAuth {
    http_client: HttpClient,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    accounts_url: String,
}

impl SpotifyAuth {
    pub fn new(config: &SpotifyConfig) -> Self {
        Self {
            http_client: HttpClient::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            accounts_url: config.accounts_url.trim_end_matches('/').to_string(),
        }
    }

    /// URL the user is sent to in order to grant access; `state` comes back on the callback
    pub fn authorize_url(&self, state: &str) -> AppResult<String> {
        let url = Url::parse_with_params(
            &format!("{}/authorize", self.accounts_url),
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::Internal(format!("Invalid accounts URL: {}", e)))?;

        Ok(url.into())
    }

    pub async fn exchange_code(&self, code: &str) -> AppResult<SpotifyToken> {
        self.request_token(
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
            None,
        )
        .await
    }

    pub async fn refresh(&self, token: &SpotifyToken) -> AppResult<SpotifyToken> {
        let refresh_token = token.refresh_token.as_deref().ok_or_else(|| {
            AppError::Auth("Access token expired and no refresh token is available".to_string())
        })?;

        self.request_token(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
            token.refresh_token.clone(),
        )
        .await
    }

    async fn request_token(
        &self,
        form: &[(&str, &str)],
        previous_refresh_token: Option<String>,
    ) -> AppResult<SpotifyToken> {
        let credentials = BASE64.encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .http_client
            .post(format!("{}/api/token", self.accounts_url))
            .header(AUTHORIZATION, format!("Basic {credentials}"))
            .form(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Auth(format!(
                "Token request returned status {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await?;

        Ok(SpotifyToken {
            access_token: token.access_token,
            // Refresh responses may omit the refresh token; the old one stays valid
            refresh_token: token.refresh_token.or(previous_refresh_token),
            expires_at: Utc::now() + TimeDelta::seconds(token.expires_in),
        })
    }
}

/// Turns an OAuth callback into an authenticated provider
#[async_trait::async_trait]
pub trait SessionConnector: Send + Sync {
    fn authorize_url(&self, state: &str) -> AppResult<String>;

    async fn connect(&self, code: &str) -> AppResult<Arc<dyn MusicProvider>>;
}

pub struct SpotifyConnector {
    auth: Arc<SpotifyAuth>,
    api_url: String,
    cache: Option<Cache>,
}

impl SpotifyConnector {
    pub fn new(config: &SpotifyConfig, cache: Option<Cache>) -> Self {
        Self {
            auth: Arc::new(SpotifyAuth::new(config)),
            api_url: config.api_url.clone(),
            cache,
        }
    }
}

#[async_trait::async_trait]
impl SessionConnector for SpotifyConnector {
    fn authorize_url(&self, state: &str) -> AppResult<String> {
        self.auth.authorize_url(state)
    }

    async fn connect(&self, code: &str) -> AppResult<Arc<dyn MusicProvider>> {
        let token = self.auth.exchange_code(code).await?;
        tracing::info!(expires_at = %token.expires_at, "Spotify authorization completed");

        Ok(Arc::new(SpotifyProvider::new(
            self.api_url.clone(),
            token,
            Some(self.auth.clone()),
            self.cache.clone(),
        )))
    }
}
