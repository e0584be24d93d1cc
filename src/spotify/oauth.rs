//! Spotify OAuth authorization-code flow.

use super::models::TokenInfo;
use crate::config::SpotifySettings;
use crate::error::{MoodlistError, Result};
use tracing::{info, instrument};
use url::Url;

/// OAuth application credentials and endpoints.
pub struct SpotifyOAuth {
    http: reqwest::Client,
    accounts_base: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: String,
}

impl SpotifyOAuth {
    /// Build the OAuth helper, failing when the app credentials are missing.
    pub fn from_settings(settings: &SpotifySettings) -> Result<Self> {
        let client_id = settings
            .client_id
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MoodlistError::MissingCredential("SPOTIFY_CLIENT_ID not set".to_string()))?;
        let client_secret = settings
            .client_secret
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                MoodlistError::MissingCredential("SPOTIFY_CLIENT_SECRET not set".to_string())
            })?;

        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;

        Ok(Self {
            http,
            accounts_base: settings.accounts_base.trim_end_matches('/').to_string(),
            client_id,
            client_secret,
            redirect_uri: settings.redirect_uri.clone(),
            scopes: settings.scopes.clone(),
        })
    }

    /// URL the user is sent to in order to grant access.
    pub fn authorize_url(&self, state: &str) -> Result<String> {
        let url = Url::parse_with_params(
            &format!("{}/authorize", self.accounts_base),
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", self.scopes.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| MoodlistError::Config(format!("Invalid accounts URL: {}", e)))?;

        Ok(url.into())
    }

    /// Exchange an authorization code for an access token.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> Result<TokenInfo> {
        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MoodlistError::OAuth(format!(
                "Token exchange failed with {}: {}",
                status, body
            )));
        }

        let token: TokenInfo = response.json().await?;
        info!("Obtained Spotify access token (expires in {}s)", token.expires_in);
        Ok(token)
    }
}
