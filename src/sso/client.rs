//! EVE SSO client
//!
//! Builds the authorization redirect and exchanges authorization codes for tokens.

use url::Url;

use crate::config::Config;
use crate::error::{AuthError, Result};
use super::TokenResponse;

/// OAuth 2.0 client for EVE Online SSO
#[derive(Debug, Clone)]
pub struct SsoClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_url: String,
    scopes: Vec<String>,
    authorize_url: String,
    token_url: String,
}

impl SsoClient {
    /// Create a client from the application configuration
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_url: config.redirect_url.clone(),
            scopes: config.scopes(),
            authorize_url: config.authorize_url.clone(),
            token_url: config.token_url.clone(),
        }
    }

    /// Build authorization URL for the given state
    pub fn authorization_url(&self, state: &str) -> Result<String> {
        let mut url = Url::parse(&self.authorize_url)?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_url)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state);

        Ok(url.to_string())
    }

    /// Exchange authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_url.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Exchange(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Exchange(format!(
                "Token exchange failed with status {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Exchange(format!("Failed to parse token response: {}", e)))?;

        if token.access_token.is_empty() {
            return Err(AuthError::Exchange(
                "Token response contained an empty access token".to_string(),
            ));
        }

        Ok(token)
    }
}
