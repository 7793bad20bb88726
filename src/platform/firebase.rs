//! Firebase implementation of the identity platform
//!
//! Uses the REST APIs directly:
//! - Firestore `documents.patch` for the token document
//! - Identity Toolkit `accounts:update` / `accounts` for the user record

use std::sync::Arc;

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use url::Url;

use crate::config::Config;
use crate::error::{AuthError, Result};
use crate::middleware::GoogleAuthMiddleware;
use crate::sso::ProviderToken;
use super::{CustomTokenSigner, GoogleTokenSource, IdentityPlatform, ServiceAccountKey, UserProfile};

const USER_NOT_FOUND: &str = "USER_NOT_FOUND";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountRequest<'a> {
    local_id: &'a str,
    display_name: &'a str,
    photo_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
}

pub struct FirebasePlatform {
    http: ClientWithMiddleware,
    project_id: String,
    identity_toolkit_url: String,
    firestore_url: String,
    token_collection: String,
    signer: CustomTokenSigner,
}

impl FirebasePlatform {
    /// Build the platform from a service account and configuration
    pub fn new(http: reqwest::Client, key: ServiceAccountKey, config: &Config) -> Result<Self> {
        let signer = CustomTokenSigner::new(&key)?;
        let project_id = key.project_id.clone();
        let tokens = GoogleTokenSource::new(http.clone(), key)?;

        let http = ClientBuilder::new(http)
            .with(GoogleAuthMiddleware::new(Arc::new(tokens)))
            .build();

        Ok(Self {
            http,
            project_id,
            identity_toolkit_url: config.identity_toolkit_url.clone(),
            firestore_url: config.firestore_url.clone(),
            token_collection: config.token_collection.clone(),
            signer,
        })
    }

    fn document_url(&self, uid: &str) -> Result<Url> {
        let mut url = Url::parse(&self.firestore_url)?;
        url.path_segments_mut()
            .map_err(|_| AuthError::Config("Firestore URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend([
                "v1",
                "projects",
                self.project_id.as_str(),
                "databases",
                "(default)",
                "documents",
            ])
            .extend(self.token_collection.split('/').filter(|s| !s.is_empty()))
            .push(uid);
        Ok(url)
    }

    fn accounts_url(&self, action: &str) -> Result<Url> {
        let mut url = Url::parse(&self.identity_toolkit_url)?;
        url.path_segments_mut()
            .map_err(|_| AuthError::Config("Identity Toolkit URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v1", "projects", self.project_id.as_str(), action]);
        Ok(url)
    }

    async fn update_account(&self, request: &AccountRequest<'_>) -> Result<bool> {
        let response = self
            .http
            .post(self.accounts_url("accounts:update")?)
            .json(request)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(true);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if google_error_message(&body).starts_with(USER_NOT_FOUND) {
            return Ok(false);
        }

        Err(AuthError::Platform(format!(
            "Account update failed with status {}: {}",
            status, body
        )))
    }

    async fn create_account(&self, request: &AccountRequest<'_>) -> Result<()> {
        let response = self
            .http
            .post(self.accounts_url("accounts")?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Platform(format!(
                "Account creation failed with status {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

fn google_error_message(body: &str) -> String {
    serde_json::from_str::<GoogleErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_default()
}

/// Firestore typed field values for the token document
fn token_fields(token: &ProviderToken) -> Value {
    let mut fields = Map::new();
    fields.insert("AccessToken".into(), json!({ "stringValue": token.access_token }));
    fields.insert("TokenType".into(), json!({ "stringValue": token.token_type }));
    fields.insert("RefreshToken".into(), json!({ "stringValue": token.refresh_token }));
    if let Some(expiry) = token.expiry {
        fields.insert(
            "Expiry".into(),
            json!({ "timestampValue": expiry.to_rfc3339_opts(chrono::SecondsFormat::Micros, true) }),
        );
    }
    json!({ "fields": fields })
}

#[async_trait]
impl IdentityPlatform for FirebasePlatform {
    async fn store_provider_token(&self, uid: &str, token: &ProviderToken) -> Result<()> {
        let url = self.document_url(uid)?;
        tracing::debug!("Writing provider token document {}", url.path());

        // No update mask: the document is replaced as a whole
        let response = self
            .http
            .patch(url)
            .json(&token_fields(token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Platform(format!(
                "Token document write failed with status {}: {}",
                status, body
            )));
        }

        Ok(())
    }

    async fn upsert_user(&self, profile: &UserProfile) -> Result<()> {
        let request = AccountRequest {
            local_id: &profile.uid,
            display_name: &profile.display_name,
            photo_url: &profile.photo_url,
        };

        if self.update_account(&request).await? {
            tracing::debug!(uid = %profile.uid, "Updated existing account");
            return Ok(());
        }

        tracing::info!(uid = %profile.uid, "Account not found, creating");
        self.create_account(&request).await
    }

    async fn mint_session_token(&self, uid: &str) -> Result<String> {
        self.signer.sign(uid)
    }
}
