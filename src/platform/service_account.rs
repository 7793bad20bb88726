//! Google service account credentials
//!
//! Parses the Firebase Admin JSON and trades a signed JWT assertion for a
//! short-lived Google OAuth access token (RFC 7523 JWT bearer grant).

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{AuthError, Result};

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const TOKEN_EXPIRY_BUFFER_SECS: i64 = 60;

/// Scopes needed for Firestore and Identity Toolkit admin calls
pub const GOOGLE_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/datastore",
    "https://www.googleapis.com/auth/identitytoolkit",
    "https://www.googleapis.com/auth/firebase",
    "https://www.googleapis.com/auth/userinfo.email",
];

/// Service account key file contents
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Parse a service account JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(json)
            .map_err(|e| AuthError::ServiceAccount(format!("Invalid service account JSON: {}", e)))?;

        if let Some(ref key_type) = key.key_type {
            if key_type != "service_account" {
                return Err(AuthError::ServiceAccount(format!(
                    "Expected a service_account key, got {}",
                    key_type
                )));
            }
        }

        let required = [
            (&key.project_id, "project_id"),
            (&key.private_key, "private_key"),
            (&key.client_email, "client_email"),
        ];
        for (value, name) in required {
            if value.is_empty() {
                return Err(AuthError::ServiceAccount(format!("{} is missing", name)));
            }
        }

        Ok(key)
    }

    /// RSA signing key from the PEM private key
    pub fn encoding_key(&self) -> Result<EncodingKey> {
        EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| AuthError::ServiceAccount(format!("Invalid private key: {}", e)))
    }

    /// JWT header carrying the key id when present
    pub fn jwt_header(&self) -> Header {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();
        header
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::seconds(TOKEN_EXPIRY_BUFFER_SECS)
    }
}

/// Source of Google OAuth access tokens for a service account
pub struct GoogleTokenSource {
    http: reqwest::Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    token: RwLock<Option<CachedToken>>,
}

impl GoogleTokenSource {
    pub fn new(http: reqwest::Client, key: ServiceAccountKey) -> Result<Self> {
        let encoding_key = key.encoding_key()?;
        Ok(Self {
            http,
            key,
            encoding_key,
            token: RwLock::new(None),
        })
    }

    /// Get a valid access token (cached or freshly issued)
    pub async fn get_token(&self) -> Result<String> {
        {
            let token_guard = self.token.read().await;
            if let Some(ref token) = *token_guard {
                if token.is_valid(Utc::now()) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut token_guard = self.token.write().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(ref token) = *token_guard {
            if token.is_valid(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }

        self.replace_token(&mut token_guard).await
    }

    /// Replace a token the API rejected
    ///
    /// When the cache already holds a different token, that one is returned
    /// instead of requesting yet another.
    pub async fn renew_token(&self, rejected: &str) -> Result<String> {
        let mut token_guard = self.token.write().await;

        if let Some(ref token) = *token_guard {
            if token.access_token != rejected && token.is_valid(Utc::now()) {
                return Ok(token.access_token.clone());
            }
        }

        self.replace_token(&mut token_guard).await
    }

    async fn replace_token(&self, slot: &mut Option<CachedToken>) -> Result<String> {
        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *slot = Some(token);

        Ok(access_token)
    }

    async fn request_token(&self) -> Result<CachedToken> {
        let now = Utc::now();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: GOOGLE_SCOPES.join(" "),
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        let assertion = encode(&self.key.jwt_header(), &claims, &self.encoding_key)?;

        tracing::debug!("Requesting Google access token for {}", self.key.client_email);

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::ServiceAccount(format!(
                "Google token request failed with status {}: {}",
                status, body
            )));
        }

        let token: GoogleTokenResponse = response.json().await?;
        // Google access tokens never outlive the assertion
        let expires_in = token
            .expires_in
            .unwrap_or(ASSERTION_LIFETIME_SECS)
            .clamp(0, ASSERTION_LIFETIME_SECS);

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: now + Duration::seconds(expires_in),
        })
    }
}
