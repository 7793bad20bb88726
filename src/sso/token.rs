//! Provider token types
//!
//! `TokenResponse` is the raw token endpoint payload, `ProviderToken` is the
//! same token with its absolute expiry fixed at receipt time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Token response from EVE SSO
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Token as stored on the identity platform
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderToken {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
    pub expiry: Option<DateTime<Utc>>,
}

impl ProviderToken {
    /// Convert a token response received at `now`
    pub fn received_at(response: TokenResponse, now: DateTime<Utc>) -> Self {
        // An out-of-range lifetime is stored as no expiry
        let expiry = response
            .expires_in
            .filter(|secs| *secs > 0)
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime));

        if expiry.is_none() && response.expires_in.is_some_and(|secs| secs > 0) {
            tracing::warn!(
                expires_in = response.expires_in,
                "Token lifetime out of range, storing without expiry"
            );
        }

        ProviderToken {
            access_token: response.access_token,
            token_type: response.token_type.unwrap_or_default(),
            refresh_token: response.refresh_token.unwrap_or_default(),
            expiry,
        }
    }
}

impl From<TokenResponse> for ProviderToken {
    fn from(response: TokenResponse) -> Self {
        ProviderToken::received_at(response, Utc::now())
    }
}
