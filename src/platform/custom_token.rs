//! Firebase custom tokens
//!
//! A custom token is an RS256 JWT signed by the service account. The web client
//! exchanges it with `signInWithCustomToken` for a Firebase session.

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};
use super::ServiceAccountKey;

pub const FIREBASE_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// Custom tokens are accepted for at most one hour
const CUSTOM_TOKEN_LIFETIME_SECS: i64 = 3600;
const MAX_UID_LEN: usize = 128;

#[derive(Debug, Serialize, Deserialize)]
pub struct CustomTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub uid: String,
}

/// Signs Firebase custom tokens with the service account key
pub struct CustomTokenSigner {
    client_email: String,
    header: Header,
    encoding_key: EncodingKey,
}

impl CustomTokenSigner {
    pub fn new(key: &ServiceAccountKey) -> Result<Self> {
        Ok(Self {
            client_email: key.client_email.clone(),
            header: key.jwt_header(),
            encoding_key: key.encoding_key()?,
        })
    }

    /// Mint a custom token for `uid`
    pub fn sign(&self, uid: &str) -> Result<String> {
        if uid.is_empty() || uid.len() > MAX_UID_LEN {
            return Err(AuthError::Platform(format!(
                "uid must be 1-{} characters, got {}",
                MAX_UID_LEN,
                uid.len()
            )));
        }

        let now = Utc::now().timestamp();
        let claims = CustomTokenClaims {
            iss: self.client_email.clone(),
            sub: self.client_email.clone(),
            aud: FIREBASE_AUDIENCE.to_string(),
            iat: now,
            exp: now + CUSTOM_TOKEN_LIFETIME_SECS,
            uid: uid.to_string(),
        };

        Ok(encode(&self.header, &claims, &self.encoding_key)?)
    }
}
