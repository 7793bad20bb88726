//! Character token claims

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// `scp` is a bare string when a single scope was granted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scopes {
    One(String),
    Many(Vec<String>),
}

impl Default for Scopes {
    fn default() -> Self {
        Scopes::Many(Vec::new())
    }
}

impl Scopes {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Scopes::One(scope) => vec![scope.clone()],
            Scopes::Many(scopes) => scopes.clone(),
        }
    }
}

/// Claims of an EVE SSO v2 access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EveClaims {
    /// `CHARACTER:EVE:<character id>`
    pub sub: String,
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub scp: Scopes,
    #[serde(default)]
    pub jti: Option<String>,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub azp: Option<String>,
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    pub exp: i64,
    pub iss: String,
}

impl EveClaims {
    /// Numeric character id taken from the subject
    pub fn character_id(&self) -> Result<&str> {
        let mut parts = self.sub.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("CHARACTER"), Some(_), Some(id), None)
                if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) =>
            {
                Ok(id)
            }
            _ => Err(AuthError::Claims(format!(
                "Unexpected subject format: {}",
                self.sub
            ))),
        }
    }
}
