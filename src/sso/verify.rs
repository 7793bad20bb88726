//! Character token verification

use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, Validation};

use crate::error::{AuthError, Result};
use super::{EveClaims, JwksCache};

/// Verifies EVE SSO access tokens against the published signing keys
pub struct TokenVerifier {
    jwks: Arc<JwksCache>,
    audience: String,
    issuers: Vec<String>,
}

impl TokenVerifier {
    pub fn new(jwks: Arc<JwksCache>, audience: String, issuers: Vec<String>) -> Self {
        Self {
            jwks,
            audience,
            issuers,
        }
    }

    /// Check signature, `exp`, `iss` and `aud`, returning the decoded claims
    pub async fn verify(&self, token: &str) -> Result<EveClaims> {
        let header = decode_header(token)
            .map_err(|e| AuthError::Validation(format!("Invalid JWT header: {}", e)))?;

        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| AuthError::Validation("JWT header missing kid".to_string()))?;

        let (alg, key) = self.jwks.get_key(kid).await?;
        if header.alg != alg {
            return Err(AuthError::Validation(format!(
                "JWT algorithm {:?} does not match key {}",
                header.alg, kid
            )));
        }

        let mut validation = Validation::new(alg);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(self.issuers.as_slice());
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let data = decode::<EveClaims>(token, &key, &validation)
            .map_err(|e| AuthError::Validation(format!("JWT validation failed: {}", e)))?;

        Ok(data.claims)
    }
}
