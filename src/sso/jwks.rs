//! EVE SSO signing keys
//!
//! Keys are cached by `kid`. A lookup miss refetches the key set, at most once
//! per refresh interval, so rotated keys are picked up without hammering SSO.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::{AuthError, Result};

const JWKS_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
struct Jwk {
    #[serde(default)]
    kid: Option<String>,
    kty: String,
    #[serde(default)]
    alg: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
    #[serde(default)]
    crv: Option<String>,
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    y: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

/// Cached JSON Web Key Set
pub struct JwksCache {
    http: reqwest::Client,
    jwks_url: String,
    keys: RwLock<HashMap<String, (Algorithm, DecodingKey)>>,
    last_refresh: RwLock<Option<Instant>>,
}

impl JwksCache {
    pub fn new(http: reqwest::Client, jwks_url: String) -> Self {
        Self {
            http,
            jwks_url,
            keys: RwLock::new(HashMap::new()),
            last_refresh: RwLock::new(None),
        }
    }

    /// Get the algorithm and decoding key for `kid`
    pub async fn get_key(&self, kid: &str) -> Result<(Algorithm, DecodingKey)> {
        {
            let keys = self.keys.read().await;
            if let Some((alg, key)) = keys.get(kid) {
                return Ok((*alg, key.clone()));
            }
        }

        self.refresh().await?;

        let keys = self.keys.read().await;
        keys.get(kid)
            .map(|(alg, key)| (*alg, key.clone()))
            .ok_or_else(|| AuthError::Validation(format!("No signing key found for kid {}", kid)))
    }

    async fn refresh(&self) -> Result<()> {
        let mut last_refresh = self.last_refresh.write().await;
        if let Some(at) = *last_refresh {
            if at.elapsed() < JWKS_REFRESH_INTERVAL {
                tracing::debug!("Skipping JWKS refresh, last fetch was {:?} ago", at.elapsed());
                return Ok(());
            }
        }

        tracing::debug!("Fetching JWKS from {}", self.jwks_url);

        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::Jwks(format!("Failed to fetch JWKS: {}", e)))?;

        if !response.status().is_success() {
            return Err(AuthError::Jwks(format!(
                "JWKS request failed with status: {}",
                response.status()
            )));
        }

        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::Jwks(format!("Failed to parse JWKS: {}", e)))?;

        let keys = parse_keys(set);
        tracing::debug!("Loaded {} signing keys", keys.len());

        *self.keys.write().await = keys;
        *last_refresh = Some(Instant::now());
        Ok(())
    }
}

/// Usable keys by `kid`, skipping anything that cannot verify a token
fn parse_keys(set: JwkSet) -> HashMap<String, (Algorithm, DecodingKey)> {
    let mut keys = HashMap::new();

    for jwk in set.keys {
        let Some(kid) = jwk.kid.clone() else {
            continue;
        };

        let decoded = match jwk.kty.as_str() {
            "RSA" => match (jwk.n.as_deref(), jwk.e.as_deref()) {
                (Some(n), Some(e)) if !n.is_empty() && !e.is_empty() => {
                    DecodingKey::from_rsa_components(n, e)
                }
                _ => continue,
            },
            "EC" => match (jwk.x.as_deref(), jwk.y.as_deref()) {
                (Some(x), Some(y)) if !x.is_empty() && !y.is_empty() => {
                    DecodingKey::from_ec_components(x, y)
                }
                _ => continue,
            },
            other => {
                tracing::debug!("Ignoring JWK {} with key type {}", kid, other);
                continue;
            }
        };

        match decoded {
            Ok(key) => {
                keys.insert(kid, (key_algorithm(&jwk), key));
            }
            Err(e) => tracing::debug!("Ignoring malformed JWK {}: {}", kid, e),
        }
    }

    keys
}

fn key_algorithm(jwk: &Jwk) -> Algorithm {
    match (jwk.kty.as_str(), jwk.alg.as_deref()) {
        ("RSA", Some("RS384")) => Algorithm::RS384,
        ("RSA", Some("RS512")) => Algorithm::RS512,
        ("RSA", _) => Algorithm::RS256,
        ("EC", Some("ES384")) => Algorithm::ES384,
        ("EC", Some("ES256")) => Algorithm::ES256,
        ("EC", _) if jwk.crv.as_deref() == Some("P-384") => Algorithm::ES384,
        _ => Algorithm::ES256,
    }
}
