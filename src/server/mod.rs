//! HTTP server exposing the SSO callback

pub mod callback;

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};

use crate::config::Config;
use crate::error::Result;
use crate::platform::{FirebasePlatform, IdentityPlatform};
use crate::sso::{JwksCache, SsoClient, TokenVerifier};

const HTTP_TIMEOUT_SECS: u64 = 15;

/// Shared state of the callback handler
pub struct AppState {
    pub config: Config,
    pub sso: SsoClient,
    pub verifier: TokenVerifier,
    pub platform: Arc<dyn IdentityPlatform>,
}

impl AppState {
    /// Wire the EVE SSO side around an existing identity platform
    pub fn new(config: Config, http: reqwest::Client, platform: Arc<dyn IdentityPlatform>) -> Self {
        let jwks = JwksCache::new(http.clone(), config.jwks_url.clone());
        let verifier = TokenVerifier::new(
            Arc::new(jwks),
            config.client_id.clone(),
            config.issuers.clone(),
        );
        let sso = SsoClient::new(http, &config);

        Self {
            config,
            sso,
            verifier,
            platform,
        }
    }

    /// Build the production state backed by Firebase
    pub fn from_config(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        let platform = FirebasePlatform::new(http.clone(), config.service_account()?, &config)?;

        Ok(Self::new(config, http, Arc::new(platform)))
    }
}

/// Router serving the callback on the configured path
pub fn router(state: Arc<AppState>) -> Router {
    let path = state.config.callback_path.clone();
    Router::new()
        .route(&path, get(callback::handle_callback))
        .with_state(state)
}

/// Serve the callback until Ctrl+C
pub async fn run_server(state: AppState) -> Result<()> {
    let addr = state.config.listen_addr();
    let path = state.config.callback_path.clone();
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("SSO callback listening on http://{}{}", addr, path);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down gracefully...");
            }
        })
        .await?;

    tracing::info!("SSO callback server stopped");
    Ok(())
}
