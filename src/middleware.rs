//! HTTP middleware for Google bearer token injection and 401 retry logic
//!
//! Implements `reqwest-middleware::Middleware` so Firestore and Identity Toolkit
//! requests carry a service account access token. A 401 renews the token and
//! retries once.

use crate::platform::GoogleTokenSource;
use async_trait::async_trait;
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result as MiddlewareResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Middleware that injects Google bearer tokens and handles 401 responses
pub struct GoogleAuthMiddleware {
    tokens: Arc<GoogleTokenSource>,
}

impl GoogleAuthMiddleware {
    pub fn new(tokens: Arc<GoogleTokenSource>) -> Self {
        Self { tokens }
    }
}

fn set_bearer(req: &mut Request, token: &str) -> MiddlewareResult<()> {
    let value = format!("Bearer {}", token).parse().map_err(|e| {
        reqwest_middleware::Error::Middleware(anyhow::anyhow!("Invalid token: {}", e))
    })?;
    req.headers_mut().insert(reqwest::header::AUTHORIZATION, value);
    Ok(())
}

#[async_trait]
impl Middleware for GoogleAuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> MiddlewareResult<Response> {
        // 1. Get access token and inject into Authorization header
        let token = self
            .tokens
            .get_token()
            .await
            .map_err(|e| reqwest_middleware::Error::Middleware(e.into()))?;
        set_bearer(&mut req, &token)?;

        debug!("Injected Google bearer token for {}", req.url().path());

        // 2. Streaming bodies can't be replayed, send those without retry
        let Some(retry) = req.try_clone() else {
            return next.run(req, extensions).await;
        };

        let response = next.clone().run(req, extensions).await?;

        // 3. Handle 401 Unauthorized - renew token and retry once
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            warn!("Google API returned 401 Unauthorized, renewing token and retrying");

            let new_token = self
                .tokens
                .renew_token(&token)
                .await
                .map_err(|e| reqwest_middleware::Error::Middleware(e.into()))?;

            let mut retry = retry;
            set_bearer(&mut retry, &new_token)?;

            return next.run(retry, extensions).await;
        }

        Ok(response)
    }
}
