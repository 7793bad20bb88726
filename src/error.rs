//! Error types for the EVE auth callback

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("cookie error")]
    MissingStateCookie,

    #[error("state error")]
    StateMismatch,

    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("JWKS error: {0}")]
    Jwks(String),

    #[error("Token validation failed: {0}")]
    Validation(String),

    #[error("Invalid claims: {0}")]
    Claims(String),

    #[error("Identity platform error: {0}")]
    Platform(String),

    #[error("Service account error: {0}")]
    ServiceAccount(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl AuthError {
    /// HTTP status returned to the browser for this error
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingStateCookie | AuthError::StateMismatch => StatusCode::BAD_REQUEST,
            AuthError::Validation(_) | AuthError::Claims(_) | AuthError::Jwt(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Exchange(_)
            | AuthError::Jwks(_)
            | AuthError::Platform(_)
            | AuthError::Http(_)
            | AuthError::Middleware(_) => StatusCode::BAD_GATEWAY,
            AuthError::Config(_)
            | AuthError::ServiceAccount(_)
            | AuthError::Io(_)
            | AuthError::UrlParse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Upstream details stay in the logs
        let body = match self {
            AuthError::MissingStateCookie | AuthError::StateMismatch => self.to_string(),
            _ => status
                .canonical_reason()
                .unwrap_or("error")
                .to_lowercase(),
        };

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
