//! SSO callback handler
//!
//! Without a `code` the request starts a login: a fresh state is stored in a
//! cookie and the browser is sent to EVE SSO. With a `code` the state is
//! checked, the code is exchanged, the character token verified, the Firebase
//! account provisioned and the browser redirected to the frontend with both
//! tokens.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{error, info, warn};
use url::Url;

use crate::config::{UidSource, CHARACTER_ID_PLACEHOLDER};
use crate::error::Result;
use crate::platform::UserProfile;
use crate::sso::{state, ProviderToken};
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

pub async fn handle_callback(
    State(app): State<Arc<AppState>>,
    jar: CookieJar,
    query: std::result::Result<Query<CallbackQuery>, QueryRejection>,
) -> Response {
    let params = match query {
        Ok(Query(params)) => params,
        Err(e) => {
            warn!("Unparseable callback query, restarting login: {}", e);
            return start_login(&app, jar);
        }
    };

    if let Some(ref error) = params.error {
        warn!(
            error = %error,
            description = params.error_description.as_deref().unwrap_or(""),
            "EVE SSO returned an error"
        );
    }

    let code = match params.code.as_deref() {
        Some(code) if !code.is_empty() => code,
        _ => return start_login(&app, jar),
    };

    if let Err(e) = state::verify_state(&jar, &app.config.state_cookie, params.state.as_deref()) {
        warn!("Rejected callback: {}", e);
        return e.into_response();
    }

    match complete_login(&app, code).await {
        Ok(location) => moved_permanently(location).into_response(),
        Err(e) => {
            error!("Login failed: {}", e);
            e.into_response()
        }
    }
}

/// Send the browser to EVE SSO with a fresh anti-forgery state
fn start_login(app: &AppState, jar: CookieJar) -> Response {
    let state = state::generate_state();

    let location = match app.sso.authorization_url(&state) {
        Ok(url) => url,
        Err(e) => {
            error!("Failed to build authorization URL: {}", e);
            return e.into_response();
        }
    };

    let jar = jar.add(state::state_cookie(&app.config.state_cookie, &state));

    (
        jar,
        [(header::CACHE_CONTROL, "private")],
        moved_permanently(location),
    )
        .into_response()
}

fn moved_permanently(location: String) -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)])
}

/// Exchange the code and provision the account, returning the frontend URL
async fn complete_login(app: &AppState, code: &str) -> Result<String> {
    let token = app.sso.exchange_code(code).await?;
    let claims = app.verifier.verify(&token.access_token).await?;

    let character_id = claims.character_id()?;
    let uid = match app.config.uid_source {
        UidSource::Subject => claims.sub.clone(),
        UidSource::CharacterId => character_id.to_string(),
    };

    let token = ProviderToken::from(token);
    app.platform.store_provider_token(&uid, &token).await?;

    let profile = UserProfile {
        uid: uid.clone(),
        display_name: claims.name.clone(),
        photo_url: portrait_url(&app.config.portrait_url, character_id),
    };
    app.platform.upsert_user(&profile).await?;

    let session_token = app.platform.mint_session_token(&uid).await?;

    info!(
        character_id = %character_id,
        uid = %uid,
        scopes = claims.scp.to_vec().len(),
        "Character signed in"
    );

    login_redirect_url(&app.config.login_redirect_url, &session_token, &token.access_token)
}

fn portrait_url(template: &str, character_id: &str) -> String {
    template.replace(CHARACTER_ID_PLACEHOLDER, character_id)
}

fn login_redirect_url(base: &str, session_token: &str, provider_token: &str) -> Result<String> {
    let mut url = Url::parse(base)?;
    url.query_pairs_mut()
        .append_pair("token", session_token)
        .append_pair("eve_token", provider_token);
    Ok(url.to_string())
}
