//! Integration tests for the SSO callback
//!
//! Drives the axum router end to end against mocked EVE SSO and Google APIs.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use clap::Parser;
use eve_auth_callback::config::Config;
use eve_auth_callback::error::Result;
use eve_auth_callback::platform::custom_token::{CustomTokenClaims, FIREBASE_AUDIENCE};
use eve_auth_callback::platform::{IdentityPlatform, UserProfile};
use eve_auth_callback::server::{router, AppState};
use eve_auth_callback::sso::ProviderToken;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mockito::{Matcher, Mock, ServerGuard};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::json;
use tower::ServiceExt;
use url::Url;

const CLIENT_ID: &str = "test-client-id";
const STATE: &str = "test-state";
const SUBJECT: &str = "CHARACTER:EVE:90000001";
const SERVICE_ACCOUNT_EMAIL: &str = "firebase-adminsdk@eve-income.iam.gserviceaccount.com";

struct Keys {
    eve_private: RsaPrivateKey,
    admin_private: RsaPrivateKey,
}

impl Keys {
    fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Keys {
            eve_private: RsaPrivateKey::new(&mut rng, 2048).unwrap(),
            admin_private: RsaPrivateKey::new(&mut rng, 2048).unwrap(),
        }
    }

    fn eve_encoding_key(&self) -> EncodingKey {
        let pem = self.eve_private.to_pkcs8_pem(LineEnding::LF).unwrap();
        EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap()
    }

    fn admin_json(&self, token_uri: &str) -> String {
        let pem = self.admin_private.to_pkcs8_pem(LineEnding::LF).unwrap();
        json!({
            "type": "service_account",
            "project_id": "eve-income",
            "private_key_id": "admin-key-1",
            "private_key": pem.as_str(),
            "client_email": SERVICE_ACCOUNT_EMAIL,
            "token_uri": token_uri,
        })
        .to_string()
    }

    fn admin_decoding_key(&self) -> DecodingKey {
        let pem = self
            .admin_private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        DecodingKey::from_rsa_pem(pem.as_bytes()).unwrap()
    }
}

fn character_token(key: &EncodingKey) -> String {
    token_for_subject(key, SUBJECT)
}

fn token_for_subject(key: &EncodingKey, subject: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some("JWT-Signature-Key".to_string());

    encode(
        &header,
        &json!({
            "scp": ["esi-wallet.read_character_wallet.v1"],
            "jti": "4b5f7a6c-0000-4000-8000-000000000000",
            "kid": "JWT-Signature-Key",
            "sub": subject,
            "azp": CLIENT_ID,
            "tenant": "tranquility",
            "tier": "live",
            "region": "world",
            "aud": [CLIENT_ID, "EVE Online"],
            "name": "Test Pilot",
            "owner": "owner-hash",
            "exp": now + 1200,
            "iat": now,
            "iss": "https://login.eveonline.com"
        }),
        key,
    )
    .unwrap()
}

/// Mock EVE SSO token + JWKS endpoints
async fn mock_eve(server: &mut ServerGuard, keys: &Keys, access_token: &str) -> Vec<Mock> {
    let public = keys.eve_private.to_public_key();
    let jwks = json!({
        "keys": [{
            "alg": "RS256",
            "kty": "RSA",
            "kid": "JWT-Signature-Key",
            "use": "sig",
            "n": URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
        }]
    });

    let token = server
        .mock("POST", "/v2/oauth/token")
        .match_body(Matcher::UrlEncoded("code".into(), "the-code".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "access_token": access_token,
                "expires_in": 1199,
                "token_type": "Bearer",
                "refresh_token": "refresh-123"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let jwks = server
        .mock("GET", "/oauth/jwks")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(jwks.to_string())
        .create_async()
        .await;

    vec![token, jwks]
}

fn config(eve: &ServerGuard, google: &ServerGuard, admin_json: &str, extra: &[&str]) -> Config {
    let eve_url = eve.url();
    let google_url = google.url();
    let token_url = format!("{}/v2/oauth/token", eve_url);
    let jwks_url = format!("{}/oauth/jwks", eve_url);

    let mut args = vec![
        "eve-auth-callback",
        "--client-id",
        CLIENT_ID,
        "--client-secret",
        "test-secret",
        "--redirect-url",
        "https://example.com/callback",
        "--admin-json",
        admin_json,
        "--token-url",
        token_url.as_str(),
        "--jwks-url",
        jwks_url.as_str(),
        "--identity-toolkit-url",
        google_url.as_str(),
        "--firestore-url",
        google_url.as_str(),
        "--callback-path",
        "/callback",
    ];
    args.extend_from_slice(extra);

    Config::try_parse_from(args).unwrap()
}

fn callback_request() -> Request<Body> {
    Request::get(format!("/callback?code=the-code&state={}", STATE))
        .header(header::COOKIE, format!("__session={}", STATE))
        .body(Body::empty())
        .unwrap()
}

fn query_value(location: &str, name: &str) -> Option<String> {
    Url::parse(location)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

#[tokio::test]
async fn test_full_login_creates_firebase_user() {
    let keys = Keys::generate();
    let mut eve = mockito::Server::new_async().await;
    let mut google = mockito::Server::new_async().await;

    let access_token = character_token(&keys.eve_encoding_key());
    let _eve_mocks = mock_eve(&mut eve, &keys, &access_token).await;

    let _google_token = google
        .mock("POST", "/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"ya29.admin","expires_in":3599,"token_type":"Bearer"}"#)
        .create_async()
        .await;
    let document = google
        .mock(
            "PATCH",
            Matcher::Regex(r"/documents/access_token/CHARACTER(:|%3A)EVE(:|%3A)90000001$".to_string()),
        )
        .match_header("authorization", "Bearer ya29.admin")
        .match_body(Matcher::PartialJson(json!({
            "fields": {
                "AccessToken": { "stringValue": access_token },
                "RefreshToken": { "stringValue": "refresh-123" },
                "TokenType": { "stringValue": "Bearer" }
            }
        })))
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let update = google
        .mock("POST", "/v1/projects/eve-income/accounts:update")
        .with_status(400)
        .with_body(r#"{"error":{"code":400,"message":"USER_NOT_FOUND"}}"#)
        .expect(1)
        .create_async()
        .await;
    let create = google
        .mock("POST", "/v1/projects/eve-income/accounts")
        .match_body(Matcher::Json(json!({
            "localId": SUBJECT,
            "displayName": "Test Pilot",
            "photoUrl": "https://images.evetech.net/characters/90000001/portrait?tenant=tranquility"
        })))
        .with_status(200)
        .with_body(json!({ "localId": SUBJECT }).to_string())
        .expect(1)
        .create_async()
        .await;

    let admin_json = keys.admin_json(&format!("{}/token", google.url()));
    let config = config(&eve, &google, &admin_json, &[]);
    config.validate().unwrap();
    let app = router(Arc::new(AppState::from_config(config).unwrap()));

    let response = app.oneshot(callback_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with("https://eve-income.web.app/login?"));
    assert_eq!(query_value(&location, "eve_token").as_deref(), Some(access_token.as_str()));

    let custom_token = query_value(&location, "token").unwrap();
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[FIREBASE_AUDIENCE]);
    validation.set_issuer(&[SERVICE_ACCOUNT_EMAIL]);
    let claims = decode::<CustomTokenClaims>(&custom_token, &keys.admin_decoding_key(), &validation)
        .unwrap()
        .claims;
    assert_eq!(claims.uid, SUBJECT);

    document.assert_async().await;
    update.assert_async().await;
    create.assert_async().await;
}

#[tokio::test]
async fn test_backend_failure_is_bad_gateway() {
    let keys = Keys::generate();
    let mut eve = mockito::Server::new_async().await;
    let mut google = mockito::Server::new_async().await;

    let access_token = character_token(&keys.eve_encoding_key());
    let _eve_mocks = mock_eve(&mut eve, &keys, &access_token).await;

    let _google_token = google
        .mock("POST", "/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"ya29.admin","expires_in":3599}"#)
        .create_async()
        .await;
    let _document = google
        .mock("PATCH", Matcher::Any)
        .with_status(500)
        .with_body(r#"{"error":{"code":500,"message":"INTERNAL"}}"#)
        .create_async()
        .await;
    let update = google
        .mock("POST", "/v1/projects/eve-income/accounts:update")
        .expect(0)
        .create_async()
        .await;

    let admin_json = keys.admin_json(&format!("{}/token", google.url()));
    let config = config(&eve, &google, &admin_json, &[]);
    let app = router(Arc::new(AppState::from_config(config).unwrap()));

    let response = app.oneshot(callback_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(!response.headers().contains_key(header::LOCATION));
    update.assert_async().await;
}

#[tokio::test]
async fn test_account_creation_failure_is_bad_gateway() {
    let keys = Keys::generate();
    let mut eve = mockito::Server::new_async().await;
    let mut google = mockito::Server::new_async().await;

    let access_token = character_token(&keys.eve_encoding_key());
    let _eve_mocks = mock_eve(&mut eve, &keys, &access_token).await;

    let _google_token = google
        .mock("POST", "/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"ya29.admin","expires_in":3599}"#)
        .create_async()
        .await;
    let _document = google
        .mock("PATCH", Matcher::Any)
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;
    let _update = google
        .mock("POST", "/v1/projects/eve-income/accounts:update")
        .with_status(400)
        .with_body(r#"{"error":{"code":400,"message":"USER_NOT_FOUND"}}"#)
        .create_async()
        .await;
    let create = google
        .mock("POST", "/v1/projects/eve-income/accounts")
        .with_status(400)
        .with_body(r#"{"error":{"code":400,"message":"INVALID_PHOTO_URL"}}"#)
        .expect(1)
        .create_async()
        .await;

    let admin_json = keys.admin_json(&format!("{}/token", google.url()));
    let config = config(&eve, &google, &admin_json, &[]);
    let app = router(Arc::new(AppState::from_config(config).unwrap()));

    let response = app.oneshot(callback_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(!response.headers().contains_key(header::LOCATION));
    create.assert_async().await;
}

/// Records platform calls instead of reaching Firebase
#[derive(Default)]
struct RecordingPlatform {
    tokens: Mutex<Vec<(String, ProviderToken)>>,
    users: Mutex<Vec<UserProfile>>,
}

#[async_trait]
impl IdentityPlatform for RecordingPlatform {
    async fn store_provider_token(&self, uid: &str, token: &ProviderToken) -> Result<()> {
        self.tokens
            .lock()
            .unwrap()
            .push((uid.to_string(), token.clone()));
        Ok(())
    }

    async fn upsert_user(&self, profile: &UserProfile) -> Result<()> {
        self.users.lock().unwrap().push(profile.clone());
        Ok(())
    }

    async fn mint_session_token(&self, uid: &str) -> Result<String> {
        Ok(format!("session-for-{}", uid))
    }
}

#[tokio::test]
async fn test_character_id_uid_source() {
    let keys = Keys::generate();
    let mut eve = mockito::Server::new_async().await;
    let google = mockito::Server::new_async().await;

    let access_token = character_token(&keys.eve_encoding_key());
    let _eve_mocks = mock_eve(&mut eve, &keys, &access_token).await;

    let config = config(
        &eve,
        &google,
        "{}",
        &["--uid-source", "character-id", "--login-redirect-url", "https://app.example.com/done"],
    );
    let platform = Arc::new(RecordingPlatform::default());
    let state = AppState::new(config, reqwest::Client::new(), platform.clone());

    let response = router(Arc::new(state))
        .oneshot(callback_request())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert_eq!(
        query_value(&location, "token").as_deref(),
        Some("session-for-90000001")
    );

    let tokens = platform.tokens.lock().unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].0, "90000001");
    assert_eq!(tokens[0].1.refresh_token, "refresh-123");
    assert!(tokens[0].1.expiry.is_some());

    let users = platform.users.lock().unwrap();
    assert_eq!(
        users.as_slice(),
        &[UserProfile {
            uid: "90000001".to_string(),
            display_name: "Test Pilot".to_string(),
            photo_url: "https://images.evetech.net/characters/90000001/portrait?tenant=tranquility"
                .to_string(),
        }]
    );
}

#[tokio::test]
async fn test_forged_token_is_rejected() {
    let keys = Keys::generate();
    let forger = Keys::generate();
    let mut eve = mockito::Server::new_async().await;
    let google = mockito::Server::new_async().await;

    // Signed by a key that is not in the published JWKS
    let forged = character_token(&forger.eve_encoding_key());
    let _eve_mocks = mock_eve(&mut eve, &keys, &forged).await;

    let config = config(&eve, &google, "{}", &[]);
    let platform = Arc::new(RecordingPlatform::default());
    let state = AppState::new(config, reqwest::Client::new(), platform.clone());

    let response = router(Arc::new(state))
        .oneshot(callback_request())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(platform.tokens.lock().unwrap().is_empty());
    assert!(platform.users.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_non_character_subject_is_rejected() {
    let keys = Keys::generate();
    let mut eve = mockito::Server::new_async().await;
    let google = mockito::Server::new_async().await;

    // Correctly signed, but not a character token
    let token = token_for_subject(&keys.eve_encoding_key(), "CORPORATION:EVE:1");
    let _eve_mocks = mock_eve(&mut eve, &keys, &token).await;

    let config = config(&eve, &google, "{}", &[]);
    let platform = Arc::new(RecordingPlatform::default());
    let state = AppState::new(config, reqwest::Client::new(), platform.clone());

    let response = router(Arc::new(state))
        .oneshot(callback_request())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!response.headers().contains_key(header::LOCATION));
    assert!(platform.tokens.lock().unwrap().is_empty());
    assert!(platform.users.lock().unwrap().is_empty());
}
