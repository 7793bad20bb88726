//! Configuration parsing and validation

use crate::error::{AuthError, Result};
use crate::platform::ServiceAccountKey;
use clap::{Parser, ValueEnum};

const DEFAULT_SCOPES: &str = "esi-wallet.read_character_wallet.v1 esi-wallet.read_corporation_wallet.v1 esi-wallet.read_corporation_wallets.v1";
const DEFAULT_AUTHORIZE_URL: &str = "https://login.eveonline.com/v2/oauth/authorize/";
const DEFAULT_TOKEN_URL: &str = "https://login.eveonline.com/v2/oauth/token";
const DEFAULT_JWKS_URL: &str = "https://login.eveonline.com/oauth/jwks";
const DEFAULT_LOGIN_REDIRECT_URL: &str = "https://eve-income.web.app/login";
const DEFAULT_PORTRAIT_URL: &str =
    "https://images.evetech.net/characters/{character_id}/portrait?tenant=tranquility";

/// Placeholder substituted in the portrait URL template
pub const CHARACTER_ID_PLACEHOLDER: &str = "{character_id}";

/// Which claim becomes the account id on the identity platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UidSource {
    /// Full subject claim, e.g. `CHARACTER:EVE:90000001`
    Subject,
    /// Numeric character id only
    CharacterId,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "eve-auth-callback",
    version,
    about = "EVE Online SSO callback for Firebase",
    long_about = "Handles the EVE Online SSO OAuth callback, validates the character token and signs the user into Firebase with a custom token"
)]
pub struct Config {
    /// EVE application client ID
    #[arg(long, env = "ClientID")]
    pub client_id: String,

    /// EVE application secret key
    #[arg(long, env = "ClientSecret", hide_env_values = true)]
    pub client_secret: String,

    /// Callback URL registered with the EVE application
    #[arg(long, env = "RedirectURL")]
    pub redirect_url: String,

    /// Firebase service account JSON (file contents, not a path)
    #[arg(long, env = "AdminJsonFile", hide_env_values = true)]
    pub admin_json: String,

    /// Space-separated ESI scopes requested at login
    #[arg(long, env = "EVE_SCOPES", default_value = DEFAULT_SCOPES)]
    pub scopes: String,

    /// EVE SSO authorization endpoint
    #[arg(long, env = "EVE_AUTHORIZE_URL", default_value = DEFAULT_AUTHORIZE_URL)]
    pub authorize_url: String,

    /// EVE SSO token endpoint
    #[arg(long, env = "EVE_TOKEN_URL", default_value = DEFAULT_TOKEN_URL)]
    pub token_url: String,

    /// EVE SSO JSON Web Key Set
    #[arg(long, env = "EVE_JWKS_URL", default_value = DEFAULT_JWKS_URL)]
    pub jwks_url: String,

    /// Accepted `iss` values of the character token
    #[arg(
        long = "issuer",
        env = "EVE_ISSUERS",
        value_delimiter = ',',
        default_values = ["login.eveonline.com", "https://login.eveonline.com"]
    )]
    pub issuers: Vec<String>,

    /// Frontend page receiving `token` and `eve_token` after login
    #[arg(long, env = "LOGIN_REDIRECT_URL", default_value = DEFAULT_LOGIN_REDIRECT_URL)]
    pub login_redirect_url: String,

    /// Character portrait URL template, `{character_id}` is substituted
    #[arg(long, env = "PORTRAIT_URL", default_value = DEFAULT_PORTRAIT_URL)]
    pub portrait_url: String,

    /// Name of the anti-forgery state cookie
    #[arg(long, env = "STATE_COOKIE", default_value = "__session")]
    pub state_cookie: String,

    /// Claim used as the Firebase uid
    #[arg(long, env = "UID_SOURCE", value_enum, default_value_t = UidSource::Subject)]
    pub uid_source: UidSource,

    /// Firestore collection holding provider tokens
    #[arg(long, env = "TOKEN_COLLECTION", default_value = "access_token")]
    pub token_collection: String,

    /// Identity Toolkit API base URL
    #[arg(long, env = "IDENTITY_TOOLKIT_URL", default_value = "https://identitytoolkit.googleapis.com")]
    pub identity_toolkit_url: String,

    /// Firestore API base URL
    #[arg(long, env = "FIRESTORE_URL", default_value = "https://firestore.googleapis.com")]
    pub firestore_url: String,

    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Path the callback is served on
    #[arg(long, env = "CALLBACK_PATH", default_value = "/")]
    pub callback_path: String,

    /// Don't show the startup banner
    #[arg(long)]
    pub no_banner: bool,

    /// Show only error messages
    #[arg(long, conflicts_with = "debug")]
    pub silent: bool,

    /// Enable debug logging
    #[arg(long, env = "EVE_AUTH_DEBUG")]
    pub debug: bool,
}

impl Config {
    /// Parse configuration from CLI arguments and environment variables
    pub fn parse_args() -> Self {
        Config::parse()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let required = [
            (&self.client_id, "client ID"),
            (&self.client_secret, "client secret"),
            (&self.redirect_url, "redirect URL"),
            (&self.admin_json, "service account JSON"),
        ];
        for (value, name) in required {
            if value.trim().is_empty() {
                return Err(AuthError::Config(format!("{} is required", name)));
            }
        }

        let urls = [
            (&self.redirect_url, "redirect URL"),
            (&self.authorize_url, "authorize URL"),
            (&self.token_url, "token URL"),
            (&self.jwks_url, "JWKS URL"),
            (&self.login_redirect_url, "login redirect URL"),
            (&self.identity_toolkit_url, "Identity Toolkit URL"),
            (&self.firestore_url, "Firestore URL"),
        ];
        for (value, name) in urls {
            url::Url::parse(value)
                .map_err(|e| AuthError::Config(format!("Invalid {}: {}", name, e)))?;
        }

        if !self.portrait_url.contains(CHARACTER_ID_PLACEHOLDER) {
            return Err(AuthError::Config(format!(
                "Portrait URL must contain {}",
                CHARACTER_ID_PLACEHOLDER
            )));
        }

        if !self.callback_path.starts_with('/') {
            return Err(AuthError::Config(
                "Callback path must start with '/'".to_string(),
            ));
        }

        if self.issuers.iter().all(|i| i.trim().is_empty()) {
            return Err(AuthError::Config(
                "At least one token issuer is required".to_string(),
            ));
        }

        self.service_account()?;

        Ok(())
    }

    /// Get ESI scopes as a list
    pub fn scopes(&self) -> Vec<String> {
        self.scopes.split_whitespace().map(String::from).collect()
    }

    /// Parse the Firebase service account
    pub fn service_account(&self) -> Result<ServiceAccountKey> {
        ServiceAccountKey::from_json(&self.admin_json)
    }

    /// Socket address string to bind
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get log level based on flags
    pub fn log_level(&self) -> tracing::Level {
        if self.silent {
            tracing::Level::ERROR
        } else if self.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
