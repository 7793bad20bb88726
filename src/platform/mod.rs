//! Identity platform the callback provisions accounts on
//!
//! The callback handler only talks to [`IdentityPlatform`]. [`FirebasePlatform`]
//! implements it over the Firestore and Identity Toolkit REST APIs.

pub mod custom_token;
pub mod firebase;
pub mod service_account;

use async_trait::async_trait;

use crate::error::Result;
use crate::sso::ProviderToken;

pub use custom_token::CustomTokenSigner;
pub use firebase::FirebasePlatform;
pub use service_account::{GoogleTokenSource, ServiceAccountKey};

/// Account attributes kept in sync with the character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub uid: String,
    pub display_name: String,
    pub photo_url: String,
}

#[async_trait]
pub trait IdentityPlatform: Send + Sync {
    /// Overwrite the stored provider token document for `uid`
    async fn store_provider_token(&self, uid: &str, token: &ProviderToken) -> Result<()>;

    /// Update the account, creating it when it does not exist yet
    async fn upsert_user(&self, profile: &UserProfile) -> Result<()>;

    /// Mint a token the frontend can sign in with
    async fn mint_session_token(&self, uid: &str) -> Result<String>;
}
