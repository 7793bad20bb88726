//! EVE Online SSO integration

pub mod claims;
pub mod client;
pub mod jwks;
pub mod state;
pub mod token;
pub mod verify;

pub use claims::{EveClaims, Scopes};
pub use client::SsoClient;
pub use jwks::JwksCache;
pub use token::{ProviderToken, TokenResponse};
pub use verify::TokenVerifier;
