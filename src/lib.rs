//! EVE Auth Callback Library
//!
//! EVE Online SSO callback that signs characters into Firebase.

pub mod config;
pub mod error;
pub mod middleware;
pub mod platform;
pub mod server;
pub mod sso;
