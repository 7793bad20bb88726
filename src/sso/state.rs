//! Anti-forgery state for the SSO redirect
//!
//! The state value travels twice: once in the authorize URL, once in a cookie.
//! The callback only proceeds when both copies match.

use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::{engine::general_purpose::URL_SAFE, Engine};
use rand::RngCore;
use time::{Duration, OffsetDateTime};

use crate::error::{AuthError, Result};

const STATE_BYTES: usize = 16;
const STATE_COOKIE_DAYS: i64 = 365;

/// Generate a random state parameter for CSRF protection
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE.encode(bytes)
}

/// Build the cookie carrying the state back to the callback
pub fn state_cookie(name: &str, state: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), state.to_string()))
        .expires(OffsetDateTime::now_utc() + Duration::days(STATE_COOKIE_DAYS))
        .build()
}

/// Check the `state` query parameter against the cookie copy
pub fn verify_state(jar: &CookieJar, cookie_name: &str, state: Option<&str>) -> Result<()> {
    let expected = jar
        .get(cookie_name)
        .ok_or(AuthError::MissingStateCookie)?;

    match state {
        Some(state) if state == expected.value() => Ok(()),
        _ => Err(AuthError::StateMismatch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_format() {
        let state = generate_state();

        // 16 bytes encode to 24 padded base64 characters
        assert_eq!(state.len(), 24);
        assert!(!state.contains('+'));
        assert!(!state.contains('/'));
    }

    #[test]
    fn test_state_uniqueness() {
        assert_ne!(generate_state(), generate_state());
    }

    #[test]
    fn test_cookie_expires_in_a_year() {
        let cookie = state_cookie("__session", "abc");
        assert_eq!(cookie.name(), "__session");
        assert_eq!(cookie.value(), "abc");

        let expires = cookie.expires_datetime().unwrap();
        assert!(expires > OffsetDateTime::now_utc() + Duration::days(364));
    }

    #[test]
    fn test_verify_state() {
        let jar = CookieJar::new().add(Cookie::new("__session", "abc"));

        assert!(verify_state(&jar, "__session", Some("abc")).is_ok());
        assert!(matches!(
            verify_state(&jar, "__session", Some("xyz")),
            Err(AuthError::StateMismatch)
        ));
        assert!(matches!(
            verify_state(&jar, "__session", None),
            Err(AuthError::StateMismatch)
        ));
        assert!(matches!(
            verify_state(&CookieJar::new(), "__session", Some("abc")),
            Err(AuthError::MissingStateCookie)
        ));
    }
}
