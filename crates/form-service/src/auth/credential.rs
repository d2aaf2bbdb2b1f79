//! Session credential extraction.
//!
//! A credential is read from the `Authorization: Bearer <token>` header or,
//! failing that, from the session cookie. The raw token is held in a
//! [`SecretString`] and only its SHA-256 digest leaves this module: the
//! digest is the identity store key and the `sessions.token_hash` value.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Maximum accepted token length in bytes.
pub const MAX_CREDENTIAL_BYTES: usize = 4096;

/// An opaque session token presented by a client.
#[derive(Debug, Clone)]
pub struct Credential {
    token: SecretString,
}

impl Credential {
    /// Wrap a raw token.
    ///
    /// Returns `None` for empty or oversized tokens; both are treated the same
    /// as a missing credential.
    pub fn new(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() || token.len() > MAX_CREDENTIAL_BYTES {
            return None;
        }
        Some(Self {
            token: SecretString::from(token.to_string()),
        })
    }

    /// Extract a credential from request headers.
    ///
    /// The bearer header takes precedence over the cookie. A present but
    /// malformed `Authorization` header does not fall back to the cookie.
    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<Self> {
        if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
            let token = value.to_str().ok()?.strip_prefix("Bearer ")?;
            return Self::new(token);
        }

        let jar = CookieJar::from_headers(headers);
        jar.get(cookie_name).and_then(|cookie| Self::new(cookie.value()))
    }

    /// Hex-encoded SHA-256 digest of the token.
    pub fn cache_key(&self) -> String {
        hash_token(self.token.expose_secret())
    }
}

/// Hex-encoded SHA-256 digest of a raw session token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const COOKIE: &str = "formaura_session";

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_bearer_header() {
        let map = headers(&[("authorization", "Bearer abc123")]);
        let credential = Credential::from_headers(&map, COOKIE).unwrap();
        assert_eq!(credential.cache_key(), hash_token("abc123"));
    }

    #[test]
    fn test_session_cookie() {
        let map = headers(&[("cookie", "theme=dark; formaura_session=tok-42")]);
        let credential = Credential::from_headers(&map, COOKIE).unwrap();
        assert_eq!(credential.cache_key(), hash_token("tok-42"));
    }

    #[test]
    fn test_bearer_takes_precedence_over_cookie() {
        let map = headers(&[
            ("authorization", "Bearer from-header"),
            ("cookie", "formaura_session=from-cookie"),
        ]);
        let credential = Credential::from_headers(&map, COOKIE).unwrap();
        assert_eq!(credential.cache_key(), hash_token("from-header"));
    }

    #[test]
    fn test_malformed_authorization_does_not_fall_back() {
        let map = headers(&[
            ("authorization", "Basic dXNlcjpwYXNz"),
            ("cookie", "formaura_session=from-cookie"),
        ]);
        assert!(Credential::from_headers(&map, COOKIE).is_none());
    }

    #[test]
    fn test_missing_credential() {
        assert!(Credential::from_headers(&HeaderMap::new(), COOKIE).is_none());

        let map = headers(&[("cookie", "other=value")]);
        assert!(Credential::from_headers(&map, COOKIE).is_none());
    }

    #[test]
    fn test_empty_and_oversized_tokens_rejected() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   ").is_none());
        assert!(Credential::new(&"x".repeat(MAX_CREDENTIAL_BYTES + 1)).is_none());
        assert!(Credential::new(&"x".repeat(MAX_CREDENTIAL_BYTES)).is_some());
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let credential = Credential::new("super-secret-token").unwrap();
        let debug_output = format!("{:?}", credential);
        assert!(!debug_output.contains("super-secret-token"));
    }

    #[test]
    fn test_hash_token_is_hex_sha256() {
        let digest = hash_token("abc");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
