//! Authenticated principal extraction and authorization helpers.
//!
//! Flow Overview: pull the access token from the Authorization header or the
//! access cookie, verify it, and return a principal downstream handlers can
//! use. No database round trip happens here; the signed claims are the source
//! of identity until the token expires.

use axum::http::{HeaderMap, StatusCode};
use uuid::Uuid;

use super::session::extract_access_token;
use super::state::AuthConfig;
use super::tokens::decode_access_token;

/// Authenticated user context derived from the access token claims.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == "ADMIN"
    }
}

/// Resolve the request's access token into a principal, or return 401.
pub fn require_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Principal, StatusCode> {
    let token = extract_access_token(headers).ok_or(StatusCode::UNAUTHORIZED)?;
    let claims = decode_access_token(config, &token).ok_or(StatusCode::UNAUTHORIZED)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| StatusCode::UNAUTHORIZED)?;
    Ok(Principal {
        user_id,
        email: claims.email,
        role: claims.role,
    })
}

/// Like [`require_auth`], but additionally requires the ADMIN role.
pub fn require_admin(headers: &HeaderMap, config: &AuthConfig) -> Result<Principal, StatusCode> {
    let principal = require_auth(headers, config)?;
    if principal.is_admin() {
        Ok(principal)
    } else {
        Err(StatusCode::FORBIDDEN)
    }
}

#[cfg(test)]
mod tests {
    use super::super::session::ACCESS_COOKIE_NAME;
    use super::super::state::AuthConfig;
    use super::super::tokens::mint_access_token;
    use super::{require_admin, require_auth};
    use anyhow::Result;
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use secrecy::SecretString;
    use uuid::Uuid;

    fn test_config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from("unit-test-secret"),
            "http://localhost:5173".to_string(),
        )
    }

    #[test]
    fn bearer_header_resolves_principal() -> Result<()> {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let token = mint_access_token(&config, user_id, "alice@example.com", "LISTENER")?;

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );

        let principal = require_auth(&headers, &config).map_err(|status| {
            anyhow::anyhow!("expected principal, got {status}")
        })?;
        assert_eq!(principal.user_id, user_id);
        assert_eq!(principal.email, "alice@example.com");
        assert!(!principal.is_admin());
        Ok(())
    }

    #[test]
    fn access_cookie_resolves_principal() -> Result<()> {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let token = mint_access_token(&config, user_id, "bob@example.com", "ADMIN")?;

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_str(&format!("{ACCESS_COOKIE_NAME}={token}"))?,
        );

        let principal = require_admin(&headers, &config).map_err(|status| {
            anyhow::anyhow!("expected principal, got {status}")
        })?;
        assert_eq!(principal.user_id, user_id);
        assert!(principal.is_admin());
        Ok(())
    }

    #[test]
    fn missing_token_is_unauthorized() {
        let config = test_config();
        let headers = HeaderMap::new();
        let err = require_auth(&headers, &config).err();
        assert_eq!(err, Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn garbage_token_is_unauthorized() {
        let config = test_config();
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer not-a-jwt"),
        );
        let err = require_auth(&headers, &config).err();
        assert_eq!(err, Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn listener_is_not_admin() -> Result<()> {
        let config = test_config();
        let token = mint_access_token(&config, Uuid::new_v4(), "carol@example.com", "LISTENER")?;

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );

        let err = require_admin(&headers, &config).err();
        assert_eq!(err, Some(StatusCode::FORBIDDEN));
        Ok(())
    }
}
