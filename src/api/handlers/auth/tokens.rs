//! Token minting and verification.
//!
//! Access tokens are HS256 `JWT`s carrying the user id, email, and role.
//! Refresh tokens are opaque random values; only their SHA-256 hash is
//! persisted in the refresh ledger.

use super::state::AuthConfig;
use anyhow::{Context, Result};
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::{RngCore, rngs::OsRng};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AccessClaims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Mint a signed access token for the given user.
pub(crate) fn mint_access_token(
    config: &AuthConfig,
    user_id: Uuid,
    email: &str,
    role: &str,
) -> Result<String> {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(config.access_token_ttl_seconds())).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret().expose_secret().as_bytes()),
    )
    .context("failed to sign access token")
}

/// Decode and validate an access token. Expired or tampered tokens yield
/// `None`; the caller turns that into a 401.
pub(crate) fn decode_access_token(config: &AuthConfig, token: &str) -> Option<AccessClaims> {
    decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret().expose_secret().as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

/// Create a new refresh token.
/// The raw value is only returned to the client; the database stores a hash.
pub(crate) fn generate_refresh_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate refresh token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a refresh token so raw values never touch the database.
/// The hash is used for ledger lookups when the token is presented.
pub(crate) fn hash_refresh_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use secrecy::SecretString;

    fn config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from("test-secret"),
            "http://localhost:5173".to_string(),
        )
    }

    #[test]
    fn access_token_round_trip() -> Result<()> {
        let config = config();
        let user_id = Uuid::new_v4();
        let token = mint_access_token(&config, user_id, "a@x.com", "LISTENER")?;

        let claims = decode_access_token(&config, &token).context("claims")?;
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.role, "LISTENER");
        assert!(claims.exp > claims.iat);
        Ok(())
    }

    #[test]
    fn access_token_rejects_wrong_secret() -> Result<()> {
        let token = mint_access_token(&config(), Uuid::new_v4(), "a@x.com", "LISTENER")?;
        let other = AuthConfig::new(
            SecretString::from("different-secret"),
            "http://localhost:5173".to_string(),
        );
        assert!(decode_access_token(&other, &token).is_none());
        Ok(())
    }

    #[test]
    fn access_token_rejects_expired() -> Result<()> {
        let config = config().with_access_token_ttl_seconds(-120);
        let token = mint_access_token(&config, Uuid::new_v4(), "a@x.com", "LISTENER")?;
        assert!(decode_access_token(&config, &token).is_none());
        Ok(())
    }

    #[test]
    fn refresh_token_is_32_random_bytes() {
        let decoded_len = generate_refresh_token()
            .ok()
            .and_then(|token| URL_SAFE_NO_PAD.decode(token.as_bytes()).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn refresh_token_hash_stable() {
        let first = hash_refresh_token("token");
        let second = hash_refresh_token("token");
        let different = hash_refresh_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
    }
}
