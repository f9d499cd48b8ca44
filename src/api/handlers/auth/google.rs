//! Google federated login.
//!
//! The browser completes the consent popup and posts the resulting
//! authorization code here. The server exchanges the code for an ID token,
//! verifies its signature against Google's published keys, and links or
//! creates the matching account. The exchange lives behind
//! [`IdentityVerifier`] so tests can stub the provider.

use anyhow::{Context, Result, anyhow};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::error;

use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::session::establish_session;
use super::state::AuthState;
use super::storage::link_or_create_google_user;
use super::types::{AuthResponse, GoogleLoginRequest};
use super::utils::{extract_client_ip, normalize_email};

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Identity asserted by the provider after a successful code verification.
#[derive(Clone, Debug)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// Exchange an authorization code for a verified identity.
pub trait IdentityVerifier: Send + Sync {
    fn verify_code<'a>(
        &'a self,
        code: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<VerifiedIdentity>> + Send + 'a>>;
}

/// Live verifier backed by Google's token and JWKS endpoints.
pub struct GoogleIdentity {
    client: Client,
    client_id: String,
    client_secret: SecretString,
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    email: String,
    name: Option<String>,
}

impl GoogleIdentity {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(client_id: String, client_secret: SecretString) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build google http client")?;
        Ok(Self {
            client,
            client_id,
            client_secret,
        })
    }

    async fn exchange_code(&self, code: &str) -> Result<String> {
        // redirect_uri is the literal "postmessage" for codes obtained via
        // the browser popup flow.
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("redirect_uri", "postmessage"),
            ("grant_type", "authorization_code"),
        ];
        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .context("google token request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let json_response: Value = response.json().await.unwrap_or(Value::Null);
            let detail = json_response
                .get("error_description")
                .and_then(Value::as_str)
                .unwrap_or("");
            return Err(anyhow!("google code exchange failed: {status} {detail}"));
        }

        let json_response: Value = response
            .json()
            .await
            .context("google token response was not json")?;
        let id_token = json_response
            .get("id_token")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("google token response missing id_token"))?;
        Ok(id_token.to_string())
    }

    async fn fetch_signing_key(&self, kid: &str) -> Result<DecodingKey> {
        let response = self
            .client
            .get(GOOGLE_JWKS_URL)
            .send()
            .await
            .context("google jwks request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!("google jwks fetch failed: {}", response.status()));
        }

        let jwks: Value = response
            .json()
            .await
            .context("google jwks response was not json")?;
        let keys = jwks
            .get("keys")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("google jwks response missing keys"))?;
        let key = keys
            .iter()
            .find(|key| key.get("kid").and_then(Value::as_str) == Some(kid))
            .ok_or_else(|| anyhow!("no google key matches kid {kid}"))?;

        let modulus = key
            .get("n")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("google key missing modulus"))?;
        let exponent = key
            .get("e")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("google key missing exponent"))?;
        DecodingKey::from_rsa_components(modulus, exponent)
            .context("failed to build google decoding key")
    }

    fn decode_claims(&self, id_token: &str, key: &DecodingKey) -> Result<GoogleClaims> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_issuer(&["https://accounts.google.com", "accounts.google.com"]);
        let data = decode::<GoogleClaims>(id_token, key, &validation)
            .context("google id token rejected")?;
        Ok(data.claims)
    }

    async fn verify(&self, code: &str) -> Result<VerifiedIdentity> {
        let id_token = self.exchange_code(code).await?;
        let header = decode_header(&id_token).context("google id token header unreadable")?;
        let kid = header
            .kid
            .ok_or_else(|| anyhow!("google id token missing kid"))?;
        let key = self.fetch_signing_key(&kid).await?;
        let claims = self.decode_claims(&id_token, &key)?;

        Ok(VerifiedIdentity {
            subject: claims.sub,
            email: claims.email,
            display_name: claims.name,
        })
    }
}

impl IdentityVerifier for GoogleIdentity {
    fn verify_code<'a>(
        &'a self,
        code: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<VerifiedIdentity>> + Send + 'a>> {
        Box::pin(self.verify(code))
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/google",
    request_body = GoogleLoginRequest,
    responses(
        (status = 200, description = "Session established", body = AuthResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Code rejected by Google", body = String),
        (status = 429, description = "Rate limited", body = String),
        (status = 503, description = "Google sign-in not configured", body = String)
    ),
    tag = "auth"
)]
pub async fn google_login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    identity: Extension<Option<Arc<dyn IdentityVerifier>>>,
    payload: Option<Json<GoogleLoginRequest>>,
) -> impl IntoResponse {
    let request: GoogleLoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };
    let code = request.code.trim();
    if code.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing code".to_string()).into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::GoogleLogin)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    let Some(verifier) = identity.0 else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Google sign-in is not configured".to_string(),
        )
            .into_response();
    };

    let verified = match verifier.verify_code(code).await {
        Ok(identity) => identity,
        Err(err) => {
            error!("Google verification failed: {err}");
            return (
                StatusCode::UNAUTHORIZED,
                "Google verification failed".to_string(),
            )
                .into_response();
        }
    };

    let email = normalize_email(&verified.email);
    if email.is_empty() {
        return (
            StatusCode::UNAUTHORIZED,
            "Google verification failed".to_string(),
        )
            .into_response();
    }
    let display_name = verified
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let user =
        match link_or_create_google_user(&pool, &email, &verified.subject, display_name).await {
            Ok(user) => user,
            Err(err) => {
                error!("Failed to link google account: {err}");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Google sign-in failed".to_string(),
                )
                    .into_response();
            }
        };

    match establish_session(&pool, &auth_state, &user).await {
        Ok((response, cookies)) => (StatusCode::OK, cookies, Json(response)).into_response(),
        Err(err) => {
            error!("Failed to establish session: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Google sign-in failed".to_string(),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::otp::{InMemoryOtpStore, OtpStore};
    use super::super::rate_limit::{NoopRateLimiter, RateLimiter};
    use super::super::state::{AuthConfig, AuthState};
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    struct RejectingVerifier;

    impl IdentityVerifier for RejectingVerifier {
        fn verify_code<'a>(
            &'a self,
            _code: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<VerifiedIdentity>> + Send + 'a>> {
            Box::pin(async { Err(anyhow!("invalid_grant")) })
        }
    }

    fn auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new(
            SecretString::from("unit-test-secret"),
            "http://localhost:5173".to_string(),
        );
        let store: Arc<dyn OtpStore> = Arc::new(InMemoryOtpStore::new());
        let limiter: Arc<dyn RateLimiter> = Arc::new(NoopRateLimiter);
        Arc::new(AuthState::new(config, store, limiter))
    }

    #[tokio::test]
    async fn google_login_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = google_login(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Extension(None),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn google_login_unconfigured() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = google_login(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Extension(None),
            Some(Json(GoogleLoginRequest {
                code: "auth-code".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        Ok(())
    }

    #[tokio::test]
    async fn google_login_rejected_code() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let verifier: Arc<dyn IdentityVerifier> = Arc::new(RejectingVerifier);
        let response = google_login(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Extension(Some(verifier)),
            Some(Json(GoogleLoginRequest {
                code: "bad-code".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
