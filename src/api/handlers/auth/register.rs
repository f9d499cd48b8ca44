//! Account registration endpoint.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::password::{MIN_PASSWORD_LEN, hash_password};
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::session::establish_session;
use super::state::AuthState;
use super::storage::{RegisterOutcome, insert_user};
use super::types::{AuthResponse, RegisterRequest};
use super::utils::{extract_client_ip, normalize_email, valid_email};

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 409, description = "Email already registered", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    if request.password.len() < MIN_PASSWORD_LEN {
        return (
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        )
            .into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Register)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }
    if auth_state
        .rate_limiter()
        .check_email(&email, RateLimitAction::Register)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    let display_name = request
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    match build_register_response(&pool, &auth_state, &email, &request.password, display_name)
        .await
    {
        Ok((response, cookies)) => (StatusCode::CREATED, cookies, Json(response)).into_response(),
        Err((status, message)) => (status, message).into_response(),
    }
}

async fn build_register_response(
    pool: &PgPool,
    auth_state: &AuthState,
    email: &str,
    password: &str,
    display_name: Option<&str>,
) -> Result<(AuthResponse, HeaderMap), (StatusCode, String)> {
    let password_hash = match hash_password(password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Password hashing failed: {err}");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed".to_string(),
            ));
        }
    };

    let user = match insert_user(pool, email, &password_hash, display_name).await {
        Ok(RegisterOutcome::Created(user)) => user,
        Ok(RegisterOutcome::Conflict) => {
            return Err((
                StatusCode::CONFLICT,
                "Email already registered".to_string(),
            ));
        }
        Err(err) => {
            error!("Failed to insert user: {err}");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed".to_string(),
            ));
        }
    };

    match establish_session(pool, auth_state, &user).await {
        Ok(pair) => Ok(pair),
        Err(err) => {
            error!("Failed to establish session: {err}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed".to_string(),
            ))
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
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

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
    async fn register_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_invalid_email() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Some(Json(RegisterRequest {
                email: "nope".to_string(),
                password: "long enough password".to_string(),
                display_name: None,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_short_password() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Some(Json(RegisterRequest {
                email: "alice@example.com".to_string(),
                password: "short".to_string(),
                display_name: None,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
