//! Account recovery: one-time codes and password reset.
//!
//! The code is cached before the email goes out. A delivery failure returns
//! 500 but leaves the cached code in place, so a retry within the TTL can
//! still succeed without reissuing.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::email::{EmailMessage, EmailSender};

use super::otp::generate_code;
use super::password::{MIN_PASSWORD_LEN, hash_password};
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::storage::{find_user_by_email, update_password};
use super::types::{MessageResponse, OtpRequest, OtpVerifyRequest, PasswordResetRequest};
use super::utils::{extract_client_ip, normalize_email, valid_email};

#[utoipa::path(
    post,
    path = "/v1/auth/otp/request",
    request_body = OtpRequest,
    responses(
        (status = 200, description = "Code issued or still active", body = MessageResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 429, description = "Rate limited", body = String),
        (status = 500, description = "Delivery failed", body = String)
    ),
    tag = "auth"
)]
pub async fn request_otp(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    email_sender: Extension<Arc<dyn EmailSender>>,
    payload: Option<Json<OtpRequest>>,
) -> impl IntoResponse {
    let request: OtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::RequestOtp)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }
    if auth_state
        .rate_limiter()
        .check_email(&email, RateLimitAction::RequestOtp)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    // Inside the cooldown window the previous code stays valid and no new
    // email goes out. The response does not reveal whether the account exists.
    let store = auth_state.otp_store();
    if let Some(stored) = store.get(&email) {
        if stored.issued_at.elapsed() < auth_state.config().otp_cooldown() {
            return (
                StatusCode::OK,
                Json(MessageResponse {
                    message: "A code is already on its way. Retry in a moment.".to_string(),
                }),
            )
                .into_response();
        }
    }

    let code = generate_code();
    store.set(&email, code.clone(), auth_state.config().otp_ttl());

    let ttl_minutes = auth_state.config().otp_ttl().as_secs() / 60;
    let message = EmailMessage {
        to: email.clone(),
        subject: "Your Resona verification code".to_string(),
        body: format!("Your verification code is {code}. It expires in {ttl_minutes} minutes."),
    };
    if let Err(err) = email_sender.send(&message) {
        // The cached code stays; a retry within the TTL reuses it.
        error!("Failed to send verification code: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to send verification code".to_string(),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        Json(MessageResponse {
            message: "Verification code sent.".to_string(),
        }),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/v1/auth/otp/verify",
    request_body = OtpVerifyRequest,
    responses(
        (status = 200, description = "Code accepted", body = MessageResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Unknown, expired, or wrong code", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<OtpVerifyRequest>>,
) -> impl IntoResponse {
    let request: OtpVerifyRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    match check_code(&auth_state, &email, &request.code) {
        Ok(()) => {}
        Err(response) => return response,
    }

    // A matching code is single-use.
    auth_state.otp_store().delete(&email);
    (
        StatusCode::OK,
        Json(MessageResponse {
            message: "Code verified.".to_string(),
        }),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/v1/auth/password/reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Password replaced", body = MessageResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Unknown, expired, or wrong code", body = String),
        (status = 404, description = "Account not found", body = String)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<PasswordResetRequest>>,
) -> impl IntoResponse {
    let request: PasswordResetRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    if request.new_password.len() < MIN_PASSWORD_LEN {
        return (
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        )
            .into_response();
    }

    match check_code(&auth_state, &email, &request.code) {
        Ok(()) => {}
        Err(response) => return response,
    }

    let user = match find_user_by_email(&pool, &email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "Account not found".to_string()).into_response();
        }
        Err(err) => {
            error!("Password reset lookup failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password reset failed".to_string(),
            )
                .into_response();
        }
    };

    let password_hash = match hash_password(&request.new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Password hashing failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password reset failed".to_string(),
            )
                .into_response();
        }
    };

    if let Err(err) = update_password(&pool, user.id, &password_hash).await {
        error!("Failed to update password: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password reset failed".to_string(),
        )
            .into_response();
    }

    // The code is consumed only after the password actually changed.
    auth_state.otp_store().delete(&email);
    (
        StatusCode::OK,
        Json(MessageResponse {
            message: "Password updated.".to_string(),
        }),
    )
        .into_response()
}

/// Compare the submitted code against the cached one. A mismatch does not
/// consume the entry; only a successful flow deletes it.
fn check_code(
    auth_state: &AuthState,
    email: &str,
    code: &str,
) -> Result<(), axum::response::Response> {
    let Some(stored) = auth_state.otp_store().get(email) else {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Code expired or not found".to_string(),
        )
            .into_response());
    };
    if stored.code != code.trim() {
        return Err((StatusCode::UNAUTHORIZED, "Invalid code".to_string()).into_response());
    }
    Ok(())
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
    use std::time::Duration;

    struct FailingSender;

    impl EmailSender for FailingSender {
        fn send(&self, _message: &EmailMessage) -> Result<()> {
            Err(anyhow::anyhow!("smtp unavailable"))
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

    fn log_sender() -> Arc<dyn EmailSender> {
        Arc::new(crate::api::email::LogEmailSender)
    }

    #[tokio::test]
    async fn request_otp_missing_payload() {
        let response = request_otp(
            HeaderMap::new(),
            Extension(auth_state()),
            Extension(log_sender()),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn request_otp_caches_code_even_when_delivery_fails() {
        let state = auth_state();
        let sender: Arc<dyn EmailSender> = Arc::new(FailingSender);
        let response = request_otp(
            HeaderMap::new(),
            Extension(Arc::clone(&state)),
            Extension(sender),
            Some(Json(OtpRequest {
                email: "Alice@Example.com".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // The cached code survives the failed send.
        assert!(state.otp_store().get("alice@example.com").is_some());
    }

    #[tokio::test]
    async fn request_otp_cooldown_keeps_previous_code() {
        let state = auth_state();
        let first = request_otp(
            HeaderMap::new(),
            Extension(Arc::clone(&state)),
            Extension(log_sender()),
            Some(Json(OtpRequest {
                email: "bob@example.com".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(first.status(), StatusCode::OK);
        let stored = state
            .otp_store()
            .get("bob@example.com")
            .map(|entry| entry.code);

        let second = request_otp(
            HeaderMap::new(),
            Extension(Arc::clone(&state)),
            Extension(log_sender()),
            Some(Json(OtpRequest {
                email: "bob@example.com".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(second.status(), StatusCode::OK);
        let still_stored = state
            .otp_store()
            .get("bob@example.com")
            .map(|entry| entry.code);
        assert_eq!(stored, still_stored);
    }

    #[tokio::test]
    async fn verify_otp_unknown_email() {
        let response = verify_otp(
            Extension(auth_state()),
            Some(Json(OtpVerifyRequest {
                email: "carol@example.com".to_string(),
                code: "123456".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn verify_otp_mismatch_keeps_code() {
        let state = auth_state();
        state.otp_store().set(
            "dave@example.com",
            "111111".to_string(),
            Duration::from_secs(60),
        );

        let response = verify_otp(
            Extension(Arc::clone(&state)),
            Some(Json(OtpVerifyRequest {
                email: "dave@example.com".to_string(),
                code: "222222".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(state.otp_store().get("dave@example.com").is_some());
    }

    #[tokio::test]
    async fn verify_otp_match_consumes_code() {
        let state = auth_state();
        state.otp_store().set(
            "erin@example.com",
            "333333".to_string(),
            Duration::from_secs(60),
        );

        let response = verify_otp(
            Extension(Arc::clone(&state)),
            Some(Json(OtpVerifyRequest {
                email: "erin@example.com".to_string(),
                code: "333333".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.otp_store().get("erin@example.com").is_none());
    }

    #[tokio::test]
    async fn reset_password_rejects_short_password() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = reset_password(
            Extension(pool),
            Extension(auth_state()),
            Some(Json(PasswordResetRequest {
                email: "frank@example.com".to_string(),
                code: "123456".to_string(),
                new_password: "short".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_requires_live_code() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = reset_password(
            Extension(pool),
            Extension(auth_state()),
            Some(Json(PasswordResetRequest {
                email: "grace@example.com".to_string(),
                code: "123456".to_string(),
                new_password: "long enough password".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
