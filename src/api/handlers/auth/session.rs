//! Session endpoints: login, refresh rotation, and logout.

use anyhow::Context;
use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{AUTHORIZATION, InvalidHeaderValue, SET_COOKIE},
    },
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::password::verify_password;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::{AuthConfig, AuthState};
use super::storage::{
    RotatedSession, UserRecord, find_user_by_email, issue_refresh_token, revoke_refresh_token,
    rotate_refresh_token,
};
use super::tokens::{hash_refresh_token, mint_access_token};
use super::types::{AuthResponse, LoginRequest, RefreshRequest, UserProfile};
use super::utils::{extract_client_ip, normalize_email, valid_email};

pub(super) const ACCESS_COOKIE_NAME: &str = "accessToken";
pub(super) const REFRESH_COOKIE_NAME: &str = "refreshToken";

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session established", body = AuthResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Invalid credentials", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
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
        .check_ip(client_ip.as_deref(), RateLimitAction::Login)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }
    if auth_state
        .rate_limiter()
        .check_email(&email, RateLimitAction::Login)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    match build_login_response(&pool, &auth_state, &email, &request.password).await {
        Ok((response, cookies)) => (StatusCode::OK, cookies, Json(response)).into_response(),
        Err((status, message)) => (status, message).into_response(),
    }
}

async fn build_login_response(
    pool: &PgPool,
    auth_state: &AuthState,
    email: &str,
    password: &str,
) -> Result<(AuthResponse, HeaderMap), (StatusCode, String)> {
    let user = match find_user_by_email(pool, email).await {
        Ok(user) => user,
        Err(err) => {
            error!("Login lookup failed: {err}");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login failed".to_string(),
            ));
        }
    };

    // Unknown accounts and federated accounts without a password get the
    // same response as a wrong password.
    let Some(user) = user else {
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()));
    };
    let Some(stored_hash) = user.password_hash.as_deref() else {
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()));
    };
    if !verify_password(password, stored_hash) {
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()));
    }

    match establish_session(pool, auth_state, &user).await {
        Ok(pair) => Ok(pair),
        Err(err) => {
            error!("Failed to establish session: {err}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login failed".to_string(),
            ))
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = AuthResponse),
        (status = 401, description = "Invalid refresh token", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> impl IntoResponse {
    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Refresh)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    let body_token = payload.and_then(|Json(request)| request.refresh_token);
    let Some(token) = extract_refresh_token(&headers, body_token.as_deref()) else {
        return (
            StatusCode::UNAUTHORIZED,
            "Missing refresh token".to_string(),
        )
            .into_response();
    };

    // Only the hash is stored; never compare raw tokens against the database.
    let token_hash = hash_refresh_token(&token);
    let ttl_seconds = auth_state.config().refresh_token_ttl_seconds();
    match rotate_refresh_token(&pool, &token_hash, ttl_seconds).await {
        Ok(Some(rotated)) => match build_refresh_response(auth_state.config(), rotated) {
            Ok((response, cookies)) => (StatusCode::OK, cookies, Json(response)).into_response(),
            Err(err) => {
                error!("Failed to build refresh response: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Refresh failed".to_string(),
                )
                    .into_response()
            }
        },
        // A rejected token leaves the client without a usable pair, so the
        // cookies are cleared along with the 401.
        Ok(None) => (
            StatusCode::UNAUTHORIZED,
            clear_session_cookies(auth_state.config()),
            "Invalid refresh token".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Refresh rotation failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Refresh failed".to_string(),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> impl IntoResponse {
    let body_token = payload.and_then(|Json(request)| request.refresh_token);
    if let Some(token) = extract_refresh_token(&headers, body_token.as_deref()) {
        let token_hash = hash_refresh_token(&token);
        if let Err(err) = revoke_refresh_token(&pool, &token_hash).await {
            error!("Failed to revoke refresh token: {err}");
        }
    }

    // Always clear both cookies, even when no refresh token was presented.
    (
        StatusCode::NO_CONTENT,
        clear_session_cookies(auth_state.config()),
    )
        .into_response()
}

/// Mint an access token and a refresh ledger row for the user, returning
/// the response body plus the `Set-Cookie` headers for both tokens.
pub(super) async fn establish_session(
    pool: &PgPool,
    auth_state: &AuthState,
    user: &UserRecord,
) -> anyhow::Result<(AuthResponse, HeaderMap)> {
    let config = auth_state.config();
    let access_token = mint_access_token(config, user.id, &user.email, &user.role)?;
    let refresh_token =
        issue_refresh_token(pool, user.id, config.refresh_token_ttl_seconds()).await?;

    let cookies = session_cookies(config, &access_token, &refresh_token)
        .context("failed to build session cookies")?;

    let response = AuthResponse {
        user: UserProfile {
            id: user.id.to_string(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: user.role.clone(),
        },
        access_token,
    };
    Ok((response, cookies))
}

fn build_refresh_response(
    config: &AuthConfig,
    rotated: RotatedSession,
) -> anyhow::Result<(AuthResponse, HeaderMap)> {
    let access_token = mint_access_token(config, rotated.user_id, &rotated.email, &rotated.role)?;
    let cookies = session_cookies(config, &access_token, &rotated.refresh_token)
        .context("failed to build session cookies")?;

    let response = AuthResponse {
        user: UserProfile {
            id: rotated.user_id.to_string(),
            email: rotated.email,
            display_name: rotated.display_name,
            role: rotated.role,
        },
        access_token,
    };
    Ok((response, cookies))
}

/// Build the `Set-Cookie` headers for a freshly issued token pair.
pub(super) fn session_cookies(
    config: &AuthConfig,
    access_token: &str,
    refresh_token: &str,
) -> Result<HeaderMap, InvalidHeaderValue> {
    let mut headers = HeaderMap::new();
    headers.append(
        SET_COOKIE,
        build_cookie(
            ACCESS_COOKIE_NAME,
            access_token,
            config.access_token_ttl_seconds(),
            config.cookie_secure(),
        )?,
    );
    headers.append(
        SET_COOKIE,
        build_cookie(
            REFRESH_COOKIE_NAME,
            refresh_token,
            config.refresh_token_ttl_seconds(),
            config.cookie_secure(),
        )?,
    );
    Ok(headers)
}

fn clear_session_cookies(config: &AuthConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
        if let Ok(cookie) = build_cookie(name, "", 0, config.cookie_secure()) {
            headers.append(SET_COOKIE, cookie);
        }
    }
    headers
}

fn build_cookie(
    name: &str,
    value: &str,
    max_age_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    // Only mark cookies secure when the frontend is served over HTTPS.
    let mut cookie =
        format!("{name}={value}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age_seconds}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Access token lookup order: `Authorization: Bearer` first, cookie second.
pub(super) fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    cookie_value(headers, ACCESS_COOKIE_NAME)
}

/// Refresh token lookup order: cookie first, request body second.
pub(super) fn extract_refresh_token(
    headers: &HeaderMap,
    body_token: Option<&str>,
) -> Option<String> {
    if let Some(token) = cookie_value(headers, REFRESH_COOKIE_NAME) {
        return Some(token);
    }
    body_token
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name {
            return Some(val.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::super::otp::{InMemoryOtpStore, OtpStore};
    use super::super::rate_limit::{NoopRateLimiter, RateLimiter};
    use super::super::state::{AuthConfig, AuthState};
    use super::*;
    use anyhow::Result;
    use axum::http::header::COOKIE;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn test_config(frontend: &str) -> AuthConfig {
        AuthConfig::new(SecretString::from("unit-test-secret"), frontend.to_string())
    }

    fn auth_state() -> Arc<AuthState> {
        let store: Arc<dyn OtpStore> = Arc::new(InMemoryOtpStore::new());
        let limiter: Arc<dyn RateLimiter> = Arc::new(NoopRateLimiter);
        Arc::new(AuthState::new(
            test_config("http://localhost:5173"),
            store,
            limiter,
        ))
    }

    #[test]
    fn session_cookies_carry_both_tokens() -> Result<()> {
        let config = test_config("http://localhost:5173");
        let headers = session_cookies(&config, "access-jwt", "refresh-raw")?;
        let cookies: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("accessToken=access-jwt;"));
        assert!(cookies[0].contains("HttpOnly"));
        assert!(cookies[0].contains("SameSite=Strict"));
        assert!(cookies[0].contains("Max-Age=900"));
        assert!(!cookies[0].contains("Secure"));
        assert!(cookies[1].starts_with("refreshToken=refresh-raw;"));
        assert!(cookies[1].contains("Max-Age=604800"));
        Ok(())
    }

    #[test]
    fn https_frontend_marks_cookies_secure() -> Result<()> {
        let config = test_config("https://resona.example.com");
        let headers = session_cookies(&config, "a", "r")?;
        for value in headers.get_all(SET_COOKIE) {
            assert!(value.to_str()?.contains("Secure"));
        }
        Ok(())
    }

    #[test]
    fn clear_session_cookies_zeroes_max_age() {
        let config = test_config("http://localhost:5173");
        let headers = clear_session_cookies(&config);
        let cookies: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        assert_eq!(cookies.len(), 2);
        for cookie in cookies {
            assert!(cookie.contains("Max-Age=0"));
        }
    }

    #[test]
    fn bearer_header_beats_access_cookie() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer from-header".parse()?);
        headers.insert(COOKIE, "accessToken=from-cookie".parse()?);
        assert_eq!(
            extract_access_token(&headers).as_deref(),
            Some("from-header")
        );
        Ok(())
    }

    #[test]
    fn refresh_cookie_beats_body_token() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "refreshToken=from-cookie; other=x".parse()?);
        assert_eq!(
            extract_refresh_token(&headers, Some("from-body")).as_deref(),
            Some("from-cookie")
        );
        assert_eq!(
            extract_refresh_token(&HeaderMap::new(), Some("from-body")).as_deref(),
            Some("from-body")
        );
        assert!(extract_refresh_token(&HeaderMap::new(), Some("  ")).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn login_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = login(HeaderMap::new(), Extension(pool), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_rejects_invalid_email() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = login(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Some(Json(LoginRequest {
                email: "not-an-email".to_string(),
                password: "whatever".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_missing_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = refresh(HeaderMap::new(), Extension(pool), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn logout_without_token_clears_cookies() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = logout(HeaderMap::new(), Extension(pool), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let cookies: Vec<_> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        assert_eq!(cookies.len(), 2);
        Ok(())
    }
}
