//! Authenticated self-service endpoints.
//!
//! Flow Overview:
//! 1) Authenticate via bearer token.
//! 2) Resolve the current user from the database.
//! 3) Apply allow-listed updates, session management, and library reads.
//!
//! Sessions here are rows in the refresh-token ledger: revoking one kills
//! that device's refresh token while the others keep working.

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth::AuthState;
use super::auth::password::{MIN_PASSWORD_LEN, hash_password, verify_password};
use super::auth::principal::require_auth;
use super::auth::types::MessageResponse;
use super::catalog::storage as catalog_storage;
use super::catalog::types::{PlaylistResponse, TrackResponse};

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub locale: Option<String>,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MeUpdateRequest {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub locale: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub code: Option<String>,
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionSummary {
    pub id: String,
    pub created_at: String,
    pub expires_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionResponse {
    pub plan: String,
    pub status: String,
    pub started_at: String,
    pub expires_at: String,
}

#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "Return the authenticated user profile.", body = MeResponse),
        (status = 401, description = "Missing or invalid access token."),
    ),
    tag = "me"
)]
pub async fn get_me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match fetch_profile(&pool, principal.user_id).await {
        Ok(Some(profile)) => {
            (StatusCode::OK, Json(profile.into_response_for(principal.email))).into_response()
        }
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to fetch /me profile: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    patch,
    path = "/v1/me",
    request_body = MeUpdateRequest,
    responses(
        (status = 200, description = "Profile updated.", body = MeResponse),
        (status = 400, description = "Invalid update payload.", body = String),
        (status = 401, description = "Missing or invalid access token."),
    ),
    tag = "me"
)]
pub async fn patch_me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<MeUpdateRequest>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let display_name = normalize_optional(payload.display_name);
    let avatar_url = normalize_optional(payload.avatar_url);
    let locale = normalize_optional(payload.locale);

    if display_name.is_none() && avatar_url.is_none() && locale.is_none() {
        return (StatusCode::BAD_REQUEST, "No updates provided.").into_response();
    }

    match update_profile(&pool, principal.user_id, display_name, avatar_url, locale).await {
        Ok(Some(profile)) => {
            (StatusCode::OK, Json(profile.into_response_for(principal.email))).into_response()
        }
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to update /me profile: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    put,
    path = "/v1/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password replaced.", body = MessageResponse),
        (status = 400, description = "Invalid payload.", body = String),
        (status = 401, description = "Neither the current password nor the code verified.", body = String),
    ),
    tag = "me"
)]
/// Replaces the caller's password. The request must prove possession either
/// with the current password or with a live one-time code; accounts created
/// through Google have no password, so the code path is their only option.
pub async fn change_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<ChangePasswordRequest>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    if payload.new_password.len() < MIN_PASSWORD_LEN {
        return (
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        )
            .into_response();
    }
    if payload.current_password.is_none() && payload.code.is_none() {
        return (
            StatusCode::BAD_REQUEST,
            "Provide the current password or a verification code.",
        )
            .into_response();
    }

    let stored_hash = match fetch_password_hash(&pool, principal.user_id).await {
        Ok(Some(hash)) => hash,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Password change lookup failed: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut verified = false;
    if let Some(current) = payload.current_password.as_deref() {
        verified = stored_hash
            .as_deref()
            .is_some_and(|hash| verify_password(current, hash));
    }
    let mut used_code = false;
    if !verified {
        if let Some(code) = payload.code.as_deref() {
            if let Some(stored) = auth_state.otp_store().get(&principal.email) {
                if stored.code == code.trim() {
                    verified = true;
                    used_code = true;
                }
            }
        }
    }
    if !verified {
        return (StatusCode::UNAUTHORIZED, "Verification failed").into_response();
    }

    let password_hash = match hash_password(&payload.new_password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Password hashing failed: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if let Err(err) = store_password_hash(&pool, principal.user_id, &password_hash).await {
        error!("Failed to store new password: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    // The code is consumed only after the password actually changed.
    if used_code {
        auth_state.otp_store().delete(&principal.email);
    }

    (
        StatusCode::OK,
        Json(MessageResponse {
            message: "Password updated.".to_string(),
        }),
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/v1/me/sessions",
    responses(
        (status = 200, description = "Active sessions for the authenticated user.", body = [SessionSummary]),
        (status = 401, description = "Missing or invalid access token."),
    ),
    tag = "me"
)]
pub async fn list_sessions(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match fetch_sessions(&pool, principal.user_id).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => {
            error!("Failed to list sessions: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/v1/me/sessions/{sid}",
    params(("sid" = String, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session revoked."),
        (status = 401, description = "Missing or invalid access token."),
        (status = 404, description = "Session not found."),
    ),
    tag = "me"
)]
pub async fn revoke_session(
    Path(sid): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let Ok(session_id) = Uuid::parse_str(sid.trim()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match revoke_refresh_session(&pool, principal.user_id, session_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to revoke session: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/me/subscription",
    responses(
        (status = 200, description = "Active subscription, or JSON null when there is none.", body = SubscriptionResponse),
        (status = 401, description = "Missing or invalid access token."),
    ),
    tag = "me"
)]
pub async fn get_subscription(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match fetch_subscription(&pool, principal.user_id).await {
        Ok(subscription) => (StatusCode::OK, Json(subscription)).into_response(),
        Err(err) => {
            error!("Failed to fetch subscription: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/me/likes",
    responses(
        (status = 200, description = "Tracks the user liked, newest first.", body = [TrackResponse]),
        (status = 401, description = "Missing or invalid access token."),
    ),
    tag = "me"
)]
pub async fn list_likes(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match catalog_storage::fetch_liked_tracks(&pool, principal.user_id).await {
        Ok(tracks) => (StatusCode::OK, Json(tracks)).into_response(),
        Err(err) => {
            error!("Failed to list liked tracks: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/me/playlists",
    responses(
        (status = 200, description = "Playlists owned by the user, including private ones.", body = [PlaylistResponse]),
        (status = 401, description = "Missing or invalid access token."),
    ),
    tag = "me"
)]
pub async fn list_my_playlists(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match catalog_storage::fetch_playlists_for_owner(&pool, principal.user_id).await {
        Ok(playlists) => (StatusCode::OK, Json(playlists)).into_response(),
        Err(err) => {
            error!("Failed to list owned playlists: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

struct ProfileRow {
    id: String,
    display_name: Option<String>,
    avatar_url: Option<String>,
    locale: Option<String>,
    role: String,
    created_at: String,
    updated_at: String,
}

impl ProfileRow {
    /// The email comes from the verified token claims, not another read.
    fn into_response_for(self, email: String) -> MeResponse {
        MeResponse {
            id: self.id,
            email,
            display_name: self.display_name,
            avatar_url: self.avatar_url,
            locale: self.locale,
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn profile_from_row(row: &sqlx::postgres::PgRow) -> ProfileRow {
    ProfileRow {
        id: row.get("id"),
        display_name: row.get("display_name"),
        avatar_url: row.get("avatar_url"),
        locale: row.get("locale"),
        role: row.get("role"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn fetch_profile(pool: &PgPool, user_id: Uuid) -> Result<Option<ProfileRow>, sqlx::Error> {
    let query = r#"
        SELECT
            id::text AS id,
            display_name,
            avatar_url,
            locale,
            role,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
        FROM users
        WHERE id = $1
        LIMIT 1
    "#;
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| profile_from_row(&row)))
}

async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    display_name: Option<String>,
    avatar_url: Option<String>,
    locale: Option<String>,
) -> Result<Option<ProfileRow>, sqlx::Error> {
    let query = r#"
        UPDATE users
        SET
            display_name = COALESCE($1, display_name),
            avatar_url = COALESCE($2, avatar_url),
            locale = COALESCE($3, locale),
            updated_at = NOW()
        WHERE id = $4
        RETURNING
            id::text AS id,
            display_name,
            avatar_url,
            locale,
            role,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
    "#;
    let row = sqlx::query(query)
        .bind(display_name)
        .bind(avatar_url)
        .bind(locale)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| profile_from_row(&row)))
}

/// `Ok(None)` means the user row is gone; `Ok(Some(None))` means the account
/// exists but has no password (Google-only sign-in).
async fn fetch_password_hash(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<Option<String>>, sqlx::Error> {
    let row = sqlx::query("SELECT password_hash FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| row.get("password_hash")))
}

async fn store_password_hash(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

async fn fetch_sessions(pool: &PgPool, user_id: Uuid) -> Result<Vec<SessionSummary>, sqlx::Error> {
    let query = r#"
        SELECT
            id::text AS id,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
            to_char(expires_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS expires_at
        FROM refresh_tokens
        WHERE user_id = $1 AND revoked = FALSE AND expires_at > NOW()
        ORDER BY created_at DESC
        LIMIT 5
    "#;
    let rows = sqlx::query(query).bind(user_id).fetch_all(pool).await?;
    Ok(rows
        .into_iter()
        .map(|row| SessionSummary {
            id: row.get("id"),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
        })
        .collect())
}

async fn revoke_refresh_session(
    pool: &PgPool,
    user_id: Uuid,
    session_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let query = r"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE id = $1 AND user_id = $2 AND revoked = FALSE
    ";
    let result = sqlx::query(query)
        .bind(session_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn fetch_subscription(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<SubscriptionResponse>, sqlx::Error> {
    let query = r#"
        SELECT
            plan,
            status,
            to_char(started_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS started_at,
            to_char(expires_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS expires_at
        FROM subscriptions
        WHERE user_id = $1 AND status = 'ACTIVE' AND expires_at > NOW()
        LIMIT 1
    "#;
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| SubscriptionResponse {
        plan: row.get("plan"),
        status: row.get("status"),
        started_at: row.get("started_at"),
        expires_at: row.get("expires_at"),
    }))
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
