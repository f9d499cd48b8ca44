//! Playlist handlers.
//!
//! Anyone can browse public playlists; mutations are owner-only. Private
//! playlists answer 404 to everyone but their owner so their existence is
//! not revealed.

use axum::{
    Json,
    extract::{Extension, Path, Query, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use utoipa::IntoParams;

use super::super::auth::AuthState;
use super::super::auth::principal::require_auth;
use super::super::auth::types::MessageResponse;
use super::super::{parse_query, parse_uuid};
use super::{
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, clamp_limit, normalize_optional,
    storage::{self, PlaylistOwnership},
    trimmed,
    types::{
        AddTrackRequest, CreatePlaylistRequest, PlaylistDetail, PlaylistPage, PlaylistResponse,
        UpdatePlaylistRequest,
    },
};

#[derive(IntoParams, Debug, Deserialize, Default)]
#[into_params(parameter_in = Query)]
pub struct PlaylistListArgs {
    /// Id of the first playlist to return, from a previous page's `next_cursor`.
    cursor: Option<String>,
    limit: Option<i64>,
}

/// Resolves the playlist and enforces ownership for mutations.
async fn require_owned_playlist(
    pool: &PgPool,
    playlist_id: uuid::Uuid,
    user_id: uuid::Uuid,
) -> Result<PlaylistOwnership, axum::response::Response> {
    match storage::resolve_playlist(pool, playlist_id).await {
        Ok(Some(ownership)) => {
            if ownership.owned_by(user_id) {
                Ok(ownership)
            } else {
                Err((StatusCode::FORBIDDEN, "Not your playlist.").into_response())
            }
        }
        Ok(None) => Err(StatusCode::NOT_FOUND.into_response()),
        Err(err) => {
            error!("Failed to resolve playlist: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/playlists",
    params(PlaylistListArgs),
    responses(
        (status = 200, description = "One page of public playlists.", body = PlaylistPage),
        (status = 400, description = "Invalid cursor.", body = String),
    ),
    tag = "playlists"
)]
/// Lists public playlists newest first with cursor pagination.
pub async fn list_playlists(
    pool: Extension<PgPool>,
    query: Result<Query<PlaylistListArgs>, QueryRejection>,
) -> impl IntoResponse {
    let args = match parse_query(query) {
        Ok(args) => args,
        Err(rejection) => return rejection.into_response(),
    };

    let limit = clamp_limit(args.limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
    let cursor = match trimmed(args.cursor.as_deref()) {
        Some(cursor) => match parse_uuid(cursor, "cursor") {
            Ok(id) => Some(id),
            Err(rejection) => return rejection.into_response(),
        },
        None => None,
    };

    match storage::fetch_public_playlists(&pool, cursor, limit).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => {
            error!("Failed to list playlists: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/playlists/{id}",
    params(("id" = String, Path, description = "Playlist id")),
    responses(
        (status = 200, description = "Playlist with its ordered tracks.", body = PlaylistDetail),
        (status = 400, description = "Invalid playlist id.", body = String),
        (status = 404, description = "Playlist not found."),
    ),
    tag = "playlists"
)]
/// Fetches one playlist with its tracks in position order. A bearer token is
/// optional: owners see their private playlists, everyone else gets 404.
pub async fn get_playlist(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let playlist_id = match parse_uuid(&id, "playlist") {
        Ok(id) => id,
        Err(rejection) => return rejection.into_response(),
    };
    let viewer = require_auth(&headers, auth_state.config())
        .ok()
        .map(|principal| principal.user_id);

    match storage::fetch_playlist_detail(&pool, playlist_id, viewer).await {
        Ok(Some(detail)) => (StatusCode::OK, Json(detail)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to get playlist: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/playlists",
    request_body = CreatePlaylistRequest,
    responses(
        (status = 201, description = "Playlist created.", body = PlaylistResponse),
        (status = 400, description = "Invalid input.", body = String),
        (status = 401, description = "Missing or invalid access token."),
    ),
    tag = "playlists"
)]
/// Creates a playlist owned by the caller. Playlists are public unless
/// `is_public` is explicitly false.
pub async fn create_playlist(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<CreatePlaylistRequest>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let name = payload.name.trim();
    if name.is_empty() {
        return (StatusCode::BAD_REQUEST, "Playlist name is required.").into_response();
    }

    match storage::create_playlist(
        &pool,
        principal.user_id,
        name,
        trimmed(payload.description.as_deref()),
        trimmed(payload.cover_url.as_deref()),
        payload.is_public.unwrap_or(true),
    )
    .await
    {
        Ok(playlist) => (StatusCode::CREATED, Json(playlist)).into_response(),
        Err(err) => {
            error!("Failed to create playlist: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    patch,
    path = "/v1/playlists/{id}",
    request_body = UpdatePlaylistRequest,
    params(("id" = String, Path, description = "Playlist id")),
    responses(
        (status = 200, description = "Playlist updated.", body = PlaylistResponse),
        (status = 400, description = "Invalid input.", body = String),
        (status = 401, description = "Missing or invalid access token."),
        (status = 403, description = "Caller does not own the playlist.", body = String),
        (status = 404, description = "Playlist not found."),
    ),
    tag = "playlists"
)]
/// Partially updates a playlist (owner only). Blank strings are treated as
/// absent; at least one field must remain after normalization.
pub async fn patch_playlist(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<UpdatePlaylistRequest>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };
    let playlist_id = match parse_uuid(&id, "playlist") {
        Ok(id) => id,
        Err(rejection) => return rejection.into_response(),
    };

    let updates = UpdatePlaylistRequest {
        name: normalize_optional(payload.name),
        description: normalize_optional(payload.description),
        cover_url: normalize_optional(payload.cover_url),
        is_public: payload.is_public,
    };
    if updates.is_empty() {
        return (StatusCode::BAD_REQUEST, "No updates provided.").into_response();
    }

    let playlist = match require_owned_playlist(&pool, playlist_id, principal.user_id).await {
        Ok(playlist) => playlist,
        Err(response) => return response,
    };

    match storage::update_playlist(&pool, playlist.id(), &updates).await {
        Ok(playlist) => (StatusCode::OK, Json(playlist)).into_response(),
        Err(err) => {
            error!("Failed to update playlist: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/v1/playlists/{id}",
    params(("id" = String, Path, description = "Playlist id")),
    responses(
        (status = 204, description = "Playlist deleted."),
        (status = 400, description = "Invalid playlist id.", body = String),
        (status = 401, description = "Missing or invalid access token."),
        (status = 403, description = "Caller does not own the playlist.", body = String),
        (status = 404, description = "Playlist not found."),
    ),
    tag = "playlists"
)]
/// Deletes a playlist (owner only). Track membership rows go with it; the
/// tracks themselves are untouched.
pub async fn delete_playlist(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };
    let playlist_id = match parse_uuid(&id, "playlist") {
        Ok(id) => id,
        Err(rejection) => return rejection.into_response(),
    };

    let playlist = match require_owned_playlist(&pool, playlist_id, principal.user_id).await {
        Ok(playlist) => playlist,
        Err(response) => return response,
    };

    match storage::delete_playlist(&pool, playlist.id()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to delete playlist: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/playlists/{id}/tracks",
    request_body = AddTrackRequest,
    params(("id" = String, Path, description = "Playlist id")),
    responses(
        (status = 200, description = "Track appended to the playlist.", body = MessageResponse),
        (status = 400, description = "Invalid id.", body = String),
        (status = 401, description = "Missing or invalid access token."),
        (status = 403, description = "Caller does not own the playlist.", body = String),
        (status = 404, description = "Playlist or track not found."),
        (status = 409, description = "Track is already in the playlist.", body = String),
    ),
    tag = "playlists"
)]
/// Appends a track at the end of a playlist (owner only). Adding a track
/// that is already present answers 409.
pub async fn add_track(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<AddTrackRequest>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };
    let playlist_id = match parse_uuid(&id, "playlist") {
        Ok(id) => id,
        Err(rejection) => return rejection.into_response(),
    };
    let track_id = match parse_uuid(&payload.track_id, "track") {
        Ok(id) => id,
        Err(rejection) => return rejection.into_response(),
    };

    let playlist = match require_owned_playlist(&pool, playlist_id, principal.user_id).await {
        Ok(playlist) => playlist,
        Err(response) => return response,
    };

    match storage::track_exists(&pool, track_id).await {
        Ok(true) => {}
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to validate track for playlist: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    match storage::add_playlist_track(&pool, playlist.id(), track_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Track added.".to_string(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/playlists/{id}/tracks/{track_id}",
    params(
        ("id" = String, Path, description = "Playlist id"),
        ("track_id" = String, Path, description = "Track id"),
    ),
    responses(
        (status = 200, description = "Track removed from the playlist.", body = MessageResponse),
        (status = 400, description = "Invalid id.", body = String),
        (status = 401, description = "Missing or invalid access token."),
        (status = 403, description = "Caller does not own the playlist.", body = String),
        (status = 404, description = "Playlist not found."),
    ),
    tag = "playlists"
)]
/// Removes a track from a playlist (owner only). Removing a track that is
/// not in the playlist is a no-op.
pub async fn remove_track(
    Path((id, track_id)): Path<(String, String)>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };
    let playlist_id = match parse_uuid(&id, "playlist") {
        Ok(id) => id,
        Err(rejection) => return rejection.into_response(),
    };
    let track_id = match parse_uuid(&track_id, "track") {
        Ok(id) => id,
        Err(rejection) => return rejection.into_response(),
    };

    let playlist = match require_owned_playlist(&pool, playlist_id, principal.user_id).await {
        Ok(playlist) => playlist,
        Err(response) => return response,
    };

    match storage::remove_playlist_track(&pool, playlist.id(), track_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Track removed.".to_string(),
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to remove playlist track: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::super::auth::{AuthConfig, AuthState, InMemoryOtpStore, NoopRateLimiter};
    use super::{
        PlaylistListArgs, add_track, create_playlist, delete_playlist, get_playlist,
        list_playlists,
    };
    use crate::api::handlers::catalog::types::{AddTrackRequest, CreatePlaylistRequest};
    use anyhow::Result;
    use axum::{
        Json,
        extract::{Extension, Path, Query},
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
    };
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    fn test_auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new(
            SecretString::from("unit-test-secret"),
            "http://localhost:5173".to_string(),
        );
        Arc::new(AuthState::new(
            config,
            Arc::new(InMemoryOtpStore::new()),
            Arc::new(NoopRateLimiter),
        ))
    }

    #[tokio::test]
    async fn list_playlists_rejects_bad_cursor() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let query = Ok(Query(PlaylistListArgs {
            cursor: Some("garbage".to_string()),
            ..PlaylistListArgs::default()
        }));
        let response = list_playlists(Extension(pool), query).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn get_playlist_rejects_bad_uuid() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = get_playlist(
            Path("not-a-uuid".to_string()),
            HeaderMap::new(),
            Extension(pool),
            Extension(test_auth_state()),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn create_playlist_requires_auth() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let payload = CreatePlaylistRequest {
            name: "Rainy day".to_string(),
            description: None,
            cover_url: None,
            is_public: None,
        };
        let response = create_playlist(
            HeaderMap::new(),
            Extension(pool),
            Extension(test_auth_state()),
            Json(payload),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn delete_playlist_requires_auth() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = delete_playlist(
            Path(uuid::Uuid::new_v4().to_string()),
            HeaderMap::new(),
            Extension(pool),
            Extension(test_auth_state()),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn add_track_requires_auth() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let payload = AddTrackRequest {
            track_id: uuid::Uuid::new_v4().to_string(),
        };
        let response = add_track(
            Path(uuid::Uuid::new_v4().to_string()),
            HeaderMap::new(),
            Extension(pool),
            Extension(test_auth_state()),
            Json(payload),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
