//! Track catalog handlers.
//!
//! Browsing is open to everyone; curation (create, update, soft delete) is
//! ADMIN-only, and play/like require a session. Playback side effects are not
//! applied inline: the play endpoint only validates the track and enqueues a
//! playback event for the background worker, then answers 202.

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
use super::super::auth::principal::{require_admin, require_auth};
use super::super::auth::types::MessageResponse;
use super::super::{parse_query, parse_uuid};
use super::{
    DEFAULT_CHART_SIZE, DEFAULT_PAGE_SIZE, MAX_CHART_SIZE, MAX_PAGE_SIZE, clamp_limit,
    normalize_optional,
    storage::{self, NewTrack, TrackFilter},
    trimmed,
    types::{CreateTrackRequest, LikeResponse, TrackPage, TrackResponse, UpdateTrackRequest},
};
use crate::api::events;

#[derive(IntoParams, Debug, Deserialize, Default)]
#[into_params(parameter_in = Query)]
pub struct TrackListArgs {
    /// Id of the first track to return, from a previous page's `next_cursor`.
    cursor: Option<String>,
    limit: Option<i64>,
    genre: Option<String>,
    artist_id: Option<String>,
}

#[derive(IntoParams, Debug, Deserialize, Default)]
#[into_params(parameter_in = Query)]
pub struct ChartArgs {
    limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/v1/tracks",
    params(TrackListArgs),
    responses(
        (status = 200, description = "One page of tracks.", body = TrackPage),
        (status = 400, description = "Invalid cursor or filter.", body = String),
    ),
    tag = "tracks"
)]
/// Lists active tracks newest first with cursor pagination.
/// Optional `genre` and `artist_id` filters narrow the page; soft-deleted
/// tracks never appear.
pub async fn list_tracks(
    pool: Extension<PgPool>,
    query: Result<Query<TrackListArgs>, QueryRejection>,
) -> impl IntoResponse {
    let args = match parse_query(query) {
        Ok(args) => args,
        Err(rejection) => return rejection.into_response(),
    };

    let limit = clamp_limit(args.limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
    let mut filter = TrackFilter {
        genre: normalize_optional(args.genre),
        ..TrackFilter::default()
    };
    if let Some(artist_id) = trimmed(args.artist_id.as_deref()) {
        filter.artist_id = match parse_uuid(artist_id, "artist") {
            Ok(id) => Some(id),
            Err(rejection) => return rejection.into_response(),
        };
    }
    if let Some(cursor) = trimmed(args.cursor.as_deref()) {
        filter.cursor = match parse_uuid(cursor, "cursor") {
            Ok(id) => Some(id),
            Err(rejection) => return rejection.into_response(),
        };
    }

    match storage::fetch_track_page(&pool, &filter, limit).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => {
            error!("Failed to list tracks: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/tracks/featured",
    params(ChartArgs),
    responses(
        (status = 200, description = "Curated tracks.", body = [TrackResponse]),
    ),
    tag = "tracks"
)]
/// Lists tracks flagged `is_featured` by an admin, newest first.
pub async fn featured_tracks(
    pool: Extension<PgPool>,
    query: Result<Query<ChartArgs>, QueryRejection>,
) -> impl IntoResponse {
    let args = match parse_query(query) {
        Ok(args) => args,
        Err(rejection) => return rejection.into_response(),
    };

    let limit = clamp_limit(args.limit, DEFAULT_CHART_SIZE, MAX_CHART_SIZE);
    match storage::fetch_featured_tracks(&pool, limit).await {
        Ok(tracks) => (StatusCode::OK, Json(tracks)).into_response(),
        Err(err) => {
            error!("Failed to list featured tracks: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/tracks/trending",
    params(ChartArgs),
    responses(
        (status = 200, description = "Most played tracks.", body = [TrackResponse]),
    ),
    tag = "tracks"
)]
/// Lists the most played active tracks. Play counts are applied by the
/// playback worker, so the ordering trails live traffic slightly.
pub async fn trending_tracks(
    pool: Extension<PgPool>,
    query: Result<Query<ChartArgs>, QueryRejection>,
) -> impl IntoResponse {
    let args = match parse_query(query) {
        Ok(args) => args,
        Err(rejection) => return rejection.into_response(),
    };

    let limit = clamp_limit(args.limit, DEFAULT_CHART_SIZE, MAX_CHART_SIZE);
    match storage::fetch_trending_tracks(&pool, limit).await {
        Ok(tracks) => (StatusCode::OK, Json(tracks)).into_response(),
        Err(err) => {
            error!("Failed to list trending tracks: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/tracks/{id}",
    params(("id" = String, Path, description = "Track id")),
    responses(
        (status = 200, description = "Track detail.", body = TrackResponse),
        (status = 400, description = "Invalid track id.", body = String),
        (status = 404, description = "Track not found."),
    ),
    tag = "tracks"
)]
/// Fetches a single track; soft-deleted tracks answer 404.
pub async fn get_track(Path(id): Path<String>, pool: Extension<PgPool>) -> impl IntoResponse {
    let track_id = match parse_uuid(&id, "track") {
        Ok(id) => id,
        Err(rejection) => return rejection.into_response(),
    };

    match storage::fetch_track(&pool, track_id).await {
        Ok(Some(track)) => (StatusCode::OK, Json(track)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to get track: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/tracks",
    request_body = CreateTrackRequest,
    responses(
        (status = 201, description = "Track created.", body = TrackResponse),
        (status = 400, description = "Invalid input.", body = String),
        (status = 401, description = "Missing or invalid access token."),
        (status = 403, description = "Caller is not an admin."),
    ),
    tag = "tracks"
)]
/// Creates a track (ADMIN). The artist is upserted by name and the optional
/// album by title under that artist, so curation never has to pre-create
/// either row.
pub async fn create_track(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<CreateTrackRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, auth_state.config()) {
        return status.into_response();
    }

    let title = payload.title.trim();
    let artist = payload.artist.trim();
    if title.is_empty() || artist.is_empty() {
        return (StatusCode::BAD_REQUEST, "Title and artist are required.").into_response();
    }
    if payload.duration_secs <= 0 {
        return (StatusCode::BAD_REQUEST, "Duration must be positive.").into_response();
    }
    let audio_url = payload.audio_url.trim();
    if audio_url.is_empty() {
        return (StatusCode::BAD_REQUEST, "Audio URL is required.").into_response();
    }

    let track = NewTrack {
        title,
        artist,
        album: trimmed(payload.album.as_deref()),
        genre: trimmed(payload.genre.as_deref()),
        duration_secs: payload.duration_secs,
        audio_url,
        cover_url: trimmed(payload.cover_url.as_deref()),
    };

    match storage::create_track(&pool, &track).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    patch,
    path = "/v1/tracks/{id}",
    request_body = UpdateTrackRequest,
    params(("id" = String, Path, description = "Track id")),
    responses(
        (status = 200, description = "Track updated.", body = TrackResponse),
        (status = 400, description = "Invalid input.", body = String),
        (status = 401, description = "Missing or invalid access token."),
        (status = 403, description = "Caller is not an admin."),
        (status = 404, description = "Track not found."),
    ),
    tag = "tracks"
)]
/// Partially updates a track (ADMIN). Blank strings are treated as absent;
/// at least one field must remain after normalization.
pub async fn patch_track(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(payload): Json<UpdateTrackRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, auth_state.config()) {
        return status.into_response();
    }
    let track_id = match parse_uuid(&id, "track") {
        Ok(id) => id,
        Err(rejection) => return rejection.into_response(),
    };

    let updates = UpdateTrackRequest {
        title: normalize_optional(payload.title),
        genre: normalize_optional(payload.genre),
        duration_secs: payload.duration_secs,
        audio_url: normalize_optional(payload.audio_url),
        cover_url: normalize_optional(payload.cover_url),
        is_featured: payload.is_featured,
    };
    if updates.is_empty() {
        return (StatusCode::BAD_REQUEST, "No updates provided.").into_response();
    }
    if updates.duration_secs.is_some_and(|duration| duration <= 0) {
        return (StatusCode::BAD_REQUEST, "Duration must be positive.").into_response();
    }

    match storage::update_track(&pool, track_id, &updates).await {
        Ok(Some(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to update track: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/v1/tracks/{id}",
    params(("id" = String, Path, description = "Track id")),
    responses(
        (status = 204, description = "Track deleted."),
        (status = 400, description = "Invalid track id.", body = String),
        (status = 401, description = "Missing or invalid access token."),
        (status = 403, description = "Caller is not an admin."),
        (status = 404, description = "Track not found."),
    ),
    tag = "tracks"
)]
/// Soft-deletes a track (ADMIN): sets `deleted_at` so history and stats
/// keep their foreign keys while the track vanishes from every read path.
pub async fn delete_track(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, auth_state.config()) {
        return status.into_response();
    }
    let track_id = match parse_uuid(&id, "track") {
        Ok(id) => id,
        Err(rejection) => return rejection.into_response(),
    };

    match storage::soft_delete_track(&pool, track_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to delete track: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/tracks/{id}/play",
    params(("id" = String, Path, description = "Track id")),
    responses(
        (status = 202, description = "Play recorded for asynchronous processing.", body = MessageResponse),
        (status = 400, description = "Invalid track id.", body = String),
        (status = 401, description = "Missing or invalid access token."),
        (status = 404, description = "Track not found."),
    ),
    tag = "tracks"
)]
/// Records a play. The counter bump, history append, and per-user stats all
/// happen later in the playback worker; the request only validates the track
/// and enqueues an event.
pub async fn play_track(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };
    let track_id = match parse_uuid(&id, "track") {
        Ok(id) => id,
        Err(rejection) => return rejection.into_response(),
    };

    match storage::track_exists(&pool, track_id).await {
        Ok(true) => {}
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to validate track for play: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    if let Err(err) = events::enqueue_play(&pool, track_id, principal.user_id).await {
        error!("Failed to enqueue playback event: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "Play queued.".to_string(),
        }),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/v1/tracks/{id}/like",
    params(("id" = String, Path, description = "Track id")),
    responses(
        (status = 200, description = "Like state after the toggle.", body = LikeResponse),
        (status = 400, description = "Invalid track id.", body = String),
        (status = 401, description = "Missing or invalid access token."),
        (status = 404, description = "Track not found."),
    ),
    tag = "tracks"
)]
/// Toggles the caller's like on a track and reports the resulting state.
pub async fn like_track(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };
    let track_id = match parse_uuid(&id, "track") {
        Ok(id) => id,
        Err(rejection) => return rejection.into_response(),
    };

    match storage::track_exists(&pool, track_id).await {
        Ok(true) => {}
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to validate track for like: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    match storage::toggle_track_like(&pool, principal.user_id, track_id).await {
        Ok(liked) => (StatusCode::OK, Json(LikeResponse { liked })).into_response(),
        Err(err) => {
            error!("Failed to toggle like: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
