//! Shared SQL storage helpers for catalog entities.
//!
//! This module provides functions for CRUD operations on tracks, playlists,
//! and search, ensuring proper scoping and constraint handling. Soft-deleted
//! tracks are filtered out of every read path.

use axum::{http::StatusCode, response::IntoResponse};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::error;
use uuid::Uuid;

use super::types::{
    AlbumResult, AlbumSummary, ArtistSummary, OwnerSummary, PlaylistDetail, PlaylistPage,
    PlaylistResponse, TrackPage, TrackResponse, UpdatePlaylistRequest, UpdateTrackRequest,
};

const TRACK_COLUMNS: &str = r#"
    t.id::text AS id,
    t.title,
    t.genre,
    t.duration_secs,
    t.audio_url,
    t.cover_url,
    t.play_count,
    t.is_featured,
    to_char(t.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    a.id::text AS artist_id,
    a.name AS artist_name,
    a.image_url AS artist_image_url,
    al.id::text AS album_id,
    al.title AS album_title,
    al.cover_url AS album_cover_url"#;

const TRACK_JOINS: &str = r"
    JOIN artists a ON a.id = t.artist_id
    LEFT JOIN albums al ON al.id = t.album_id";

const PLAYLIST_COLUMNS: &str = r#"
    p.id::text AS id,
    p.name,
    p.description,
    p.cover_url,
    p.is_public,
    to_char(p.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    u.id::text AS owner_id,
    u.display_name AS owner_display_name"#;

/// Columns the handler wants when creating a track; grouped to keep the
/// argument list readable.
#[derive(Debug)]
pub(super) struct NewTrack<'a> {
    pub(super) title: &'a str,
    pub(super) artist: &'a str,
    pub(super) album: Option<&'a str>,
    pub(super) genre: Option<&'a str>,
    pub(super) duration_secs: i32,
    pub(super) audio_url: &'a str,
    pub(super) cover_url: Option<&'a str>,
}

/// Filters applied to the track listing page.
#[derive(Debug, Default)]
pub(super) struct TrackFilter {
    pub(super) genre: Option<String>,
    pub(super) artist_id: Option<Uuid>,
    pub(super) cursor: Option<Uuid>,
}

#[derive(Debug)]
pub(super) struct PlaylistOwnership {
    id: Uuid,
    owner_id: Uuid,
}

impl PlaylistOwnership {
    pub(super) fn id(&self) -> Uuid {
        self.id
    }

    /// ACL check used to guard playlist writes.
    pub(super) fn owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }
}

#[derive(Debug)]
pub(super) enum CatalogError {
    Conflict(&'static str),
    Database(sqlx::Error),
}

impl IntoResponse for CatalogError {
    /// Maps storage-layer failures into stable HTTP responses for handlers.
    /// Database errors are logged server-side and surfaced as `500` without
    /// leaking details.
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::Conflict(message) => (StatusCode::CONFLICT, message).into_response(),
            Self::Database(err) => {
                error!("Database error: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

fn track_from_row(row: &PgRow) -> TrackResponse {
    let album = row
        .get::<Option<String>, _>("album_id")
        .map(|id| AlbumSummary {
            id,
            title: row.get("album_title"),
            cover_url: row.get("album_cover_url"),
        });
    TrackResponse {
        id: row.get("id"),
        title: row.get("title"),
        artist: ArtistSummary {
            id: row.get("artist_id"),
            name: row.get("artist_name"),
            image_url: row.get("artist_image_url"),
        },
        album,
        genre: row.get("genre"),
        duration_secs: row.get("duration_secs"),
        audio_url: row.get("audio_url"),
        cover_url: row.get("cover_url"),
        play_count: row.get("play_count"),
        is_featured: row.get("is_featured"),
        created_at: row.get("created_at"),
    }
}

fn playlist_from_row(row: &PgRow) -> PlaylistResponse {
    PlaylistResponse {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        cover_url: row.get("cover_url"),
        is_public: row.get("is_public"),
        owner: OwnerSummary {
            id: row.get("owner_id"),
            display_name: row.get("owner_display_name"),
        },
        created_at: row.get("created_at"),
    }
}

/// Fetches one page of active tracks, newest first.
///
/// One extra row past `limit` is requested; when present its id becomes
/// `next_cursor` and the row is dropped from the page. The cursor predicate is
/// inclusive so the next page starts exactly at that row. A stale cursor
/// (pointing at a deleted row) yields an empty page rather than an error.
pub(super) async fn fetch_track_page(
    pool: &PgPool,
    filter: &TrackFilter,
    limit: i64,
) -> Result<TrackPage, sqlx::Error> {
    let query = format!(
        r"
        SELECT {TRACK_COLUMNS}
        FROM tracks t {TRACK_JOINS}
        WHERE t.deleted_at IS NULL
          AND ($1::text IS NULL OR t.genre = $1)
          AND ($2::uuid IS NULL OR t.artist_id = $2)
          AND ($3::uuid IS NULL
               OR (t.created_at, t.id) <= (SELECT created_at, id FROM tracks WHERE id = $3))
        ORDER BY t.created_at DESC, t.id DESC
        LIMIT $4
        "
    );
    let rows = sqlx::query(&query)
        .bind(filter.genre.as_deref())
        .bind(filter.artist_id)
        .bind(filter.cursor)
        .bind(limit + 1)
        .fetch_all(pool)
        .await?;

    let mut items: Vec<TrackResponse> = rows.iter().map(track_from_row).collect();
    let page_size = usize::try_from(limit).unwrap_or(usize::MAX);
    let next_cursor = if items.len() > page_size {
        items.pop().map(|track| track.id)
    } else {
        None
    };
    Ok(TrackPage { items, next_cursor })
}

/// Lists curated tracks flagged by an admin, newest first.
pub(super) async fn fetch_featured_tracks(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<TrackResponse>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {TRACK_COLUMNS}
        FROM tracks t {TRACK_JOINS}
        WHERE t.deleted_at IS NULL AND t.is_featured
        ORDER BY t.created_at DESC
        LIMIT $1
        "
    );
    let rows = sqlx::query(&query).bind(limit).fetch_all(pool).await?;
    Ok(rows.iter().map(track_from_row).collect())
}

/// Lists the most played active tracks.
pub(super) async fn fetch_trending_tracks(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<TrackResponse>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {TRACK_COLUMNS}
        FROM tracks t {TRACK_JOINS}
        WHERE t.deleted_at IS NULL
        ORDER BY t.play_count DESC, t.created_at DESC
        LIMIT $1
        "
    );
    let rows = sqlx::query(&query).bind(limit).fetch_all(pool).await?;
    Ok(rows.iter().map(track_from_row).collect())
}

/// Fetches a single active track, `None` when missing or soft-deleted.
pub(super) async fn fetch_track(
    pool: &PgPool,
    track_id: Uuid,
) -> Result<Option<TrackResponse>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {TRACK_COLUMNS}
        FROM tracks t {TRACK_JOINS}
        WHERE t.id = $1 AND t.deleted_at IS NULL
        "
    );
    let row = sqlx::query(&query).bind(track_id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(track_from_row))
}

/// Returns `true` when the track exists and is not soft-deleted.
/// Used to validate play and like requests before touching other tables.
pub(super) async fn track_exists(pool: &PgPool, track_id: Uuid) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        "SELECT EXISTS(SELECT 1 FROM tracks WHERE id = $1 AND deleted_at IS NULL) AS exists",
    )
    .bind(track_id)
    .fetch_one(pool)
    .await?;
    Ok(row.get("exists"))
}

/// Inserts a track, creating the artist row (and album row, when given) on
/// first use. Runs as a transaction so a failed insert leaves no orphan
/// artist or album behind.
pub(super) async fn create_track(
    pool: &PgPool,
    track: &NewTrack<'_>,
) -> Result<TrackResponse, CatalogError> {
    let mut tx = pool.begin().await.map_err(CatalogError::Database)?;

    // DO UPDATE instead of DO NOTHING so RETURNING yields a row either way.
    let artist_id: Uuid = sqlx::query(
        r"
        INSERT INTO artists (name)
        VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        ",
    )
    .bind(track.artist)
    .fetch_one(&mut *tx)
    .await
    .map_err(CatalogError::Database)?
    .get("id");

    let album_id: Option<Uuid> = match track.album {
        Some(album_title) => {
            let id = sqlx::query(
                r"
                INSERT INTO albums (artist_id, title)
                VALUES ($1, $2)
                ON CONFLICT (artist_id, title) DO UPDATE SET title = EXCLUDED.title
                RETURNING id
                ",
            )
            .bind(artist_id)
            .bind(album_title)
            .fetch_one(&mut *tx)
            .await
            .map_err(CatalogError::Database)?
            .get("id");
            Some(id)
        }
        None => None,
    };

    let track_id: Uuid = sqlx::query(
        r"
        INSERT INTO tracks (title, artist_id, album_id, genre, duration_secs, audio_url, cover_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        ",
    )
    .bind(track.title)
    .bind(artist_id)
    .bind(album_id)
    .bind(track.genre)
    .bind(track.duration_secs)
    .bind(track.audio_url)
    .bind(track.cover_url)
    .fetch_one(&mut *tx)
    .await
    .map_err(CatalogError::Database)?
    .get("id");

    let query = format!(
        r"
        SELECT {TRACK_COLUMNS}
        FROM tracks t {TRACK_JOINS}
        WHERE t.id = $1
        "
    );
    let row = sqlx::query(&query)
        .bind(track_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(CatalogError::Database)?;

    tx.commit().await.map_err(CatalogError::Database)?;
    Ok(track_from_row(&row))
}

/// Applies a partial update to a track and returns the refreshed row.
/// Returns `None` when the track is missing or soft-deleted.
pub(super) async fn update_track(
    pool: &PgPool,
    track_id: Uuid,
    updates: &UpdateTrackRequest,
) -> Result<Option<TrackResponse>, sqlx::Error> {
    let updated = sqlx::query(
        r"
        UPDATE tracks
        SET
            title = COALESCE($1, title),
            genre = COALESCE($2, genre),
            duration_secs = COALESCE($3, duration_secs),
            audio_url = COALESCE($4, audio_url),
            cover_url = COALESCE($5, cover_url),
            is_featured = COALESCE($6, is_featured),
            updated_at = NOW()
        WHERE id = $7 AND deleted_at IS NULL
        ",
    )
    .bind(updates.title.as_deref())
    .bind(updates.genre.as_deref())
    .bind(updates.duration_secs)
    .bind(updates.audio_url.as_deref())
    .bind(updates.cover_url.as_deref())
    .bind(updates.is_featured)
    .bind(track_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Ok(None);
    }
    fetch_track(pool, track_id).await
}

/// Soft-deletes a track; the row stays for history and stats.
pub(super) async fn soft_delete_track(pool: &PgPool, track_id: Uuid) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        r"
        UPDATE tracks
        SET deleted_at = NOW(), updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        ",
    )
    .bind(track_id)
    .execute(pool)
    .await?;
    Ok(updated.rows_affected() > 0)
}

/// Flips the like state for a user/track pair. Returns the new state:
/// `true` when the track is now liked.
pub(super) async fn toggle_track_like(
    pool: &PgPool,
    user_id: Uuid,
    track_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let removed = sqlx::query("DELETE FROM track_likes WHERE user_id = $1 AND track_id = $2")
        .bind(user_id)
        .bind(track_id)
        .execute(pool)
        .await?
        .rows_affected();
    if removed > 0 {
        return Ok(false);
    }

    let insert = sqlx::query("INSERT INTO track_likes (user_id, track_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(track_id)
        .execute(pool)
        .await;
    match insert {
        Ok(_) => Ok(true),
        // A concurrent like landed first; the end state is still "liked".
        Err(err) if is_unique_violation(&err) => Ok(true),
        Err(err) => Err(err),
    }
}

/// Lists the tracks a user has liked, most recently liked first.
pub(crate) async fn fetch_liked_tracks(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<TrackResponse>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {TRACK_COLUMNS}
        FROM track_likes l
        JOIN tracks t ON t.id = l.track_id {TRACK_JOINS}
        WHERE l.user_id = $1 AND t.deleted_at IS NULL
        ORDER BY l.created_at DESC
        "
    );
    let rows = sqlx::query(&query).bind(user_id).fetch_all(pool).await?;
    Ok(rows.iter().map(track_from_row).collect())
}

/// Fetches one page of public playlists, newest first, with the same
/// inclusive cursor scheme as the track listing.
pub(super) async fn fetch_public_playlists(
    pool: &PgPool,
    cursor: Option<Uuid>,
    limit: i64,
) -> Result<PlaylistPage, sqlx::Error> {
    let query = format!(
        r"
        SELECT {PLAYLIST_COLUMNS}
        FROM playlists p
        JOIN users u ON u.id = p.owner_id
        WHERE p.is_public
          AND ($1::uuid IS NULL
               OR (p.created_at, p.id) <= (SELECT created_at, id FROM playlists WHERE id = $1))
        ORDER BY p.created_at DESC, p.id DESC
        LIMIT $2
        "
    );
    let rows = sqlx::query(&query)
        .bind(cursor)
        .bind(limit + 1)
        .fetch_all(pool)
        .await?;

    let mut items: Vec<PlaylistResponse> = rows.iter().map(playlist_from_row).collect();
    let page_size = usize::try_from(limit).unwrap_or(usize::MAX);
    let next_cursor = if items.len() > page_size {
        items.pop().map(|playlist| playlist.id)
    } else {
        None
    };
    Ok(PlaylistPage { items, next_cursor })
}

/// Fetches a playlist with its ordered tracks.
///
/// Private playlists resolve to `None` unless `viewer` is the owner, so a
/// caller cannot distinguish a hidden playlist from a missing one.
pub(super) async fn fetch_playlist_detail(
    pool: &PgPool,
    playlist_id: Uuid,
    viewer: Option<Uuid>,
) -> Result<Option<PlaylistDetail>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {PLAYLIST_COLUMNS}, p.owner_id AS owner_uuid
        FROM playlists p
        JOIN users u ON u.id = p.owner_id
        WHERE p.id = $1
        "
    );
    let row = sqlx::query(&query)
        .bind(playlist_id)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };

    let is_public: bool = row.get("is_public");
    let owner_uuid: Uuid = row.get("owner_uuid");
    if !is_public && viewer != Some(owner_uuid) {
        return Ok(None);
    }

    let tracks_query = format!(
        r"
        SELECT {TRACK_COLUMNS}
        FROM playlist_tracks pt
        JOIN tracks t ON t.id = pt.track_id {TRACK_JOINS}
        WHERE pt.playlist_id = $1 AND t.deleted_at IS NULL
        ORDER BY pt.position ASC, pt.added_at ASC
        "
    );
    let track_rows = sqlx::query(&tracks_query)
        .bind(playlist_id)
        .fetch_all(pool)
        .await?;

    Ok(Some(PlaylistDetail {
        playlist: playlist_from_row(&row),
        tracks: track_rows.iter().map(track_from_row).collect(),
    }))
}

/// Inserts a playlist for `owner_id` and returns the response row.
pub(super) async fn create_playlist(
    pool: &PgPool,
    owner_id: Uuid,
    name: &str,
    description: Option<&str>,
    cover_url: Option<&str>,
    is_public: bool,
) -> Result<PlaylistResponse, sqlx::Error> {
    let row = sqlx::query(
        r"
        INSERT INTO playlists (owner_id, name, description, cover_url, is_public)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        ",
    )
    .bind(owner_id)
    .bind(name)
    .bind(description)
    .bind(cover_url)
    .bind(is_public)
    .fetch_one(pool)
    .await?;

    fetch_playlist_response(pool, row.get("id")).await
}

/// Resolves a playlist's id and owner for ACL checks, `None` when missing.
pub(super) async fn resolve_playlist(
    pool: &PgPool,
    playlist_id: Uuid,
) -> Result<Option<PlaylistOwnership>, sqlx::Error> {
    let row = sqlx::query("SELECT id, owner_id FROM playlists WHERE id = $1")
        .bind(playlist_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| PlaylistOwnership {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
    }))
}

/// Applies a partial update to a playlist and returns the refreshed row.
/// Caller must already have verified ownership; this function does no ACL
/// checks.
pub(super) async fn update_playlist(
    pool: &PgPool,
    playlist_id: Uuid,
    updates: &UpdatePlaylistRequest,
) -> Result<PlaylistResponse, sqlx::Error> {
    sqlx::query(
        r"
        UPDATE playlists
        SET
            name = COALESCE($1, name),
            description = COALESCE($2, description),
            cover_url = COALESCE($3, cover_url),
            is_public = COALESCE($4, is_public),
            updated_at = NOW()
        WHERE id = $5
        ",
    )
    .bind(updates.name.as_deref())
    .bind(updates.description.as_deref())
    .bind(updates.cover_url.as_deref())
    .bind(updates.is_public)
    .bind(playlist_id)
    .execute(pool)
    .await?;

    fetch_playlist_response(pool, playlist_id).await
}

/// Hard-deletes a playlist; membership rows go with it via cascade.
pub(super) async fn delete_playlist(pool: &PgPool, playlist_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM playlists WHERE id = $1")
        .bind(playlist_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Appends a track at the end of a playlist.
/// A duplicate track maps to `409` via the membership primary key.
pub(super) async fn add_playlist_track(
    pool: &PgPool,
    playlist_id: Uuid,
    track_id: Uuid,
) -> Result<(), CatalogError> {
    let insert = sqlx::query(
        r"
        INSERT INTO playlist_tracks (playlist_id, track_id, position)
        SELECT $1, $2, COALESCE(MAX(position) + 1, 0)
        FROM playlist_tracks
        WHERE playlist_id = $1
        ",
    )
    .bind(playlist_id)
    .bind(track_id)
    .execute(pool)
    .await;

    match insert {
        Ok(_) => Ok(()),
        Err(err) if is_unique_violation(&err) => {
            Err(CatalogError::Conflict("Track is already in this playlist."))
        }
        Err(err) => Err(CatalogError::Database(err)),
    }
}

/// Removes a track from a playlist; removing an absent track is a no-op.
pub(super) async fn remove_playlist_track(
    pool: &PgPool,
    playlist_id: Uuid,
    track_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM playlist_tracks WHERE playlist_id = $1 AND track_id = $2")
        .bind(playlist_id)
        .bind(track_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Lists every playlist owned by a user, most recently updated first.
pub(crate) async fn fetch_playlists_for_owner(
    pool: &PgPool,
    owner_id: Uuid,
) -> Result<Vec<PlaylistResponse>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {PLAYLIST_COLUMNS}
        FROM playlists p
        JOIN users u ON u.id = p.owner_id
        WHERE p.owner_id = $1
        ORDER BY p.updated_at DESC
        "
    );
    let rows = sqlx::query(&query).bind(owner_id).fetch_all(pool).await?;
    Ok(rows.iter().map(playlist_from_row).collect())
}

async fn fetch_playlist_response(
    pool: &PgPool,
    playlist_id: Uuid,
) -> Result<PlaylistResponse, sqlx::Error> {
    let query = format!(
        r"
        SELECT {PLAYLIST_COLUMNS}
        FROM playlists p
        JOIN users u ON u.id = p.owner_id
        WHERE p.id = $1
        "
    );
    let row = sqlx::query(&query).bind(playlist_id).fetch_one(pool).await?;
    Ok(playlist_from_row(&row))
}

/// Tracks matching a search term on title, artist name, or genre,
/// most played first.
pub(super) async fn search_tracks(
    pool: &PgPool,
    pattern: &str,
    limit: i64,
) -> Result<Vec<TrackResponse>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {TRACK_COLUMNS}
        FROM tracks t {TRACK_JOINS}
        WHERE t.deleted_at IS NULL
          AND (t.title ILIKE $1 OR a.name ILIKE $1 OR t.genre ILIKE $1)
        ORDER BY t.play_count DESC, t.created_at DESC
        LIMIT $2
        "
    );
    let rows = sqlx::query(&query)
        .bind(pattern)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(track_from_row).collect())
}

pub(super) async fn search_artists(
    pool: &PgPool,
    pattern: &str,
    limit: i64,
) -> Result<Vec<ArtistSummary>, sqlx::Error> {
    let rows = sqlx::query(
        r"
        SELECT id::text AS id, name, image_url
        FROM artists
        WHERE name ILIKE $1
        ORDER BY name ASC
        LIMIT $2
        ",
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| ArtistSummary {
            id: row.get("id"),
            name: row.get("name"),
            image_url: row.get("image_url"),
        })
        .collect())
}

pub(super) async fn search_albums(
    pool: &PgPool,
    pattern: &str,
    limit: i64,
) -> Result<Vec<AlbumResult>, sqlx::Error> {
    let rows = sqlx::query(
        r"
        SELECT al.id::text AS id, al.title, al.cover_url, a.name AS artist_name
        FROM albums al
        JOIN artists a ON a.id = al.artist_id
        WHERE al.title ILIKE $1
        ORDER BY al.title ASC
        LIMIT $2
        ",
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| AlbumResult {
            id: row.get("id"),
            title: row.get("title"),
            cover_url: row.get("cover_url"),
            artist_name: row.get("artist_name"),
        })
        .collect())
}

/// Public playlists matching a search term on name.
pub(super) async fn search_playlists(
    pool: &PgPool,
    pattern: &str,
    limit: i64,
) -> Result<Vec<PlaylistResponse>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {PLAYLIST_COLUMNS}
        FROM playlists p
        JOIN users u ON u.id = p.owner_id
        WHERE p.is_public AND p.name ILIKE $1
        ORDER BY p.created_at DESC
        LIMIT $2
        "
    );
    let rows = sqlx::query(&query)
        .bind(pattern)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(playlist_from_row).collect())
}

/// Builds an ILIKE pattern that matches the term anywhere, escaping LIKE
/// metacharacters so user input matches literally.
pub(super) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Returns `true` when `err` is a database unique-violation (SQLSTATE `23505`).
/// This is used to translate constraint errors into stable API `409` responses.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}
